// SPDX-License-Identifier: MIT OR Apache-2.0
//! Module factory with every module of this crate registered.

use crate::algorithms::default_algorithms;
use crate::basic::{ReceiveTestMatrix, SendTestMatrix};
use crate::math::{
    AccumulateMatrices, EvaluateLinearAlgebraBinary, EvaluateLinearAlgebraUnary, ReportMatrixInfo,
};
use dataflow_network::{ModuleDescription, ModuleFactory, ModuleRegistry, NetworkContext};
use std::sync::Arc;

/// Fixed set of module types known at compile time
#[derive(Debug)]
pub struct HardCodedModuleFactory {
    registry: ModuleRegistry,
}

impl HardCodedModuleFactory {
    /// Factory with every built-in module registered
    pub fn new() -> Self {
        let mut registry = ModuleRegistry::new();
        registry.register(SendTestMatrix::description());
        registry.register(ReceiveTestMatrix::description());
        registry.register(EvaluateLinearAlgebraUnary::description());
        registry.register(EvaluateLinearAlgebraBinary::description());
        registry.register(ReportMatrixInfo::description());
        registry.register(AccumulateMatrices::description());
        Self { registry }
    }
}

impl Default for HardCodedModuleFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleFactory for HardCodedModuleFactory {
    fn description(&self, module_name: &str) -> Option<ModuleDescription> {
        self.registry.description(module_name)
    }

    fn module_names(&self) -> Vec<String> {
        self.registry.module_names()
    }
}

/// Network context wired with the built-in module and algorithm factories
pub fn default_context() -> NetworkContext {
    NetworkContext::new(Arc::new(HardCodedModuleFactory::new()))
        .with_algorithm_factory(Arc::new(default_algorithms()))
}
