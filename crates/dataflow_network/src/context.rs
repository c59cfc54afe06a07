// SPDX-License-Identifier: MIT OR Apache-2.0
//! Explicit dependency context handed to a network at construction.

use crate::algorithm::{AlgorithmFactory, AlgorithmRegistry};
use crate::factory::{ModuleFactory, ModuleIdGenerator, ModuleRegistry};
use crate::state::{ModuleStateFactory, SimpleMapModuleStateFactory};
use std::fmt;
use std::sync::Arc;

/// Factories and the id generator a network creates modules with.
///
/// Cloning shares the underlying factories and generator.
#[derive(Clone)]
pub struct NetworkContext {
    module_factory: Arc<dyn ModuleFactory>,
    state_factory: Arc<dyn ModuleStateFactory>,
    algorithm_factory: Arc<dyn AlgorithmFactory>,
    id_generator: Arc<ModuleIdGenerator>,
}

impl NetworkContext {
    /// Context around a module factory, with default state and algorithm
    /// factories
    pub fn new(module_factory: Arc<dyn ModuleFactory>) -> Self {
        Self {
            module_factory,
            ..Self::default()
        }
    }

    /// Replace the state factory
    pub fn with_state_factory(mut self, factory: Arc<dyn ModuleStateFactory>) -> Self {
        self.state_factory = factory;
        self
    }

    /// Replace the algorithm factory
    pub fn with_algorithm_factory(mut self, factory: Arc<dyn AlgorithmFactory>) -> Self {
        self.algorithm_factory = factory;
        self
    }

    /// Replace the id generator
    pub fn with_id_generator(mut self, generator: Arc<ModuleIdGenerator>) -> Self {
        self.id_generator = generator;
        self
    }

    /// Module factory
    pub fn module_factory(&self) -> &Arc<dyn ModuleFactory> {
        &self.module_factory
    }

    /// State factory
    pub fn state_factory(&self) -> &Arc<dyn ModuleStateFactory> {
        &self.state_factory
    }

    /// Algorithm factory
    pub fn algorithm_factory(&self) -> &Arc<dyn AlgorithmFactory> {
        &self.algorithm_factory
    }

    /// Module id generator
    pub fn id_generator(&self) -> &ModuleIdGenerator {
        &self.id_generator
    }
}

impl Default for NetworkContext {
    fn default() -> Self {
        Self {
            module_factory: Arc::new(ModuleRegistry::new()),
            state_factory: Arc::new(SimpleMapModuleStateFactory),
            algorithm_factory: Arc::new(AlgorithmRegistry::new()),
            id_generator: Arc::new(ModuleIdGenerator::new()),
        }
    }
}

impl fmt::Debug for NetworkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkContext")
            .field("module_types", &self.module_factory.module_names())
            .field("id_generator", &self.id_generator)
            .finish_non_exhaustive()
    }
}
