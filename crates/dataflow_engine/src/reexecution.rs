// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reexecution strategies deciding whether a scheduled module runs or keeps
//! its previous output.

use crate::config::ReexecutionMode;
use dataflow_network::{Module, NetworkSnapshot};
use std::sync::Arc;

/// Decides execute-or-skip for a module.
///
/// Implementations must be pure functions of the module and snapshot so
/// they can be queried any number of times.
pub trait ReexecutionStrategy: Send + Sync {
    /// Whether the module has to run in this pass
    fn needs_execute(&self, module: &Module, snapshot: &NetworkSnapshot) -> bool;
}

/// Shared strategy handle
pub type ReexecutionStrategyHandle = Arc<dyn ReexecutionStrategy>;

/// Runs every scheduled module
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReexecute;

impl ReexecutionStrategy for AlwaysReexecute {
    fn needs_execute(&self, _module: &Module, _snapshot: &NetworkSnapshot) -> bool {
        true
    }
}

/// Runs a module only when something it depends on changed.
///
/// A module needs to run if it never ran (or its last run failed), was
/// marked dirty, one of its parameters changed, or an upstream module
/// produced new output since its last run. Connections added or removed
/// since then also count as changed input.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicReexecution;

impl ReexecutionStrategy for DynamicReexecution {
    fn needs_execute(&self, module: &Module, snapshot: &NetworkSnapshot) -> bool {
        if module.is_dirty() {
            return true;
        }
        match module.last_signature() {
            Some(last) => last != snapshot.input_signature(module),
            None => true,
        }
    }
}

/// Strategy for a configured mode
pub fn strategy_for(mode: ReexecutionMode) -> ReexecutionStrategyHandle {
    match mode {
        ReexecutionMode::Always => Arc::new(AlwaysReexecute),
        ReexecutionMode::Dynamic => Arc::new(DynamicReexecution),
    }
}
