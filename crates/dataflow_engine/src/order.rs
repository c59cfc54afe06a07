// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution orders produced by the schedulers.

use dataflow_network::ModuleId;
use serde::{Deserialize, Serialize};

/// A dependency-respecting arrangement of modules, seen as a sequence of
/// waves. Modules inside one wave have no path between them.
pub trait ExecutionOrder: Send + Sync {
    /// The waves, in execution order
    fn waves(&self) -> Vec<Vec<ModuleId>>;

    /// Number of scheduled modules
    fn len(&self) -> usize;

    /// Whether nothing was scheduled
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every scheduled module, in execution order
    fn module_ids(&self) -> Vec<ModuleId> {
        self.waves().into_iter().flatten().collect()
    }
}

/// Plain topological order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleExecutionOrder {
    order: Vec<ModuleId>,
}

impl ModuleExecutionOrder {
    /// Wrap a sequence
    pub fn new(order: Vec<ModuleId>) -> Self {
        Self { order }
    }

    /// Modules in order
    pub fn as_slice(&self) -> &[ModuleId] {
        &self.order
    }

    /// Iterate in order
    pub fn iter(&self) -> impl Iterator<Item = &ModuleId> {
        self.order.iter()
    }

    /// Position of a module
    pub fn position(&self, id: &ModuleId) -> Option<usize> {
        self.order.iter().position(|m| m == id)
    }
}

impl ExecutionOrder for ModuleExecutionOrder {
    fn waves(&self) -> Vec<Vec<ModuleId>> {
        self.order.iter().map(|id| vec![id.clone()]).collect()
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn module_ids(&self) -> Vec<ModuleId> {
        self.order.clone()
    }
}

impl<'a> IntoIterator for &'a ModuleExecutionOrder {
    type Item = &'a ModuleId;
    type IntoIter = std::slice::Iter<'a, ModuleId>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}

/// Topological order partitioned into waves that may run concurrently
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParallelModuleExecutionOrder {
    waves: Vec<Vec<ModuleId>>,
}

impl ParallelModuleExecutionOrder {
    /// Wrap a wave partition
    pub fn new(waves: Vec<Vec<ModuleId>>) -> Self {
        Self { waves }
    }

    /// Waves in order
    pub fn as_waves(&self) -> &[Vec<ModuleId>] {
        &self.waves
    }

    /// Number of waves
    pub fn nwaves(&self) -> usize {
        self.waves.len()
    }

    /// Index of the wave holding a module
    pub fn wave_of(&self, id: &ModuleId) -> Option<usize> {
        self.waves.iter().position(|wave| wave.contains(id))
    }

    /// Widest wave
    pub fn max_width(&self) -> usize {
        self.waves.iter().map(Vec::len).max().unwrap_or(0)
    }
}

impl ExecutionOrder for ParallelModuleExecutionOrder {
    fn waves(&self) -> Vec<Vec<ModuleId>> {
        self.waves.clone()
    }

    fn len(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ModuleId> {
        names.iter().copied().map(ModuleId::new).collect()
    }

    #[test]
    fn test_serial_order_is_singleton_waves() {
        let order = ModuleExecutionOrder::new(ids(&["A", "B"]));
        assert_eq!(order.waves(), vec![ids(&["A"]), ids(&["B"])]);
        assert_eq!(order.position(&ModuleId::new("B")), Some(1));
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_parallel_order_queries() {
        let order = ParallelModuleExecutionOrder::new(vec![ids(&["A"]), ids(&["B", "C"]), ids(&["D"])]);
        assert_eq!(order.len(), 4);
        assert_eq!(order.nwaves(), 3);
        assert_eq!(order.max_width(), 2);
        assert_eq!(order.wave_of(&ModuleId::new("C")), Some(1));
        assert_eq!(order.module_ids(), ids(&["A", "B", "C", "D"]));
    }
}
