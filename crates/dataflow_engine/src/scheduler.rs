// SPDX-License-Identifier: MIT OR Apache-2.0
//! Schedulers turning a network into an execution order.

use crate::error::NetworkHasCycles;
use crate::graph::DependencyGraph;
use crate::order::{ExecutionOrder, ModuleExecutionOrder, ParallelModuleExecutionOrder};
use dataflow_network::{ModuleFilter, Network, NetworkSnapshot};

/// Computes an execution order for the modules passing a filter.
///
/// A cycle among the scheduled modules is the only failure.
pub trait Scheduler {
    /// Order representation produced
    type Order: ExecutionOrder;

    /// Schedule a frozen snapshot
    fn schedule_snapshot(
        &self,
        snapshot: &NetworkSnapshot,
        filter: &ModuleFilter,
    ) -> Result<Self::Order, NetworkHasCycles>;

    /// Schedule every module of a network
    fn schedule(&self, network: &Network) -> Result<Self::Order, NetworkHasCycles> {
        self.schedule_filtered(network, &ModuleFilter::all())
    }

    /// Schedule the subnetwork passing `filter`
    fn schedule_filtered(
        &self,
        network: &Network,
        filter: &ModuleFilter,
    ) -> Result<Self::Order, NetworkHasCycles> {
        self.schedule_snapshot(&network.snapshot(), filter)
    }
}

/// Produces a [`ModuleExecutionOrder`], ties broken by insertion order
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialScheduler;

impl Scheduler for SerialScheduler {
    type Order = ModuleExecutionOrder;

    fn schedule_snapshot(
        &self,
        snapshot: &NetworkSnapshot,
        filter: &ModuleFilter,
    ) -> Result<ModuleExecutionOrder, NetworkHasCycles> {
        let graph = DependencyGraph::from_snapshot(snapshot, filter);
        let order = graph.topological_order()?;
        tracing::debug!(modules = order.len(), "serial schedule computed");
        Ok(ModuleExecutionOrder::new(order))
    }
}

/// Produces a [`ParallelModuleExecutionOrder`] with maximum-width waves
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelScheduler;

impl Scheduler for ParallelScheduler {
    type Order = ParallelModuleExecutionOrder;

    fn schedule_snapshot(
        &self,
        snapshot: &NetworkSnapshot,
        filter: &ModuleFilter,
    ) -> Result<ParallelModuleExecutionOrder, NetworkHasCycles> {
        let graph = DependencyGraph::from_snapshot(snapshot, filter);
        let waves = graph.waves()?;
        tracing::debug!(
            modules = graph.len(),
            waves = waves.len(),
            "parallel schedule computed"
        );
        Ok(ParallelModuleExecutionOrder::new(waves))
    }
}
