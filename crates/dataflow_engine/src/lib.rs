// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scheduling and execution engine for dataflow networks.
//!
//! This crate turns a [`dataflow_network::Network`] into work:
//! - A dependency graph over the modules passing a filter
//! - Serial (topological) and parallel (wave) execution orders, with cycle
//!   detection as the only scheduling failure
//! - Reexecution strategies that skip modules whose inputs and parameters
//!   did not change
//! - An execution driver running orders serially or wave by wave on a
//!   worker pool, with cancellation, per-module events and a report
//! - A controller owning the network and notifying subscribers of edits
//!
//! ## Example
//!
//! ```
//! use dataflow_engine::{ParallelScheduler, Scheduler};
//! use dataflow_network::{Module, Network};
//!
//! let mut network = Network::default();
//! network
//!     .insert_module(Module::builder().with_name("Source").build())
//!     .unwrap();
//! let order = ParallelScheduler.schedule(&network).unwrap();
//! assert_eq!(order.nwaves(), 1);
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod graph;
pub mod logging;
pub mod order;
pub mod reexecution;
pub mod scheduler;

pub use config::{EngineConfig, ReexecutionMode, SchedulingMode, CONFIG_FORMAT_VERSION};
pub use controller::{NetworkController, NetworkEvent, PortEndpoint};
pub use error::{EngineError, NetworkHasCycles, Result};
pub use executor::{
    ExecutionEventSender, ExecutionReport, ModuleExecutionEvent, ModuleExecutionState,
    NetworkExecutor, RunId,
};
pub use graph::DependencyGraph;
pub use logging::{init_logging, LogBridge, LogLevel, LogRecord};
pub use order::{ExecutionOrder, ModuleExecutionOrder, ParallelModuleExecutionOrder};
pub use reexecution::{
    strategy_for, AlwaysReexecute, DynamicReexecution, ReexecutionStrategy,
    ReexecutionStrategyHandle,
};
pub use scheduler::{ParallelScheduler, Scheduler, SerialScheduler};
