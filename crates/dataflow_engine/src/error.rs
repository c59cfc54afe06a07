// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for scheduling and engine operations.

use dataflow_network::{ModuleId, NetworkError};
use thiserror::Error;

/// The scheduled graph contains at least one cycle.
///
/// `modules` lists every module whose in-degree never reached zero, in
/// network order. That is every module on a cycle plus anything downstream
/// of one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Network has cycles involving {} module(s): {}", .modules.len(), format_ids(.modules))]
pub struct NetworkHasCycles {
    /// Modules left unscheduled
    pub modules: Vec<ModuleId>,
}

fn format_ids(ids: &[ModuleId]) -> String {
    ids.iter()
        .map(ModuleId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Network edit or persistence failure
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Scheduling refused because of a cycle
    #[error(transparent)]
    Cycle(#[from] NetworkHasCycles),

    /// The worker pool could not be started
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The logging subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// File system failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
