// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for network editing and module execution.

use crate::algorithm::AlgorithmError;
use crate::module::ModuleId;
use crate::port::{PortDirection, PortId, PortRef, PortTypeTag};
use thiserror::Error;

/// Rejected attempt to wire two ports together.
///
/// The network is left untouched whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WiringError {
    /// The module handle on one side of the connection was missing
    #[error("{0:?} module handle is null")]
    NullModule(PortDirection),

    /// The referenced port does not exist on the module
    #[error("Port {port} not found on module {module}")]
    PortNotFound {
        /// Module that was searched
        module: ModuleId,
        /// Requested port
        port: PortRef,
    },

    /// One of the endpoints belongs to a module outside the network
    #[error("Module {0} is not part of this network")]
    ModuleNotInNetwork(ModuleId),

    /// Both endpoints are on the same module
    #[error("Cannot connect module {0} to itself")]
    SameModule(ModuleId),

    /// Input-to-input or output-to-output request
    #[error("Cannot connect two {0:?} ports")]
    WrongDirection(PortDirection),

    /// Port type tags differ
    #[error("Port type mismatch: {output:?} -> {input:?}")]
    TypeMismatch {
        /// Type of the output port
        output: PortTypeTag,
        /// Type of the input port
        input: PortTypeTag,
    },

    /// A non-dynamic input port already has its connection
    #[error("Input port {port} on module {module} is already connected")]
    InputPortFull {
        /// Owning module
        module: ModuleId,
        /// The occupied port
        port: PortId,
    },

    /// The exact same output/input pair is already connected
    #[error("Connection already exists: {0}")]
    DuplicateConnection(String),
}

/// Errors from network-level operations.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The module factory has no description for this name
    #[error("Unknown module type: {0}")]
    UnknownModuleType(String),

    /// No module with this id in the network
    #[error("Module not found: {0}")]
    ModuleNotFound(ModuleId),

    /// A module with this id is already in the network
    #[error("Duplicate module id: {0}")]
    DuplicateModuleId(ModuleId),

    /// Wiring failure
    #[error(transparent)]
    Wiring(#[from] WiringError),

    /// Encoding or decoding of a network file failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unsupported saved network version
    #[error("Unsupported network format version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Version this build writes
        expected: u32,
    },

    /// File system failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Module-local execution failure.
///
/// These are contained to the failing module; the driver marks it failed and
/// blocks its downstream subgraph.
#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    /// A required input port has no data
    #[error("Input data required on port {port} of module {module}")]
    MissingRequiredInput {
        /// Module being executed
        module: ModuleId,
        /// Port with no data
        port: PortId,
    },

    /// Data on the port is not of the requested type
    #[error("Wrong datatype on port {port} of module {module}; expected {expected}")]
    WrongDatatype {
        /// Module being executed
        module: ModuleId,
        /// Port carrying the data
        port: PortId,
        /// Requested type name
        expected: &'static str,
    },

    /// The module has no such port
    #[error("Port {port} not found on module {module}")]
    PortNotFound {
        /// Module being executed
        module: ModuleId,
        /// Requested port
        port: PortRef,
    },

    /// The wrapped algorithm failed
    #[error("Algorithm error: {0}")]
    Algorithm(#[from] AlgorithmError),

    /// Execution was interrupted by the cancellation flag
    #[error("Execution of module {0} was cancelled")]
    Cancelled(ModuleId),

    /// Any other module failure
    #[error("{0}")]
    Execution(String),
}

impl ModuleError {
    /// Whether this is the named missing-input failure
    pub fn is_missing_input(&self) -> bool {
        matches!(self, Self::MissingRequiredInput { .. })
    }
}

/// Result type for network operations
pub type Result<T> = std::result::Result<T, NetworkError>;
