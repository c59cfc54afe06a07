// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dataflow network model.
//!
//! This crate provides the graph that the execution engine schedules:
//! - Modules with declared, typed input/output ports and key-value state
//! - Connections binding one output port to one input port
//! - The network owning both, with validated edits and graph queries
//! - Module, state and algorithm factories behind an explicit context
//! - A saved network format (RON or JSON)
//!
//! ## Architecture
//!
//! Modules are shared handles owned by a [`Network`]. Connections refer to
//! their endpoints by module id plus port position, and ports record the ids
//! of the connections attached to them. Execution sees a frozen
//! [`NetworkSnapshot`] so that edits never race with a running pass.

pub mod algorithm;
pub mod connection;
pub mod context;
pub mod error;
pub mod execution;
pub mod factory;
pub mod filter;
pub mod module;
pub mod network;
pub mod persistence;
pub mod port;
pub mod snapshot;
pub mod state;

pub use algorithm::{
    Algorithm, AlgorithmError, AlgorithmFactory, AlgorithmHandle, AlgorithmInput,
    AlgorithmOutput, AlgorithmRegistry,
};
pub use connection::{
    Connection, ConnectionDescription, ConnectionHandle, ConnectionId,
    IncomingConnectionDescription,
    OutgoingConnectionDescription,
};
pub use context::NetworkContext;
pub use error::{ModuleError, NetworkError, Result, WiringError};
pub use execution::{
    CancellationFlag, FnModule, InputSignature, ModuleContext, ModuleExecute, NoOp,
};
pub use factory::{ModuleDescription, ModuleFactory, ModuleIdGenerator, ModuleMaker, ModuleRegistry};
pub use filter::ModuleFilter;
pub use module::{Module, ModuleBuilder, ModuleHandle, ModuleId, ModuleLookupInfo};
pub use network::{ConnectionInputPort, ConnectionOutputPort, Network};
pub use persistence::{ModuleRecord, NetworkFile, NETWORK_FORMAT_VERSION};
pub use port::{
    DatatypeHandle, InputPort, OutputPort, PortDescription, PortDirection, PortId, PortRef,
    PortTypeTag, Ports,
};
pub use snapshot::NetworkSnapshot;
pub use state::{
    ModuleState, ModuleStateFactory, ModuleStateHandle, SimpleMapModuleState,
    SimpleMapModuleStateFactory, StateValue, TransientValue,
};
