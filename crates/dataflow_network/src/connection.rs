// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the network.

use crate::error::WiringError;
use crate::module::{ModuleHandle, ModuleId};
use crate::port::{PortDirection, PortId, PortRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Unique identifier for a connection, derived from its endpoints
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Wrap an existing id string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate the id for a connection description
    pub fn create(description: &ConnectionDescription) -> Self {
        Self(format!(
            "{}_p#{}_@to@_{}_p#{}",
            description.output.module_id,
            description.output.port_id,
            description.input.module_id,
            description.input.port_id,
        ))
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Output side of a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutgoingConnectionDescription {
    /// Source module
    pub module_id: ModuleId,
    /// Source output port
    pub port_id: PortId,
}

/// Input side of a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncomingConnectionDescription {
    /// Target module
    pub module_id: ModuleId,
    /// Target input port
    pub port_id: PortId,
}

/// Plain description of a connection, used for persistence and events
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionDescription {
    /// Output end
    pub output: OutgoingConnectionDescription,
    /// Input end
    pub input: IncomingConnectionDescription,
}

impl ConnectionDescription {
    /// Create a description from both endpoints
    pub fn new(
        output_module: ModuleId,
        output_port: PortId,
        input_module: ModuleId,
        input_port: PortId,
    ) -> Self {
        Self {
            output: OutgoingConnectionDescription {
                module_id: output_module,
                port_id: output_port,
            },
            input: IncomingConnectionDescription {
                module_id: input_module,
                port_id: input_port,
            },
        }
    }
}

/// A live connection from one output port to one input port.
///
/// Endpoints are stored as module ids plus port positions; the ports
/// themselves record the connection id in their attachment sets. Only the
/// owning [`Network`](crate::network::Network) attaches and detaches
/// connections, so a port never lists a connection the network does not hold.
#[derive(Debug, PartialEq, Eq)]
pub struct Connection {
    id: ConnectionId,
    description: ConnectionDescription,
    output_port_index: usize,
    input_port_index: usize,
}

impl Connection {
    /// Attach a new connection to both ports.
    ///
    /// Fails if either module is missing or either port cannot be resolved.
    /// Both ports are resolved before either is modified, so on failure no
    /// attachment set has changed.
    pub(crate) fn attach(
        output: Option<&ModuleHandle>,
        output_port: impl Into<PortRef>,
        input: Option<&ModuleHandle>,
        input_port: impl Into<PortRef>,
    ) -> Result<Self, WiringError> {
        let output = output.ok_or(WiringError::NullModule(PortDirection::Output))?;
        let input = input.ok_or(WiringError::NullModule(PortDirection::Input))?;
        let output_port = output_port.into();
        let input_port = input_port.into();

        let (output_port_index, output_port_id) = output
            .with_ports(|ports| {
                ports
                    .resolve_output(&output_port)
                    .map(|index| (index, ports.outputs[index].id().clone()))
            })
            .ok_or_else(|| WiringError::PortNotFound {
                module: output.id().clone(),
                port: output_port.clone(),
            })?;
        let (input_port_index, input_port_id) = input
            .with_ports(|ports| {
                ports
                    .resolve_input(&input_port)
                    .map(|index| (index, ports.inputs[index].id().clone()))
            })
            .ok_or_else(|| WiringError::PortNotFound {
                module: input.id().clone(),
                port: input_port.clone(),
            })?;

        let description = ConnectionDescription::new(
            output.id().clone(),
            output_port_id,
            input.id().clone(),
            input_port_id,
        );
        let id = ConnectionId::create(&description);

        output.with_ports_mut(|ports| ports.outputs[output_port_index].attach(id.clone()));
        input.with_ports_mut(|ports| ports.inputs[input_port_index].attach(id.clone()));

        tracing::trace!(connection = %id, "connection attached");
        Ok(Self {
            id,
            description,
            output_port_index,
            input_port_index,
        })
    }

    /// Detach from both ports. Safe to call repeatedly and with either side
    /// already gone.
    pub(crate) fn detach(&self, output: Option<&ModuleHandle>, input: Option<&ModuleHandle>) {
        if let Some(output) = output {
            output.with_ports_mut(|ports| {
                if let Some(port) = ports.outputs.get_mut(self.output_port_index) {
                    port.detach(&self.id);
                }
            });
        }
        if let Some(input) = input {
            input.with_ports_mut(|ports| {
                if let Some(port) = ports.inputs.get_mut(self.input_port_index) {
                    port.detach(&self.id);
                }
            });
        }
        tracing::trace!(connection = %self.id, "connection detached");
    }

    /// Connection id
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Endpoint description
    pub fn description(&self) -> &ConnectionDescription {
        &self.description
    }

    /// Source module id
    pub fn output_module(&self) -> &ModuleId {
        &self.description.output.module_id
    }

    /// Target module id
    pub fn input_module(&self) -> &ModuleId {
        &self.description.input.module_id
    }

    /// Position of the source port on its module
    pub fn output_port_index(&self) -> usize {
        self.output_port_index
    }

    /// Position of the target port on its module
    pub fn input_port_index(&self) -> usize {
        self.input_port_index
    }

    /// Check if this connection involves a specific module
    pub fn involves_module(&self, module_id: &ModuleId) -> bool {
        self.output_module() == module_id || self.input_module() == module_id
    }
}

/// Shared handle to a connection held by a network and its snapshots
pub type ConnectionHandle = Arc<Connection>;
