// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for module inputs/outputs.

use crate::connection::ConnectionId;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Data flowing between modules.
///
/// Modules downcast to the concrete type they expect on a port.
pub type DatatypeHandle = Arc<dyn Any + Send + Sync>;

/// Identifier of a port on a module: its name plus the instance index
/// (non-zero only for additional instances of a dynamic port).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId {
    /// Port name
    pub name: String,
    /// Instance index
    pub index: usize,
}

impl PortId {
    /// Create a port id
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.index)
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Type tag carried by a port. Both ends of a connection must agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortTypeTag {
    /// Dense or sparse real matrix
    Matrix,
    /// Complex matrix
    ComplexMatrix,
    /// Single scalar
    Scalar,
    /// Text
    String,
    /// Field (mesh plus data)
    Field,
    /// Bare mesh
    Mesh,
    /// Renderable geometry
    Geometry,
    /// Color map
    ColorMap,
    /// Heterogeneous bundle
    Bundle,
    /// Nrrd volume
    Nrrd,
    /// Untyped datatype
    Datatype,
    /// Anything else
    Custom(String),
}

impl PortTypeTag {
    /// Human readable type name
    pub fn type_name(&self) -> &str {
        match self {
            Self::Matrix => "Matrix",
            Self::ComplexMatrix => "ComplexMatrix",
            Self::Scalar => "Scalar",
            Self::String => "String",
            Self::Field => "Field",
            Self::Mesh => "Mesh",
            Self::Geometry => "Geometry",
            Self::ColorMap => "ColorMap",
            Self::Bundle => "Bundle",
            Self::Nrrd => "Nrrd",
            Self::Datatype => "Datatype",
            Self::Custom(name) => name,
        }
    }

    /// Check if an output of this type can feed an input of `other`
    pub fn can_connect_to(&self, other: &PortTypeTag) -> bool {
        self == other
    }
}

/// Static description of a port, as declared by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescription {
    /// Port id
    pub id: PortId,
    /// Data type tag
    pub type_tag: PortTypeTag,
    /// Port direction
    pub direction: PortDirection,
    /// Dynamic input ports accept any number of connections
    pub dynamic: bool,
}

impl PortDescription {
    /// Create a new input port description
    pub fn input(name: impl Into<String>, type_tag: PortTypeTag) -> Self {
        Self {
            id: PortId::new(name, 0),
            type_tag,
            direction: PortDirection::Input,
            dynamic: false,
        }
    }

    /// Create a new output port description
    pub fn output(name: impl Into<String>, type_tag: PortTypeTag) -> Self {
        Self {
            id: PortId::new(name, 0),
            type_tag,
            direction: PortDirection::Output,
            dynamic: false,
        }
    }

    /// Mark as dynamic
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Port name
    pub fn name(&self) -> &str {
        &self.id.name
    }
}

/// Reference to a port on a module, either by position or by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortRef {
    /// Position in the module's ordered port list
    Index(usize),
    /// Port id
    Id(PortId),
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

impl From<usize> for PortRef {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<PortId> for PortRef {
    fn from(id: PortId) -> Self {
        Self::Id(id)
    }
}

impl From<&PortId> for PortRef {
    fn from(id: &PortId) -> Self {
        Self::Id(id.clone())
    }
}

impl From<&str> for PortRef {
    fn from(name: &str) -> Self {
        Self::Id(PortId::new(name, 0))
    }
}

/// An input port instance on a module, with its attached connections and
/// the data most recently delivered over each of them.
#[derive(Debug, Clone)]
pub struct InputPort {
    description: PortDescription,
    connections: IndexSet<ConnectionId>,
    received: IndexMap<ConnectionId, DatatypeHandle>,
}

impl InputPort {
    /// Create an unconnected input port
    pub fn new(mut description: PortDescription) -> Self {
        description.direction = PortDirection::Input;
        Self {
            description,
            connections: IndexSet::new(),
            received: IndexMap::new(),
        }
    }

    /// Port description
    pub fn description(&self) -> &PortDescription {
        &self.description
    }

    /// Port id
    pub fn id(&self) -> &PortId {
        &self.description.id
    }

    /// Port type tag
    pub fn type_tag(&self) -> &PortTypeTag {
        &self.description.type_tag
    }

    /// Whether the port accepts multiple connections
    pub fn is_dynamic(&self) -> bool {
        self.description.dynamic
    }

    /// Number of attached connections
    pub fn nconnections(&self) -> usize {
        self.connections.len()
    }

    /// Attached connection ids, in attachment order
    pub fn connections(&self) -> impl Iterator<Item = &ConnectionId> {
        self.connections.iter()
    }

    /// A non-dynamic port holding a connection cannot take another
    pub fn is_full(&self) -> bool {
        !self.is_dynamic() && !self.connections.is_empty()
    }

    /// Record a connection. Returns false if it was already attached.
    pub fn attach(&mut self, connection: ConnectionId) -> bool {
        self.connections.insert(connection)
    }

    /// Forget a connection and any data it delivered. Idempotent.
    pub fn detach(&mut self, connection: &ConnectionId) -> bool {
        self.received.shift_remove(connection);
        self.connections.shift_remove(connection)
    }

    /// Store data delivered over an attached connection
    pub fn receive(&mut self, connection: &ConnectionId, data: DatatypeHandle) {
        if self.connections.contains(connection) {
            self.received.insert(connection.clone(), data);
        }
    }

    /// Drop data delivered over a connection
    pub fn clear(&mut self, connection: &ConnectionId) {
        self.received.shift_remove(connection);
    }

    /// First delivered value, in connection order
    pub fn data(&self) -> Option<&DatatypeHandle> {
        self.connections
            .iter()
            .find_map(|connection| self.received.get(connection))
    }

    /// All delivered values, in connection order
    pub fn all_data(&self) -> impl Iterator<Item = &DatatypeHandle> {
        self.connections
            .iter()
            .filter_map(|connection| self.received.get(connection))
    }
}

/// An output port instance on a module. Output ports fan out to any number
/// of connections and hold the value last produced by the module.
#[derive(Debug, Clone)]
pub struct OutputPort {
    description: PortDescription,
    connections: IndexSet<ConnectionId>,
    data: Option<DatatypeHandle>,
}

impl OutputPort {
    /// Create an unconnected output port
    pub fn new(mut description: PortDescription) -> Self {
        description.direction = PortDirection::Output;
        Self {
            description,
            connections: IndexSet::new(),
            data: None,
        }
    }

    /// Port description
    pub fn description(&self) -> &PortDescription {
        &self.description
    }

    /// Port id
    pub fn id(&self) -> &PortId {
        &self.description.id
    }

    /// Port type tag
    pub fn type_tag(&self) -> &PortTypeTag {
        &self.description.type_tag
    }

    /// Number of attached connections
    pub fn nconnections(&self) -> usize {
        self.connections.len()
    }

    /// Attached connection ids
    pub fn connections(&self) -> impl Iterator<Item = &ConnectionId> {
        self.connections.iter()
    }

    /// Record a connection. Returns false if it was already attached.
    pub fn attach(&mut self, connection: ConnectionId) -> bool {
        self.connections.insert(connection)
    }

    /// Forget a connection. Idempotent.
    pub fn detach(&mut self, connection: &ConnectionId) -> bool {
        self.connections.shift_remove(connection)
    }

    /// Publish a value
    pub fn send(&mut self, data: DatatypeHandle) {
        self.data = Some(data);
    }

    /// Last published value
    pub fn data(&self) -> Option<&DatatypeHandle> {
        self.data.as_ref()
    }
}

/// The ordered input and output ports of one module.
#[derive(Debug, Clone, Default)]
pub struct Ports {
    /// Input ports, in declaration order
    pub inputs: Vec<InputPort>,
    /// Output ports, in declaration order
    pub outputs: Vec<OutputPort>,
}

impl Ports {
    /// Position of an input port
    pub fn resolve_input(&self, port: &PortRef) -> Option<usize> {
        match port {
            PortRef::Index(index) => (*index < self.inputs.len()).then_some(*index),
            PortRef::Id(id) => self.inputs.iter().position(|p| p.id() == id),
        }
    }

    /// Position of an output port
    pub fn resolve_output(&self, port: &PortRef) -> Option<usize> {
        match port {
            PortRef::Index(index) => (*index < self.outputs.len()).then_some(*index),
            PortRef::Id(id) => self.outputs.iter().position(|p| p.id() == id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_port_accepts_one_connection() {
        let mut port = InputPort::new(PortDescription::input("Input", PortTypeTag::Matrix));
        assert!(!port.is_full());
        assert!(port.attach(ConnectionId::new("c1")));
        assert!(port.is_full());
        assert!(!port.attach(ConnectionId::new("c1")));
    }

    #[test]
    fn test_dynamic_port_never_full() {
        let mut port =
            InputPort::new(PortDescription::input("Inputs", PortTypeTag::Matrix).dynamic());
        port.attach(ConnectionId::new("c1"));
        port.attach(ConnectionId::new("c2"));
        assert!(!port.is_full());
        assert_eq!(port.nconnections(), 2);
    }

    #[test]
    fn test_detach_drops_received_data() {
        let mut port = InputPort::new(PortDescription::input("Input", PortTypeTag::Scalar));
        let id = ConnectionId::new("c1");
        port.attach(id.clone());
        port.receive(&id, Arc::new(2.0_f64));
        assert!(port.data().is_some());

        assert!(port.detach(&id));
        assert!(port.data().is_none());
        assert!(!port.detach(&id));
    }

    #[test]
    fn test_receive_ignores_unattached_connection() {
        let mut port = InputPort::new(PortDescription::input("Input", PortTypeTag::Scalar));
        port.receive(&ConnectionId::new("stray"), Arc::new(1_i64));
        assert!(port.data().is_none());
    }

    #[test]
    fn test_resolve_ports() {
        let ports = Ports {
            inputs: vec![
                InputPort::new(PortDescription::input("A", PortTypeTag::Matrix)),
                InputPort::new(PortDescription::input("B", PortTypeTag::Matrix)),
            ],
            outputs: vec![OutputPort::new(PortDescription::output(
                "Result",
                PortTypeTag::Matrix,
            ))],
        };
        assert_eq!(ports.resolve_input(&PortRef::Index(1)), Some(1));
        assert_eq!(ports.resolve_input(&PortRef::from("B")), Some(1));
        assert_eq!(ports.resolve_input(&PortRef::Index(2)), None);
        assert_eq!(ports.resolve_output(&PortRef::from("Result")), Some(0));
        assert_eq!(ports.resolve_output(&PortRef::from("Missing")), None);
    }

    #[test]
    fn test_type_tags_must_match() {
        assert!(PortTypeTag::Matrix.can_connect_to(&PortTypeTag::Matrix));
        assert!(!PortTypeTag::Matrix.can_connect_to(&PortTypeTag::Field));
        assert_eq!(PortTypeTag::Custom("Nrrd2".into()).type_name(), "Nrrd2");
    }
}
