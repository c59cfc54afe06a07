// SPDX-License-Identifier: MIT OR Apache-2.0
//! The network: owned modules and the connections between them.

use crate::connection::{Connection, ConnectionDescription, ConnectionHandle, ConnectionId};
use crate::context::NetworkContext;
use crate::error::{NetworkError, Result, WiringError};
use crate::module::{ModuleHandle, ModuleId, ModuleLookupInfo};
use crate::port::PortRef;
use crate::snapshot::NetworkSnapshot;
use indexmap::IndexMap;
use std::sync::Arc;

/// Output end of a requested connection
#[derive(Debug, Clone)]
pub struct ConnectionOutputPort {
    /// Source module
    pub module: ModuleHandle,
    /// Source output port
    pub port: PortRef,
}

impl ConnectionOutputPort {
    /// Refer to an output port of a module
    pub fn new(module: &ModuleHandle, port: impl Into<PortRef>) -> Self {
        Self {
            module: Arc::clone(module),
            port: port.into(),
        }
    }
}

/// Input end of a requested connection
#[derive(Debug, Clone)]
pub struct ConnectionInputPort {
    /// Target module
    pub module: ModuleHandle,
    /// Target input port
    pub port: PortRef,
}

impl ConnectionInputPort {
    /// Refer to an input port of a module
    pub fn new(module: &ModuleHandle, port: impl Into<PortRef>) -> Self {
        Self {
            module: Arc::clone(module),
            port: port.into(),
        }
    }
}

/// A dataflow network.
///
/// Every connection's endpoints are modules owned by this network. Modules
/// and connections iterate in insertion order.
#[derive(Debug)]
pub struct Network {
    context: NetworkContext,
    modules: IndexMap<ModuleId, ModuleHandle>,
    connections: IndexMap<ConnectionId, ConnectionHandle>,
}

impl Network {
    /// Create an empty network around a dependency context
    pub fn new(context: NetworkContext) -> Self {
        Self {
            context,
            modules: IndexMap::new(),
            connections: IndexMap::new(),
        }
    }

    /// The dependency context
    pub fn context(&self) -> &NetworkContext {
        &self.context
    }

    /// Create a module through the module factory under a fresh id
    pub fn add_module(&mut self, info: &ModuleLookupInfo) -> Result<ModuleHandle> {
        let factory = Arc::clone(self.context.module_factory());
        if factory.description(&info.module_name).is_none() {
            return Err(NetworkError::UnknownModuleType(info.module_name.clone()));
        }
        let id = self.context.id_generator().generate(&info.module_name);
        let module = factory.create(info, id, &self.context)?;
        self.insert_module(module)
    }

    /// Create a module by type name
    pub fn add_module_named(&mut self, module_name: &str) -> Result<ModuleHandle> {
        self.add_module(&ModuleLookupInfo::named(module_name))
    }

    /// Create a module through the factory under a given id
    pub fn add_module_with_id(
        &mut self,
        info: &ModuleLookupInfo,
        id: ModuleId,
    ) -> Result<ModuleHandle> {
        if self.modules.contains_key(&id) {
            return Err(NetworkError::DuplicateModuleId(id));
        }
        let module = self
            .context
            .module_factory()
            .create(info, id, &self.context)?;
        self.insert_module(module)
    }

    /// Take ownership of an already built module
    pub fn insert_module(&mut self, module: ModuleHandle) -> Result<ModuleHandle> {
        let id = module.id().clone();
        if self.modules.contains_key(&id) {
            return Err(NetworkError::DuplicateModuleId(id));
        }
        self.context.id_generator().reserve(&id);
        tracing::debug!(module = %id, "module added");
        self.modules.insert(id, Arc::clone(&module));
        Ok(module)
    }

    /// Remove a module. Every connection touching it is detached and removed
    /// first.
    pub fn remove_module(&mut self, id: &ModuleId) -> Option<ModuleHandle> {
        let module = self.modules.get(id).cloned()?;
        let touching: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.involves_module(id))
            .map(|c| c.id().clone())
            .collect();
        for connection in &touching {
            self.disconnect(connection);
        }
        self.modules.shift_remove(id);
        tracing::debug!(module = %id, connections = touching.len(), "module removed");
        Some(module)
    }

    /// Connect an output port to an input port.
    ///
    /// Validation happens before anything is attached: both modules must be
    /// in this network and distinct, both ports must exist, the type tags
    /// must match, the pair must not already be connected and a non-dynamic
    /// input must be free.
    pub fn connect(
        &mut self,
        output: ConnectionOutputPort,
        input: ConnectionInputPort,
    ) -> std::result::Result<ConnectionId, WiringError> {
        for module in [&output.module, &input.module] {
            match self.modules.get(module.id()) {
                Some(owned) if Arc::ptr_eq(owned, module) => {}
                _ => return Err(WiringError::ModuleNotInNetwork(module.id().clone())),
            }
        }
        if output.module.id() == input.module.id() {
            return Err(WiringError::SameModule(output.module.id().clone()));
        }

        let (output_port_id, output_type) = output
            .module
            .with_ports(|ports| {
                ports.resolve_output(&output.port).map(|index| {
                    let port = &ports.outputs[index];
                    (port.id().clone(), port.type_tag().clone())
                })
            })
            .ok_or_else(|| WiringError::PortNotFound {
                module: output.module.id().clone(),
                port: output.port.clone(),
            })?;
        let (input_port_id, input_type, input_full) = input
            .module
            .with_ports(|ports| {
                ports.resolve_input(&input.port).map(|index| {
                    let port = &ports.inputs[index];
                    (port.id().clone(), port.type_tag().clone(), port.is_full())
                })
            })
            .ok_or_else(|| WiringError::PortNotFound {
                module: input.module.id().clone(),
                port: input.port.clone(),
            })?;

        if !output_type.can_connect_to(&input_type) {
            return Err(WiringError::TypeMismatch {
                output: output_type,
                input: input_type,
            });
        }

        let description = ConnectionDescription::new(
            output.module.id().clone(),
            output_port_id,
            input.module.id().clone(),
            input_port_id.clone(),
        );
        let id = ConnectionId::create(&description);
        if self.connections.contains_key(&id) {
            return Err(WiringError::DuplicateConnection(id.to_string()));
        }
        if input_full {
            return Err(WiringError::InputPortFull {
                module: input.module.id().clone(),
                port: input_port_id,
            });
        }

        let connection = Connection::attach(
            Some(&output.module),
            output.port,
            Some(&input.module),
            input.port,
        )?;
        let id = connection.id().clone();
        tracing::debug!(connection = %id, "connection added");
        self.connections.insert(id.clone(), Arc::new(connection));
        Ok(id)
    }

    /// Connect two modules of this network by id
    pub fn connect_modules(
        &mut self,
        output_module: &ModuleId,
        output_port: impl Into<PortRef>,
        input_module: &ModuleId,
        input_port: impl Into<PortRef>,
    ) -> std::result::Result<ConnectionId, WiringError> {
        let output = self
            .modules
            .get(output_module)
            .ok_or_else(|| WiringError::ModuleNotInNetwork(output_module.clone()))?;
        let input = self
            .modules
            .get(input_module)
            .ok_or_else(|| WiringError::ModuleNotInNetwork(input_module.clone()))?;
        let output = ConnectionOutputPort::new(output, output_port);
        let input = ConnectionInputPort::new(input, input_port);
        self.connect(output, input)
    }

    /// Re-create a connection from its description
    pub fn connect_description(
        &mut self,
        description: &ConnectionDescription,
    ) -> std::result::Result<ConnectionId, WiringError> {
        self.connect_modules(
            &description.output.module_id,
            &description.output.port_id,
            &description.input.module_id,
            &description.input.port_id,
        )
    }

    /// Remove a connection, detaching both ends
    pub fn disconnect(&mut self, id: &ConnectionId) -> Option<ConnectionHandle> {
        let connection = self.connections.shift_remove(id)?;
        connection.detach(
            self.modules.get(connection.output_module()),
            self.modules.get(connection.input_module()),
        );
        tracing::debug!(connection = %id, "connection removed");
        Some(connection)
    }

    /// Every module, in insertion order. Each call starts a fresh iteration.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleHandle> + Clone {
        self.modules.values()
    }

    /// Every connection, in insertion order
    pub fn connections(&self) -> impl Iterator<Item = &Connection> + Clone {
        self.connections.values().map(|c| &**c)
    }

    /// Every module id, in insertion order
    pub fn module_ids(&self) -> impl Iterator<Item = &ModuleId> + Clone {
        self.modules.keys()
    }

    /// Find a module by id
    pub fn lookup_module(&self, id: &ModuleId) -> Option<&ModuleHandle> {
        self.modules.get(id)
    }

    /// Find a module by id, failing with [`NetworkError::ModuleNotFound`]
    pub fn module(&self, id: &ModuleId) -> Result<&ModuleHandle> {
        self.lookup_module(id)
            .ok_or_else(|| NetworkError::ModuleNotFound(id.clone()))
    }

    /// Find a connection by id
    pub fn connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id).map(|c| &**c)
    }

    /// Number of modules
    pub fn nmodules(&self) -> usize {
        self.modules.len()
    }

    /// Number of connections
    pub fn nconnections(&self) -> usize {
        self.connections.len()
    }

    /// Connections feeding a module
    pub fn incoming_connections<'a>(
        &'a self,
        id: &'a ModuleId,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections
            .values()
            .filter(move |c| c.input_module() == id)
            .map(|c| &**c)
    }

    /// Connections leaving a module
    pub fn outgoing_connections<'a>(
        &'a self,
        id: &'a ModuleId,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections
            .values()
            .filter(move |c| c.output_module() == id)
            .map(|c| &**c)
    }

    /// Modules directly feeding a module, without duplicates
    pub fn upstream_modules(&self, id: &ModuleId) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = Vec::new();
        for connection in self.incoming_connections(id) {
            if !ids.contains(connection.output_module()) {
                ids.push(connection.output_module().clone());
            }
        }
        ids
    }

    /// Modules directly fed by a module, without duplicates
    pub fn downstream_modules(&self, id: &ModuleId) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = Vec::new();
        for connection in self.outgoing_connections(id) {
            if !ids.contains(connection.input_module()) {
                ids.push(connection.input_module().clone());
            }
        }
        ids
    }

    /// Freeze the current modules and connections for one execution pass
    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot::new(
            self.modules.values().cloned().collect(),
            self.connections.values().cloned().collect(),
        )
    }

    /// Remove every connection and module
    pub fn clear(&mut self) {
        let ids: Vec<ConnectionId> = self.connections.keys().cloned().collect();
        for id in &ids {
            self.disconnect(id);
        }
        self.modules.clear();
        self.context.id_generator().reset();
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new(NetworkContext::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;
    use crate::port::{PortDescription, PortTypeTag};

    fn matrix_module(name: &str) -> ModuleHandle {
        Module::builder()
            .with_name(name)
            .add_input_port(PortDescription::input("Input", PortTypeTag::Matrix))
            .add_input_port(PortDescription::input("Inputs", PortTypeTag::Matrix).dynamic())
            .add_output_port(PortDescription::output("Output", PortTypeTag::Matrix))
            .add_output_port(PortDescription::output("Text", PortTypeTag::String))
            .build()
    }

    fn network_with(names: &[&str]) -> (Network, Vec<ModuleHandle>) {
        let mut network = Network::default();
        let modules = names
            .iter()
            .map(|name| network.insert_module(matrix_module(name)).unwrap())
            .collect();
        (network, modules)
    }

    #[test]
    fn test_connect_and_query() {
        let (mut network, m) = network_with(&["A", "B", "C"]);
        network
            .connect(ConnectionOutputPort::new(&m[0], 0), ConnectionInputPort::new(&m[1], 0))
            .unwrap();
        network
            .connect(ConnectionOutputPort::new(&m[0], 0), ConnectionInputPort::new(&m[2], 0))
            .unwrap();

        assert_eq!(network.nconnections(), 2);
        assert_eq!(network.downstream_modules(m[0].id()).len(), 2);
        assert_eq!(network.upstream_modules(m[2].id()), vec![m[0].id().clone()]);
        assert_eq!(m[0].output_connections(0).len(), 2);
    }

    #[test]
    fn test_rejected_connections_leave_network_unchanged() {
        let (mut network, m) = network_with(&["A", "B"]);
        let outsider = matrix_module("Outsider");

        let same = network.connect(
            ConnectionOutputPort::new(&m[0], 0),
            ConnectionInputPort::new(&m[0], 0),
        );
        assert!(matches!(same, Err(WiringError::SameModule(_))));

        let foreign = network.connect(
            ConnectionOutputPort::new(&outsider, 0),
            ConnectionInputPort::new(&m[1], 0),
        );
        assert!(matches!(foreign, Err(WiringError::ModuleNotInNetwork(_))));

        let mismatch = network.connect(
            ConnectionOutputPort::new(&m[0], "Text"),
            ConnectionInputPort::new(&m[1], "Input"),
        );
        assert!(matches!(mismatch, Err(WiringError::TypeMismatch { .. })));

        let missing = network.connect(
            ConnectionOutputPort::new(&m[0], 5),
            ConnectionInputPort::new(&m[1], 0),
        );
        assert!(matches!(missing, Err(WiringError::PortNotFound { .. })));

        assert_eq!(network.nconnections(), 0);
        assert!(m[1].input_connections(0).is_empty());
        assert!(outsider.output_connections(0).is_empty());
    }

    #[test]
    fn test_full_input_port_is_rejected() {
        let (mut network, m) = network_with(&["A", "B", "C"]);
        network.connect_modules(m[0].id(), 0, m[2].id(), 0).unwrap();

        let again = network.connect_modules(m[0].id(), 0, m[2].id(), 0);
        assert!(matches!(again, Err(WiringError::DuplicateConnection(_))));

        let full = network.connect_modules(m[1].id(), 0, m[2].id(), 0);
        assert!(matches!(full, Err(WiringError::InputPortFull { .. })));

        network.connect_modules(m[0].id(), 0, m[2].id(), "Inputs").unwrap();
        network.connect_modules(m[1].id(), 0, m[2].id(), "Inputs").unwrap();
        assert_eq!(m[2].input_connections(1).len(), 2);
    }

    #[test]
    fn test_remove_module_detaches_connections_first() {
        let (mut network, m) = network_with(&["A", "B", "C"]);
        network.connect_modules(m[0].id(), 0, m[1].id(), 0).unwrap();
        network.connect_modules(m[1].id(), 0, m[2].id(), 0).unwrap();

        let removed = network.remove_module(m[1].id()).unwrap();
        assert_eq!(network.nmodules(), 2);
        assert_eq!(network.nconnections(), 0);
        assert!(m[0].output_connections(0).is_empty());
        assert!(m[2].input_connections(0).is_empty());
        assert!(removed.input_connections(0).is_empty());
        assert!(network.remove_module(m[1].id()).is_none());
    }

    #[test]
    fn test_modules_iterate_in_insertion_order_and_restart() {
        let (network, _) = network_with(&["C", "A", "B"]);
        let modules = network.modules();
        let first: Vec<&str> = modules.clone().map(|m| m.id().as_str()).collect();
        let second: Vec<&str> = modules.map(|m| m.id().as_str()).collect();
        assert_eq!(first, vec!["C:0", "A:0", "B:0"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_module_id() {
        let (mut network, _) = network_with(&["A"]);
        let result = network.insert_module(matrix_module("A"));
        assert!(matches!(result, Err(NetworkError::DuplicateModuleId(_))));
    }

    #[test]
    fn test_disconnect_detaches_both_ports() {
        let (mut network, m) = network_with(&["A", "B"]);
        let id = network.connect_modules(m[0].id(), 0, m[1].id(), 0).unwrap();

        assert!(network.disconnect(&id).is_some());
        assert!(network.disconnect(&id).is_none());
        assert!(m[0].output_connections(0).is_empty());
        assert!(m[1].input_connections(0).is_empty());
    }

    #[test]
    fn test_removed_connection_frees_input_port() {
        let (mut network, m) = network_with(&["A", "B", "C"]);
        let id = network.connect_modules(m[0].id(), 0, m[2].id(), 0).unwrap();
        let snapshot = network.snapshot();

        let removed = network.disconnect(&id).unwrap();
        drop(removed);
        assert!(m[2].input_connections(0).is_empty());
        assert!(m[0].output_connections(0).is_empty());
        // A snapshot taken earlier still sees the edge but holds no port.
        assert_eq!(snapshot.connections().len(), 1);

        let replacement = network.connect_modules(m[1].id(), 0, m[2].id(), 0).unwrap();
        assert_eq!(m[2].input_connections(0), vec![replacement]);
    }

    #[test]
    fn test_dropping_network_view_keeps_attachments() {
        let (mut network, m) = network_with(&["A", "B"]);
        let id = network.connect_modules(m[0].id(), 0, m[1].id(), 0).unwrap();
        drop(network.snapshot());

        assert_eq!(m[1].input_connections(0), vec![id.clone()]);
        assert!(matches!(
            network.connect_modules(m[0].id(), 1, m[1].id(), 0),
            Err(WiringError::TypeMismatch { .. } | WiringError::InputPortFull { .. })
        ));
        network.remove_module(m[0].id());
        assert!(m[1].input_connections(0).is_empty());
    }
}
