// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frozen view of a network for one execution pass.

use crate::connection::{Connection, ConnectionHandle};
use crate::execution::InputSignature;
use crate::module::{Module, ModuleHandle, ModuleId};
use std::collections::HashMap;

/// The modules and connections an execution pass started with.
///
/// Later edits to the network do not show up here; the next pass takes a
/// fresh snapshot.
#[derive(Debug, Clone, Default)]
pub struct NetworkSnapshot {
    modules: Vec<ModuleHandle>,
    connections: Vec<ConnectionHandle>,
    positions: HashMap<ModuleId, usize>,
}

impl NetworkSnapshot {
    /// Snapshot from modules in insertion order plus their connections
    pub fn new(modules: Vec<ModuleHandle>, connections: Vec<ConnectionHandle>) -> Self {
        let positions = modules
            .iter()
            .enumerate()
            .map(|(index, module)| (module.id().clone(), index))
            .collect();
        Self {
            modules,
            connections,
            positions,
        }
    }

    /// Modules, in network insertion order
    pub fn modules(&self) -> &[ModuleHandle] {
        &self.modules
    }

    /// Connections, in network insertion order
    pub fn connections(&self) -> &[ConnectionHandle] {
        &self.connections
    }

    /// Module by id
    pub fn module(&self, id: &ModuleId) -> Option<&ModuleHandle> {
        self.position(id).map(|index| &self.modules[index])
    }

    /// Insertion position of a module
    pub fn position(&self, id: &ModuleId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Connections feeding a module
    pub fn incoming<'a>(&'a self, id: &'a ModuleId) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections
            .iter()
            .filter(move |c| c.input_module() == id)
            .map(|c| &**c)
    }

    /// Connections leaving a module
    pub fn outgoing<'a>(&'a self, id: &'a ModuleId) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections
            .iter()
            .filter(move |c| c.output_module() == id)
            .map(|c| &**c)
    }

    /// Copy the current output of every upstream module into the module's
    /// input ports. Inputs whose upstream has produced nothing are cleared.
    pub fn deliver_inputs(&self, module: &Module) {
        for connection in self.incoming(module.id()) {
            let data = self
                .module(connection.output_module())
                .and_then(|upstream| upstream.output_data(connection.output_port_index()));
            match data {
                Some(data) => {
                    module.receive_input(connection.input_port_index(), connection.id(), data);
                }
                None => module.clear_input(connection.input_port_index(), connection.id()),
            }
        }
    }

    /// Current parameter generation of a module plus the output generation
    /// of everything feeding it
    pub fn input_signature(&self, module: &Module) -> InputSignature {
        let inputs = self
            .incoming(module.id())
            .map(|connection| {
                let generation = self
                    .module(connection.output_module())
                    .map_or(0, |upstream| upstream.output_generation());
                (connection.id().clone(), generation)
            })
            .collect();
        InputSignature {
            state_generation: module.state().generation(),
            inputs,
        }
    }
}
