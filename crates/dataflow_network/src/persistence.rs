// SPDX-License-Identifier: MIT OR Apache-2.0
//! Saved network format.
//!
//! A [`NetworkFile`] captures module ids, lookup info, parameter state and
//! the connection list; loading it through the same module factory rebuilds
//! an identical graph.

use crate::connection::ConnectionDescription;
use crate::context::NetworkContext;
use crate::error::{NetworkError, Result};
use crate::module::{ModuleId, ModuleLookupInfo};
use crate::network::Network;
use crate::state::StateValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current saved network format version
pub const NETWORK_FORMAT_VERSION: u32 = 1;

/// One saved module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Factory lookup info
    pub info: ModuleLookupInfo,
    /// Parameter values
    #[serde(default)]
    pub state: IndexMap<String, StateValue>,
    /// Whether the module was disabled
    #[serde(default)]
    pub disabled: bool,
}

/// Saved network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkFile {
    /// Format version
    pub version: u32,
    /// Modules by id, in network order
    pub modules: IndexMap<ModuleId, ModuleRecord>,
    /// Connections, in network order
    pub connections: Vec<ConnectionDescription>,
}

impl NetworkFile {
    /// Capture a network
    pub fn from_network(network: &Network) -> Self {
        let modules = network
            .modules()
            .map(|module| {
                (
                    module.id().clone(),
                    ModuleRecord {
                        info: module.info().clone(),
                        state: module.state().values(),
                        disabled: module.is_disabled(),
                    },
                )
            })
            .collect();
        let connections = network
            .connections()
            .map(|c| c.description().clone())
            .collect();
        Self {
            version: NETWORK_FORMAT_VERSION,
            modules,
            connections,
        }
    }

    /// Rebuild the network through the context's module factory
    pub fn into_network(self, context: NetworkContext) -> Result<Network> {
        self.check_version()?;
        let mut network = Network::new(context);
        for (id, record) in self.modules {
            let module = network.add_module_with_id(&record.info, id)?;
            for (key, value) in record.state {
                module.state().set_value(&key, value);
            }
            module.set_disabled(record.disabled);
        }
        for description in &self.connections {
            network.connect_description(description)?;
        }
        tracing::info!(
            modules = network.nmodules(),
            connections = network.nconnections(),
            "network loaded"
        );
        Ok(network)
    }

    fn check_version(&self) -> Result<()> {
        if self.version > NETWORK_FORMAT_VERSION {
            return Err(NetworkError::UnsupportedVersion {
                found: self.version,
                expected: NETWORK_FORMAT_VERSION,
            });
        }
        Ok(())
    }

    /// Encode as pretty RON
    pub fn to_ron_string(&self) -> Result<String> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        ron::ser::to_string_pretty(self, config)
            .map_err(|e| NetworkError::Serialization(e.to_string()))
    }

    /// Decode from RON
    pub fn from_ron_str(content: &str) -> Result<Self> {
        ron::from_str(content).map_err(|e| NetworkError::Serialization(e.to_string()))
    }

    /// Encode as pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| NetworkError::Serialization(e.to_string()))
    }

    /// Decode from JSON
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| NetworkError::Serialization(e.to_string()))
    }

    /// Write to a file; `.json` files are JSON, anything else RON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = if is_json(path) {
            self.to_json_string()?
        } else {
            self.to_ron_string()?
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Read from a file; `.json` files are JSON, anything else RON
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file = if is_json(path) {
            Self::from_json_str(&content)?
        } else {
            Self::from_ron_str(&content)?
        };
        file.check_version()?;
        Ok(file)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
