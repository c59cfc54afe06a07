// SPDX-License-Identifier: MIT OR Apache-2.0
//! Module factories and module id generation.

use crate::context::NetworkContext;
use crate::error::{ModuleError, NetworkError, Result};
use crate::execution::{FnModule, ModuleContext, ModuleExecute, NoOp};
use crate::module::{Module, ModuleHandle, ModuleId, ModuleLookupInfo};
use crate::port::PortDescription;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Creates the execute body of a new module instance
pub type ModuleMaker = Arc<dyn Fn(&NetworkContext) -> Box<dyn ModuleExecute> + Send + Sync>;

/// Everything needed to instantiate one module type
#[derive(Clone)]
pub struct ModuleDescription {
    /// Lookup names
    pub lookup_info: ModuleLookupInfo,
    /// Declared input ports
    pub input_ports: Vec<PortDescription>,
    /// Declared output ports
    pub output_ports: Vec<PortDescription>,
    /// Execute body constructor
    pub maker: ModuleMaker,
}

impl fmt::Debug for ModuleDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescription")
            .field("lookup_info", &self.lookup_info)
            .field("input_ports", &self.input_ports)
            .field("output_ports", &self.output_ports)
            .finish_non_exhaustive()
    }
}

impl ModuleDescription {
    /// Description with no ports and a no-op body
    pub fn new(lookup_info: ModuleLookupInfo) -> Self {
        Self {
            lookup_info,
            input_ports: Vec::new(),
            output_ports: Vec::new(),
            maker: Arc::new(|_: &NetworkContext| Box::new(NoOp) as Box<dyn ModuleExecute>),
        }
    }

    /// Append an input port
    pub fn with_input(mut self, port: PortDescription) -> Self {
        self.input_ports.push(port);
        self
    }

    /// Append an output port
    pub fn with_output(mut self, port: PortDescription) -> Self {
        self.output_ports.push(port);
        self
    }

    /// Set the body constructor
    pub fn with_maker(
        mut self,
        maker: impl Fn(&NetworkContext) -> Box<dyn ModuleExecute> + Send + Sync + 'static,
    ) -> Self {
        self.maker = Arc::new(maker);
        self
    }

    /// Use the same closure body for every instance
    pub fn with_body<F>(self, body: F) -> Self
    where
        F: Fn(&mut ModuleContext<'_>) -> std::result::Result<(), ModuleError>
            + Send
            + Sync
            + Clone
            + 'static,
    {
        self.with_maker(move |_| Box::new(FnModule(body.clone())))
    }

    /// Instantiate a module with the given id
    pub fn instantiate(&self, id: ModuleId, ctx: &NetworkContext) -> ModuleHandle {
        let builder = Module::builder()
            .with_info(self.lookup_info.clone())
            .with_id(id)
            .with_state(ctx.state_factory().make_state(&self.lookup_info.module_name))
            .using_boxed((self.maker)(ctx));
        let builder = self
            .input_ports
            .iter()
            .cloned()
            .fold(builder, |b, port| b.add_input_port(port));
        self.output_ports
            .iter()
            .cloned()
            .fold(builder, |b, port| b.add_output_port(port))
            .build()
    }
}

/// Source of module types
pub trait ModuleFactory: Send + Sync {
    /// Description of the named module type
    fn description(&self, module_name: &str) -> Option<ModuleDescription>;

    /// Names of every available module type
    fn module_names(&self) -> Vec<String>;

    /// Create a module instance
    fn create(
        &self,
        info: &ModuleLookupInfo,
        id: ModuleId,
        ctx: &NetworkContext,
    ) -> Result<ModuleHandle> {
        let description = self
            .description(&info.module_name)
            .ok_or_else(|| NetworkError::UnknownModuleType(info.module_name.clone()))?;
        Ok(description.instantiate(id, ctx))
    }
}

/// Registry of available module types
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    descriptions: IndexMap<String, ModuleDescription>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module type
    pub fn register(&mut self, description: ModuleDescription) {
        self.descriptions
            .insert(description.lookup_info.module_name.clone(), description);
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    /// Whether no types are registered
    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}

impl ModuleFactory for ModuleRegistry {
    fn description(&self, module_name: &str) -> Option<ModuleDescription> {
        self.descriptions.get(module_name).cloned()
    }

    fn module_names(&self) -> Vec<String> {
        self.descriptions.keys().cloned().collect()
    }
}

/// Produces `"<ModuleName>:<n>"` ids from a per-name counter
#[derive(Debug, Default)]
pub struct ModuleIdGenerator {
    counters: Mutex<HashMap<String, usize>>,
}

impl ModuleIdGenerator {
    /// Create a generator with every counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Next free id for a module type
    pub fn generate(&self, module_name: &str) -> ModuleId {
        let mut counters = self.counters.lock();
        let next = counters.entry(module_name.to_string()).or_insert(0);
        let id = ModuleId::from_name(module_name, *next);
        *next += 1;
        id
    }

    /// Make sure later ids never collide with an existing one
    pub fn reserve(&self, id: &ModuleId) {
        let Some(index) = id.index() else {
            return;
        };
        let mut counters = self.counters.lock();
        let next = counters.entry(id.module_name().to_string()).or_insert(0);
        *next = (*next).max(index + 1);
    }

    /// Start every counter over
    pub fn reset(&self) {
        self.counters.lock().clear();
    }
}
