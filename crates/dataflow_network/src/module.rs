// SPDX-License-Identifier: MIT OR Apache-2.0
//! Module definitions: identity, declared ports, state and reexecution
//! bookkeeping.

use crate::connection::ConnectionId;
use crate::error::ModuleError;
use crate::execution::{
    CancellationFlag, FnModule, InputSignature, ModuleContext, ModuleExecute, NoOp,
};
use crate::port::{
    DatatypeHandle, InputPort, OutputPort, PortDescription, PortRef, Ports,
};
use crate::state::{ModuleStateHandle, SimpleMapModuleState};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a module within a network, e.g. `"ReadMatrix:2"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Wrap an existing id string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the id for the `index`-th instance of a module type
    pub fn from_name(module_name: &str, index: usize) -> Self {
        Self(format!("{module_name}:{index}"))
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Module type name part of the id
    pub fn module_name(&self) -> &str {
        self.0.rsplit_once(':').map_or(&self.0, |(name, _)| name)
    }

    /// Instance index part of the id, if present
    pub fn index(&self) -> Option<usize> {
        self.0
            .rsplit_once(':')
            .and_then(|(_, index)| index.parse().ok())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Names used to look a module type up in a factory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ModuleLookupInfo {
    /// Module type name
    pub module_name: String,
    /// Category (e.g. "Math")
    pub category_name: String,
    /// Package (e.g. "SCIRun")
    pub package_name: String,
}

impl ModuleLookupInfo {
    /// Create lookup info
    pub fn new(
        module_name: impl Into<String>,
        category_name: impl Into<String>,
        package_name: impl Into<String>,
    ) -> Self {
        Self {
            module_name: module_name.into(),
            category_name: category_name.into(),
            package_name: package_name.into(),
        }
    }

    /// Lookup info with only a module name
    pub fn named(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            ..Self::default()
        }
    }
}

/// Shared handle to a module. The network owns modules; handles are passed
/// around for reading and execution.
pub type ModuleHandle = Arc<Module>;

/// A schedulable unit of work with typed ports and internal state.
pub struct Module {
    id: ModuleId,
    info: ModuleLookupInfo,
    ports: RwLock<Ports>,
    state: ModuleStateHandle,
    behavior: Box<dyn ModuleExecute>,
    disabled: AtomicBool,
    dirty: AtomicBool,
    output_generation: AtomicU64,
    execution_count: AtomicU64,
    last_signature: Mutex<Option<InputSignature>>,
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("info", &self.info)
            .field("ports", &*self.ports.read())
            .field("disabled", &self.is_disabled())
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

impl Module {
    /// Start building a module
    pub fn builder() -> ModuleBuilder {
        ModuleBuilder::new()
    }

    /// Module id
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Factory lookup info
    pub fn info(&self) -> &ModuleLookupInfo {
        &self.info
    }

    /// Module type name
    pub fn module_name(&self) -> &str {
        &self.info.module_name
    }

    /// Number of input ports
    pub fn num_input_ports(&self) -> usize {
        self.ports.read().inputs.len()
    }

    /// Number of output ports
    pub fn num_output_ports(&self) -> usize {
        self.ports.read().outputs.len()
    }

    /// Whether any input port is dynamic
    pub fn has_dynamic_ports(&self) -> bool {
        self.ports.read().inputs.iter().any(InputPort::is_dynamic)
    }

    /// Declared input ports, in order
    pub fn input_descriptions(&self) -> Vec<PortDescription> {
        self.ports
            .read()
            .inputs
            .iter()
            .map(|p| p.description().clone())
            .collect()
    }

    /// Declared output ports, in order
    pub fn output_descriptions(&self) -> Vec<PortDescription> {
        self.ports
            .read()
            .outputs
            .iter()
            .map(|p| p.description().clone())
            .collect()
    }

    /// Look up an input port description and its position
    pub fn input_port(&self, port: impl Into<PortRef>) -> Option<(usize, PortDescription)> {
        let port = port.into();
        let ports = self.ports.read();
        ports
            .resolve_input(&port)
            .map(|index| (index, ports.inputs[index].description().clone()))
    }

    /// Look up an output port description and its position
    pub fn output_port(&self, port: impl Into<PortRef>) -> Option<(usize, PortDescription)> {
        let port = port.into();
        let ports = self.ports.read();
        ports
            .resolve_output(&port)
            .map(|index| (index, ports.outputs[index].description().clone()))
    }

    /// Connections attached to an input port
    pub fn input_connections(&self, index: usize) -> Vec<ConnectionId> {
        self.ports
            .read()
            .inputs
            .get(index)
            .map(|p| p.connections().cloned().collect())
            .unwrap_or_default()
    }

    /// Connections attached to an output port
    pub fn output_connections(&self, index: usize) -> Vec<ConnectionId> {
        self.ports
            .read()
            .outputs
            .get(index)
            .map(|p| p.connections().cloned().collect())
            .unwrap_or_default()
    }

    /// Read access to the ports
    pub fn with_ports<R>(&self, f: impl FnOnce(&Ports) -> R) -> R {
        f(&self.ports.read())
    }

    pub(crate) fn with_ports_mut<R>(&self, f: impl FnOnce(&mut Ports) -> R) -> R {
        f(&mut self.ports.write())
    }

    /// Value last published on an output port
    pub fn output_data(&self, index: usize) -> Option<DatatypeHandle> {
        self.ports
            .read()
            .outputs
            .get(index)
            .and_then(|p| p.data().cloned())
    }

    /// Deliver a value to an input port over one of its connections
    pub fn receive_input(&self, index: usize, connection: &ConnectionId, data: DatatypeHandle) {
        if let Some(port) = self.ports.write().inputs.get_mut(index) {
            port.receive(connection, data);
        }
    }

    /// Drop the value delivered over a connection
    pub fn clear_input(&self, index: usize, connection: &ConnectionId) {
        if let Some(port) = self.ports.write().inputs.get_mut(index) {
            port.clear(connection);
        }
    }

    /// Module state
    pub fn state(&self) -> &ModuleStateHandle {
        &self.state
    }

    /// Whether the module is excluded from default scheduling passes
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Enable or disable the module
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Release);
    }

    /// Force the module to run on the next pass
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Whether the module was explicitly marked for re-execution
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Incremented every time the module produces new output
    pub fn output_generation(&self) -> u64 {
        self.output_generation.load(Ordering::Acquire)
    }

    /// Number of successful executions
    pub fn execution_count(&self) -> u64 {
        self.execution_count.load(Ordering::Acquire)
    }

    /// Input signature recorded at the last successful execution
    pub fn last_signature(&self) -> Option<InputSignature> {
        self.last_signature.lock().clone()
    }

    /// Whether the module has ever completed an execution
    pub fn has_executed(&self) -> bool {
        self.last_signature.lock().is_some()
    }

    /// Remember the inputs of a successful execution and clear the dirty flag
    pub fn record_execution(&self, signature: InputSignature) {
        *self.last_signature.lock() = Some(signature);
        self.dirty.store(false, Ordering::Release);
    }

    /// Forget the last execution so the module runs again
    pub fn invalidate(&self) {
        *self.last_signature.lock() = None;
    }

    /// Run the module body. On success the output generation advances so
    /// downstream modules see new output.
    pub fn do_execute(&self, cancel: &CancellationFlag) -> Result<(), ModuleError> {
        let span = tracing::debug_span!("execute", module = %self.id);
        let _guard = span.enter();

        cancel.check(&self.id)?;
        let mut ctx = ModuleContext::new(self, cancel);
        self.behavior.execute(&mut ctx)?;

        self.output_generation.fetch_add(1, Ordering::AcqRel);
        self.execution_count.fetch_add(1, Ordering::AcqRel);
        tracing::debug!("module executed");
        Ok(())
    }
}

/// Builder for [`Module`]s.
///
/// ```
/// use dataflow_network::{Module, PortDescription, PortTypeTag};
///
/// let module = Module::builder()
///     .with_name("SolveLinearSystem")
///     .add_input_port(PortDescription::input("LHS", PortTypeTag::Matrix))
///     .add_input_port(PortDescription::input("RHS", PortTypeTag::Matrix))
///     .add_output_port(PortDescription::output("Solution", PortTypeTag::Matrix))
///     .build();
/// assert_eq!(module.num_input_ports(), 2);
/// assert_eq!(module.num_output_ports(), 1);
/// ```
pub struct ModuleBuilder {
    id: Option<ModuleId>,
    info: ModuleLookupInfo,
    ports: Ports,
    state: Option<ModuleStateHandle>,
    behavior: Option<Box<dyn ModuleExecute>>,
}

impl ModuleBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            id: None,
            info: ModuleLookupInfo::default(),
            ports: Ports::default(),
            state: None,
            behavior: None,
        }
    }

    /// Set the module type name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.info.module_name = name.into();
        self
    }

    /// Set the full lookup info
    pub fn with_info(mut self, info: ModuleLookupInfo) -> Self {
        self.info = info;
        self
    }

    /// Set the id (defaults to `"<name>:0"`)
    pub fn with_id(mut self, id: ModuleId) -> Self {
        self.id = Some(id);
        self
    }

    /// Append an input port
    pub fn add_input_port(mut self, description: PortDescription) -> Self {
        self.ports.inputs.push(InputPort::new(description));
        self
    }

    /// Append an output port
    pub fn add_output_port(mut self, description: PortDescription) -> Self {
        self.ports.outputs.push(OutputPort::new(description));
        self
    }

    /// Use this state object (defaults to an empty map state)
    pub fn with_state(mut self, state: ModuleStateHandle) -> Self {
        self.state = Some(state);
        self
    }

    /// Set the execute body
    pub fn using(mut self, behavior: impl ModuleExecute + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    /// Set the execute body from a closure
    pub fn using_fn<F>(self, body: F) -> Self
    where
        F: Fn(&mut ModuleContext<'_>) -> Result<(), ModuleError> + Send + Sync + 'static,
    {
        self.using(FnModule(body))
    }

    /// Set an already boxed execute body
    pub fn using_boxed(mut self, behavior: Box<dyn ModuleExecute>) -> Self {
        self.behavior = Some(behavior);
        self
    }

    /// Build the module
    pub fn build(self) -> ModuleHandle {
        let id = self
            .id
            .unwrap_or_else(|| ModuleId::from_name(&self.info.module_name, 0));
        Arc::new(Module {
            id,
            info: self.info,
            ports: RwLock::new(self.ports),
            state: self
                .state
                .unwrap_or_else(|| Arc::new(SimpleMapModuleState::new())),
            behavior: self.behavior.unwrap_or_else(|| Box::new(NoOp)),
            disabled: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            output_generation: AtomicU64::new(0),
            execution_count: AtomicU64::new(0),
            last_signature: Mutex::new(None),
        })
    }
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
