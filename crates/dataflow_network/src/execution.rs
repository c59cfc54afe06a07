// SPDX-License-Identifier: MIT OR Apache-2.0
//! The module execution contract.
//!
//! A module's execute body sees only a [`ModuleContext`]: typed reads from
//! its input ports, writes to its output ports, its state and the
//! cancellation flag of the current pass.

use crate::connection::ConnectionId;
use crate::error::ModuleError;
use crate::module::{Module, ModuleId};
use crate::port::{DatatypeHandle, PortId, PortRef};
use crate::state::ModuleStateHandle;
use std::any::{type_name, Any};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The execute operation of a module
pub trait ModuleExecute: Send + Sync {
    /// Read inputs, do the work, publish outputs
    fn execute(&self, ctx: &mut ModuleContext<'_>) -> Result<(), ModuleError>;
}

/// Module body that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOp;

impl ModuleExecute for NoOp {
    fn execute(&self, _ctx: &mut ModuleContext<'_>) -> Result<(), ModuleError> {
        Ok(())
    }
}

/// Module body backed by a closure
pub struct FnModule<F>(pub F);

impl<F> ModuleExecute for FnModule<F>
where
    F: Fn(&mut ModuleContext<'_>) -> Result<(), ModuleError> + Send + Sync,
{
    fn execute(&self, ctx: &mut ModuleContext<'_>) -> Result<(), ModuleError> {
        (self.0)(ctx)
    }
}

/// External cancellation flag, polled by modules at checkpoints.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create a flag that is not set
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear the flag for the next pass
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// `Err(Cancelled)` if cancellation was requested
    pub fn check(&self, module: &ModuleId) -> Result<(), ModuleError> {
        if self.is_cancelled() {
            Err(ModuleError::Cancelled(module.clone()))
        } else {
            Ok(())
        }
    }
}

/// What a module saw when it last ran: its parameter generation and the
/// output generation of every upstream connection feeding it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputSignature {
    /// Module state generation
    pub state_generation: u64,
    /// Upstream output generation per incoming connection
    pub inputs: Vec<(ConnectionId, u64)>,
}

/// View of a module handed to its execute body
pub struct ModuleContext<'a> {
    module: &'a Module,
    cancel: &'a CancellationFlag,
}

impl<'a> ModuleContext<'a> {
    pub(crate) fn new(module: &'a Module, cancel: &'a CancellationFlag) -> Self {
        Self { module, cancel }
    }

    /// Id of the executing module
    pub fn module_id(&self) -> &ModuleId {
        self.module.id()
    }

    /// Module state
    pub fn state(&self) -> &ModuleStateHandle {
        self.module.state()
    }

    /// Whether the current pass was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Return `Err(Cancelled)` if the pass was cancelled.
    ///
    /// Long-running modules call this between units of work.
    pub fn checkpoint(&self) -> Result<(), ModuleError> {
        self.cancel.check(self.module.id())
    }

    fn input_values(
        &self,
        port: &PortRef,
    ) -> Result<(PortId, Vec<DatatypeHandle>), ModuleError> {
        self.module
            .with_ports(|ports| {
                ports.resolve_input(port).map(|index| {
                    let input = &ports.inputs[index];
                    (input.id().clone(), input.all_data().cloned().collect())
                })
            })
            .ok_or_else(|| ModuleError::PortNotFound {
                module: self.module.id().clone(),
                port: port.clone(),
            })
    }

    fn downcast<T: Any + Send + Sync>(
        &self,
        port: &PortId,
        data: DatatypeHandle,
    ) -> Result<Arc<T>, ModuleError> {
        data.downcast::<T>().map_err(|_| ModuleError::WrongDatatype {
            module: self.module.id().clone(),
            port: port.clone(),
            expected: type_name::<T>(),
        })
    }

    /// Data on an input port that must be connected and populated.
    ///
    /// Fails with [`ModuleError::MissingRequiredInput`] when no data arrived.
    pub fn required_input<T: Any + Send + Sync>(
        &self,
        port: impl Into<PortRef>,
    ) -> Result<Arc<T>, ModuleError> {
        let (id, values) = self.input_values(&port.into())?;
        match values.into_iter().next() {
            Some(data) => self.downcast(&id, data),
            None => Err(ModuleError::MissingRequiredInput {
                module: self.module.id().clone(),
                port: id,
            }),
        }
    }

    /// Data on an input port that may be left unconnected
    pub fn optional_input<T: Any + Send + Sync>(
        &self,
        port: impl Into<PortRef>,
    ) -> Result<Option<Arc<T>>, ModuleError> {
        let (id, values) = self.input_values(&port.into())?;
        values
            .into_iter()
            .next()
            .map(|data| self.downcast(&id, data))
            .transpose()
    }

    /// Every value on a dynamic input port, in connection order
    pub fn dynamic_inputs<T: Any + Send + Sync>(
        &self,
        port: impl Into<PortRef>,
    ) -> Result<Vec<Arc<T>>, ModuleError> {
        let (id, values) = self.input_values(&port.into())?;
        values
            .into_iter()
            .map(|data| self.downcast(&id, data))
            .collect()
    }

    /// Publish a value on an output port
    pub fn send_output<T: Any + Send + Sync>(
        &self,
        port: impl Into<PortRef>,
        data: T,
    ) -> Result<(), ModuleError> {
        self.send_output_handle(port, Arc::new(data))
    }

    /// Publish an already shared value on an output port
    pub fn send_output_handle(
        &self,
        port: impl Into<PortRef>,
        data: DatatypeHandle,
    ) -> Result<(), ModuleError> {
        let port = port.into();
        self.module
            .with_ports_mut(|ports| {
                ports
                    .resolve_output(&port)
                    .map(|index| ports.outputs[index].send(data))
            })
            .ok_or_else(|| ModuleError::PortNotFound {
                module: self.module.id().clone(),
                port,
            })
    }
}
