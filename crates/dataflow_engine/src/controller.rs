// SPDX-License-Identifier: MIT OR Apache-2.0
//! Network controller: the single owner of a network that edits it,
//! schedules and executes it, and tells subscribers what changed.

use crate::config::{EngineConfig, SchedulingMode};
use crate::error::{EngineError, Result};
use crate::executor::{ExecutionReport, ModuleExecutionState, NetworkExecutor, RunId};
use crate::graph::DependencyGraph;
use crate::order::ExecutionOrder;
use crate::scheduler::{ParallelScheduler, Scheduler, SerialScheduler};
use dataflow_network::{
    CancellationFlag, ConnectionHandle, ConnectionId, ModuleFilter, ModuleHandle, ModuleId,
    ModuleLookupInfo, Network, NetworkContext, NetworkFile, PortDirection, PortRef, WiringError,
};
use std::path::Path;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// One side of a requested connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEndpoint {
    /// Owning module
    pub module: ModuleId,
    /// Port on that module
    pub port: PortRef,
    /// Whether `port` is an input or an output
    pub direction: PortDirection,
}

impl PortEndpoint {
    /// Input port endpoint
    pub fn input(module: ModuleId, port: impl Into<PortRef>) -> Self {
        Self {
            module,
            port: port.into(),
            direction: PortDirection::Input,
        }
    }

    /// Output port endpoint
    pub fn output(module: ModuleId, port: impl Into<PortRef>) -> Self {
        Self {
            module,
            port: port.into(),
            direction: PortDirection::Output,
        }
    }
}

/// Change notifications sent to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    /// A module joined the network
    ModuleAdded(ModuleId),
    /// A module left the network
    ModuleRemoved(ModuleId),
    /// A connection was made
    ConnectionAdded(ConnectionId),
    /// A connection was removed
    ConnectionRemoved(ConnectionId),
    /// A connection request was rejected; the network is unchanged
    InvalidConnection {
        /// First endpoint as requested
        first: PortEndpoint,
        /// Second endpoint as requested
        second: PortEndpoint,
        /// Why it was rejected
        reason: WiringError,
    },
    /// A pass is about to run
    ExecutionStarted {
        /// Number of scheduled modules
        modules: usize,
    },
    /// A pass finished
    ExecutionFinished {
        /// Pass id
        run_id: RunId,
        /// Whether every module completed or was skipped
        success: bool,
        /// Whether the pass was cancelled
        cancelled: bool,
    },
}

/// Owns a network and everything needed to run it.
///
/// All edits go through the controller so that subscribers see every
/// change. Execution works on a snapshot, so the network is never mutated
/// while a pass runs.
pub struct NetworkController {
    network: Network,
    config: EngineConfig,
    executor: NetworkExecutor,
    subscribers: Vec<UnboundedSender<NetworkEvent>>,
}

impl NetworkController {
    /// Controller over an empty network
    pub fn new(context: NetworkContext, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let executor = NetworkExecutor::from_config(&config);
        Ok(Self {
            network: Network::new(context),
            config,
            executor,
            subscribers: Vec::new(),
        })
    }

    /// Replace the executor, e.g. to attach an execution event channel
    pub fn with_executor(mut self, executor: NetworkExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// The controlled network
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The executor
    pub fn executor(&self) -> &NetworkExecutor {
        &self.executor
    }

    /// Module by id
    pub fn module(&self, id: &ModuleId) -> Result<&ModuleHandle> {
        Ok(self.network.module(id)?)
    }

    /// Receive every future [`NetworkEvent`]
    pub fn subscribe(&mut self) -> UnboundedReceiver<NetworkEvent> {
        let (sender, receiver) = unbounded_channel();
        self.subscribers.push(sender);
        receiver
    }

    fn emit(&mut self, event: NetworkEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Create a module of a registered type
    pub fn add_module(&mut self, module_name: &str) -> Result<ModuleHandle> {
        self.add_module_with_info(&ModuleLookupInfo::named(module_name))
    }

    /// Create a module from full lookup info
    pub fn add_module_with_info(&mut self, info: &ModuleLookupInfo) -> Result<ModuleHandle> {
        let module = self.network.add_module(info)?;
        self.emit(NetworkEvent::ModuleAdded(module.id().clone()));
        Ok(module)
    }

    /// Add a module built outside the factory
    pub fn insert_module(&mut self, module: ModuleHandle) -> Result<ModuleHandle> {
        let module = self.network.insert_module(module)?;
        self.emit(NetworkEvent::ModuleAdded(module.id().clone()));
        Ok(module)
    }

    /// Remove a module together with its connections
    pub fn remove_module(&mut self, id: &ModuleId) -> Result<ModuleHandle> {
        let touching: Vec<ConnectionId> = self
            .network
            .connections()
            .filter(|c| c.involves_module(id))
            .map(|c| c.id().clone())
            .collect();
        let module = self
            .network
            .remove_module(id)
            .ok_or_else(|| dataflow_network::NetworkError::ModuleNotFound(id.clone()))?;
        for connection in touching {
            self.emit(NetworkEvent::ConnectionRemoved(connection));
        }
        self.emit(NetworkEvent::ModuleRemoved(id.clone()));
        Ok(module)
    }

    /// Connect two ports given in either order.
    ///
    /// Rejected requests leave the network unchanged and produce an
    /// [`NetworkEvent::InvalidConnection`].
    pub fn request_connection(
        &mut self,
        first: PortEndpoint,
        second: PortEndpoint,
    ) -> std::result::Result<ConnectionId, WiringError> {
        let result = if first.direction == second.direction {
            Err(WiringError::WrongDirection(first.direction))
        } else {
            let (output, input) = match first.direction {
                PortDirection::Output => (&first, &second),
                PortDirection::Input => (&second, &first),
            };
            self.network.connect_modules(
                &output.module,
                output.port.clone(),
                &input.module,
                input.port.clone(),
            )
        };

        match result {
            Ok(id) => {
                self.emit(NetworkEvent::ConnectionAdded(id.clone()));
                Ok(id)
            }
            Err(reason) => {
                tracing::debug!(error = %reason, "connection request rejected");
                self.emit(NetworkEvent::InvalidConnection {
                    first,
                    second,
                    reason: reason.clone(),
                });
                Err(reason)
            }
        }
    }

    /// Remove a connection
    pub fn remove_connection(&mut self, id: &ConnectionId) -> Option<ConnectionHandle> {
        let connection = self.network.disconnect(id)?;
        self.emit(NetworkEvent::ConnectionRemoved(id.clone()));
        Some(connection)
    }

    /// Run every enabled module
    pub fn execute_all(&mut self) -> Result<ExecutionReport> {
        self.execute_filtered(&ModuleFilter::enabled())
    }

    /// Run the subnetwork passing `filter`.
    ///
    /// A cycle among the filtered modules aborts before anything runs.
    pub fn execute_filtered(&mut self, filter: &ModuleFilter) -> Result<ExecutionReport> {
        let snapshot = self.network.snapshot();
        let report = match self.executor.scheduling() {
            SchedulingMode::Serial => {
                let order = SerialScheduler.schedule_snapshot(&snapshot, filter)?;
                self.emit(NetworkEvent::ExecutionStarted {
                    modules: order.len(),
                });
                self.executor.execute_serial(&snapshot, &order)
            }
            SchedulingMode::Parallel => {
                let order = ParallelScheduler.schedule_snapshot(&snapshot, filter)?;
                self.emit(NetworkEvent::ExecutionStarted {
                    modules: order.len(),
                });
                self.executor.execute_parallel(&snapshot, &order)?
            }
        };
        self.emit(NetworkEvent::ExecutionFinished {
            run_id: report.run_id,
            success: report.is_success(),
            cancelled: report.cancelled,
        });
        Ok(report)
    }

    /// Cancel the running pass
    pub fn cancel(&self) {
        self.executor.cancel();
    }

    /// Handle for cancelling from another thread
    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.executor.cancellation_flag()
    }

    /// The failed modules upstream of `id` in `report`, i.e. why it was
    /// blocked
    pub fn blocking_modules(&self, report: &ExecutionReport, id: &ModuleId) -> Vec<ModuleId> {
        DependencyGraph::from_network(&self.network, &ModuleFilter::all())
            .upstream_of(id)
            .into_iter()
            .filter(|upstream| report.state(upstream) == Some(ModuleExecutionState::Failed))
            .collect()
    }

    /// Save the network; `.json` files are written as JSON, anything else
    /// as RON
    pub fn save_network(&self, path: &Path) -> Result<()> {
        NetworkFile::from_network(&self.network).save(path)?;
        tracing::info!(path = %path.display(), modules = self.network.nmodules(), "network saved");
        Ok(())
    }

    /// Replace the network with one loaded from a file.
    ///
    /// On failure the current network is kept.
    pub fn load_network(&mut self, path: &Path) -> Result<()> {
        let file = NetworkFile::load(path)?;
        let context = self.network.context().clone();
        context.id_generator().reset();
        let loaded = match file.into_network(context) {
            Ok(network) => network,
            Err(e) => {
                for id in self.network.module_ids() {
                    self.network.context().id_generator().reserve(id);
                }
                return Err(EngineError::Network(e));
            }
        };

        let previous = std::mem::replace(&mut self.network, loaded);
        for id in previous.module_ids() {
            self.emit(NetworkEvent::ModuleRemoved(id.clone()));
        }
        let added: Vec<NetworkEvent> = self
            .network
            .module_ids()
            .map(|id| NetworkEvent::ModuleAdded(id.clone()))
            .chain(
                self.network
                    .connections()
                    .map(|c| NetworkEvent::ConnectionAdded(c.id().clone())),
            )
            .collect();
        for event in added {
            self.emit(event);
        }
        tracing::info!(path = %path.display(), modules = self.network.nmodules(), "network loaded");
        Ok(())
    }
}
