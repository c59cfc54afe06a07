// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution driver: walks an execution order, asks the reexecution strategy
//! which modules must run, and runs them serially or wave by wave on a
//! worker pool.

use crate::config::{EngineConfig, SchedulingMode};
use crate::error::{EngineError, Result};
use crate::order::{ModuleExecutionOrder, ParallelModuleExecutionOrder};
use crate::reexecution::{strategy_for, DynamicReexecution, ReexecutionStrategyHandle};
use dataflow_network::{CancellationFlag, ModuleError, ModuleId, NetworkSnapshot};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Per-module state within one pass.
///
/// `Pending -> Ready -> Running -> {Completed, Failed}`, with `Skipped`
/// for modules whose previous output is still valid and `Blocked` for
/// modules downstream of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleExecutionState {
    /// Scheduled, not reached yet
    Pending,
    /// Upstream resolved, about to be decided
    Ready,
    /// Execute body in progress
    Running,
    /// Ran successfully; new output available
    Completed,
    /// Did not need to run; previous output kept
    Skipped,
    /// Execute body failed or was cancelled
    Failed,
    /// Not run because an upstream module failed or was blocked
    Blocked,
}

impl ModuleExecutionState {
    /// Whether the module is done for this pass
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Skipped | Self::Failed | Self::Blocked
        )
    }

    /// Whether downstream modules must be blocked
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Blocked)
    }
}

impl fmt::Display for ModuleExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identifier of one execution pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State transition of one module during a pass
#[derive(Debug, Clone)]
pub struct ModuleExecutionEvent {
    /// Pass the transition belongs to
    pub run_id: RunId,
    /// Module
    pub module: ModuleId,
    /// New state
    pub state: ModuleExecutionState,
    /// Failure cause when `state` is `Failed`
    pub error: Option<ModuleError>,
}

/// Channel receiving [`ModuleExecutionEvent`]s
pub type ExecutionEventSender = UnboundedSender<ModuleExecutionEvent>;

/// Outcome of one pass
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Pass id
    pub run_id: RunId,
    /// Final state of every scheduled module, in execution order
    pub states: IndexMap<ModuleId, ModuleExecutionState>,
    /// Cause of every failure
    pub errors: IndexMap<ModuleId, ModuleError>,
    /// Whether the pass was cancelled
    pub cancelled: bool,
}

impl ExecutionReport {
    /// Final state of a module, if it was scheduled
    pub fn state(&self, id: &ModuleId) -> Option<ModuleExecutionState> {
        self.states.get(id).copied()
    }

    /// Failure cause of a module
    pub fn error(&self, id: &ModuleId) -> Option<&ModuleError> {
        self.errors.get(id)
    }

    fn with_state(&self, state: ModuleExecutionState) -> Vec<ModuleId> {
        self.states
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Modules that ran successfully, in execution order
    pub fn completed(&self) -> Vec<ModuleId> {
        self.with_state(ModuleExecutionState::Completed)
    }

    /// Modules that kept their previous output
    pub fn skipped(&self) -> Vec<ModuleId> {
        self.with_state(ModuleExecutionState::Skipped)
    }

    /// Modules whose execution failed
    pub fn failed(&self) -> Vec<ModuleId> {
        self.with_state(ModuleExecutionState::Failed)
    }

    /// Modules blocked by an upstream failure
    pub fn blocked(&self) -> Vec<ModuleId> {
        self.with_state(ModuleExecutionState::Blocked)
    }

    /// Number of modules ending in `state`
    pub fn count(&self, state: ModuleExecutionState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }

    /// No failures, no blocked modules and not cancelled
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.states.values().all(|s| !s.is_failure())
    }
}

/// Runs execution orders against network snapshots.
///
/// The parallel path owns a tokio runtime whose blocking pool is capped at
/// `worker_threads`; each module of a wave runs as one blocking task and the
/// next wave starts only after every task of the current one finished.
/// `execute_parallel` must not be called from inside another tokio runtime.
pub struct NetworkExecutor {
    strategy: ReexecutionStrategyHandle,
    scheduling: SchedulingMode,
    worker_threads: usize,
    cancel: CancellationFlag,
    events: Option<ExecutionEventSender>,
    runtime: Mutex<Option<Arc<tokio::runtime::Runtime>>>,
}

impl fmt::Debug for NetworkExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkExecutor")
            .field("scheduling", &self.scheduling)
            .field("worker_threads", &self.worker_threads)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Default for NetworkExecutor {
    fn default() -> Self {
        Self::new(Arc::new(DynamicReexecution))
    }
}

impl NetworkExecutor {
    /// Executor with a strategy and default pool size
    pub fn new(strategy: ReexecutionStrategyHandle) -> Self {
        let config = EngineConfig::default();
        Self {
            strategy,
            scheduling: config.scheduling,
            worker_threads: config.worker_threads,
            cancel: CancellationFlag::new(),
            events: None,
            runtime: Mutex::new(None),
        }
    }

    /// Executor set up from engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(strategy_for(config.reexecution))
            .with_scheduling(config.scheduling)
            .with_worker_threads(config.worker_threads)
    }

    /// Set the preferred scheduling mode
    pub fn with_scheduling(mut self, scheduling: SchedulingMode) -> Self {
        self.scheduling = scheduling;
        self
    }

    /// Set the worker pool capacity (at least one)
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads.max(1);
        self
    }

    /// Send state transitions to `sender`
    pub fn with_events(mut self, sender: ExecutionEventSender) -> Self {
        self.events = Some(sender);
        self
    }

    /// Preferred scheduling mode
    pub fn scheduling(&self) -> SchedulingMode {
        self.scheduling
    }

    /// Worker pool capacity
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Reexecution strategy in use
    pub fn strategy(&self) -> &ReexecutionStrategyHandle {
        &self.strategy
    }

    /// Handle to the cancellation flag, for cancelling from another thread.
    ///
    /// The flag is cleared when a pass starts, so it only affects a pass
    /// that is already running.
    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Cancel the running pass
    pub fn cancel(&self) {
        tracing::info!("execution cancellation requested");
        self.cancel.cancel();
    }

    fn begin(&self, snapshot: &NetworkSnapshot, ids: impl Iterator<Item = ModuleId>) -> Pass {
        self.cancel.reset();
        Pass {
            run_id: RunId::new(),
            snapshot: snapshot.clone(),
            strategy: Arc::clone(&self.strategy),
            cancel: self.cancel.clone(),
            events: self.events.clone(),
            states: Mutex::new(ids.map(|id| (id, ModuleExecutionState::Pending)).collect()),
            errors: Mutex::new(IndexMap::new()),
        }
    }

    /// Run a serial order on the calling thread
    pub fn execute_serial(
        &self,
        snapshot: &NetworkSnapshot,
        order: &ModuleExecutionOrder,
    ) -> ExecutionReport {
        let pass = self.begin(snapshot, order.iter().cloned());
        let span = tracing::info_span!("execute", run = %pass.run_id, modules = order.as_slice().len());
        let _guard = span.enter();

        for id in order {
            pass.step(id);
        }
        pass.take_report()
    }

    /// Run a wave order on the worker pool
    pub fn execute_parallel(
        &self,
        snapshot: &NetworkSnapshot,
        order: &ParallelModuleExecutionOrder,
    ) -> Result<ExecutionReport> {
        let runtime = self.runtime()?;
        let pass = Arc::new(self.begin(
            snapshot,
            order.as_waves().iter().flatten().cloned(),
        ));
        let span = tracing::info_span!(
            "execute",
            run = %pass.run_id,
            waves = order.nwaves(),
            workers = self.worker_threads
        );
        let _guard = span.enter();

        runtime.block_on(run_waves(Arc::clone(&pass), order.as_waves()));
        Ok(pass.take_report())
    }

    fn runtime(&self) -> Result<Arc<tokio::runtime::Runtime>> {
        let mut slot = self.runtime.lock();
        if let Some(runtime) = slot.as_ref() {
            return Ok(Arc::clone(runtime));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.worker_threads)
            .max_blocking_threads(self.worker_threads)
            .thread_name("dataflow-worker")
            .build()
            .map_err(|e| EngineError::Runtime(e.to_string()))?;
        let runtime = Arc::new(runtime);
        *slot = Some(Arc::clone(&runtime));
        Ok(runtime)
    }
}

async fn run_waves(pass: Arc<Pass>, waves: &[Vec<ModuleId>]) {
    for (index, wave) in waves.iter().enumerate() {
        tracing::debug!(wave = index, modules = wave.len(), "wave started");
        let tasks = wave.iter().map(|id| {
            let pass = Arc::clone(&pass);
            let id = id.clone();
            tokio::task::spawn_blocking(move || pass.step(&id))
        });
        let results = futures::future::join_all(tasks).await;

        for (id, result) in wave.iter().zip(results) {
            if let Err(e) = result {
                pass.fail(id, ModuleError::Execution(format!("worker task failed: {e}")));
            }
        }
        tracing::debug!(wave = index, "wave finished");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("module panicked: {detail}")
}

/// Bookkeeping for one pass
struct Pass {
    run_id: RunId,
    snapshot: NetworkSnapshot,
    strategy: ReexecutionStrategyHandle,
    cancel: CancellationFlag,
    events: Option<ExecutionEventSender>,
    states: Mutex<IndexMap<ModuleId, ModuleExecutionState>>,
    errors: Mutex<IndexMap<ModuleId, ModuleError>>,
}

impl Pass {
    fn transition(&self, id: &ModuleId, state: ModuleExecutionState, error: Option<ModuleError>) {
        self.states.lock().insert(id.clone(), state);
        if let Some(error) = &error {
            self.errors.lock().insert(id.clone(), error.clone());
        }
        if let Some(events) = &self.events {
            // A closed receiver only means nobody is watching.
            let _ = events.send(ModuleExecutionEvent {
                run_id: self.run_id,
                module: id.clone(),
                state,
                error,
            });
        }
    }

    fn fail(&self, id: &ModuleId, error: ModuleError) {
        tracing::warn!(module = %id, error = %error, "module failed");
        self.transition(id, ModuleExecutionState::Failed, Some(error));
    }

    fn blocked_by_upstream(&self, id: &ModuleId) -> bool {
        let states = self.states.lock();
        self.snapshot.incoming(id).any(|connection| {
            states
                .get(connection.output_module())
                .is_some_and(|state| state.is_failure())
        })
    }

    fn step(&self, id: &ModuleId) {
        let Some(module) = self.snapshot.module(id) else {
            self.fail(
                id,
                ModuleError::Execution(format!("module {id} is not in the executed network")),
            );
            return;
        };

        if self.blocked_by_upstream(id) {
            tracing::debug!(module = %id, "module blocked by upstream failure");
            self.transition(id, ModuleExecutionState::Blocked, None);
            return;
        }
        if let Err(error) = self.cancel.check(id) {
            self.fail(id, error);
            return;
        }

        self.transition(id, ModuleExecutionState::Ready, None);
        if !self.strategy.needs_execute(module, &self.snapshot) {
            tracing::trace!(module = %id, "module up to date");
            self.transition(id, ModuleExecutionState::Skipped, None);
            return;
        }

        self.transition(id, ModuleExecutionState::Running, None);
        self.snapshot.deliver_inputs(module);
        let signature = self.snapshot.input_signature(module);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| module.do_execute(&self.cancel)))
            .unwrap_or_else(|payload| Err(ModuleError::Execution(panic_message(&*payload))));
        match outcome {
            Ok(()) => {
                module.record_execution(signature);
                self.transition(id, ModuleExecutionState::Completed, None);
            }
            Err(error) => {
                module.invalidate();
                self.fail(id, error);
            }
        }
    }

    fn take_report(&self) -> ExecutionReport {
        let report = ExecutionReport {
            run_id: self.run_id,
            states: std::mem::take(&mut *self.states.lock()),
            errors: std::mem::take(&mut *self.errors.lock()),
            cancelled: self.cancel.is_cancelled(),
        };
        tracing::info!(
            completed = report.count(ModuleExecutionState::Completed),
            skipped = report.count(ModuleExecutionState::Skipped),
            failed = report.count(ModuleExecutionState::Failed),
            blocked = report.count(ModuleExecutionState::Blocked),
            cancelled = report.cancelled,
            "execution finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reexecution::AlwaysReexecute;
    use crate::scheduler::{ParallelScheduler, Scheduler, SerialScheduler};
    use dataflow_network::{Module, ModuleHandle, Network, PortDescription, PortTypeTag};

    fn source(name: &str, value: f64) -> ModuleHandle {
        Module::builder()
            .with_name(name)
            .add_output_port(PortDescription::output("Out", PortTypeTag::Scalar))
            .using_fn(move |ctx| ctx.send_output(0, value))
            .build()
    }

    fn adder(name: &str) -> ModuleHandle {
        Module::builder()
            .with_name(name)
            .add_input_port(PortDescription::input("In", PortTypeTag::Scalar).dynamic())
            .add_output_port(PortDescription::output("Out", PortTypeTag::Scalar))
            .using_fn(|ctx| {
                let sum: f64 = ctx.dynamic_inputs::<f64>(0)?.iter().map(|v| **v).sum();
                ctx.send_output(0, sum)
            })
            .build()
    }

    fn failing(name: &str) -> ModuleHandle {
        Module::builder()
            .with_name(name)
            .add_input_port(PortDescription::input("In", PortTypeTag::Scalar))
            .add_output_port(PortDescription::output("Out", PortTypeTag::Scalar))
            .using_fn(|_| Err(ModuleError::Execution("boom".to_string())))
            .build()
    }

    fn panicking(name: &str) -> ModuleHandle {
        Module::builder()
            .with_name(name)
            .add_input_port(PortDescription::input("In", PortTypeTag::Scalar))
            .add_output_port(PortDescription::output("Out", PortTypeTag::Scalar))
            .using_fn(|_| panic!("module bug"))
            .build()
    }

    fn output(module: &ModuleHandle) -> Option<f64> {
        module
            .output_data(0)
            .and_then(|data| data.downcast::<f64>().ok())
            .map(|value| *value)
    }

    /// A(1) -> C, B(2) -> C, C -> D
    fn sum_network() -> (Network, [ModuleHandle; 4]) {
        let mut network = Network::default();
        let a = network.insert_module(source("A", 1.0)).unwrap();
        let b = network.insert_module(source("B", 2.0)).unwrap();
        let c = network.insert_module(adder("C")).unwrap();
        let d = network.insert_module(adder("D")).unwrap();
        network.connect_modules(a.id(), 0, c.id(), 0).unwrap();
        network.connect_modules(b.id(), 0, c.id(), 0).unwrap();
        network.connect_modules(c.id(), 0, d.id(), 0).unwrap();
        (network, [a, b, c, d])
    }

    #[test]
    fn test_serial_execution_propagates_data() {
        let (network, [_, _, c, d]) = sum_network();
        let order = SerialScheduler.schedule(&network).unwrap();
        let report = NetworkExecutor::default().execute_serial(&network.snapshot(), &order);

        assert!(report.is_success());
        assert_eq!(report.count(ModuleExecutionState::Completed), 4);
        assert_eq!(output(&c), Some(3.0));
        assert_eq!(output(&d), Some(3.0));
    }

    #[test]
    fn test_second_pass_skips_everything() {
        let (network, [a, ..]) = sum_network();
        let order = SerialScheduler.schedule(&network).unwrap();
        let executor = NetworkExecutor::default();
        executor.execute_serial(&network.snapshot(), &order);

        let report = executor.execute_serial(&network.snapshot(), &order);
        assert_eq!(report.count(ModuleExecutionState::Skipped), 4);
        assert_eq!(a.execution_count(), 1);

        let always = NetworkExecutor::new(Arc::new(AlwaysReexecute));
        let report = always.execute_serial(&network.snapshot(), &order);
        assert_eq!(report.count(ModuleExecutionState::Completed), 4);
    }

    #[test]
    fn test_failure_blocks_only_downstream() {
        let mut network = Network::default();
        let a = network.insert_module(source("A", 1.0)).unwrap();
        let bad = network.insert_module(failing("Bad")).unwrap();
        let after = network.insert_module(adder("After")).unwrap();
        let sibling = network.insert_module(adder("Sibling")).unwrap();
        network.connect_modules(a.id(), 0, bad.id(), 0).unwrap();
        network.connect_modules(bad.id(), 0, after.id(), 0).unwrap();
        network.connect_modules(a.id(), 0, sibling.id(), 0).unwrap();

        let order = SerialScheduler.schedule(&network).unwrap();
        let report = NetworkExecutor::default().execute_serial(&network.snapshot(), &order);

        assert_eq!(report.failed(), vec![bad.id().clone()]);
        assert_eq!(report.blocked(), vec![after.id().clone()]);
        assert_eq!(report.state(sibling.id()), Some(ModuleExecutionState::Completed));
        assert!(matches!(report.error(bad.id()), Some(ModuleError::Execution(_))));
        assert!(!report.is_success());
        assert!(!bad.has_executed());
    }

    #[test]
    fn test_panicking_module_fails_without_aborting_pass() {
        let mut network = Network::default();
        let a = network.insert_module(source("A", 1.0)).unwrap();
        let bad = network.insert_module(panicking("Bad")).unwrap();
        let after = network.insert_module(adder("After")).unwrap();
        let sibling = network.insert_module(adder("Sibling")).unwrap();
        network.connect_modules(a.id(), 0, bad.id(), 0).unwrap();
        network.connect_modules(bad.id(), 0, after.id(), 0).unwrap();
        network.connect_modules(a.id(), 0, sibling.id(), 0).unwrap();

        let executor = NetworkExecutor::default().with_worker_threads(2);
        let serial = SerialScheduler.schedule(&network).unwrap();
        let parallel = ParallelScheduler.schedule(&network).unwrap();
        let reports = [
            executor.execute_serial(&network.snapshot(), &serial),
            executor
                .execute_parallel(&network.snapshot(), &parallel)
                .unwrap(),
        ];

        for report in reports {
            assert_eq!(report.failed(), vec![bad.id().clone()]);
            assert_eq!(report.blocked(), vec![after.id().clone()]);
            assert!(matches!(
                report.error(bad.id()),
                Some(ModuleError::Execution(message)) if message.contains("module bug")
            ));
        }
        assert_eq!(output(&sibling), Some(1.0));
        assert!(!bad.has_executed());
    }

    #[test]
    fn test_cancel_before_pass_is_cleared() {
        let (network, _) = sum_network();
        let order = SerialScheduler.schedule(&network).unwrap();
        let executor = NetworkExecutor::default();
        executor.cancel();

        let report = executor.execute_serial(&network.snapshot(), &order);
        assert!(!report.cancelled);
        assert!(report.is_success());
    }

    #[test]
    fn test_parallel_execution_matches_serial() {
        let (network, [_, _, c, d]) = sum_network();
        let order = ParallelScheduler.schedule(&network).unwrap();
        let executor = NetworkExecutor::default().with_worker_threads(2);
        let report = executor.execute_parallel(&network.snapshot(), &order).unwrap();

        assert!(report.is_success());
        assert_eq!(output(&c), Some(3.0));
        assert_eq!(output(&d), Some(3.0));

        let report = executor.execute_parallel(&network.snapshot(), &order).unwrap();
        assert_eq!(report.count(ModuleExecutionState::Skipped), 4);
    }

    #[test]
    fn test_wave_members_run_concurrently() {
        let barrier = Arc::new(std::sync::Barrier::new(2));
        let mut network = Network::default();
        for name in ["Left", "Right"] {
            let barrier = Arc::clone(&barrier);
            network
                .insert_module(
                    Module::builder()
                        .with_name(name)
                        .using_fn(move |_| {
                            barrier.wait();
                            Ok(())
                        })
                        .build(),
                )
                .unwrap();
        }

        let order = ParallelScheduler.schedule(&network).unwrap();
        assert_eq!(order.nwaves(), 1);
        let report = NetworkExecutor::default()
            .with_worker_threads(2)
            .execute_parallel(&network.snapshot(), &order)
            .unwrap();
        assert_eq!(report.count(ModuleExecutionState::Completed), 2);
    }

    #[test]
    fn test_cancellation_fails_remaining_modules() {
        let executor = NetworkExecutor::default();
        let flag = executor.cancellation_flag();

        let mut network = Network::default();
        let a = network
            .insert_module(
                Module::builder()
                    .with_name("A")
                    .add_output_port(PortDescription::output("Out", PortTypeTag::Scalar))
                    .using_fn(move |ctx| {
                        flag.cancel();
                        ctx.checkpoint()?;
                        ctx.send_output(0, 1.0_f64)
                    })
                    .build(),
            )
            .unwrap();
        let b = network.insert_module(adder("B")).unwrap();
        let c = network.insert_module(source("C", 5.0)).unwrap();
        network.connect_modules(a.id(), 0, b.id(), 0).unwrap();

        let order = SerialScheduler.schedule(&network).unwrap();
        let report = executor.execute_serial(&network.snapshot(), &order);

        assert!(report.cancelled);
        assert!(matches!(report.error(a.id()), Some(ModuleError::Cancelled(_))));
        assert_eq!(report.state(b.id()), Some(ModuleExecutionState::Blocked));
        assert_eq!(report.state(c.id()), Some(ModuleExecutionState::Failed));
        assert_eq!(output(&c), None);
    }

    #[test]
    fn test_events_follow_state_machine() {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let mut network = Network::default();
        let a = network.insert_module(source("A", 1.0)).unwrap();

        let order = SerialScheduler.schedule(&network).unwrap();
        let report = NetworkExecutor::default()
            .with_events(sender)
            .execute_serial(&network.snapshot(), &order);

        let mut states = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            assert_eq!(event.run_id, report.run_id);
            assert_eq!(&event.module, a.id());
            states.push(event.state);
        }
        assert_eq!(
            states,
            vec![
                ModuleExecutionState::Ready,
                ModuleExecutionState::Running,
                ModuleExecutionState::Completed,
            ]
        );
    }
}
