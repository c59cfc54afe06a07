// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution driver behavior under failures and cancellation.

use dataflow_engine::{
    EngineConfig, ModuleExecutionState, NetworkController, NetworkHasCycles, PortEndpoint,
    ReexecutionMode,
};
use dataflow_network::{
    Module, ModuleError, ModuleFilter, ModuleHandle, NetworkContext, PortDescription, PortTypeTag,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn controller(config: EngineConfig) -> NetworkController {
    NetworkController::new(NetworkContext::default(), config).unwrap()
}

fn passthrough(name: &str) -> ModuleHandle {
    Module::builder()
        .with_name(name)
        .add_input_port(PortDescription::input("In", PortTypeTag::Scalar))
        .add_output_port(PortDescription::output("Out", PortTypeTag::Scalar))
        .using_fn(|ctx| {
            let value = ctx.optional_input::<f64>(0)?.map_or(1.0, |v| *v);
            ctx.send_output(0, value + 1.0)
        })
        .build()
}

fn link(controller: &mut NetworkController, from: &ModuleHandle, to: &ModuleHandle) {
    controller
        .request_connection(
            PortEndpoint::output(from.id().clone(), 0),
            PortEndpoint::input(to.id().clone(), 0),
        )
        .unwrap();
}

#[test]
fn test_parallel_cancellation_stops_later_waves() {
    let mut controller = controller(EngineConfig::parallel(2, ReexecutionMode::Always));
    let flag = controller.cancellation_flag();
    let canceller = controller
        .insert_module(
            Module::builder()
                .with_name("Canceller")
                .add_output_port(PortDescription::output("Out", PortTypeTag::Scalar))
                .using_fn(move |ctx| {
                    flag.cancel();
                    ctx.checkpoint()?;
                    ctx.send_output(0, 0.0_f64)
                })
                .build(),
        )
        .unwrap();
    let source = controller.insert_module(passthrough("Source")).unwrap();
    let after_canceller = controller.insert_module(passthrough("AfterCanceller")).unwrap();
    let after_source = controller.insert_module(passthrough("AfterSource")).unwrap();
    link(&mut controller, &canceller, &after_canceller);
    link(&mut controller, &source, &after_source);

    let report = controller.execute_all().unwrap();
    assert!(report.cancelled);
    assert!(!report.is_success());
    assert!(matches!(
        report.error(canceller.id()),
        Some(ModuleError::Cancelled(_))
    ));
    assert_eq!(
        report.state(after_canceller.id()),
        Some(ModuleExecutionState::Blocked)
    );
    // Source raced the cancellation, so it either finished or was cancelled;
    // either way nothing after it ran.
    assert!(report.state(source.id()).is_some_and(|s| s.is_terminal()));
    assert!(report
        .state(after_source.id())
        .is_some_and(|s| s.is_failure()));

    // The flag is cleared at the start of the next pass.
    let flagless = controller.execute_filtered(&ModuleFilter::excluding([canceller.id().clone()]));
    let report = flagless.unwrap();
    assert!(!report.cancelled);
    assert_eq!(report.state(after_source.id()), Some(ModuleExecutionState::Completed));
}

#[test]
fn test_failure_does_not_abort_sibling_branches() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut controller = controller(EngineConfig::parallel(2, ReexecutionMode::Dynamic));
    let root = controller.insert_module(passthrough("Root")).unwrap();
    let broken = controller
        .insert_module(
            Module::builder()
                .with_name("Broken")
                .add_input_port(PortDescription::input("In", PortTypeTag::Scalar))
                .add_output_port(PortDescription::output("Out", PortTypeTag::Scalar))
                .using_fn(|_| Err(ModuleError::Execution("malformed input".to_string())))
                .build(),
        )
        .unwrap();
    let counter = Arc::clone(&runs);
    let healthy = controller
        .insert_module(
            Module::builder()
                .with_name("Healthy")
                .add_input_port(PortDescription::input("In", PortTypeTag::Scalar))
                .using_fn(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .build(),
        )
        .unwrap();
    let downstream = controller.insert_module(passthrough("Downstream")).unwrap();
    link(&mut controller, &root, &broken);
    link(&mut controller, &root, &healthy);
    link(&mut controller, &broken, &downstream);

    let report = controller.execute_all().unwrap();
    assert_eq!(report.failed(), vec![broken.id().clone()]);
    assert_eq!(report.blocked(), vec![downstream.id().clone()]);
    assert_eq!(report.state(healthy.id()), Some(ModuleExecutionState::Completed));
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // The failed module is retried; its healthy sibling is not.
    let report = controller.execute_all().unwrap();
    assert_eq!(report.failed(), vec![broken.id().clone()]);
    assert_eq!(report.state(healthy.id()), Some(ModuleExecutionState::Skipped));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cycle_stops_execution() {
    let mut controller = controller(EngineConfig::serial(ReexecutionMode::Always));
    let a = controller.insert_module(passthrough("A")).unwrap();
    let b = controller.insert_module(passthrough("B")).unwrap();
    link(&mut controller, &a, &b);
    link(&mut controller, &b, &a);

    let err = controller.execute_all().unwrap_err();
    assert!(matches!(
        err,
        dataflow_engine::EngineError::Cycle(NetworkHasCycles { ref modules }) if modules.len() == 2
    ));
    assert_eq!(a.execution_count(), 0);
    assert_eq!(b.execution_count(), 0);

    // Leaving one of them out of the pass makes it schedulable.
    let report = controller
        .execute_filtered(&ModuleFilter::only([a.id().clone()]))
        .unwrap();
    assert_eq!(report.completed(), vec![a.id().clone()]);
}
