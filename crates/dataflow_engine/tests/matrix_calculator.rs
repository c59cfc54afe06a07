// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end runs of a small matrix calculator network:
//! `Result = (-M1) * (4 * M2) + M1^T`, reported and received at the end.

use dataflow_engine::{
    EngineConfig, ExecutionReport, ModuleExecutionState, NetworkController, NetworkExecutor,
    ParallelScheduler, PortEndpoint, ReexecutionMode, Scheduler, SerialScheduler,
};
use dataflow_modules::algorithms::{OPERATOR, SCALAR_VALUE};
use dataflow_modules::{
    default_context, BinaryOperator, DenseMatrix, EvaluateLinearAlgebraBinary,
    EvaluateLinearAlgebraUnary, MatrixInfo, ReceiveTestMatrix, ReportMatrixInfo, SendTestMatrix,
    UnaryOperator, MATRIX_TO_SEND, RECEIVED_MATRIX, REPORTED_INFO,
};
use dataflow_network::{ModuleError, ModuleHandle, ModuleId, StateValue};
use std::sync::Arc;

struct Calculator {
    controller: NetworkController,
    send1: ModuleHandle,
    send2: ModuleHandle,
    negate: ModuleHandle,
    scale: ModuleHandle,
    transpose: ModuleHandle,
    multiply: ModuleHandle,
    add: ModuleHandle,
    report: ModuleHandle,
    receive: ModuleHandle,
}

fn m1() -> DenseMatrix {
    DenseMatrix::from_fn(3, 3, |(i, j)| (3 * i + j) as f64)
}

fn m2() -> DenseMatrix {
    DenseMatrix::from_fn(3, 3, |(i, j)| -2.0 * i as f64 + j as f64)
}

fn expected() -> DenseMatrix {
    DenseMatrix::from_rows(&[
        vec![40.0, 31.0, 22.0],
        vec![113.0, 68.0, 23.0],
        vec![186.0, 105.0, 24.0],
    ])
    .unwrap()
}

fn connect(
    controller: &mut NetworkController,
    from: &ModuleHandle,
    from_port: &str,
    to: &ModuleHandle,
    to_port: &str,
) {
    controller
        .request_connection(
            PortEndpoint::output(from.id().clone(), from_port),
            PortEndpoint::input(to.id().clone(), to_port),
        )
        .unwrap();
}

fn set_inputs(send1: &ModuleHandle, send2: &ModuleHandle) {
    send1.state().set_transient_value(MATRIX_TO_SEND, Arc::new(m1()));
    send2.state().set_transient_value(MATRIX_TO_SEND, Arc::new(m2()));
}

fn calculator(config: EngineConfig) -> Calculator {
    let mut controller = NetworkController::new(default_context(), config).unwrap();
    let send1 = controller.add_module(SendTestMatrix::NAME).unwrap();
    let send2 = controller.add_module(SendTestMatrix::NAME).unwrap();
    let negate = controller.add_module(EvaluateLinearAlgebraUnary::NAME).unwrap();
    let scale = controller.add_module(EvaluateLinearAlgebraUnary::NAME).unwrap();
    let transpose = controller.add_module(EvaluateLinearAlgebraUnary::NAME).unwrap();
    let multiply = controller.add_module(EvaluateLinearAlgebraBinary::NAME).unwrap();
    let add = controller.add_module(EvaluateLinearAlgebraBinary::NAME).unwrap();
    let report = controller.add_module(ReportMatrixInfo::NAME).unwrap();
    let receive = controller.add_module(ReceiveTestMatrix::NAME).unwrap();

    negate.state().set_value(OPERATOR, UnaryOperator::Negate.into());
    scale.state().set_value(OPERATOR, UnaryOperator::ScalarMultiply.into());
    scale.state().set_value(SCALAR_VALUE, StateValue::Double(4.0));
    transpose.state().set_value(OPERATOR, UnaryOperator::Transpose.into());
    multiply.state().set_value(OPERATOR, BinaryOperator::Multiply.into());
    add.state().set_value(OPERATOR, BinaryOperator::Add.into());
    set_inputs(&send1, &send2);

    connect(&mut controller, &send1, "TestMatrix", &negate, "InputMatrix");
    connect(&mut controller, &send2, "TestMatrix", &scale, "InputMatrix");
    connect(&mut controller, &send1, "TestMatrix", &transpose, "InputMatrix");
    connect(&mut controller, &negate, "Result", &multiply, "LHS");
    connect(&mut controller, &scale, "Result", &multiply, "RHS");
    connect(&mut controller, &multiply, "Result", &add, "LHS");
    connect(&mut controller, &transpose, "Result", &add, "RHS");
    connect(&mut controller, &add, "Result", &report, "InputMatrix");
    connect(&mut controller, &add, "Result", &receive, "InputMatrix");

    Calculator {
        controller,
        send1,
        send2,
        negate,
        scale,
        transpose,
        multiply,
        add,
        report,
        receive,
    }
}

fn assert_result(calc: &Calculator) {
    let received = calc
        .receive
        .state()
        .transient::<DenseMatrix>(RECEIVED_MATRIX)
        .unwrap();
    assert_eq!(*received, expected());

    let info = calc.report.state().transient::<MatrixInfo>(REPORTED_INFO).unwrap();
    assert_eq!((info.rows, info.cols, info.nnz), (3, 3, 9));
    assert_eq!(info.min, 22.0);
    assert_eq!(info.max, 186.0);
}

fn ids(modules: &[&ModuleHandle]) -> Vec<ModuleId> {
    modules.iter().map(|m| m.id().clone()).collect()
}

#[test]
fn test_serial_calculation() {
    let mut calc = calculator(EngineConfig::serial(ReexecutionMode::Dynamic));
    let report = calc.controller.execute_all().unwrap();

    assert!(report.is_success());
    assert_eq!(report.count(ModuleExecutionState::Completed), 9);
    assert_result(&calc);

    let order = SerialScheduler.schedule(calc.controller.network()).unwrap();
    assert_eq!(
        order.as_slice(),
        ids(&[
            &calc.send1,
            &calc.send2,
            &calc.negate,
            &calc.scale,
            &calc.transpose,
            &calc.multiply,
            &calc.add,
            &calc.report,
            &calc.receive,
        ])
        .as_slice()
    );
}

#[test]
fn test_parallel_calculation() {
    let mut calc = calculator(EngineConfig::parallel(4, ReexecutionMode::Dynamic));
    let order = ParallelScheduler.schedule(calc.controller.network()).unwrap();
    assert_eq!(
        order.as_waves(),
        &[
            ids(&[&calc.send1, &calc.send2]),
            ids(&[&calc.negate, &calc.scale, &calc.transpose]),
            ids(&[&calc.multiply]),
            ids(&[&calc.add]),
            ids(&[&calc.report, &calc.receive]),
        ]
    );

    let report = calc.controller.execute_all().unwrap();
    assert!(report.is_success());
    assert_result(&calc);
}

#[test]
fn test_unchanged_network_is_not_rerun() {
    let mut calc = calculator(EngineConfig::serial(ReexecutionMode::Dynamic));
    calc.controller.execute_all().unwrap();

    let report = calc.controller.execute_all().unwrap();
    assert_eq!(report.count(ModuleExecutionState::Skipped), 9);
    assert!(report.completed().is_empty());
    assert_eq!(calc.add.execution_count(), 1);
    assert_result(&calc);
}

#[test]
fn test_parameter_change_reruns_downstream_only() {
    let mut calc = calculator(EngineConfig::serial(ReexecutionMode::Dynamic));
    calc.controller.execute_all().unwrap();

    calc.scale.state().set_value(SCALAR_VALUE, StateValue::Double(2.0));
    let report = calc.controller.execute_all().unwrap();
    assert_eq!(
        report.completed(),
        ids(&[&calc.scale, &calc.multiply, &calc.add, &calc.report, &calc.receive])
    );
    assert_eq!(
        report.skipped(),
        ids(&[&calc.send1, &calc.send2, &calc.negate, &calc.transpose])
    );

    // Writing the same value again is not a change.
    calc.scale.state().set_value(SCALAR_VALUE, StateValue::Double(2.0));
    let report = calc.controller.execute_all().unwrap();
    assert!(report.completed().is_empty());
}

#[test]
fn test_leaf_parameter_change_reruns_only_the_leaf() {
    let mut calc = calculator(EngineConfig::parallel(2, ReexecutionMode::Dynamic));
    calc.controller.execute_all().unwrap();

    calc.report.state().set_value("Precision", StateValue::Int(3));
    let report = calc.controller.execute_all().unwrap();
    assert_eq!(report.completed(), ids(&[&calc.report]));
    assert_eq!(report.count(ModuleExecutionState::Skipped), 8);
}

#[test]
fn test_always_reexecute_runs_everything() {
    let mut calc = calculator(EngineConfig::serial(ReexecutionMode::Always));
    calc.controller.execute_all().unwrap();
    let report = calc.controller.execute_all().unwrap();
    assert_eq!(report.count(ModuleExecutionState::Completed), 9);
    assert_eq!(calc.send1.execution_count(), 2);
}

fn missing_input_run(calc: &mut Calculator) -> ExecutionReport {
    let connection = calc.scale.input_connections(0).remove(0);
    calc.controller.remove_connection(&connection).unwrap();
    calc.controller.execute_all().unwrap()
}

#[test]
fn test_missing_input_blocks_downstream() {
    let mut calc = calculator(EngineConfig::serial(ReexecutionMode::Dynamic));
    let report = missing_input_run(&mut calc);

    assert_eq!(report.failed(), ids(&[&calc.scale]));
    assert!(report.error(calc.scale.id()).unwrap().is_missing_input());
    assert_eq!(
        report.blocked(),
        ids(&[&calc.multiply, &calc.add, &calc.report, &calc.receive])
    );
    assert_eq!(
        report.completed(),
        ids(&[&calc.send1, &calc.send2, &calc.negate, &calc.transpose])
    );
    assert_eq!(
        calc.controller.blocking_modules(&report, calc.receive.id()),
        ids(&[&calc.scale])
    );
    assert!(calc.receive.state().transient::<DenseMatrix>(RECEIVED_MATRIX).is_none());
}

#[test]
fn test_missing_input_in_parallel() {
    let mut calc = calculator(EngineConfig::parallel(3, ReexecutionMode::Dynamic));
    let report = missing_input_run(&mut calc);

    assert!(matches!(
        report.error(calc.scale.id()),
        Some(ModuleError::MissingRequiredInput { .. })
    ));
    assert_eq!(report.count(ModuleExecutionState::Blocked), 4);
    assert_eq!(report.count(ModuleExecutionState::Completed), 4);
}

#[test]
fn test_failed_module_recovers_after_fix() {
    let mut calc = calculator(EngineConfig::serial(ReexecutionMode::Dynamic));
    calc.scale.state().set_value(OPERATOR, StateValue::Int(42));
    let report = calc.controller.execute_all().unwrap();
    assert!(matches!(
        report.error(calc.scale.id()),
        Some(ModuleError::Algorithm(_))
    ));

    calc.scale
        .state()
        .set_value(OPERATOR, UnaryOperator::ScalarMultiply.into());
    let report = calc.controller.execute_all().unwrap();
    assert!(report.is_success());
    assert_eq!(
        report.completed(),
        ids(&[&calc.scale, &calc.multiply, &calc.add, &calc.report, &calc.receive])
    );
    assert_result(&calc);
}

#[test]
fn test_execution_events_cover_every_module() {
    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
    let calc = calculator(EngineConfig::parallel(4, ReexecutionMode::Dynamic));
    let executor = NetworkExecutor::from_config(calc.controller.config()).with_events(sender);
    let mut controller = calc.controller.with_executor(executor);

    let report = controller.execute_all().unwrap();
    let mut completed = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        assert_eq!(event.run_id, report.run_id);
        if event.state == ModuleExecutionState::Completed {
            completed.push(event.module);
        }
    }
    assert_eq!(completed.len(), 9);

    let last_wave = &completed[7..];
    assert!(last_wave.contains(calc.report.id()));
    assert!(last_wave.contains(calc.receive.id()));
}
