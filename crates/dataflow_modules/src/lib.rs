// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in modules for dataflow networks.
//!
//! This crate provides a small matrix calculator:
//! - A dense matrix datatype
//! - Unary and binary linear algebra plus a matrix report, behind the
//!   algorithm boundary
//! - Test source/sink modules and an accumulator with a dynamic input port
//! - A hard-coded module factory registering all of them

pub mod algorithms;
pub mod basic;
pub mod factory;
pub mod math;
pub mod matrix;

pub use algorithms::{
    default_algorithms, BinaryOperator, EvaluateLinearAlgebraBinaryAlgorithm,
    EvaluateLinearAlgebraUnaryAlgorithm, ReportMatrixInfoAlgorithm, UnaryOperator,
};
pub use basic::{ReceiveTestMatrix, SendTestMatrix, MATRIX_TO_SEND, RECEIVED_MATRIX};
pub use factory::{default_context, HardCodedModuleFactory};
pub use math::{
    AccumulateMatrices, EvaluateLinearAlgebraBinary, EvaluateLinearAlgebraUnary, ReportMatrixInfo,
    REPORTED_INFO,
};
pub use matrix::{DenseMatrix, MatrixInfo};
