// SPDX-License-Identifier: MIT OR Apache-2.0
//! Linear algebra algorithms behind the algorithm boundary.

use crate::matrix::DenseMatrix;
use dataflow_network::{
    Algorithm, AlgorithmError, AlgorithmInput, AlgorithmOutput, AlgorithmRegistry, StateValue,
};
use std::sync::Arc;

/// Input slot holding the (left) matrix
pub const INPUT_MATRIX: &str = "InputMatrix";
/// Input slot holding the right-hand matrix of a binary operation
pub const RHS_MATRIX: &str = "RHS";
/// Output slot holding the result
pub const RESULT: &str = "Result";
/// Parameter selecting the operation
pub const OPERATOR: &str = "Operator";
/// Parameter holding the scalar for scalar multiplication
pub const SCALAR_VALUE: &str = "ScalarValue";

/// Registered name of [`EvaluateLinearAlgebraUnaryAlgorithm`]
pub const UNARY_ALGORITHM: &str = "EvaluateLinearAlgebraUnary";
/// Registered name of [`EvaluateLinearAlgebraBinaryAlgorithm`]
pub const BINARY_ALGORITHM: &str = "EvaluateLinearAlgebraBinary";
/// Registered name of [`ReportMatrixInfoAlgorithm`]
pub const REPORT_ALGORITHM: &str = "ReportMatrixInfo";

/// Unary matrix operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// `-A`
    Negate,
    /// `Aᵀ`
    Transpose,
    /// `s * A`
    ScalarMultiply,
}

impl UnaryOperator {
    /// Value stored in the `Operator` parameter
    pub fn code(self) -> i64 {
        match self {
            Self::Negate => 0,
            Self::Transpose => 1,
            Self::ScalarMultiply => 2,
        }
    }

    /// Decode the `Operator` parameter
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Negate),
            1 => Some(Self::Transpose),
            2 => Some(Self::ScalarMultiply),
            _ => None,
        }
    }
}

impl From<UnaryOperator> for StateValue {
    fn from(op: UnaryOperator) -> Self {
        StateValue::Int(op.code())
    }
}

/// Binary matrix operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// `A + B`
    Add,
    /// `A - B`
    Subtract,
    /// `A * B`
    Multiply,
}

impl BinaryOperator {
    /// Value stored in the `Operator` parameter
    pub fn code(self) -> i64 {
        match self {
            Self::Add => 0,
            Self::Subtract => 1,
            Self::Multiply => 2,
        }
    }

    /// Decode the `Operator` parameter
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Add),
            1 => Some(Self::Subtract),
            2 => Some(Self::Multiply),
            _ => None,
        }
    }
}

impl From<BinaryOperator> for StateValue {
    fn from(op: BinaryOperator) -> Self {
        StateValue::Int(op.code())
    }
}

fn operator_code(input: &AlgorithmInput) -> Result<i64, AlgorithmError> {
    input
        .parameter(OPERATOR)
        .and_then(StateValue::as_int)
        .ok_or_else(|| AlgorithmError::InvalidParameter {
            name: OPERATOR.to_string(),
            reason: "missing or not an integer".to_string(),
        })
}

fn unknown_operator(code: i64) -> AlgorithmError {
    AlgorithmError::InvalidParameter {
        name: OPERATOR.to_string(),
        reason: format!("unknown operator {code}"),
    }
}

/// Negate, transpose or scale one matrix
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluateLinearAlgebraUnaryAlgorithm;

impl Algorithm for EvaluateLinearAlgebraUnaryAlgorithm {
    fn run(&self, input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError> {
        let matrix = input.get::<DenseMatrix>(INPUT_MATRIX)?;
        let code = operator_code(input)?;
        let op = UnaryOperator::from_code(code).ok_or_else(|| unknown_operator(code))?;

        let result = match op {
            UnaryOperator::Negate => matrix.negate(),
            UnaryOperator::Transpose => matrix.transpose(),
            UnaryOperator::ScalarMultiply => {
                let scalar = input
                    .parameter(SCALAR_VALUE)
                    .and_then(StateValue::as_double)
                    .ok_or_else(|| AlgorithmError::InvalidParameter {
                        name: SCALAR_VALUE.to_string(),
                        reason: "missing or not a number".to_string(),
                    })?;
                matrix.scale(scalar)
            }
        };

        let mut output = AlgorithmOutput::new();
        output.set(RESULT, result);
        Ok(output)
    }
}

/// Add, subtract or multiply two matrices
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluateLinearAlgebraBinaryAlgorithm;

impl Algorithm for EvaluateLinearAlgebraBinaryAlgorithm {
    fn run(&self, input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError> {
        let lhs = input.get::<DenseMatrix>(INPUT_MATRIX)?;
        let rhs = input.get::<DenseMatrix>(RHS_MATRIX)?;
        let code = operator_code(input)?;
        let op = BinaryOperator::from_code(code).ok_or_else(|| unknown_operator(code))?;

        let result = match op {
            BinaryOperator::Add => lhs.checked_add(&rhs)?,
            BinaryOperator::Subtract => lhs.checked_sub(&rhs)?,
            BinaryOperator::Multiply => lhs.checked_mul(&rhs)?,
        };

        let mut output = AlgorithmOutput::new();
        output.set(RESULT, result);
        Ok(output)
    }
}

/// Summarize a matrix as a [`crate::MatrixInfo`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportMatrixInfoAlgorithm;

impl Algorithm for ReportMatrixInfoAlgorithm {
    fn run(&self, input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError> {
        let matrix = input.get::<DenseMatrix>(INPUT_MATRIX)?;
        let mut output = AlgorithmOutput::new();
        output.set(RESULT, matrix.info());
        Ok(output)
    }
}

/// Registry holding every algorithm in this crate
pub fn default_algorithms() -> AlgorithmRegistry {
    let mut registry = AlgorithmRegistry::new();
    registry.register(UNARY_ALGORITHM, Arc::new(EvaluateLinearAlgebraUnaryAlgorithm));
    registry.register(BINARY_ALGORITHM, Arc::new(EvaluateLinearAlgebraBinaryAlgorithm));
    registry.register(REPORT_ALGORITHM, Arc::new(ReportMatrixInfoAlgorithm));
    registry
}
