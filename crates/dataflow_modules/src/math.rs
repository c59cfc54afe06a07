// SPDX-License-Identifier: MIT OR Apache-2.0
//! Matrix math modules. Each one wraps an algorithm looked up through the
//! network context's algorithm factory.

use crate::algorithms::{
    EvaluateLinearAlgebraBinaryAlgorithm, EvaluateLinearAlgebraUnaryAlgorithm,
    ReportMatrixInfoAlgorithm, BINARY_ALGORITHM, INPUT_MATRIX, REPORT_ALGORITHM, RESULT,
    RHS_MATRIX, UNARY_ALGORITHM,
};
use crate::matrix::{DenseMatrix, MatrixInfo};
use dataflow_network::{
    AlgorithmError, AlgorithmHandle, AlgorithmInput, AlgorithmOutput, ModuleContext,
    ModuleDescription, ModuleError, ModuleExecute, ModuleLookupInfo, NetworkContext,
    PortDescription, PortTypeTag,
};
use std::sync::Arc;

/// Transient state key written by `ReportMatrixInfo`
pub const REPORTED_INFO: &str = "ReportedInfo";

fn lookup(ctx: &NetworkContext, name: &str, fallback: AlgorithmHandle) -> AlgorithmHandle {
    ctx.algorithm_factory().create(name).unwrap_or(fallback)
}

fn result_matrix(output: &AlgorithmOutput) -> Result<Arc<DenseMatrix>, ModuleError> {
    output
        .get::<DenseMatrix>(RESULT)
        .ok_or_else(|| AlgorithmError::Failed("algorithm produced no result".into()).into())
}

/// One-input matrix operation selected by the `Operator` parameter
pub struct EvaluateLinearAlgebraUnary {
    algorithm: AlgorithmHandle,
}

impl EvaluateLinearAlgebraUnary {
    /// Module type name
    pub const NAME: &'static str = "EvaluateLinearAlgebraUnary";

    /// Factory description
    pub fn description() -> ModuleDescription {
        ModuleDescription::new(ModuleLookupInfo::new(Self::NAME, "Math", "Dataflow"))
            .with_input(PortDescription::input(INPUT_MATRIX, PortTypeTag::Matrix))
            .with_output(PortDescription::output(RESULT, PortTypeTag::Matrix))
            .with_maker(|ctx| {
                Box::new(EvaluateLinearAlgebraUnary {
                    algorithm: lookup(
                        ctx,
                        UNARY_ALGORITHM,
                        Arc::new(EvaluateLinearAlgebraUnaryAlgorithm),
                    ),
                })
            })
    }
}

impl ModuleExecute for EvaluateLinearAlgebraUnary {
    fn execute(&self, ctx: &mut ModuleContext<'_>) -> Result<(), ModuleError> {
        let matrix: Arc<DenseMatrix> = ctx.required_input(INPUT_MATRIX)?;
        let input = AlgorithmInput::new()
            .with_data(INPUT_MATRIX, matrix)
            .with_parameters(ctx.state().values());
        let output = self.algorithm.run(&input)?;
        ctx.send_output_handle(RESULT, result_matrix(&output)?)
    }
}

/// Two-input matrix operation selected by the `Operator` parameter
pub struct EvaluateLinearAlgebraBinary {
    algorithm: AlgorithmHandle,
}

impl EvaluateLinearAlgebraBinary {
    /// Module type name
    pub const NAME: &'static str = "EvaluateLinearAlgebraBinary";

    /// Factory description
    pub fn description() -> ModuleDescription {
        ModuleDescription::new(ModuleLookupInfo::new(Self::NAME, "Math", "Dataflow"))
            .with_input(PortDescription::input("LHS", PortTypeTag::Matrix))
            .with_input(PortDescription::input(RHS_MATRIX, PortTypeTag::Matrix))
            .with_output(PortDescription::output(RESULT, PortTypeTag::Matrix))
            .with_maker(|ctx| {
                Box::new(EvaluateLinearAlgebraBinary {
                    algorithm: lookup(
                        ctx,
                        BINARY_ALGORITHM,
                        Arc::new(EvaluateLinearAlgebraBinaryAlgorithm),
                    ),
                })
            })
    }
}

impl ModuleExecute for EvaluateLinearAlgebraBinary {
    fn execute(&self, ctx: &mut ModuleContext<'_>) -> Result<(), ModuleError> {
        let lhs: Arc<DenseMatrix> = ctx.required_input("LHS")?;
        let rhs: Arc<DenseMatrix> = ctx.required_input(RHS_MATRIX)?;
        ctx.checkpoint()?;
        let input = AlgorithmInput::new()
            .with_data(INPUT_MATRIX, lhs)
            .with_data(RHS_MATRIX, rhs)
            .with_parameters(ctx.state().values());
        let output = self.algorithm.run(&input)?;
        ctx.send_output_handle(RESULT, result_matrix(&output)?)
    }
}

/// Summarizes its input matrix into transient state and a text output
pub struct ReportMatrixInfo {
    algorithm: AlgorithmHandle,
}

impl ReportMatrixInfo {
    /// Module type name
    pub const NAME: &'static str = "ReportMatrixInfo";

    /// Factory description
    pub fn description() -> ModuleDescription {
        ModuleDescription::new(ModuleLookupInfo::new(Self::NAME, "Math", "Dataflow"))
            .with_input(PortDescription::input(INPUT_MATRIX, PortTypeTag::Matrix))
            .with_output(PortDescription::output(REPORTED_INFO, PortTypeTag::String))
            .with_maker(|ctx| {
                Box::new(ReportMatrixInfo {
                    algorithm: lookup(ctx, REPORT_ALGORITHM, Arc::new(ReportMatrixInfoAlgorithm)),
                })
            })
    }
}

impl ModuleExecute for ReportMatrixInfo {
    fn execute(&self, ctx: &mut ModuleContext<'_>) -> Result<(), ModuleError> {
        let matrix: Arc<DenseMatrix> = ctx.required_input(INPUT_MATRIX)?;
        let output = self
            .algorithm
            .run(&AlgorithmInput::new().with_data(INPUT_MATRIX, matrix))?;
        let info = output
            .get::<MatrixInfo>(RESULT)
            .ok_or_else(|| AlgorithmError::Failed("no matrix info produced".into()))?;
        tracing::info!(module = %ctx.module_id(), info = %info, "matrix info");
        ctx.send_output(REPORTED_INFO, info.to_string())?;
        ctx.state().set_transient_value(REPORTED_INFO, info);
        Ok(())
    }
}

/// Sums every matrix arriving on its dynamic input port
#[derive(Debug, Clone, Copy, Default)]
pub struct AccumulateMatrices;

impl AccumulateMatrices {
    /// Module type name
    pub const NAME: &'static str = "AccumulateMatrices";

    /// Factory description
    pub fn description() -> ModuleDescription {
        ModuleDescription::new(ModuleLookupInfo::new(Self::NAME, "Math", "Dataflow"))
            .with_input(PortDescription::input("InputMatrices", PortTypeTag::Matrix).dynamic())
            .with_output(PortDescription::output("Sum", PortTypeTag::Matrix))
            .with_maker(|_| Box::new(AccumulateMatrices))
    }
}

impl ModuleExecute for AccumulateMatrices {
    fn execute(&self, ctx: &mut ModuleContext<'_>) -> Result<(), ModuleError> {
        let matrices = ctx.dynamic_inputs::<DenseMatrix>("InputMatrices")?;
        let Some((first, rest)) = matrices.split_first() else {
            return Err(ModuleError::MissingRequiredInput {
                module: ctx.module_id().clone(),
                port: dataflow_network::PortId::new("InputMatrices", 0),
            });
        };
        let mut sum = DenseMatrix::clone(first);
        for matrix in rest {
            ctx.checkpoint()?;
            sum = sum.checked_add(matrix)?;
        }
        ctx.send_output("Sum", sum)
    }
}
