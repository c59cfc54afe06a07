// SPDX-License-Identifier: MIT OR Apache-2.0
//! Test source and sink modules.

use crate::matrix::DenseMatrix;
use dataflow_network::{
    ModuleContext, ModuleDescription, ModuleError, ModuleExecute, ModuleLookupInfo,
    PortDescription, PortTypeTag,
};
use std::sync::Arc;

/// Transient state key read by `SendTestMatrix`
pub const MATRIX_TO_SEND: &str = "MatrixToSend";
/// Transient state key written by `ReceiveTestMatrix`
pub const RECEIVED_MATRIX: &str = "ReceivedMatrix";

/// Publishes the matrix placed in its transient state
#[derive(Debug, Clone, Copy, Default)]
pub struct SendTestMatrix;

impl SendTestMatrix {
    /// Module type name
    pub const NAME: &'static str = "SendTestMatrix";

    /// Factory description
    pub fn description() -> ModuleDescription {
        ModuleDescription::new(ModuleLookupInfo::new(Self::NAME, "Testing", "Dataflow"))
            .with_output(PortDescription::output("TestMatrix", PortTypeTag::Matrix))
            .with_maker(|_| Box::new(SendTestMatrix))
    }
}

impl ModuleExecute for SendTestMatrix {
    fn execute(&self, ctx: &mut ModuleContext<'_>) -> Result<(), ModuleError> {
        let matrix = ctx
            .state()
            .transient::<DenseMatrix>(MATRIX_TO_SEND)
            .ok_or_else(|| ModuleError::Execution(format!("no {MATRIX_TO_SEND} set")))?;
        ctx.send_output_handle(0, matrix)
    }
}

/// Stores the matrix it receives in its transient state
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiveTestMatrix;

impl ReceiveTestMatrix {
    /// Module type name
    pub const NAME: &'static str = "ReceiveTestMatrix";

    /// Factory description
    pub fn description() -> ModuleDescription {
        ModuleDescription::new(ModuleLookupInfo::new(Self::NAME, "Testing", "Dataflow"))
            .with_input(PortDescription::input("InputMatrix", PortTypeTag::Matrix))
            .with_maker(|_| Box::new(ReceiveTestMatrix))
    }
}

impl ModuleExecute for ReceiveTestMatrix {
    fn execute(&self, ctx: &mut ModuleContext<'_>) -> Result<(), ModuleError> {
        let matrix: Arc<DenseMatrix> = ctx.required_input(0)?;
        ctx.state().set_transient_value(RECEIVED_MATRIX, matrix);
        Ok(())
    }
}
