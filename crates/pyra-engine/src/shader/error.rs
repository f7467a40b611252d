use std::path::PathBuf;

use thiserror::Error;

use crate::device::{DeviceError, ShaderStage};

use super::ProgramState;

/// Failures while building a shader program.
///
/// None of these are fatal to the process; the program is left `Failed` and
/// the caller decides whether to continue.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("error creating shader program: {0}")]
    ProgramCreation(#[source] DeviceError),

    #[error("error compiling the {stage} shader: '{log}'")]
    Compilation { stage: ShaderStage, log: String },

    #[error("error linking program: '{log}'")]
    Link { log: String },

    #[error("error validating program: '{log}'")]
    Validation { log: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("program cannot be built from the {0:?} state")]
    InvalidState(ProgramState),
}

impl ShaderError {
    /// Device diagnostic text carried by compile/link/validation failures.
    pub fn log(&self) -> Option<&str> {
        match self {
            ShaderError::Compilation { log, .. }
            | ShaderError::Link { log }
            | ShaderError::Validation { log } => Some(log),
            _ => None,
        }
    }
}
