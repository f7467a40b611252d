//! Shader programs.
//!
//! A program moves through `Empty -> Compiling -> Ready | Failed`. Build
//! failures carry the device diagnostic log and never abort the process.

mod error;
mod program;
mod source;

pub use error::ShaderError;
pub use program::{
    MODEL_UNIFORM, PROJECTION_UNIFORM, ProgramState, ShaderProgram, VIEW_UNIFORM,
};
pub use source::{read_source, read_source_or_empty};
