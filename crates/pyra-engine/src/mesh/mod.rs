//! Mesh buffers: vertex/index upload, indexed draws and disposal.

mod buffer;

pub use buffer::{MeshBuffer, MeshError, POSITION_ATTRIBUTE};
