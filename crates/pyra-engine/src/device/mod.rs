//! Graphics device abstraction.
//!
//! This module is responsible for:
//! - typed handles for device-resident objects (`None` means unallocated)
//! - the [`Device`] trait that meshes, shader programs and surfaces talk to
//! - the OpenGL backend (`glow`) and a headless recording backend

mod api;
mod gl;
mod handle;
pub mod headless;

use std::rc::Rc;

pub use api::{
    BufferTarget, BufferUsage, ClearMask, Device, DeviceError, IndexType, PrimitiveMode,
    ShaderStage, VertexAttribute,
};
pub use gl::GlDevice;
pub use handle::{BufferHandle, ProgramHandle, ShaderHandle, UniformLocation, VertexArrayHandle};
pub use headless::HeadlessDevice;

/// Shared reference to the device that owns a set of GPU objects.
///
/// Resource owners keep one so they can release their objects on drop.
pub type DeviceRef = Rc<dyn Device>;
