//! Pyra engine crate.
//!
//! Device-side mesh buffers, shader programs and the window/context surface
//! they render into. The frame loop itself lives in the application.

pub mod device;
pub mod input;
pub mod logging;
pub mod mesh;
pub mod shader;
pub mod surface;
