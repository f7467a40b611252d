//! Render surface: native window, graphics context and raw input.
//!
//! This module is responsible for:
//! - the process-wide [`Platform`] that initialises the window system for
//!   the first surface and terminates it after the last
//! - routing window events to the input state of the owning surface
//! - [`RenderSurface`] lifecycle: initialise, poll, present, dispose

mod backend;
mod config;
mod error;
mod platform;
mod render_surface;

pub use backend::{HeadlessWindowSystem, WinitWindowSystem};
pub use config::SurfaceConfig;
pub use error::SurfaceError;
pub use platform::{NativeWindowId, Platform, WindowSystem};
pub use render_surface::RenderSurface;
