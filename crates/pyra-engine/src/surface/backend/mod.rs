//! Window system backends.

mod headless;
mod winit;

pub use self::headless::HeadlessWindowSystem;
pub use self::winit::WinitWindowSystem;
