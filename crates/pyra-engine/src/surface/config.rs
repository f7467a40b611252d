use crate::input::Key;

/// Window/context configuration for a [`RenderSurface`](super::RenderSurface).
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    pub title: String,

    /// Requested window size in logical pixels.
    ///
    /// The framebuffer may be larger on high-density displays.
    pub width: u32,
    pub height: u32,

    /// Requested OpenGL version. Contexts are always core profile and
    /// forward compatible.
    pub gl_version: (u8, u8),

    /// Hide the cursor and keep it inside the window for mouse-look.
    pub grab_cursor: bool,

    /// Key that sets the close flag when pressed.
    pub close_key: Option<Key>,

    /// Synchronize presentation with the display refresh.
    pub vsync: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            title: "Test Window".to_string(),
            width: 800,
            height: 600,
            gl_version: (3, 3),
            grab_cursor: true,
            close_key: Some(Key::Escape),
            vsync: true,
        }
    }
}

impl SurfaceConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}
