use std::cell::RefCell;
use std::rc::Rc;

use crate::device::DeviceRef;
use crate::input::{InputState, Key};

use super::platform::{NativeWindowId, Platform};
use super::{SurfaceConfig, SurfaceError};

/// A native window with a current OpenGL context and its raw input state.
///
/// Created unbound; [`initialise`](Self::initialise) brings the window and
/// context up, [`dispose`](Self::dispose) (or drop) tears them down together.
pub struct RenderSurface {
    platform: Platform,
    config: SurfaceConfig,

    /// Framebuffer size in physical pixels, queried once at initialisation.
    buffer_size: (u32, u32),

    window: Option<NativeWindowId>,
    device: Option<DeviceRef>,

    /// Shared with the platform's event routes.
    input: Rc<RefCell<InputState>>,
}

impl RenderSurface {
    pub fn new(platform: &Platform, config: SurfaceConfig) -> Self {
        let input = Rc::new(RefCell::new(InputState::new(config.close_key)));
        Self {
            platform: platform.clone(),
            config,
            buffer_size: (0, 0),
            window: None,
            device: None,
            input,
        }
    }

    /// Creates the window and context, makes the context current and loads
    /// the device.
    ///
    /// On failure everything created so far is torn down again and the
    /// surface stays uninitialised.
    pub fn initialise(&mut self) -> Result<(), SurfaceError> {
        if self.window.is_some() {
            return Err(SurfaceError::AlreadyInitialised);
        }

        self.platform.acquire()?;

        let window = match self.platform.with_system(|s| s.create_window(&self.config)) {
            Ok(id) => id,
            Err(e) => {
                log::error!("{e}");
                self.platform.release();
                return Err(e);
            }
        };

        let (bw, bh) = self.platform.with_system(|s| s.framebuffer_size(window));

        if let Err(e) = self.platform.with_system(|s| s.make_current(window)) {
            log::error!("{e}");
            self.teardown(window);
            return Err(e);
        }

        self.platform.register(window, &self.input);

        if self.config.grab_cursor {
            self.platform.with_system(|s| s.set_cursor_grab(window, true));
        }

        let device = match self.platform.with_system(|s| s.load_device(window)) {
            Ok(device) => device,
            Err(e) => {
                log::error!("{e}");
                self.teardown(window);
                return Err(e);
            }
        };

        device.enable_depth_test();
        device.viewport(0, 0, bw as i32, bh as i32);

        log::info!(
            "surface \"{}\" up: {}x{} window, {bw}x{bh} framebuffer",
            self.config.title,
            self.config.width,
            self.config.height
        );

        self.buffer_size = (bw, bh);
        self.window = Some(window);
        self.device = Some(device);
        Ok(())
    }

    fn teardown(&self, window: NativeWindowId) {
        self.platform.unregister(window);
        self.platform.with_system(|s| s.destroy_window(window));
        self.platform.release();
    }

    /// Services the platform event queue once.
    ///
    /// Events for every surface on the platform are delivered, not only
    /// this one's.
    pub fn poll_events(&self) {
        self.platform.poll_events();
    }

    /// Horizontal mouse movement since the last call.
    pub fn consume_mouse_delta_x(&mut self) -> f32 {
        self.input.borrow_mut().take_mouse_delta_x()
    }

    /// Vertical mouse movement since the last call; positive is upwards.
    pub fn consume_mouse_delta_y(&mut self) -> f32 {
        self.input.borrow_mut().take_mouse_delta_y()
    }

    pub fn should_close(&self) -> bool {
        self.input.borrow().should_close()
    }

    pub fn request_close(&mut self) {
        self.input.borrow_mut().request_close();
    }

    pub fn key_down(&self, key: Key) -> bool {
        self.input.borrow().key_down(key)
    }

    /// Swaps the front and back buffers.
    pub fn present(&mut self) -> Result<(), SurfaceError> {
        let window = self.window.ok_or(SurfaceError::NotInitialised)?;
        log::trace!("present {window:?}");
        self.platform.with_system(|s| s.swap_buffers(window))
    }

    /// Destroys the window and context and releases the platform.
    ///
    /// Idempotent. Objects created through [`device`](Self::device) must be
    /// disposed first.
    pub fn dispose(&mut self) {
        let Some(window) = self.window.take() else {
            return;
        };
        self.device = None;
        self.buffer_size = (0, 0);
        self.teardown(window);
        log::debug!("surface \"{}\" disposed", self.config.title);
    }

    pub fn is_initialised(&self) -> bool {
        self.window.is_some()
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    pub fn buffer_width(&self) -> u32 {
        self.buffer_size.0
    }

    pub fn buffer_height(&self) -> u32 {
        self.buffer_size.1
    }

    /// Framebuffer width over height; 1.0 before initialisation.
    pub fn aspect_ratio(&self) -> f32 {
        let (w, h) = self.buffer_size;
        if h == 0 { 1.0 } else { w as f32 / h as f32 }
    }

    /// Device of the surface's context, once initialised.
    pub fn device(&self) -> Option<&DeviceRef> {
        self.device.as_ref()
    }

    pub fn window_id(&self) -> Option<NativeWindowId> {
        self.window
    }
}

impl Drop for RenderSurface {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for RenderSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSurface")
            .field("title", &self.config.title)
            .field("window", &self.window)
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}
