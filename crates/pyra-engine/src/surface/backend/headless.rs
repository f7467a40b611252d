use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::device::{DeviceRef, HeadlessDevice};
use crate::input::InputEvent;
use crate::surface::platform::{NativeWindowId, WindowSystem};
use crate::surface::{SurfaceConfig, SurfaceError};

#[derive(Debug)]
struct HeadlessWindow {
    framebuffer: (u32, u32),
    cursor_grabbed: bool,
    swaps: u32,
}

#[derive(Debug)]
struct State {
    initialised: bool,
    init_count: u32,
    terminate_count: u32,

    fail_init: Option<String>,
    fail_window: Option<String>,
    fail_loader: Option<String>,

    scale_factor: f64,
    next_window: u64,
    windows: HashMap<NativeWindowId, HeadlessWindow>,
    current: Option<NativeWindowId>,
    queue: VecDeque<(NativeWindowId, InputEvent)>,

    device: Rc<HeadlessDevice>,
}

/// Window system without a display.
///
/// Cloning yields another handle to the same state, so a test can keep one
/// handle to script failures and queue input while a [`Platform`] owns the
/// other. Every window shares one [`HeadlessDevice`].
///
/// [`Platform`]: crate::surface::Platform
#[derive(Debug, Clone)]
pub struct HeadlessWindowSystem {
    state: Rc<RefCell<State>>,
}

impl Default for HeadlessWindowSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessWindowSystem {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                initialised: false,
                init_count: 0,
                terminate_count: 0,
                fail_init: None,
                fail_window: None,
                fail_loader: None,
                scale_factor: 1.0,
                next_window: 0,
                windows: HashMap::new(),
                current: None,
                queue: VecDeque::new(),
                device: Rc::new(HeadlessDevice::new()),
            })),
        }
    }

    pub fn fail_init(&self, reason: impl Into<String>) {
        self.state.borrow_mut().fail_init = Some(reason.into());
    }

    pub fn fail_window_creation(&self, reason: impl Into<String>) {
        self.state.borrow_mut().fail_window = Some(reason.into());
    }

    pub fn fail_loader(&self, reason: impl Into<String>) {
        self.state.borrow_mut().fail_loader = Some(reason.into());
    }

    /// Ratio of framebuffer pixels to logical pixels for new windows.
    pub fn set_scale_factor(&self, scale: f64) {
        self.state.borrow_mut().scale_factor = scale;
    }

    /// Queues an event for the next pump.
    pub fn push_event(&self, window: NativeWindowId, event: InputEvent) {
        self.state.borrow_mut().queue.push_back((window, event));
    }

    pub fn device(&self) -> Rc<HeadlessDevice> {
        self.state.borrow().device.clone()
    }

    pub fn init_count(&self) -> u32 {
        self.state.borrow().init_count
    }

    pub fn terminate_count(&self) -> u32 {
        self.state.borrow().terminate_count
    }

    pub fn is_initialised(&self) -> bool {
        self.state.borrow().initialised
    }

    pub fn window_count(&self) -> usize {
        self.state.borrow().windows.len()
    }

    pub fn current_window(&self) -> Option<NativeWindowId> {
        self.state.borrow().current
    }

    pub fn is_cursor_grabbed(&self, window: NativeWindowId) -> bool {
        self.state
            .borrow()
            .windows
            .get(&window)
            .is_some_and(|w| w.cursor_grabbed)
    }

    pub fn swap_count(&self, window: NativeWindowId) -> u32 {
        self.state
            .borrow()
            .windows
            .get(&window)
            .map_or(0, |w| w.swaps)
    }
}

impl WindowSystem for HeadlessWindowSystem {
    fn init(&mut self) -> Result<(), SurfaceError> {
        let mut state = self.state.borrow_mut();
        if let Some(reason) = state.fail_init.clone() {
            return Err(SurfaceError::WindowSystemInit(reason));
        }
        state.initialised = true;
        state.init_count += 1;
        Ok(())
    }

    fn terminate(&mut self) {
        let mut state = self.state.borrow_mut();
        state.initialised = false;
        state.windows.clear();
        state.current = None;
        state.queue.clear();
        state.terminate_count += 1;
    }

    fn create_window(&mut self, config: &SurfaceConfig) -> Result<NativeWindowId, SurfaceError> {
        let mut state = self.state.borrow_mut();
        if !state.initialised {
            return Err(SurfaceError::WindowCreation(
                "window system is not initialised".to_string(),
            ));
        }
        if let Some(reason) = state.fail_window.clone() {
            return Err(SurfaceError::WindowCreation(reason));
        }

        let scale = state.scale_factor;
        let framebuffer = (
            (config.width as f64 * scale).round() as u32,
            (config.height as f64 * scale).round() as u32,
        );

        state.next_window += 1;
        let id = NativeWindowId(state.next_window);
        state.windows.insert(
            id,
            HeadlessWindow {
                framebuffer,
                cursor_grabbed: false,
                swaps: 0,
            },
        );
        Ok(id)
    }

    fn destroy_window(&mut self, window: NativeWindowId) {
        let mut state = self.state.borrow_mut();
        state.windows.remove(&window);
        if state.current == Some(window) {
            state.current = None;
        }
    }

    fn framebuffer_size(&self, window: NativeWindowId) -> (u32, u32) {
        self.state
            .borrow()
            .windows
            .get(&window)
            .map_or((0, 0), |w| w.framebuffer)
    }

    fn make_current(&mut self, window: NativeWindowId) -> Result<(), SurfaceError> {
        let mut state = self.state.borrow_mut();
        if !state.windows.contains_key(&window) {
            return Err(SurfaceError::WindowCreation(format!(
                "no context for window {window:?}"
            )));
        }
        state.current = Some(window);
        Ok(())
    }

    fn set_cursor_grab(&mut self, window: NativeWindowId, grab: bool) {
        if let Some(w) = self.state.borrow_mut().windows.get_mut(&window) {
            w.cursor_grabbed = grab;
        }
    }

    fn load_device(&mut self, window: NativeWindowId) -> Result<DeviceRef, SurfaceError> {
        let state = self.state.borrow();
        if let Some(reason) = state.fail_loader.clone() {
            return Err(SurfaceError::FunctionLoader(reason));
        }
        if state.current != Some(window) {
            return Err(SurfaceError::FunctionLoader(format!(
                "context of window {window:?} is not current"
            )));
        }
        let device: DeviceRef = state.device.clone();
        Ok(device)
    }

    fn pump_events(&mut self, events: &mut Vec<(NativeWindowId, InputEvent)>) {
        events.extend(self.state.borrow_mut().queue.drain(..));
    }

    fn swap_buffers(&mut self, window: NativeWindowId) -> Result<(), SurfaceError> {
        match self.state.borrow_mut().windows.get_mut(&window) {
            Some(w) => {
                w.swaps += 1;
                Ok(())
            }
            None => Err(SurfaceError::Present(format!("unknown window {window:?}"))),
        }
    }
}
