use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::device::DeviceRef;
use crate::input::{InputEvent, InputState};

use super::backend::{HeadlessWindowSystem, WinitWindowSystem};
use super::{SurfaceConfig, SurfaceError};

/// Opaque identifier of a native window, assigned by the window system.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct NativeWindowId(pub u64);

/// Process-wide windowing system: windows, contexts and the event queue.
///
/// `init`/`terminate` are paired by [`Platform`]; implementations do not have
/// to guard against repeated calls themselves.
pub trait WindowSystem {
    fn init(&mut self) -> Result<(), SurfaceError>;
    fn terminate(&mut self);

    /// Creates a window with a core-profile context matching `config`.
    fn create_window(&mut self, config: &SurfaceConfig) -> Result<NativeWindowId, SurfaceError>;
    fn destroy_window(&mut self, window: NativeWindowId);

    /// Framebuffer size in physical pixels.
    fn framebuffer_size(&self, window: NativeWindowId) -> (u32, u32);

    /// Makes the window's context current on the calling thread.
    fn make_current(&mut self, window: NativeWindowId) -> Result<(), SurfaceError>;

    fn set_cursor_grab(&mut self, window: NativeWindowId, grab: bool);

    /// Loads the device functions for the window's current context.
    fn load_device(&mut self, window: NativeWindowId) -> Result<DeviceRef, SurfaceError>;

    /// Services the event queue once, appending translated events.
    fn pump_events(&mut self, events: &mut Vec<(NativeWindowId, InputEvent)>);

    fn swap_buffers(&mut self, window: NativeWindowId) -> Result<(), SurfaceError>;
}

struct PlatformInner {
    system: Box<dyn WindowSystem>,

    /// Surfaces currently holding the window system initialised.
    users: usize,

    /// Where events for each window are delivered. Weak: a surface owns its
    /// input state, the platform only routes to it.
    routes: HashMap<NativeWindowId, Weak<RefCell<InputState>>>,
}

/// Shared handle to the process-wide window system.
///
/// The window system is initialised when the first surface is brought up and
/// terminated when the last one is disposed. Events pumped through
/// [`poll_events`](Self::poll_events) are routed by window id to the owning
/// surface, so several surfaces can share one platform.
#[derive(Clone)]
pub struct Platform {
    inner: Rc<RefCell<PlatformInner>>,
}

impl Platform {
    pub fn new(system: impl WindowSystem + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(PlatformInner {
                system: Box::new(system),
                users: 0,
                routes: HashMap::new(),
            })),
        }
    }

    /// Desktop platform backed by `winit` and `glutin`.
    pub fn desktop() -> Self {
        Self::new(WinitWindowSystem::new())
    }

    /// Headless platform; the returned window system handle scripts it.
    pub fn headless() -> (Self, HeadlessWindowSystem) {
        let system = HeadlessWindowSystem::new();
        (Self::new(system.clone()), system)
    }

    pub fn is_initialised(&self) -> bool {
        self.inner.borrow().users > 0
    }

    pub fn user_count(&self) -> usize {
        self.inner.borrow().users
    }

    pub(crate) fn acquire(&self) -> Result<(), SurfaceError> {
        let mut inner = self.inner.borrow_mut();
        if inner.users == 0 {
            if let Err(e) = inner.system.init() {
                inner.system.terminate();
                return Err(e);
            }
            log::debug!("window system initialised");
        }
        inner.users += 1;
        Ok(())
    }

    pub(crate) fn release(&self) {
        let mut inner = self.inner.borrow_mut();
        match inner.users {
            0 => log::warn!("window system released more often than acquired"),
            1 => {
                inner.users = 0;
                inner.routes.clear();
                inner.system.terminate();
                log::debug!("window system terminated");
            }
            _ => inner.users -= 1,
        }
    }

    pub(crate) fn register(&self, window: NativeWindowId, input: &Rc<RefCell<InputState>>) {
        self.inner
            .borrow_mut()
            .routes
            .insert(window, Rc::downgrade(input));
    }

    pub(crate) fn unregister(&self, window: NativeWindowId) {
        self.inner.borrow_mut().routes.remove(&window);
    }

    pub(crate) fn with_system<R>(&self, f: impl FnOnce(&mut dyn WindowSystem) -> R) -> R {
        let mut inner = self.inner.borrow_mut();
        f(inner.system.as_mut())
    }

    /// Services the event queue once and delivers events to their surfaces.
    ///
    /// Returns the number of events delivered.
    pub fn poll_events(&self) -> usize {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.borrow_mut();
            if inner.users == 0 {
                return 0;
            }
            inner.system.pump_events(&mut events);
        }

        let mut inner = self.inner.borrow_mut();
        let mut delivered = 0;
        for (window, ev) in &events {
            match inner.routes.get(window).and_then(Weak::upgrade) {
                Some(input) => {
                    input.borrow_mut().apply_event(ev);
                    delivered += 1;
                }
                None => log::trace!("dropping event for unrouted window {window:?}: {ev:?}"),
            }
        }
        inner.routes.retain(|_, input| input.strong_count() > 0);
        delivered
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Platform")
            .field("users", &inner.users)
            .field("windows", &inner.routes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Key, KeyState};

    #[test]
    fn init_and_terminate_are_reference_counted() {
        let (platform, system) = Platform::headless();
        assert!(!platform.is_initialised());

        platform.acquire().unwrap();
        platform.acquire().unwrap();
        assert_eq!(system.init_count(), 1);

        platform.release();
        assert!(platform.is_initialised());
        assert_eq!(system.terminate_count(), 0);

        platform.release();
        assert!(!platform.is_initialised());
        assert_eq!(system.terminate_count(), 1);
    }

    #[test]
    fn failed_init_terminates_and_stays_uninitialised() {
        let (platform, system) = Platform::headless();
        system.fail_init("no display");

        let err = platform.acquire().unwrap_err();
        assert!(matches!(err, SurfaceError::WindowSystemInit(_)));
        assert!(!platform.is_initialised());
        assert_eq!(system.terminate_count(), 1);
    }

    #[test]
    fn events_route_by_window_id() {
        let (platform, system) = Platform::headless();
        platform.acquire().unwrap();

        let a = Rc::new(RefCell::new(InputState::default()));
        let b = Rc::new(RefCell::new(InputState::default()));
        platform.register(NativeWindowId(1), &a);
        platform.register(NativeWindowId(2), &b);

        system.push_event(NativeWindowId(2), InputEvent::key(Key::A, KeyState::Pressed));
        system.push_event(NativeWindowId(9), InputEvent::CloseRequested);
        assert_eq!(platform.poll_events(), 1);

        assert!(!a.borrow().key_down(Key::A));
        assert!(b.borrow().key_down(Key::A));
    }

    #[test]
    fn dropped_inputs_are_pruned() {
        let (platform, system) = Platform::headless();
        platform.acquire().unwrap();
        {
            let input = Rc::new(RefCell::new(InputState::default()));
            platform.register(NativeWindowId(1), &input);
        }
        system.push_event(NativeWindowId(1), InputEvent::CloseRequested);
        assert_eq!(platform.poll_events(), 0);
        assert_eq!(format!("{platform:?}"), "Platform { users: 1, windows: 0 }");
    }
}
