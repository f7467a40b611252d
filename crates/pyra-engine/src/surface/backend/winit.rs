use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::rc::Rc;
use std::time::Duration;

use glutin::config::{Config, ConfigTemplateBuilder};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentContext, PossiblyCurrentContext,
    Version,
};
use glutin::display::{Display, DisplayApiPreference, GetGlDisplay};
use glutin::prelude::*;
use glutin::surface::{Surface, SwapInterval, WindowSurface};
use glutin_winit::{GlWindow as _, finalize_window};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawWindowHandle};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{CursorGrabMode, Window, WindowId};

use crate::device::{DeviceRef, GlDevice};
use crate::input::InputEvent;
use crate::input::platform::winit::translate_window_event;
use crate::surface::platform::{NativeWindowId, WindowSystem};
use crate::surface::{SurfaceConfig, SurfaceError};

enum ContextState {
    NotCurrent(NotCurrentContext),
    Current(PossiblyCurrentContext),
    /// A failed `make_current` consumed the context.
    Lost,
}

/// One native window with its GL context and window surface.
///
/// Field order is drop order: context, then surface, then window.
struct GlWindow {
    context: ContextState,
    surface: Surface<WindowSurface>,
    config: Config,
    vsync: bool,
    window: Window,
}

/// Desktop window system: a `winit` event loop driven by `pump_app_events`,
/// with `glutin` providing displays, contexts and window surfaces.
///
/// winit allows one event loop per process, so `terminate` destroys all
/// windows but keeps the loop for a later `init`.
#[derive(Default)]
pub struct WinitWindowSystem {
    event_loop: Option<EventLoop<()>>,
    initialised: bool,
    next_window: u64,
    windows: HashMap<NativeWindowId, GlWindow>,
    ids: HashMap<WindowId, NativeWindowId>,

    /// Windows with a grabbed cursor; they receive raw mouse motion.
    grabbed: HashSet<NativeWindowId>,
    focused: Option<NativeWindowId>,
}

impl WinitWindowSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, window: NativeWindowId) -> Option<&GlWindow> {
        self.windows.get(&window)
    }

    fn build_window(
        event_loop: &EventLoop<()>,
        config: &SurfaceConfig,
    ) -> Result<GlWindow, SurfaceError> {
        let creation = |e: &dyn std::fmt::Display| SurfaceError::WindowCreation(e.to_string());

        let attrs = Window::default_attributes()
            .with_title(config.title.clone())
            .with_inner_size(LogicalSize::new(config.width as f64, config.height as f64));

        let template = ConfigTemplateBuilder::new().with_depth_size(24);

        // WGL only offers modern pixel formats for an existing window.
        #[cfg(target_os = "windows")]
        let (template, early) = {
            #[allow(deprecated)]
            let window = event_loop
                .create_window(attrs.clone())
                .map_err(|e| creation(&e))?;
            let handle = window.window_handle().map_err(|e| creation(&e))?.as_raw();
            (
                template.compatible_with_native_window(handle),
                Some((window, handle)),
            )
        };
        #[cfg(not(target_os = "windows"))]
        let early: Option<(Window, RawWindowHandle)> = None;

        let display = create_display(event_loop, early.as_ref().map(|(_, h)| *h))?;

        let gl_config = unsafe { display.find_configs(template.build()) }
            .map_err(|e| creation(&e))?
            .reduce(|best, c| if c.depth_size() > best.depth_size() { c } else { best })
            .ok_or_else(|| {
                SurfaceError::WindowCreation(
                    "no GL config with a depth buffer for this display".to_string(),
                )
            })?;

        let window = match early {
            Some((window, _)) => window,
            None => finalize_window(event_loop, attrs, &gl_config).map_err(|e| creation(&e))?,
        };

        let raw_handle = window
            .window_handle()
            .map_err(|e| creation(&e))?
            .as_raw();

        let (major, minor) = config.gl_version;
        // Core profile contexts on macOS are always forward compatible.
        let context_attrs = ContextAttributesBuilder::new()
            .with_profile(GlProfile::Core)
            .with_context_api(ContextApi::OpenGl(Some(Version::new(major, minor))))
            .build(Some(raw_handle));

        let context = unsafe { display.create_context(&gl_config, &context_attrs) }
            .map_err(|e| creation(&e))?;

        let surface_attrs = window
            .build_surface_attributes(Default::default())
            .map_err(|e| creation(&e))?;
        let surface = unsafe { display.create_window_surface(&gl_config, &surface_attrs) }
            .map_err(|e| creation(&e))?;

        Ok(GlWindow {
            context: ContextState::NotCurrent(context),
            surface,
            config: gl_config,
            vsync: config.vsync,
            window,
        })
    }
}

fn create_display(
    event_loop: &EventLoop<()>,
    window: Option<RawWindowHandle>,
) -> Result<Display, SurfaceError> {
    #[cfg(target_os = "windows")]
    let preference = DisplayApiPreference::WglThenEgl(window);

    #[cfg(target_vendor = "apple")]
    let preference = DisplayApiPreference::Cgl;

    #[cfg(all(unix, not(target_vendor = "apple"), not(target_os = "android")))]
    let preference = DisplayApiPreference::EglThenGlx(Box::new(
        winit::platform::x11::register_xlib_error_hook,
    ));

    #[cfg(not(target_os = "windows"))]
    let _ = window;

    let handle = event_loop
        .display_handle()
        .map_err(|e| SurfaceError::WindowCreation(e.to_string()))?
        .as_raw();
    unsafe { Display::new(handle, preference) }
        .map_err(|e| SurfaceError::WindowCreation(e.to_string()))
}

impl WindowSystem for WinitWindowSystem {
    fn init(&mut self) -> Result<(), SurfaceError> {
        if self.event_loop.is_none() {
            let event_loop =
                EventLoop::new().map_err(|e| SurfaceError::WindowSystemInit(e.to_string()))?;
            self.event_loop = Some(event_loop);
        }
        self.initialised = true;
        Ok(())
    }

    fn terminate(&mut self) {
        self.windows.clear();
        self.ids.clear();
        self.grabbed.clear();
        self.focused = None;
        self.initialised = false;
    }

    fn create_window(&mut self, config: &SurfaceConfig) -> Result<NativeWindowId, SurfaceError> {
        let event_loop = match (&self.event_loop, self.initialised) {
            (Some(el), true) => el,
            _ => {
                return Err(SurfaceError::WindowCreation(
                    "window system is not initialised".to_string(),
                ));
            }
        };

        let entry = Self::build_window(event_loop, config)?;

        self.next_window += 1;
        let id = NativeWindowId(self.next_window);
        self.ids.insert(entry.window.id(), id);
        self.windows.insert(id, entry);

        log::debug!("created window {id:?} \"{}\"", config.title);
        Ok(id)
    }

    fn destroy_window(&mut self, window: NativeWindowId) {
        self.grabbed.remove(&window);
        if self.focused == Some(window) {
            self.focused = None;
        }
        if let Some(entry) = self.windows.remove(&window) {
            self.ids.remove(&entry.window.id());
            log::debug!("destroyed window {window:?}");
        }
    }

    fn framebuffer_size(&self, window: NativeWindowId) -> (u32, u32) {
        self.entry(window).map_or((0, 0), |e| {
            let size = e.window.inner_size();
            (size.width, size.height)
        })
    }

    fn make_current(&mut self, window: NativeWindowId) -> Result<(), SurfaceError> {
        let entry = self.windows.get_mut(&window).ok_or_else(|| {
            SurfaceError::WindowCreation(format!("unknown window {window:?}"))
        })?;

        let context = match std::mem::replace(&mut entry.context, ContextState::Lost) {
            ContextState::NotCurrent(ctx) => ctx.make_current(&entry.surface),
            ContextState::Current(ctx) => ctx.make_current(&entry.surface).map(|()| ctx),
            ContextState::Lost => {
                return Err(SurfaceError::WindowCreation(
                    "GL context was lost".to_string(),
                ));
            }
        }
        .map_err(|e| SurfaceError::WindowCreation(e.to_string()))?;

        let interval = if entry.vsync {
            SwapInterval::Wait(NonZeroU32::MIN)
        } else {
            SwapInterval::DontWait
        };
        if let Err(e) = entry.surface.set_swap_interval(&context, interval) {
            log::warn!("could not set swap interval: {e}");
        }

        entry.context = ContextState::Current(context);
        Ok(())
    }

    fn set_cursor_grab(&mut self, window: NativeWindowId, grab: bool) {
        let Some(entry) = self.windows.get(&window) else { return };
        let w = &entry.window;

        // Locked gives unbounded relative motion; Confined is the fallback
        // where locking is unsupported.
        let result = if grab {
            w.set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| w.set_cursor_grab(CursorGrabMode::Confined))
        } else {
            w.set_cursor_grab(CursorGrabMode::None)
        };
        if let Err(e) = result {
            log::warn!("cursor grab not supported: {e}");
        }
        w.set_cursor_visible(!grab);

        if grab {
            self.grabbed.insert(window);
            self.focused.get_or_insert(window);
        } else {
            self.grabbed.remove(&window);
        }
    }

    fn load_device(&mut self, window: NativeWindowId) -> Result<DeviceRef, SurfaceError> {
        let entry = self.entry(window).ok_or_else(|| {
            SurfaceError::FunctionLoader(format!("unknown window {window:?}"))
        })?;
        if !matches!(entry.context, ContextState::Current(_)) {
            return Err(SurfaceError::FunctionLoader(
                "GL context is not current".to_string(),
            ));
        }

        let display = entry.config.display();
        // SAFETY: the context was made current on this thread above and the
        // pointers come from its display.
        let device = unsafe { GlDevice::from_loader(|name| display.get_proc_address(name)) }
            .map_err(|e| SurfaceError::FunctionLoader(e.to_string()))?;
        Ok(Rc::new(device))
    }

    fn pump_events(&mut self, events: &mut Vec<(NativeWindowId, InputEvent)>) {
        let Self {
            event_loop,
            windows,
            ids,
            grabbed,
            focused,
            ..
        } = self;
        let Some(event_loop) = event_loop.as_mut() else { return };

        let mut collector = EventCollector {
            windows,
            ids,
            grabbed,
            focused,
            events,
            resized: Vec::new(),
        };
        let status = event_loop.pump_app_events(Some(Duration::ZERO), &mut collector);
        let resized = std::mem::take(&mut collector.resized);

        if let PumpStatus::Exit(code) = status {
            log::debug!("event loop exited with code {code}");
            events.extend(windows.keys().map(|id| (*id, InputEvent::CloseRequested)));
        }

        for id in resized {
            let Some(entry) = windows.get(&id) else { continue };
            let ContextState::Current(ctx) = &entry.context else { continue };
            let size = entry.window.inner_size();
            if let (Some(w), Some(h)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height)) {
                entry.surface.resize(ctx, w, h);
            }
        }
    }

    fn swap_buffers(&mut self, window: NativeWindowId) -> Result<(), SurfaceError> {
        let entry = self
            .entry(window)
            .ok_or_else(|| SurfaceError::Present(format!("unknown window {window:?}")))?;
        let ContextState::Current(ctx) = &entry.context else {
            return Err(SurfaceError::Present("GL context is not current".to_string()));
        };
        entry.window.pre_present_notify();
        entry
            .surface
            .swap_buffers(ctx)
            .map_err(|e| SurfaceError::Present(e.to_string()))
    }
}

struct EventCollector<'a> {
    windows: &'a HashMap<NativeWindowId, GlWindow>,
    ids: &'a HashMap<WindowId, NativeWindowId>,
    grabbed: &'a HashSet<NativeWindowId>,
    focused: &'a mut Option<NativeWindowId>,
    events: &'a mut Vec<(NativeWindowId, InputEvent)>,
    resized: Vec<NativeWindowId>,
}

impl ApplicationHandler for EventCollector<'_> {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(&id) = self.ids.get(&window_id) else { return };
        let Some(entry) = self.windows.get(&id) else { return };

        match event {
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                self.resized.push(id);
            }
            WindowEvent::Focused(true) => *self.focused = Some(id),
            WindowEvent::Focused(false) if *self.focused == Some(id) => *self.focused = None,
            _ => {}
        }

        if let Some(ev) = translate_window_event(&entry.window, &event) {
            self.events.push((id, ev));
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        let DeviceEvent::MouseMotion { delta: (dx, dy) } = event else { return };
        let Some(id) = *self.focused else { return };
        if self.grabbed.contains(&id) {
            self.events.push((id, InputEvent::motion(dx as f32, dy as f32)));
        }
    }
}
