//! Top-level lifecycle: connect, shell handshake, event loop, windows.

pub(crate) mod xdg;

pub use xdg::{resize_edge, Size, XdgWm};

use std::sync::Arc;

use crate::display::Display;
use crate::error::Error;
use crate::window::{DrawCallback, Window, WindowEgl};

/// Default title and application id for the base toplevel.
const APP_ID: &str = "waywin";

/// Which shell protocol to negotiate at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellType {
    /// No shell role; the base surface stays unmapped.
    None,
    /// XDG shell with a toplevel role.
    Xdg,
}

/// Rendering backend requested for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    /// EGL/GLES rendering.
    Egl,
    /// Vulkan rendering. Not implemented.
    Vulkan,
}

/// An external event loop serviced from [`WindowManager::dispatch`].
///
/// Implementations must not block; `iterate` is called repeatedly until it
/// reports no more immediately pending work.
pub trait SecondaryLoop {
    /// Runs one iteration. Returns `true` while more work is pending.
    fn iterate(&mut self) -> bool;
}

/// Owns the display connection, the base window, the shell handshake and
/// every rendering window created through it.
pub struct WindowManager {
    // Declaration order doubles as teardown order; the display goes last.
    windows: Vec<Arc<WindowEgl>>,
    xdg_wm: Option<XdgWm>,
    base_window: Window,
    shell_type: ShellType,
    secondary: Option<Box<dyn SecondaryLoop>>,
    display: Display,
}

impl WindowManager {
    /// Connects, creates the base window and completes the shell handshake.
    ///
    /// For [`ShellType::Xdg`] this blocks until the compositor delivers the
    /// first configure. `name` selects a specific display socket; `None`
    /// follows the environment.
    pub fn new(
        shell_type: ShellType,
        secondary: Option<Box<dyn SecondaryLoop>>,
        enable_cursor: bool,
        name: Option<&str>,
    ) -> Result<Self, Error> {
        let mut display = Display::connect(name, enable_cursor)?;

        let base_window = Window::new(
            &display,
            Box::new(|time| log::trace!("base window frame at {time}")),
        );

        let xdg_wm = match shell_type {
            ShellType::Xdg => {
                let xdg = XdgWm::new(&display, &base_window, APP_ID, APP_ID, Size::default())?;
                while xdg.wait_for_configure() {
                    display.blocking_dispatch()?;
                }
                Some(xdg)
            }
            ShellType::None => None,
        };

        if xdg_wm.is_some() {
            base_window.start_frames();
        }

        Ok(Self {
            windows: Vec::new(),
            xdg_wm,
            base_window,
            shell_type,
            secondary,
            display,
        })
    }

    /// The display connection.
    pub fn display(&self) -> &Display {
        &self.display
    }

    /// Mutable access to the display, for roundtrips and observers.
    pub fn display_mut(&mut self) -> &mut Display {
        &mut self.display
    }

    /// The surface the shell role and all rendering windows are built on.
    pub fn base_window(&self) -> &Window {
        &self.base_window
    }

    /// The negotiated shell role, if any.
    pub fn xdg_wm(&self) -> Option<&XdgWm> {
        self.xdg_wm.as_ref()
    }

    /// The shell protocol selected at construction.
    pub fn shell_type(&self) -> ShellType {
        self.shell_type
    }

    /// Windows created through [`WindowManager::create_window`].
    pub fn windows(&self) -> &[Arc<WindowEgl>] {
        &self.windows
    }

    /// Whether the application should keep running. Always `true` without a
    /// shell role; with XDG it clears when the compositor requests close.
    pub fn running(&self) -> bool {
        self.xdg_wm.as_ref().map_or(true, XdgWm::running)
    }

    /// Creates a rendering window on the base surface.
    ///
    /// The draw callback replaces the base window's callback and the frame
    /// loop restarts, so the first frame runs immediately with time zero.
    pub fn create_window(
        &mut self,
        width: i32,
        height: i32,
        window_type: WindowType,
        draw: DrawCallback,
    ) -> Result<Arc<WindowEgl>, Error> {
        match window_type {
            WindowType::Vulkan => Err(Error::Unsupported("vulkan rendering")),
            WindowType::Egl => {
                self.base_window.set_draw(draw);
                let target = Arc::new(WindowEgl::new(
                    &self.display,
                    self.base_window.clone(),
                    width,
                    height,
                )?);
                self.base_window.start_frames();
                self.windows.push(target.clone());
                Ok(target)
            }
        }
    }

    /// Runs one event-loop pass: drains the secondary loop, fires due key
    /// repeats, then waits up to `timeout_ms` for Wayland events and
    /// dispatches them. Returns the number of dispatched events.
    pub fn dispatch(&mut self, timeout_ms: i32) -> Result<usize, Error> {
        if let Some(secondary) = self.secondary.as_mut() {
            while secondary.iterate() {}
        }
        self.display.service_repeats();
        self.display.dispatch(timeout_ms)
    }

    /// Like [`WindowManager::dispatch`] but never waits on the socket.
    pub fn poll_events(&mut self) -> Result<usize, Error> {
        if let Some(secondary) = self.secondary.as_mut() {
            while secondary.iterate() {}
        }
        self.display.service_repeats();
        self.display.poll_events()
    }
}
