//! Surfaces, the frame-driven draw loop and EGL rendering targets.

pub(crate) mod egl;
mod frame;
mod window_egl;

pub use egl::Egl;
pub use window_egl::WindowEgl;

use std::sync::{Arc, Mutex};

use wayland_client::protocol::{wl_callback, wl_surface};
use wayland_client::{Proxy, QueueHandle};

use crate::display::{Display, DisplayState, SharedState};

use self::frame::FrameLoop;

/// Invoked once per compositor frame with the callback timestamp in
/// milliseconds. The first invocation after a (re)start carries time zero.
pub type DrawCallback = Box<dyn FnMut(u32) + Send>;

/// A `wl_surface` driven by the compositor's frame clock.
///
/// Cloning a window clones a handle to the same surface.
#[derive(Clone)]
pub struct Window {
    inner: Arc<WindowInner>,
}

pub(crate) struct WindowInner {
    wl_surface: wl_surface::WlSurface,
    qh: QueueHandle<DisplayState>,
    shared: Arc<SharedState>,
    frames: Mutex<FrameLoop<wl_callback::WlCallback>>,
    draw: Mutex<Option<DrawCallback>>,
}

impl Window {
    /// Creates a surface with the given draw callback. Frames do not start
    /// until [`Window::start_frames`] is called.
    pub fn new(display: &Display, draw: DrawCallback) -> Self {
        let qh = display.queue_handle().clone();
        let wl_surface = display.compositor().create_surface(&qh, ());
        log::debug!("created surface {}", wl_surface.id().protocol_id());
        let inner = Arc::new(WindowInner {
            wl_surface,
            qh,
            shared: display.shared().clone(),
            frames: Mutex::new(FrameLoop::new()),
            draw: Mutex::new(Some(draw)),
        });
        inner.shared.register_window(&inner);
        Self { inner }
    }

    /// The underlying surface.
    pub fn wl_surface(&self) -> &wl_surface::WlSurface {
        &self.inner.wl_surface
    }

    /// Protocol id of the surface, used as window key throughout the crate.
    pub fn key(&self) -> u32 {
        self.inner.key()
    }

    /// Replaces the draw callback. Takes effect on the next frame.
    pub fn set_draw(&self, draw: DrawCallback) {
        *self.inner.draw.lock().unwrap() = Some(draw);
    }

    /// (Re)starts the frame loop: any outstanding callback is forgotten and
    /// a synthetic frame with time zero runs immediately.
    pub fn start_frames(&self) {
        self.inner.frames.lock().unwrap().stop();
        self.inner.on_frame(0);
    }

    /// Stops the frame loop. A callback already in flight is ignored when it
    /// fires.
    pub fn stop_frames(&self) {
        self.inner.frames.lock().unwrap().stop();
    }

    /// Whether the frame loop is running.
    pub fn is_framing(&self) -> bool {
        self.inner.frames.lock().unwrap().is_framing()
    }

    /// Commits pending surface state.
    pub fn commit(&self) {
        self.inner.wl_surface.commit();
    }
}

impl WindowInner {
    pub(crate) fn key(&self) -> u32 {
        self.wl_surface.id().protocol_id()
    }

    /// Runs one frame: draw, request the next callback, commit.
    fn on_frame(&self, time: u32) {
        // The callback is taken out of the lock so a draw that reaches back
        // into the window cannot deadlock.
        let taken = self.draw.lock().unwrap().take();
        if let Some(mut draw) = taken {
            draw(time);
            let mut slot = self.draw.lock().unwrap();
            if slot.is_none() {
                *slot = Some(draw);
            }
        }

        let callback = self.wl_surface.frame(&self.qh, self.key());
        self.frames.lock().unwrap().arm(callback);
        self.wl_surface.commit();
    }

    /// Entry point from the dispatch machinery when a frame callback fires.
    pub(crate) fn handle_frame_done(&self, fired: &wl_callback::WlCallback, time: u32) {
        let current = self.frames.lock().unwrap().finish(fired);
        if current {
            self.on_frame(time);
        } else {
            log::trace!("ignoring stale frame callback for surface {}", self.key());
        }
    }
}

impl Drop for WindowInner {
    fn drop(&mut self) {
        self.shared.unregister_window(self.key());
        self.wl_surface.destroy();
    }
}
