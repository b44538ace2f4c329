//! XDG shell handshake and toplevel state tracking.

use std::sync::{Arc, Mutex};

use wayland_client::{Connection, Dispatch, QueueHandle};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base};

use crate::display::{Display, DisplayState};
use crate::error::Error;
use crate::window::Window;

const XDG_WM_BASE_VERSION: u32 = 3;

/// A width and height in surface-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    /// Width in surface units.
    pub width: i32,
    /// Height in surface units.
    pub height: i32,
}

impl Size {
    /// Convenience constructor.
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug)]
pub(crate) struct XdgState {
    pub(crate) wait_for_configure: bool,
    pub(crate) running: bool,
    pub(crate) fullscreen: bool,
    pub(crate) maximized: bool,
    pub(crate) resizing: bool,
    pub(crate) activated: bool,
    pub(crate) window_size: Size,
    pub(crate) geometry: Size,
}

/// Applies a toplevel configure to the tracked state.
///
/// A zero width or height is the compositor leaving the size to the client
/// and updates nothing. Otherwise the delivered state array is
/// authoritative: all flags are recomputed from scratch, and the remembered
/// floating size is only touched while neither fullscreen nor maximized.
pub(crate) fn apply_configure(
    state: &mut XdgState,
    width: i32,
    height: i32,
    states: &[xdg_toplevel::State],
) {
    if width == 0 || height == 0 {
        return;
    }

    state.fullscreen = false;
    state.maximized = false;
    state.resizing = false;
    state.activated = false;
    for entry in states {
        match entry {
            xdg_toplevel::State::Fullscreen => state.fullscreen = true,
            xdg_toplevel::State::Maximized => state.maximized = true,
            xdg_toplevel::State::Resizing => state.resizing = true,
            xdg_toplevel::State::Activated => state.activated = true,
            _ => {}
        }
    }

    if !state.fullscreen && !state.maximized {
        state.window_size = Size::new(width, height);
    }
    state.geometry = Size::new(width, height);
}

/// Decodes the packed state array of a toplevel configure event.
pub(crate) fn parse_states(raw: &[u8]) -> Vec<xdg_toplevel::State> {
    raw.chunks_exact(4)
        .filter_map(|chunk| {
            let value = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            xdg_toplevel::State::try_from(value).ok()
        })
        .collect()
}

/// Classifies a surface-local position into the resize edge it falls on,
/// given the width of the grab band along the borders. Interior positions
/// yield `None`.
pub fn resize_edge(
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    padding: f64,
) -> Option<xdg_toplevel::ResizeEdge> {
    let left = x < padding;
    let right = x >= width - padding;
    let top = y < padding;
    let bottom = y >= height - padding;

    match (left, right, top, bottom) {
        (true, _, true, _) => Some(xdg_toplevel::ResizeEdge::TopLeft),
        (_, true, true, _) => Some(xdg_toplevel::ResizeEdge::TopRight),
        (true, _, _, true) => Some(xdg_toplevel::ResizeEdge::BottomLeft),
        (_, true, _, true) => Some(xdg_toplevel::ResizeEdge::BottomRight),
        (true, ..) => Some(xdg_toplevel::ResizeEdge::Left),
        (_, true, ..) => Some(xdg_toplevel::ResizeEdge::Right),
        (_, _, true, _) => Some(xdg_toplevel::ResizeEdge::Top),
        (_, _, _, true) => Some(xdg_toplevel::ResizeEdge::Bottom),
        _ => None,
    }
}

pub(crate) struct XdgWmInner {
    wm_base: xdg_wm_base::XdgWmBase,
    xdg_surface: xdg_surface::XdgSurface,
    toplevel: xdg_toplevel::XdgToplevel,
    state: Mutex<XdgState>,
}

impl XdgWmInner {
    pub(crate) fn handle_surface_configure(&self, serial: u32) {
        self.xdg_surface.ack_configure(serial);
        let mut state = self.state.lock().unwrap();
        if state.wait_for_configure {
            log::debug!("initial configure acked (serial {serial})");
            state.wait_for_configure = false;
        }
    }

    pub(crate) fn handle_toplevel_configure(&self, width: i32, height: i32, raw_states: &[u8]) {
        let states = parse_states(raw_states);
        log::trace!("toplevel configure {width}x{height} {states:?}");
        apply_configure(&mut self.state.lock().unwrap(), width, height, &states);
    }

    pub(crate) fn handle_close(&self) {
        log::debug!("toplevel close requested");
        self.state.lock().unwrap().running = false;
    }

    pub(crate) fn pong(&self, serial: u32) {
        self.wm_base.pong(serial);
    }
}

impl Drop for XdgWmInner {
    fn drop(&mut self) {
        self.toplevel.destroy();
        self.xdg_surface.destroy();
        self.wm_base.destroy();
    }
}

/// The XDG shell role of a window: an `xdg_surface` with a toplevel on top,
/// plus the state the compositor has configured.
#[derive(Clone)]
pub struct XdgWm {
    inner: Arc<XdgWmInner>,
}

impl XdgWm {
    /// Binds `xdg_wm_base`, assigns the toplevel role to the window's
    /// surface and commits the initial (buffer-less) state.
    ///
    /// The first configure has not arrived when this returns; callers must
    /// dispatch until [`XdgWm::wait_for_configure`] clears before attaching
    /// a buffer.
    pub fn new(
        display: &Display,
        window: &Window,
        title: &str,
        app_id: &str,
        size: Size,
    ) -> Result<Self, Error> {
        let qh = display.queue_handle();
        let wm_base = display
            .globals()
            .bind::<xdg_wm_base::XdgWmBase, _, _>(qh, 1..=XDG_WM_BASE_VERSION, ())?;

        let xdg_surface = wm_base.get_xdg_surface(window.wl_surface(), qh, ());
        let toplevel = xdg_surface.get_toplevel(qh, ());
        toplevel.set_title(title.to_owned());
        toplevel.set_app_id(app_id.to_owned());

        let inner = Arc::new(XdgWmInner {
            wm_base,
            xdg_surface,
            toplevel,
            state: Mutex::new(XdgState {
                wait_for_configure: true,
                running: true,
                fullscreen: false,
                maximized: false,
                resizing: false,
                activated: false,
                window_size: size,
                geometry: Size::default(),
            }),
        });
        display.shared().set_xdg(&inner);

        // Committing without a buffer asks the compositor for the first
        // configure.
        window.commit();

        Ok(Self { inner })
    }

    /// Whether the first configure is still outstanding.
    pub fn wait_for_configure(&self) -> bool {
        self.inner.state.lock().unwrap().wait_for_configure
    }

    /// Whether the compositor has asked the toplevel to close.
    pub fn running(&self) -> bool {
        self.inner.state.lock().unwrap().running
    }

    /// Whether the toplevel is fullscreen.
    pub fn fullscreen(&self) -> bool {
        self.inner.state.lock().unwrap().fullscreen
    }

    /// Whether the toplevel is maximized.
    pub fn maximized(&self) -> bool {
        self.inner.state.lock().unwrap().maximized
    }

    /// Whether an interactive resize is in progress.
    pub fn resizing(&self) -> bool {
        self.inner.state.lock().unwrap().resizing
    }

    /// Whether the toplevel has focus.
    pub fn activated(&self) -> bool {
        self.inner.state.lock().unwrap().activated
    }

    /// The remembered floating size.
    pub fn window_size(&self) -> Size {
        self.inner.state.lock().unwrap().window_size
    }

    /// The size delivered by the last non-empty configure.
    pub fn geometry(&self) -> Size {
        self.inner.state.lock().unwrap().geometry
    }

    /// Updates the toplevel title.
    pub fn set_title(&self, title: &str) {
        self.inner.toplevel.set_title(title.to_owned());
    }

    /// Updates the application id.
    pub fn set_app_id(&self, app_id: &str) {
        self.inner.toplevel.set_app_id(app_id.to_owned());
    }

    /// Requests fullscreen on the compositor-chosen output.
    pub fn set_fullscreen(&self) {
        self.inner.toplevel.set_fullscreen(None);
    }

    /// Leaves fullscreen.
    pub fn unset_fullscreen(&self) {
        self.inner.toplevel.unset_fullscreen();
    }

    /// Requests maximization.
    pub fn set_maximized(&self) {
        self.inner.toplevel.set_maximized();
    }

    /// Leaves the maximized state.
    pub fn unset_maximized(&self) {
        self.inner.toplevel.unset_maximized();
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for DisplayState {
    fn event(
        state: &mut Self,
        wm_base: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            match state.shared.xdg() {
                Some(inner) => inner.pong(serial),
                // Shell already torn down; answer on the proxy we were
                // given so the compositor does not kill the connection.
                None => wm_base.pong(serial),
            }
        }
    }
}

impl Dispatch<xdg_surface::XdgSurface, ()> for DisplayState {
    fn event(
        state: &mut Self,
        _surface: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            if let Some(inner) = state.shared.xdg() {
                inner.handle_surface_configure(serial);
            }
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, ()> for DisplayState {
    fn event(
        state: &mut Self,
        _toplevel: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(inner) = state.shared.xdg() else {
            return;
        };
        match event {
            xdg_toplevel::Event::Configure {
                width,
                height,
                states,
            } => {
                inner.handle_toplevel_configure(width, height, &states);
            }
            xdg_toplevel::Event::Close => {
                inner.handle_close();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(width: i32, height: i32) -> XdgState {
        XdgState {
            wait_for_configure: true,
            running: true,
            fullscreen: false,
            maximized: false,
            resizing: false,
            activated: false,
            window_size: Size::new(width, height),
            geometry: Size::default(),
        }
    }

    #[test]
    fn zero_size_configure_changes_nothing() {
        let mut state = fresh(640, 480);
        state.activated = true;
        apply_configure(&mut state, 0, 0, &[xdg_toplevel::State::Fullscreen]);
        assert!(!state.fullscreen);
        assert!(state.activated);
        assert_eq!(state.window_size, Size::new(640, 480));
        assert_eq!(state.geometry, Size::default());
    }

    #[test]
    fn state_array_is_authoritative() {
        let mut state = fresh(640, 480);
        apply_configure(
            &mut state,
            1920,
            1080,
            &[
                xdg_toplevel::State::Fullscreen,
                xdg_toplevel::State::Activated,
            ],
        );
        assert!(state.fullscreen && state.activated);

        // A later configure without those states clears them again.
        apply_configure(&mut state, 800, 600, &[]);
        assert!(!state.fullscreen && !state.activated);
    }

    #[test]
    fn floating_size_survives_fullscreen() {
        let mut state = fresh(640, 480);
        apply_configure(&mut state, 1920, 1080, &[xdg_toplevel::State::Fullscreen]);
        assert_eq!(state.window_size, Size::new(640, 480));
        assert_eq!(state.geometry, Size::new(1920, 1080));

        apply_configure(&mut state, 800, 600, &[]);
        assert_eq!(state.window_size, Size::new(800, 600));
        assert_eq!(state.geometry, Size::new(800, 600));
    }

    #[test]
    fn floating_size_survives_maximize() {
        let mut state = fresh(640, 480);
        apply_configure(&mut state, 2560, 1440, &[xdg_toplevel::State::Maximized]);
        assert!(state.maximized);
        assert_eq!(state.window_size, Size::new(640, 480));
    }

    #[test]
    fn state_bytes_decode_in_native_order() {
        let raw: Vec<u8> = [2u32, 4u32]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        let states = parse_states(&raw);
        assert_eq!(
            states,
            vec![
                xdg_toplevel::State::Fullscreen,
                xdg_toplevel::State::Activated
            ]
        );
    }

    #[test]
    fn unknown_state_values_are_dropped() {
        let raw = 0xffff_u32.to_ne_bytes();
        assert!(parse_states(&raw).is_empty());
    }

    #[test]
    fn interior_position_is_not_an_edge() {
        assert_eq!(resize_edge(100.0, 100.0, 640.0, 480.0, 5.0), None);
    }

    #[test]
    fn borders_and_corners_classify() {
        use xdg_toplevel::ResizeEdge;
        assert_eq!(resize_edge(2.0, 200.0, 640.0, 480.0, 5.0), Some(ResizeEdge::Left));
        assert_eq!(resize_edge(638.0, 200.0, 640.0, 480.0, 5.0), Some(ResizeEdge::Right));
        assert_eq!(resize_edge(300.0, 2.0, 640.0, 480.0, 5.0), Some(ResizeEdge::Top));
        assert_eq!(resize_edge(300.0, 478.0, 640.0, 480.0, 5.0), Some(ResizeEdge::Bottom));
        assert_eq!(resize_edge(2.0, 2.0, 640.0, 480.0, 5.0), Some(ResizeEdge::TopLeft));
        assert_eq!(resize_edge(638.0, 478.0, 640.0, 480.0, 5.0), Some(ResizeEdge::BottomRight));
    }
}
