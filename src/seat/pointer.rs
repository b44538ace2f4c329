//! Pointer input and cursor management.

use wayland_client::protocol::{wl_compositor, wl_pointer, wl_shm};
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle, WEnum};

use crate::display::DisplayState;

use super::cursor::{Cursor, CursorKind};

/// A `wl_pointer` with an optional themed cursor.
///
/// Motion, button and axis events are logged at trace level. The last enter
/// serial is kept so the cursor image can be changed at any time.
pub struct Pointer {
    wl_pointer: wl_pointer::WlPointer,
    cursor: Option<Cursor>,
    enter_serial: Option<u32>,
    focus: Option<u32>,
    position: (f64, f64),
}

impl Pointer {
    pub(crate) fn new(
        wl_pointer: wl_pointer::WlPointer,
        enable_cursor: bool,
        conn: &Connection,
        qh: &QueueHandle<DisplayState>,
        compositor: Option<&wl_compositor::WlCompositor>,
        shm: Option<&wl_shm::WlShm>,
    ) -> Self {
        let cursor = match (compositor, shm) {
            (Some(compositor), Some(shm)) => {
                Some(Cursor::new(conn, qh, compositor, shm, None, enable_cursor))
            }
            _ => {
                log::warn!("pointer created before wl_compositor/wl_shm were bound");
                None
            }
        };
        Self {
            wl_pointer,
            cursor,
            enter_serial: None,
            focus: None,
            position: (0.0, 0.0),
        }
    }

    /// The underlying protocol object.
    pub fn wl_pointer(&self) -> &wl_pointer::WlPointer {
        &self.wl_pointer
    }

    /// Protocol id of the surface under the pointer, if any.
    pub fn focus(&self) -> Option<u32> {
        self.focus
    }

    /// Last reported surface-local position.
    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    /// Toggles cursor rendering. While disabled, [`Pointer::set_cursor`]
    /// commits an invisible cursor instead of a theme image.
    pub fn set_cursor_enabled(&mut self, enabled: bool) {
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.set_enabled(enabled);
        }
    }

    /// Switches the cursor image.
    ///
    /// While cursor rendering is disabled this commits an invisible cursor
    /// and still succeeds. Returns `false` when the pointer has not yet
    /// entered a surface or the theme has no image for the kind.
    pub fn set_cursor(&mut self, kind: CursorKind) -> bool {
        let Some(serial) = self.enter_serial else {
            return false;
        };
        let Some(cursor) = self.cursor.as_mut() else {
            return false;
        };
        cursor.set(&self.wl_pointer, serial, kind)
    }
}

impl Drop for Pointer {
    fn drop(&mut self) {
        if self.wl_pointer.version() >= 3 {
            self.wl_pointer.release();
        }
    }
}

impl Dispatch<wl_pointer::WlPointer, u32> for DisplayState {
    fn event(
        state: &mut Self,
        _pointer: &wl_pointer::WlPointer,
        event: wl_pointer::Event,
        seat_key: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(seat) = state.seats.get_mut(seat_key) else {
            return;
        };
        let Some(ptr) = seat.pointer_mut() else {
            return;
        };
        match event {
            wl_pointer::Event::Enter {
                serial,
                surface,
                surface_x,
                surface_y,
            } => {
                let key = surface.id().protocol_id();
                log::trace!("pointer entered surface {key} at {surface_x},{surface_y}");
                ptr.enter_serial = Some(serial);
                ptr.focus = Some(key);
                ptr.position = (surface_x, surface_y);
                ptr.set_cursor(CursorKind::Basic);
            }
            wl_pointer::Event::Leave { surface, .. } => {
                log::trace!("pointer left surface {}", surface.id().protocol_id());
                ptr.focus = None;
            }
            wl_pointer::Event::Motion {
                surface_x,
                surface_y,
                ..
            } => {
                ptr.position = (surface_x, surface_y);
                log::trace!("pointer motion to {surface_x},{surface_y}");
            }
            wl_pointer::Event::Button {
                button,
                state: button_state,
                serial,
                ..
            } => {
                if let WEnum::Value(value) = button_state {
                    log::trace!("pointer button {button} {value:?} (serial {serial})");
                }
            }
            wl_pointer::Event::Axis { axis, value, .. } => {
                if let WEnum::Value(axis) = axis {
                    log::trace!("pointer axis {axis:?} by {value}");
                }
            }
            wl_pointer::Event::Frame => {}
            _ => {}
        }
    }
}
