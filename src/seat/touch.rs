//! Touch input. Events are tracked per touch point and logged.

use wayland_client::protocol::wl_touch;
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle};

use crate::display::DisplayState;

/// A `wl_touch` device.
pub struct Touch {
    wl_touch: wl_touch::WlTouch,
}

impl Touch {
    pub(crate) fn new(wl_touch: wl_touch::WlTouch) -> Self {
        Self { wl_touch }
    }

    /// The underlying protocol object.
    pub fn wl_touch(&self) -> &wl_touch::WlTouch {
        &self.wl_touch
    }
}

impl Drop for Touch {
    fn drop(&mut self) {
        if self.wl_touch.version() >= 3 {
            self.wl_touch.release();
        }
    }
}

impl Dispatch<wl_touch::WlTouch, u32> for DisplayState {
    fn event(
        _state: &mut Self,
        _touch: &wl_touch::WlTouch,
        event: wl_touch::Event,
        seat_key: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_touch::Event::Down {
                id,
                surface,
                x,
                y,
                ..
            } => {
                log::trace!(
                    "touch {id} down on surface {} at {x},{y} (seat {seat_key})",
                    surface.id().protocol_id()
                );
            }
            wl_touch::Event::Up { id, .. } => {
                log::trace!("touch {id} up (seat {seat_key})");
            }
            wl_touch::Event::Motion { id, x, y, .. } => {
                log::trace!("touch {id} moved to {x},{y}");
            }
            wl_touch::Event::Frame => {}
            wl_touch::Event::Cancel => {
                log::trace!("touch sequence cancelled (seat {seat_key})");
            }
            _ => {}
        }
    }
}
