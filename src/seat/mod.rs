//! Seat capability tracking and the input devices hanging off a seat.

pub(crate) mod cursor;
pub(crate) mod keyboard;
pub(crate) mod pointer;
pub(crate) mod touch;

pub use cursor::CursorKind;
pub use keyboard::Keyboard;
pub use pointer::Pointer;
pub use touch::Touch;

use wayland_client::protocol::wl_seat;
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle};

use crate::display::DisplayState;

/// A `wl_seat` and the input devices it currently advertises.
///
/// Devices are created and destroyed lazily as the capability bitmask
/// changes; repeated announcements of the same capabilities are idempotent.
pub struct Seat {
    wl_seat: wl_seat::WlSeat,
    version: u32,
    name: String,
    keyboard: Option<Keyboard>,
    pointer: Option<Pointer>,
    touch: Option<Touch>,
}

impl Seat {
    pub(crate) fn new(wl_seat: wl_seat::WlSeat, version: u32) -> Self {
        Self {
            wl_seat,
            version,
            name: String::new(),
            keyboard: None,
            pointer: None,
            touch: None,
        }
    }

    /// The underlying protocol object.
    pub fn wl_seat(&self) -> &wl_seat::WlSeat {
        &self.wl_seat
    }

    /// Version advertised by the registry (not the bound version).
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The seat name, empty until the `name` event arrives.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The keyboard device, if the seat has one.
    pub fn keyboard(&self) -> Option<&Keyboard> {
        self.keyboard.as_ref()
    }

    pub(crate) fn keyboard_mut(&mut self) -> Option<&mut Keyboard> {
        self.keyboard.as_mut()
    }

    /// The pointer device, if the seat has one.
    pub fn pointer(&self) -> Option<&Pointer> {
        self.pointer.as_ref()
    }

    pub(crate) fn pointer_mut(&mut self) -> Option<&mut Pointer> {
        self.pointer.as_mut()
    }

    /// The touch device, if the seat has one.
    pub fn touch(&self) -> Option<&Touch> {
        self.touch.as_ref()
    }
}

impl Drop for Seat {
    fn drop(&mut self) {
        // Devices release themselves in their own Drop impls.
        if self.wl_seat.version() >= 5 {
            self.wl_seat.release();
        }
    }
}

/// What to do with one device slot after a capability announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeviceAction {
    Keep,
    Create,
    Destroy,
}

/// Reconciles an advertised capability against the device's presence.
pub(crate) fn reconcile(advertised: bool, present: bool) -> DeviceAction {
    match (advertised, present) {
        (true, false) => DeviceAction::Create,
        (false, true) => DeviceAction::Destroy,
        _ => DeviceAction::Keep,
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for DisplayState {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: wl_seat::Event,
        _data: &(),
        conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let key = seat.id().protocol_id();
        match event {
            wl_seat::Event::Capabilities { capabilities } => {
                let caps = match capabilities.into_result() {
                    Ok(caps) => caps,
                    Err(err) => {
                        log::warn!("seat {key} sent unknown capabilities: {err:?}");
                        return;
                    }
                };
                let enable_cursor = state.enable_cursor;
                let compositor = state.compositor.clone();
                let shm = state.shm.clone();
                let Some(entry) = state.seats.get_mut(&key) else {
                    return;
                };
                log::debug!("seat {key} capabilities: {caps:?}");

                match reconcile(
                    caps.contains(wl_seat::Capability::Keyboard),
                    entry.keyboard.is_some(),
                ) {
                    DeviceAction::Create => {
                        entry.keyboard = Some(Keyboard::new(seat.get_keyboard(qh, key)));
                    }
                    DeviceAction::Destroy => {
                        entry.keyboard = None;
                    }
                    DeviceAction::Keep => {}
                }

                match reconcile(
                    caps.contains(wl_seat::Capability::Pointer),
                    entry.pointer.is_some(),
                ) {
                    DeviceAction::Create => {
                        let wl_pointer = seat.get_pointer(qh, key);
                        entry.pointer = Some(Pointer::new(
                            wl_pointer,
                            enable_cursor,
                            conn,
                            qh,
                            compositor.as_ref(),
                            shm.as_ref(),
                        ));
                    }
                    DeviceAction::Destroy => {
                        entry.pointer = None;
                    }
                    DeviceAction::Keep => {}
                }

                match reconcile(
                    caps.contains(wl_seat::Capability::Touch),
                    entry.touch.is_some(),
                ) {
                    DeviceAction::Create => {
                        entry.touch = Some(Touch::new(seat.get_touch(qh, key)));
                    }
                    DeviceAction::Destroy => {
                        entry.touch = None;
                    }
                    DeviceAction::Keep => {}
                }
            }
            wl_seat::Event::Name { name } => {
                if let Some(entry) = state.seats.get_mut(&key) {
                    log::debug!("seat {key} is named {name:?}");
                    entry.name = name;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{reconcile, DeviceAction};

    #[test]
    fn missing_device_is_created_when_advertised() {
        assert_eq!(reconcile(true, false), DeviceAction::Create);
    }

    #[test]
    fn present_device_is_destroyed_when_withdrawn() {
        assert_eq!(reconcile(false, true), DeviceAction::Destroy);
    }

    #[test]
    fn repeated_announcements_are_idempotent() {
        assert_eq!(reconcile(true, true), DeviceAction::Keep);
        assert_eq!(reconcile(false, false), DeviceAction::Keep);
    }
}
