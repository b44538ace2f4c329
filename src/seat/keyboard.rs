//! Keyboard input: xkb keymap handling, focus tracking and key repeat.

use std::time::{Duration, Instant};

use wayland_client::protocol::wl_keyboard;
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle, WEnum};
use xkbcommon::xkb;

use crate::display::DisplayState;

/// Offset between evdev scancodes and xkb keycodes.
const SCANCODE_OFFSET: u32 = 8;

/// A `wl_keyboard` with its compiled xkb state.
///
/// Key events are decoded to keysyms and logged; a repeat timer is armed for
/// keys the keymap marks as repeating. There is no per-key callback surface,
/// embedders observe input through the log until they wire their own seat.
pub struct Keyboard {
    wl_keyboard: wl_keyboard::WlKeyboard,
    context: xkb::Context,
    keymap: Option<xkb::Keymap>,
    state: Option<xkb::State>,
    focus: Option<u32>,
    repeat_rate: i32,
    repeat_delay: i32,
    repeat: Option<RepeatState>,
}

struct RepeatState {
    key: u32,
    next: Instant,
}

impl Keyboard {
    pub(crate) fn new(wl_keyboard: wl_keyboard::WlKeyboard) -> Self {
        Self {
            wl_keyboard,
            context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
            keymap: None,
            state: None,
            focus: None,
            repeat_rate: 0,
            repeat_delay: 0,
            repeat: None,
        }
    }

    /// The underlying protocol object.
    pub fn wl_keyboard(&self) -> &wl_keyboard::WlKeyboard {
        &self.wl_keyboard
    }

    /// Protocol id of the focused surface, if any.
    pub fn focus(&self) -> Option<u32> {
        self.focus
    }

    /// Repeat rate in characters per second, as announced by the compositor.
    pub fn repeat_rate(&self) -> i32 {
        self.repeat_rate
    }

    fn keysym_for(&self, raw: u32) -> Option<xkb::Keysym> {
        let state = self.state.as_ref()?;
        Some(state.key_get_one_sym(xkb::Keycode::new(raw + SCANCODE_OFFSET)))
    }

    fn key_repeats(&self, raw: u32) -> bool {
        self.keymap
            .as_ref()
            .map(|keymap| keymap.key_repeats(xkb::Keycode::new(raw + SCANCODE_OFFSET)))
            .unwrap_or(false)
    }

    fn arm_repeat(&mut self, raw: u32) {
        if self.repeat_rate > 0 && self.repeat_delay >= 0 && self.key_repeats(raw) {
            self.repeat = Some(RepeatState {
                key: raw,
                next: Instant::now() + Duration::from_millis(self.repeat_delay as u64),
            });
        }
    }

    fn cancel_repeat(&mut self, raw: u32) {
        if self.repeat.as_ref().map(|r| r.key) == Some(raw) {
            self.repeat = None;
        }
    }

    /// Fires the repeat timer if its deadline has passed and re-arms it at
    /// the announced rate.
    pub(crate) fn service_repeat(&mut self, now: Instant) {
        let Some(interval) = repeat_interval_ms(self.repeat_rate) else {
            self.repeat = None;
            return;
        };
        let Some(repeat) = self.repeat.as_mut() else {
            return;
        };
        if repeat.next > now {
            return;
        }
        let key = repeat.key;
        repeat.next = now + Duration::from_millis(interval);
        if let Some(sym) = self.keysym_for(key) {
            log::trace!("key repeat: {} ({key})", xkb::keysym_get_name(sym));
        }
    }

    /// Milliseconds until the repeat deadline, zero if it is overdue.
    pub(crate) fn next_repeat_in_ms(&self, now: Instant) -> Option<u64> {
        let repeat = self.repeat.as_ref()?;
        Some(repeat.next.saturating_duration_since(now).as_millis() as u64)
    }
}

impl Drop for Keyboard {
    fn drop(&mut self) {
        if self.wl_keyboard.version() >= 3 {
            self.wl_keyboard.release();
        }
    }
}

/// Milliseconds between repeats for the announced rate. A rate of zero
/// disables repeat entirely.
pub(crate) fn repeat_interval_ms(rate: i32) -> Option<u64> {
    if rate > 0 {
        Some(1000 / rate as u64)
    } else {
        None
    }
}

/// Shortens a poll timeout so a pending repeat deadline is not overslept.
/// A negative timeout means "wait forever" and is replaced by the deadline.
pub(crate) fn clamp_timeout(timeout_ms: i32, next_repeat_ms: Option<u64>) -> i32 {
    match next_repeat_ms {
        None => timeout_ms,
        Some(ms) => {
            let due = ms.min(i32::MAX as u64) as i32;
            if timeout_ms < 0 {
                due
            } else {
                timeout_ms.min(due)
            }
        }
    }
}

impl Dispatch<wl_keyboard::WlKeyboard, u32> for DisplayState {
    fn event(
        state: &mut Self,
        _keyboard: &wl_keyboard::WlKeyboard,
        event: wl_keyboard::Event,
        seat_key: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(seat) = state.seats.get_mut(seat_key) else {
            return;
        };
        let Some(kb) = seat.keyboard_mut() else {
            return;
        };
        match event {
            wl_keyboard::Event::Keymap { format, fd, size } => {
                if !matches!(format.into_result(), Ok(wl_keyboard::KeymapFormat::XkbV1)) {
                    log::warn!("ignoring keymap in unknown format {format:?}");
                    return;
                }
                // The fd is mapped read-only by xkb and closed on return.
                let keymap = unsafe {
                    xkb::Keymap::new_from_fd(
                        &kb.context,
                        fd,
                        size as usize,
                        xkb::FORMAT_TEXT_V1,
                        xkb::KEYMAP_COMPILE_NO_FLAGS,
                    )
                };
                match keymap {
                    Ok(Some(keymap)) => {
                        kb.state = Some(xkb::State::new(&keymap));
                        kb.keymap = Some(keymap);
                        log::debug!("compiled keymap for seat {seat_key}");
                    }
                    Ok(None) => {
                        log::warn!("keymap for seat {seat_key} failed to compile");
                        kb.keymap = None;
                        kb.state = None;
                    }
                    Err(err) => {
                        log::warn!("could not map keymap for seat {seat_key}: {err}");
                    }
                }
            }
            wl_keyboard::Event::Enter { surface, .. } => {
                let key = surface.id().protocol_id();
                log::debug!("keyboard focus entered surface {key}");
                kb.focus = Some(key);
            }
            wl_keyboard::Event::Leave { surface, .. } => {
                log::debug!(
                    "keyboard focus left surface {}",
                    surface.id().protocol_id()
                );
                kb.focus = None;
                kb.repeat = None;
            }
            wl_keyboard::Event::Key {
                key,
                state: key_state,
                time,
                ..
            } => match key_state {
                WEnum::Value(wl_keyboard::KeyState::Pressed) => {
                    if let Some(sym) = kb.keysym_for(key) {
                        log::trace!(
                            "key press: {} ({key}) at {time}",
                            xkb::keysym_get_name(sym)
                        );
                    }
                    kb.arm_repeat(key);
                }
                WEnum::Value(wl_keyboard::KeyState::Released) => {
                    if let Some(sym) = kb.keysym_for(key) {
                        log::trace!(
                            "key release: {} ({key}) at {time}",
                            xkb::keysym_get_name(sym)
                        );
                    }
                    kb.cancel_repeat(key);
                }
                _ => {}
            },
            wl_keyboard::Event::Modifiers {
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
                ..
            } => {
                if let Some(xkb_state) = kb.state.as_mut() {
                    xkb_state.update_mask(mods_depressed, mods_latched, mods_locked, 0, 0, group);
                }
            }
            wl_keyboard::Event::RepeatInfo { rate, delay } => {
                log::debug!("key repeat info: rate {rate}/s after {delay}ms");
                kb.repeat_rate = rate;
                kb.repeat_delay = delay;
                if rate == 0 {
                    kb.repeat = None;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{clamp_timeout, repeat_interval_ms};

    #[test]
    fn zero_rate_disables_repeat() {
        assert_eq!(repeat_interval_ms(0), None);
        assert_eq!(repeat_interval_ms(-1), None);
    }

    #[test]
    fn rate_maps_to_interval() {
        assert_eq!(repeat_interval_ms(25), Some(40));
        assert_eq!(repeat_interval_ms(1000), Some(1));
    }

    #[test]
    fn timeout_unchanged_without_pending_repeat() {
        assert_eq!(clamp_timeout(100, None), 100);
        assert_eq!(clamp_timeout(-1, None), -1);
    }

    #[test]
    fn timeout_shortened_to_repeat_deadline() {
        assert_eq!(clamp_timeout(100, Some(30)), 30);
        assert_eq!(clamp_timeout(10, Some(30)), 10);
    }

    #[test]
    fn infinite_timeout_becomes_deadline() {
        assert_eq!(clamp_timeout(-1, Some(250)), 250);
    }

    #[test]
    fn overdue_deadline_yields_zero_wait() {
        assert_eq!(clamp_timeout(100, Some(0)), 0);
    }
}
