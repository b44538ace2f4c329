//! Cursor theme loading and pointer image selection.

use wayland_client::protocol::{wl_compositor, wl_pointer, wl_shm, wl_surface};
use wayland_client::{Connection, QueueHandle};
use wayland_cursor::CursorTheme;

use crate::display::DisplayState;

const CURSOR_SIZE: u32 = 24;

/// The pointer images this crate knows how to request from a cursor theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    /// The default arrow.
    Basic,
    /// A hand, for clickable elements.
    Click,
    /// A text caret.
    Text,
    /// An action that is not allowed.
    Forbidden,
    /// No visible cursor at all.
    Hidden,
}

/// XCursor name for a cursor kind, `None` for the hidden cursor.
pub(crate) fn theme_name_for_kind(kind: CursorKind) -> Option<&'static str> {
    match kind {
        CursorKind::Basic => Some("left_ptr"),
        CursorKind::Click => Some("hand"),
        CursorKind::Text => Some("left_ptr"),
        CursorKind::Forbidden => Some("pirate"),
        CursorKind::Hidden => None,
    }
}

/// What a cursor change request resolves to before touching the theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CursorAction {
    /// Commit an empty surface (invisible cursor) and report success.
    Clear,
    /// Look the named image up in the theme.
    Lookup(&'static str),
    /// No theme to look anything up in; report failure.
    Unavailable,
}

/// Resolves a cursor request against the enabled flag and theme presence.
/// Disabling cursor rendering wins over everything, including a missing
/// theme.
pub(crate) fn cursor_action(enabled: bool, theme_loaded: bool, kind: CursorKind) -> CursorAction {
    if !enabled {
        return CursorAction::Clear;
    }
    match theme_name_for_kind(kind) {
        None => CursorAction::Clear,
        Some(_) if !theme_loaded => CursorAction::Unavailable,
        Some(name) => CursorAction::Lookup(name),
    }
}

/// A cursor surface with an optionally loaded theme.
pub(crate) struct Cursor {
    theme: Option<CursorTheme>,
    surface: wl_surface::WlSurface,
    enabled: bool,
}

impl Cursor {
    /// Creates the cursor surface and, when `enabled`, loads the theme named
    /// by `name` (the default theme for `None`). A theme that fails to load
    /// is logged; image requests then fail until re-enabled with a working
    /// theme.
    pub(crate) fn new(
        conn: &Connection,
        qh: &QueueHandle<DisplayState>,
        compositor: &wl_compositor::WlCompositor,
        shm: &wl_shm::WlShm,
        name: Option<&str>,
        enabled: bool,
    ) -> Self {
        let theme = if enabled {
            let loaded = match name {
                Some(name) => CursorTheme::load_from_name(conn, shm.clone(), name, CURSOR_SIZE),
                None => CursorTheme::load(conn, shm.clone(), CURSOR_SIZE),
            };
            match loaded {
                Ok(theme) => Some(theme),
                Err(err) => {
                    log::warn!("could not load cursor theme: {err}");
                    None
                }
            }
        } else {
            None
        };
        let surface = compositor.create_surface(qh, ());
        Self {
            theme,
            surface,
            enabled,
        }
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Applies the image for `kind` to the pointer.
    ///
    /// With cursor rendering disabled (or for [`CursorKind::Hidden`]) this
    /// commits an empty surface and succeeds. Returns `false` when the theme
    /// is missing or has no usable image for the kind; the previous cursor
    /// then stays in effect.
    pub(crate) fn set(
        &mut self,
        pointer: &wl_pointer::WlPointer,
        serial: u32,
        kind: CursorKind,
    ) -> bool {
        let name = match cursor_action(self.enabled, self.theme.is_some(), kind) {
            CursorAction::Clear => {
                self.surface.attach(None, 0, 0);
                self.surface.commit();
                pointer.set_cursor(serial, Some(&self.surface), 0, 0);
                return true;
            }
            CursorAction::Unavailable => return false,
            CursorAction::Lookup(name) => name,
        };

        // cursor_action only yields Lookup when the theme is present.
        let Some(theme) = self.theme.as_mut() else {
            return false;
        };
        let Some(cursor) = theme.get_cursor(name) else {
            log::warn!("cursor theme has no image named {name:?}");
            return false;
        };
        if cursor.image_count() == 0 {
            log::warn!("cursor {name:?} has no frames");
            return false;
        }
        let image = &cursor[0];

        let (hx, hy) = image.hotspot();
        let (width, height) = image.dimensions();
        self.surface.attach(Some(image), 0, 0);
        self.surface.damage(0, 0, width as i32, height as i32);
        self.surface.commit();
        pointer.set_cursor(serial, Some(&self.surface), hx as i32, hy as i32);
        true
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.surface.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::{cursor_action, theme_name_for_kind, CursorAction, CursorKind};

    #[test]
    fn kinds_map_to_theme_names() {
        assert_eq!(theme_name_for_kind(CursorKind::Basic), Some("left_ptr"));
        assert_eq!(theme_name_for_kind(CursorKind::Click), Some("hand"));
        assert_eq!(theme_name_for_kind(CursorKind::Text), Some("left_ptr"));
        assert_eq!(theme_name_for_kind(CursorKind::Forbidden), Some("pirate"));
    }

    #[test]
    fn hidden_kind_has_no_theme_name() {
        assert_eq!(theme_name_for_kind(CursorKind::Hidden), None);
    }

    #[test]
    fn disabled_cursor_clears_and_succeeds() {
        assert_eq!(
            cursor_action(false, true, CursorKind::Basic),
            CursorAction::Clear
        );
        assert_eq!(
            cursor_action(false, false, CursorKind::Forbidden),
            CursorAction::Clear
        );
    }

    #[test]
    fn enabled_cursor_looks_up_the_theme_image() {
        assert_eq!(
            cursor_action(true, true, CursorKind::Basic),
            CursorAction::Lookup("left_ptr")
        );
        assert_eq!(
            cursor_action(true, true, CursorKind::Click),
            CursorAction::Lookup("hand")
        );
    }

    #[test]
    fn hidden_kind_clears_even_with_a_theme() {
        assert_eq!(
            cursor_action(true, true, CursorKind::Hidden),
            CursorAction::Clear
        );
    }

    #[test]
    fn missing_theme_fails_visible_kinds() {
        assert_eq!(
            cursor_action(true, false, CursorKind::Basic),
            CursorAction::Unavailable
        );
    }
}
