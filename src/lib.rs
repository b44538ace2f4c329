#![warn(missing_docs)]

//! Thin object-oriented wrapper over the Wayland client protocol and EGL.
//!
//! `waywin` lets an application connect to a Wayland compositor, create a
//! toplevel window with an OpenGL ES rendering surface attached, and receive
//! input (keyboard, pointer, touch) and output notifications. Every operation
//! is a direct forwarding call into `wayland-client` or EGL; the crate adds
//! ownership, lifecycle bracketing and an event-dispatch entry point, nothing
//! more.
//!
//! The usual entry point is [`WindowManager`](wm::WindowManager):
//!
//! ```no_run
//! use waywin::wm::{ShellType, WindowManager, WindowType};
//!
//! let mut wm = WindowManager::new(ShellType::Xdg, None, true, None).unwrap();
//! let _window = wm
//!     .create_window(640, 480, WindowType::Egl, Box::new(|time| {
//!         log::trace!("draw at {time}ms");
//!     }))
//!     .unwrap();
//! while wm.running() {
//!     wm.dispatch(16).unwrap();
//! }
//! ```

/// Crate-wide error type.
pub mod error;

/// Wayland display connection, registry and global discovery.
pub mod display;

/// Monitor geometry, mode and scale bookkeeping.
pub mod output;

/// Input seats and their keyboard/pointer/touch devices.
pub mod seat;

/// Surfaces, the frame-callback loop and EGL rendering surfaces.
pub mod window;

/// The window-manager facade and the XDG shell handshake.
pub mod wm;

pub use error::Error;
pub use display::{Display, DisplayState, RegistryObserver};
pub use output::{Output, OutputGeometry, OutputInfo, OutputMode};
pub use seat::{CursorKind, Keyboard, Pointer, Seat, Touch};
pub use window::{DrawCallback, Egl, Window, WindowEgl};
pub use wm::{resize_edge, SecondaryLoop, ShellType, Size, WindowManager, WindowType, XdgWm};
