//! Error type shared by every component of the crate.
//!
//! Setup failures (connecting, EGL initialization) are not retried anywhere;
//! the caller is expected to let them propagate. Per-call failures such as a
//! missing cursor image are reported as `bool` results by the operations
//! themselves and never surface here.

use wayland_client::backend::WaylandError;
use wayland_client::globals::{BindError, GlobalError};
use wayland_client::{ConnectError, DispatchError};

/// Errors produced by display setup, EGL setup and the dispatch path.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connecting to the Wayland display failed. Unrecoverable: no window
    /// can exist without a display connection.
    #[error("failed to connect to wayland display: {0}")]
    Connect(#[from] ConnectError),

    /// Initializing the registry global list failed.
    #[error("failed to initialize wayland registry: {0}")]
    Registry(#[from] GlobalError),

    /// Binding a required global failed.
    #[error("failed to bind wayland global: {0}")]
    Bind(#[from] BindError),

    /// A required global was never advertised by the compositor.
    #[error("required wayland global missing: {0}")]
    MissingGlobal(&'static str),

    /// Dispatching queued events failed.
    #[error("wayland event dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// A backend I/O or protocol error on the connection.
    #[error("wayland connection error: {0}")]
    Backend(#[from] WaylandError),

    /// libEGL could not be loaded at runtime.
    #[error("failed to load libEGL: {0}")]
    EglLoad(String),

    /// An EGL call failed.
    #[error("egl error: {0}")]
    Egl(#[from] khronos_egl::Error),

    /// No enumerated EGL config satisfied the minimum buffer size.
    #[error("no EGL config with buffer size >= {0}")]
    NoEglConfig(i32),

    /// EGL window surface creation returned no surface.
    #[error("failed to create an EGL window surface")]
    EglSurface,

    /// Creating the native EGL window wrapper failed.
    #[error("native egl window error: {0}")]
    NativeWindow(#[from] wayland_egl::Error),

    /// A requested capability has no implementation or is not available.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// A raw I/O error from the poll path.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
