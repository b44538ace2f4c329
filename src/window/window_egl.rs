//! An EGL rendering target bound to a window's surface.

use std::ffi::c_void;

use khronos_egl as egl;
use wayland_client::Proxy;
use wayland_egl::WlEglSurface;

use crate::display::Display;
use crate::error::Error;

use super::{Egl, Window};

type FnCreatePlatformWindowSurface = unsafe extern "system" fn(
    egl::EGLDisplay,
    egl::EGLConfig,
    *mut c_void,
    *const egl::Int,
) -> egl::EGLSurface;

/// A window with a native EGL window surface attached to it.
///
/// Owns its own [`Egl`] instance; the wrapped [`Window`] handle keeps the
/// underlying `wl_surface` alive for as long as the target exists.
pub struct WindowEgl {
    window: Window,
    egl: Egl,
    egl_surface: egl::Surface,
    // Dropped after the EGL surface is destroyed.
    wl_egl_surface: WlEglSurface,
}

impl WindowEgl {
    /// Creates the native window and the EGL surface on top of it.
    ///
    /// `eglCreatePlatformWindowSurfaceEXT` is preferred when the driver
    /// exports it; otherwise the core entry point is used.
    pub fn new(display: &Display, window: Window, width: i32, height: i32) -> Result<Self, Error> {
        let egl = Egl::new(display.connection())?;

        let wl_egl_surface = WlEglSurface::new(window.wl_surface().id(), width, height)?;
        let native = wl_egl_surface.ptr() as *mut c_void;

        let platform_create: Option<FnCreatePlatformWindowSurface> = unsafe {
            std::mem::transmute(egl.get_proc_address("eglCreatePlatformWindowSurfaceEXT"))
        };

        let egl_surface = match platform_create {
            Some(func) => {
                let raw = unsafe {
                    func(
                        egl.raw_display(),
                        egl.config().as_ptr(),
                        native,
                        std::ptr::null(),
                    )
                };
                if raw.is_null() {
                    return Err(Error::EglSurface);
                }
                unsafe { egl::Surface::from_ptr(raw) }
            }
            None => unsafe {
                egl.instance()
                    .create_window_surface(egl.display(), egl.config(), native, None)?
            },
        };

        log::debug!(
            "created EGL window surface {width}x{height} for surface {}",
            window.key()
        );

        Ok(Self {
            window,
            egl,
            egl_surface,
            wl_egl_surface,
        })
    }

    /// The window this target renders to.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// The EGL instance owned by this target.
    pub fn egl(&self) -> &Egl {
        &self.egl
    }

    /// The EGL surface handle.
    pub fn egl_surface(&self) -> egl::Surface {
        self.egl_surface
    }

    /// Makes the primary context current on this surface.
    pub fn make_current(&self) -> Result<(), Error> {
        self.egl.make_current(self.egl_surface)
    }

    /// Presents the back buffer, with optional damage quads.
    pub fn swap_buffers(&self, damage: &[egl::Int]) -> Result<(), Error> {
        self.egl.swap_buffers(self.egl_surface, damage)
    }

    /// Age of the back buffer in frames.
    pub fn buffer_age(&self) -> Result<i32, Error> {
        self.egl.buffer_age(self.egl_surface)
    }

    /// Resizes the native window backing the EGL surface.
    pub fn resize(&self, width: i32, height: i32) {
        self.wl_egl_surface.resize(width, height, 0, 0);
    }
}

impl Drop for WindowEgl {
    fn drop(&mut self) {
        // The EGL surface must go before the native window it wraps.
        self.egl.destroy_surface(self.egl_surface);
    }
}
