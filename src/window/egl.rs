//! EGL loading, config selection and context management.

use std::ffi::c_void;

use khronos_egl::{self as egl, DynamicInstance, EGL1_4};
use wayland_client::Connection;

use crate::error::Error;

/// Minimum color depth a config must offer to be selected.
const MIN_BUFFER_SIZE: egl::Int = 24;

/// `EGL_BUFFER_AGE_EXT` from `EGL_EXT_buffer_age`.
const BUFFER_AGE_EXT: egl::Int = 0x313D;

type FnSwapBuffersWithDamage = unsafe extern "system" fn(
    egl::EGLDisplay,
    egl::EGLSurface,
    *const egl::Int,
    egl::Int,
) -> egl::Int;

type FnSetDamageRegion = unsafe extern "system" fn(
    egl::EGLDisplay,
    egl::EGLSurface,
    *const egl::Int,
    egl::Int,
) -> egl::Int;

/// A loaded EGL with a chosen config and three shared GLES contexts.
///
/// The primary context drives rendering; the resource and texture contexts
/// share its objects so loader threads can upload without binding the
/// primary one.
pub struct Egl {
    instance: DynamicInstance<EGL1_4>,
    display: egl::Display,
    config: egl::Config,
    context: egl::Context,
    resource_context: egl::Context,
    texture_context: egl::Context,
    buffer_size: egl::Int,
    swap_buffers_with_damage: Option<FnSwapBuffersWithDamage>,
    set_damage_region: Option<FnSetDamageRegion>,
    has_buffer_age: bool,
}

impl Egl {
    /// Loads libEGL, initializes it on the Wayland display and creates the
    /// contexts.
    pub fn new(connection: &Connection) -> Result<Self, Error> {
        let instance = unsafe {
            DynamicInstance::<EGL1_4>::load_required()
                .map_err(|err| Error::EglLoad(err.to_string()))?
        };

        let wl_display = connection.backend().display_ptr();
        let display = unsafe { instance.get_display(wl_display.cast()) }
            .ok_or(Error::Egl(egl::Error::BadDisplay))?;

        let (major, minor) = instance.initialize(display)?;
        log::debug!("initialized EGL {major}.{minor}");

        instance.bind_api(egl::OPENGL_ES_API)?;

        let config_attribs = [
            egl::SURFACE_TYPE,
            egl::WINDOW_BIT,
            egl::RENDERABLE_TYPE,
            egl::OPENGL_ES2_BIT | egl::OPENGL_ES3_BIT,
            egl::RED_SIZE,
            8,
            egl::GREEN_SIZE,
            8,
            egl::BLUE_SIZE,
            8,
            egl::ALPHA_SIZE,
            8,
            egl::STENCIL_SIZE,
            8,
            egl::DEPTH_SIZE,
            16,
            egl::SAMPLES,
            4,
            egl::NONE,
        ];

        let count = instance.matching_config_count(display, &config_attribs)?;
        let mut configs = Vec::with_capacity(count);
        instance.choose_config(display, &config_attribs, &mut configs)?;

        let mut buffer_sizes = Vec::with_capacity(configs.len());
        for config in &configs {
            buffer_sizes.push(instance.get_config_attrib(display, *config, egl::BUFFER_SIZE)?);
        }

        let index = pick_config(&buffer_sizes, MIN_BUFFER_SIZE)
            .ok_or(Error::NoEglConfig(MIN_BUFFER_SIZE))?;
        let config = configs[index];
        let buffer_size = buffer_sizes[index];
        log::debug!(
            "chose EGL config {index} of {} with buffer size {buffer_size}",
            configs.len()
        );

        let context_attribs = [egl::CONTEXT_CLIENT_VERSION, 2, egl::NONE];
        let context = instance.create_context(display, config, None, &context_attribs)?;
        let resource_context =
            instance.create_context(display, config, Some(context), &context_attribs)?;
        let texture_context =
            instance.create_context(display, config, Some(context), &context_attribs)?;

        let extensions = instance
            .query_string(Some(display), egl::EXTENSIONS)?
            .to_string_lossy()
            .into_owned();
        log::trace!("EGL extensions: {extensions}");

        let swap_buffers_with_damage = if has_extension(&extensions, "EGL_EXT_swap_buffers_with_damage")
        {
            unsafe {
                std::mem::transmute::<_, Option<FnSwapBuffersWithDamage>>(
                    instance.get_proc_address("eglSwapBuffersWithDamageEXT"),
                )
            }
        } else if has_extension(&extensions, "EGL_KHR_swap_buffers_with_damage") {
            unsafe {
                std::mem::transmute::<_, Option<FnSwapBuffersWithDamage>>(
                    instance.get_proc_address("eglSwapBuffersWithDamageKHR"),
                )
            }
        } else {
            None
        };

        let set_damage_region = if has_extension(&extensions, "EGL_KHR_partial_update") {
            unsafe {
                std::mem::transmute::<_, Option<FnSetDamageRegion>>(
                    instance.get_proc_address("eglSetDamageRegionKHR"),
                )
            }
        } else {
            None
        };

        let has_buffer_age = has_extension(&extensions, "EGL_EXT_buffer_age");

        Ok(Self {
            instance,
            display,
            config,
            context,
            resource_context,
            texture_context,
            buffer_size,
            swap_buffers_with_damage,
            set_damage_region,
            has_buffer_age,
        })
    }

    pub(crate) fn instance(&self) -> &DynamicInstance<EGL1_4> {
        &self.instance
    }

    pub(crate) fn display(&self) -> egl::Display {
        self.display
    }

    pub(crate) fn config(&self) -> egl::Config {
        self.config
    }

    /// Color depth of the chosen config.
    pub fn buffer_size(&self) -> i32 {
        self.buffer_size
    }

    /// Whether `EGL_EXT_buffer_age` is available.
    pub fn has_buffer_age(&self) -> bool {
        self.has_buffer_age
    }

    /// Makes the primary context current on `surface`. Skipped when it
    /// already is.
    pub fn make_current(&self, surface: egl::Surface) -> Result<(), Error> {
        self.make_context_current(surface, self.context)
    }

    /// Unbinds whatever context is current on this thread. Skipped when
    /// nothing is bound.
    pub fn make_current_clear(&self) -> Result<(), Error> {
        if self.instance.get_current_context().is_none() {
            return Ok(());
        }
        self.instance.make_current(self.display, None, None, None)?;
        Ok(())
    }

    /// Makes the resource-loading context current.
    pub fn make_current_resource(&self, surface: egl::Surface) -> Result<(), Error> {
        self.make_context_current(surface, self.resource_context)
    }

    /// Makes the texture-upload context current.
    pub fn make_current_texture(&self, surface: egl::Surface) -> Result<(), Error> {
        self.make_context_current(surface, self.texture_context)
    }

    fn make_context_current(
        &self,
        surface: egl::Surface,
        context: egl::Context,
    ) -> Result<(), Error> {
        if !needs_switch(self.instance.get_current_context(), &context) {
            return Ok(());
        }
        self.instance
            .make_current(self.display, Some(surface), Some(surface), Some(context))?;
        Ok(())
    }

    /// Presents the back buffer. `damage` is x,y,width,height quads in
    /// surface coordinates; an empty slice (or a missing extension) falls
    /// back to a full swap.
    pub fn swap_buffers(&self, surface: egl::Surface, damage: &[egl::Int]) -> Result<(), Error> {
        debug_assert!(damage.len() % 4 == 0);
        match self.swap_buffers_with_damage {
            Some(func) if !damage.is_empty() => {
                let ok = unsafe {
                    func(
                        self.display.as_ptr(),
                        surface.as_ptr(),
                        damage.as_ptr(),
                        (damage.len() / 4) as egl::Int,
                    )
                };
                if ok == 0 {
                    return Err(Error::Egl(egl::Error::BadSurface));
                }
                Ok(())
            }
            _ => {
                self.instance.swap_buffers(self.display, surface)?;
                Ok(())
            }
        }
    }

    /// Restricts post-swap rendering to the given region, when
    /// `EGL_KHR_partial_update` is available.
    pub fn set_damage_region(
        &self,
        surface: egl::Surface,
        damage: &[egl::Int],
    ) -> Result<(), Error> {
        debug_assert!(damage.len() % 4 == 0);
        let Some(func) = self.set_damage_region else {
            return Err(Error::Unsupported("EGL_KHR_partial_update"));
        };
        let ok = unsafe {
            func(
                self.display.as_ptr(),
                surface.as_ptr(),
                damage.as_ptr(),
                (damage.len() / 4) as egl::Int,
            )
        };
        if ok == 0 {
            return Err(Error::Egl(egl::Error::BadSurface));
        }
        Ok(())
    }

    /// Age of the current back buffer in frames, zero when undefined or the
    /// extension is missing.
    pub fn buffer_age(&self, surface: egl::Surface) -> Result<i32, Error> {
        if !self.has_buffer_age {
            return Ok(0);
        }
        Ok(self.instance.query_surface(self.display, surface, BUFFER_AGE_EXT)?)
    }

    /// Looks up an EGL entry point by name.
    pub fn get_proc_address(&self, name: &str) -> Option<extern "system" fn()> {
        self.instance.get_proc_address(name)
    }

    pub(crate) fn destroy_surface(&self, surface: egl::Surface) {
        if let Err(err) = self.instance.destroy_surface(self.display, surface) {
            log::warn!("failed to destroy EGL surface: {err}");
        }
    }

    pub(crate) fn raw_display(&self) -> *mut c_void {
        self.display.as_ptr()
    }
}

impl Drop for Egl {
    fn drop(&mut self) {
        for context in [self.texture_context, self.resource_context, self.context] {
            if let Err(err) = self.instance.destroy_context(self.display, context) {
                log::warn!("failed to destroy EGL context: {err}");
            }
        }
        if let Err(err) = self.instance.terminate(self.display) {
            log::warn!("failed to terminate EGL display: {err}");
        }
        let _ = self.instance.release_thread();
    }
}

/// Index of the first config whose buffer size meets the floor.
pub(crate) fn pick_config(buffer_sizes: &[i32], floor: i32) -> Option<usize> {
    buffer_sizes.iter().position(|&size| size >= floor)
}

/// Whether `name` appears as a whole word in the extension string.
pub(crate) fn has_extension(extensions: &str, name: &str) -> bool {
    extensions.split_whitespace().any(|ext| ext == name)
}

/// Whether a `make_current` is required to reach `target`.
pub(crate) fn needs_switch<T: PartialEq>(current: Option<T>, target: &T) -> bool {
    current.as_ref() != Some(target)
}

#[cfg(test)]
mod tests {
    use super::{has_extension, needs_switch, pick_config};

    #[test]
    fn first_deep_enough_config_wins() {
        assert_eq!(pick_config(&[16, 24, 32], 24), Some(1));
        assert_eq!(pick_config(&[32, 24], 24), Some(0));
    }

    #[test]
    fn no_config_meets_the_floor() {
        assert_eq!(pick_config(&[16, 16], 24), None);
        assert_eq!(pick_config(&[], 24), None);
    }

    #[test]
    fn extension_match_is_whole_word() {
        let list = "EGL_EXT_buffer_age EGL_KHR_partial_update";
        assert!(has_extension(list, "EGL_EXT_buffer_age"));
        assert!(has_extension(list, "EGL_KHR_partial_update"));
        assert!(!has_extension(list, "EGL_EXT_buffer"));
        assert!(!has_extension("", "EGL_EXT_buffer_age"));
    }

    #[test]
    fn current_context_is_not_rebound() {
        assert!(!needs_switch(Some(5u32), &5));
        assert!(needs_switch(Some(4u32), &5));
        assert!(needs_switch(None::<u32>, &5));
    }
}
