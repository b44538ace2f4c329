//! Monitor state, populated by `wl_output` notifications.

use wayland_client::protocol::wl_output;
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle, WEnum};

use crate::display::DisplayState;

/// Physical placement and identity of an output, from the `geometry` event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputGeometry {
    /// X position within the global compositor space.
    pub x: i32,
    /// Y position within the global compositor space.
    pub y: i32,
    /// Physical width in millimeters.
    pub physical_width: i32,
    /// Physical height in millimeters.
    pub physical_height: i32,
    /// Subpixel orientation.
    pub subpixel: wl_output::Subpixel,
    /// Monitor manufacturer.
    pub make: String,
    /// Monitor model.
    pub model: String,
    /// Transform applied to buffer contents.
    pub transform: wl_output::Transform,
}

impl Default for OutputGeometry {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            physical_width: 0,
            physical_height: 0,
            subpixel: wl_output::Subpixel::Unknown,
            make: String::new(),
            model: String::new(),
            transform: wl_output::Transform::Normal,
        }
    }
}

/// A display mode, from the `mode` event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutputMode {
    /// Raw mode flag bits (current, preferred).
    pub flags: u32,
    /// Width in hardware units.
    pub width: i32,
    /// Height in hardware units.
    pub height: i32,
    /// Vertical refresh rate in mHz.
    pub refresh: i32,
}

/// Everything known about one output. Mutated only by server notifications.
#[derive(Clone, Debug, Default)]
pub struct OutputInfo {
    /// Geometry as of the last `geometry` event.
    pub geometry: OutputGeometry,
    /// Current mode as of the last `mode` event.
    pub mode: OutputMode,
    /// Whether the initial burst of properties has been delivered.
    pub done: bool,
    /// Buffer scale factor.
    pub scale: i32,
    /// Output name (delivered on v4+ compositors only).
    pub name: String,
    /// Output description (delivered on v4+ compositors only).
    pub description: String,
}

/// One monitor advertised by the compositor, owned by its `Display`.
#[derive(Debug)]
pub struct Output {
    wl_output: wl_output::WlOutput,
    version: u32,
    info: OutputInfo,
}

impl Output {
    pub(crate) fn new(wl_output: wl_output::WlOutput, version: u32) -> Self {
        Self {
            wl_output,
            version,
            info: OutputInfo::default(),
        }
    }

    /// The underlying protocol object.
    pub fn wl_output(&self) -> &wl_output::WlOutput {
        &self.wl_output
    }

    /// The version the output was bound at.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Current snapshot of the output's properties.
    pub fn info(&self) -> &OutputInfo {
        &self.info
    }
}

impl Dispatch<wl_output::WlOutput, ()> for DisplayState {
    fn event(
        state: &mut Self,
        output: &wl_output::WlOutput,
        event: wl_output::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let key = output.id().protocol_id();
        let Some(output) = state.output_mut(key) else {
            log::warn!("event for unknown wl_output {key}");
            return;
        };
        match event {
            wl_output::Event::Geometry {
                x,
                y,
                physical_width,
                physical_height,
                subpixel,
                make,
                model,
                transform,
            } => {
                // Geometry restarts the property burst; reset the record.
                output.info = OutputInfo {
                    geometry: OutputGeometry {
                        x,
                        y,
                        physical_width,
                        physical_height,
                        subpixel: subpixel.into_result().unwrap_or(wl_output::Subpixel::Unknown),
                        make,
                        model,
                        transform: transform.into_result().unwrap_or(wl_output::Transform::Normal),
                    },
                    ..OutputInfo::default()
                };
            }
            wl_output::Event::Mode {
                flags,
                width,
                height,
                refresh,
            } => {
                let flags = match flags {
                    WEnum::Value(v) => v.bits(),
                    WEnum::Unknown(v) => v,
                };
                output.info.mode = OutputMode {
                    flags,
                    width,
                    height,
                    refresh,
                };
            }
            wl_output::Event::Done => {
                output.info.done = true;
            }
            wl_output::Event::Scale { factor } => {
                output.info.scale = factor;
            }
            wl_output::Event::Name { name } => {
                output.info.name = name;
            }
            wl_output::Event::Description { description } => {
                output.info.description = description;
            }
            _ => {}
        }
    }
}
