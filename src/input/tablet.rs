//! Drawing tablet to pointer normalization
//!
//! Tablet tools report absolute positions in the [0,1] range of the whole
//! device surface. Before they can drive the cursor (and therefore menu
//! hover), the position is remapped to the configured active area and then
//! rotated to match how the tablet is physically held.

use std::collections::HashSet;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ButtonEvent, ButtonState, MotionEvent, MotionSource, BTN_LEFT, BTN_MIDDLE, BTN_RIGHT};
use crate::{
    config::TabletConfig,
    utils::geometry::{Point, Rectangle},
};

pub const BTN_TOOL_PEN: u32 = 0x140;
pub const BTN_STYLUS3: u32 = 0x149;
pub const BTN_STYLUS: u32 = 0x14b;
pub const BTN_STYLUS2: u32 = 0x14c;

bitflags! {
    /// Axes updated by a single tablet tool event
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TabletAxes: u32 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const DISTANCE = 1 << 2;
        const PRESSURE = 1 << 3;
        const TILT_X = 1 << 4;
        const TILT_Y = 1 << 5;
        const ROTATION = 1 << 6;
        const SLIDER = 1 << 7;
        const WHEEL = 1 << 8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabletToolType {
    Pen,
    Eraser,
    Brush,
    Pencil,
    Airbrush,
    Mouse,
    Lens,
    Totem,
}

impl TabletToolType {
    /// Puck-like tools move relatively and are handled as a regular pointer
    pub fn supports_absolute_motion(self) -> bool {
        !matches!(self, Self::Mouse | Self::Lens)
    }
}

/// Rotation of the tablet surface, clockwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Self::None),
            90 => Ok(Self::Rotate90),
            180 => Ok(Self::Rotate180),
            270 => Ok(Self::Rotate270),
            other => Err(format!(
                "invalid tablet rotation {other}, expected 0, 90, 180 or 270"
            )),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        match rotation {
            Rotation::None => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }
}

/// Sub-rectangle of the tablet surface mapped to the full output range,
/// in millimetres. A zero width or height extends to the device edge.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActiveArea {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

impl ActiveArea {
    pub fn is_unset(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.width == 0.0 && self.height == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabletButton {
    Tip,
    Stylus,
    Stylus2,
    Stylus3,
}

impl TabletButton {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            BTN_TOOL_PEN => Some(Self::Tip),
            BTN_STYLUS => Some(Self::Stylus),
            BTN_STYLUS2 => Some(Self::Stylus2),
            BTN_STYLUS3 => Some(Self::Stylus3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

impl PointerButton {
    pub fn code(self) -> u32 {
        match self {
            Self::Left => BTN_LEFT,
            Self::Right => BTN_RIGHT,
            Self::Middle => BTN_MIDDLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabletButtonMapping {
    pub button: TabletButton,
    pub to: PointerButton,
}

pub fn default_button_map() -> Vec<TabletButtonMapping> {
    vec![
        TabletButtonMapping {
            button: TabletButton::Tip,
            to: PointerButton::Left,
        },
        TabletButtonMapping {
            button: TabletButton::Stylus,
            to: PointerButton::Right,
        },
        TabletButtonMapping {
            button: TabletButton::Stylus2,
            to: PointerButton::Middle,
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TabletAxisEvent {
    pub tool: TabletToolType,
    pub updated_axes: TabletAxes,
    /// Normalized [0,1] device position, only meaningful for updated axes
    pub x: f64,
    pub y: f64,
    pub time_msec: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabletButtonEvent {
    pub button: u32,
    pub state: ButtonState,
    pub time_msec: u32,
}

/// Position in normalized [0,1]x[0,1] space after area and rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsoluteMotion {
    pub x: f64,
    pub y: f64,
    pub time_msec: u32,
}

impl AbsoluteMotion {
    /// Map onto the layout rectangle the tablet is bound to
    pub fn to_layout(&self, bounds: Rectangle) -> MotionEvent {
        MotionEvent {
            position: Point::new(
                bounds.loc.x + self.x * bounds.size.w,
                bounds.loc.y + self.y * bounds.size.h,
            ),
            time_msec: self.time_msec,
            source: MotionSource::Tablet,
        }
    }
}

pub fn adjust_for_tablet_area(
    tablet_width: f64,
    tablet_height: f64,
    area: Option<ActiveArea>,
    x: f64,
    y: f64,
) -> (f64, f64) {
    let Some(mut area) = area.filter(|area| !area.is_unset()) else {
        return (x, y);
    };
    if tablet_width <= 0.0 || tablet_height <= 0.0 {
        return (x, y);
    }

    if area.width == 0.0 {
        area.width = tablet_width - area.x;
    }
    if area.height == 0.0 {
        area.height = tablet_height - area.y;
    }

    let mut x = x;
    let mut y = y;
    // An empty or inverted area leaves that axis alone
    if area.width > 0.0 && area.x + area.width <= tablet_width {
        let width_offset = area.x / tablet_width;
        x = (x - width_offset) * tablet_width / area.width;
    }
    if area.height > 0.0 && area.y + area.height <= tablet_height {
        let height_offset = area.y / tablet_height;
        y = (y - height_offset) * tablet_height / area.height;
    }
    (x, y)
}

/// Clamp to [0,1], NaN maps to 0
fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

pub fn adjust_for_rotation(rotation: Rotation, x: f64, y: f64) -> (f64, f64) {
    match rotation {
        Rotation::None => (x, y),
        Rotation::Rotate90 => (1.0 - y, x),
        Rotation::Rotate180 => (1.0 - x, 1.0 - y),
        Rotation::Rotate270 => (y, 1.0 - x),
    }
}

/// Per-device state of an attached drawing tablet
#[derive(Debug, Clone)]
pub struct DrawingTablet {
    name: String,
    width_mm: f64,
    height_mm: f64,
    x: f64,
    y: f64,
    area: Option<ActiveArea>,
    rotation: Rotation,
    button_map: Vec<TabletButtonMapping>,
    /// Unsupported tools already reported
    ignored_tools: HashSet<TabletToolType>,
}

impl DrawingTablet {
    pub fn new(name: impl Into<String>, width_mm: f64, height_mm: f64, config: &TabletConfig) -> Self {
        let name = name.into();
        info!("tablet {name} dimensions: {width_mm:.2}mm x {height_mm:.2}mm");
        Self {
            name,
            width_mm,
            height_mm,
            x: 0.0,
            y: 0.0,
            area: config.active_area,
            rotation: config.rotation,
            button_map: config.button_map.clone(),
            ignored_tools: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether the tool will be tracked by this tablet
    pub fn handle_proximity(&mut self, tool: TabletToolType, entering: bool) -> bool {
        let supported = tool.supports_absolute_motion();
        if !supported && entering && self.ignored_tools.insert(tool) {
            info!(tablet = %self.name, ?tool, "ignoring tablet tool without absolute motion");
        }
        supported
    }

    pub fn handle_axis(&mut self, event: &TabletAxisEvent) -> Option<AbsoluteMotion> {
        if !event.tool.supports_absolute_motion() {
            return None;
        }
        if !event
            .updated_axes
            .intersects(TabletAxes::X | TabletAxes::Y)
        {
            return None;
        }

        if event.updated_axes.contains(TabletAxes::X) {
            self.x = event.x;
        }
        if event.updated_axes.contains(TabletAxes::Y) {
            self.y = event.y;
        }

        let (x, y) =
            adjust_for_tablet_area(self.width_mm, self.height_mm, self.area, self.x, self.y);
        let (x, y) = adjust_for_rotation(self.rotation, x, y);

        Some(AbsoluteMotion {
            x: clamp_unit(x),
            y: clamp_unit(y),
            time_msec: event.time_msec,
        })
    }

    pub fn handle_tip(&self, down: bool, time_msec: u32) -> Option<ButtonEvent> {
        let state = if down {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        };
        self.map_button(BTN_TOOL_PEN, state, time_msec)
    }

    pub fn handle_button(&self, event: &TabletButtonEvent) -> Option<ButtonEvent> {
        self.map_button(event.button, event.state, event.time_msec)
    }

    fn map_button(&self, code: u32, state: ButtonState, time_msec: u32) -> Option<ButtonEvent> {
        let button = TabletButton::from_code(code)?;
        let Some(mapping) = self.button_map.iter().find(|m| m.button == button) else {
            debug!(tablet = %self.name, ?button, "unmapped tablet button");
            return None;
        };
        Some(ButtonEvent {
            button: mapping.to.code(),
            state,
            time_msec,
        })
    }
}
