//! Normalized input events consumed by the menu session
//!
//! Device backends (pointer, tablet) translate their native events into
//! [`MotionEvent`] and [`ButtonEvent`] so that hover and click handling is the
//! same no matter which device drives the cursor.

pub mod tablet;

use crate::utils::geometry::Point;

pub use tablet::{
    AbsoluteMotion, ActiveArea, DrawingTablet, Rotation, TabletAxes, TabletAxisEvent,
    TabletButton, TabletButtonEvent, TabletToolType,
};

pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;
pub const BTN_MIDDLE: u32 = 0x112;

/// Which device produced a motion event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionSource {
    Pointer,
    Tablet,
}

/// Cursor motion in layout coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEvent {
    pub position: Point,
    pub time_msec: u32,
    pub source: MotionSource,
}

impl MotionEvent {
    pub fn pointer(position: impl Into<Point>, time_msec: u32) -> Self {
        Self {
            position: position.into(),
            time_msec,
            source: MotionSource::Pointer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    /// Linux input event code (`BTN_LEFT`, ...)
    pub button: u32,
    pub state: ButtonState,
    pub time_msec: u32,
}
