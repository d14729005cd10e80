//! Screen rotation handling and the physical/screen coordinate remaps.

use crate::vec2::Vec2;

/// Discrete screen rotation, counter-clockwise from the panel's natural
/// orientation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Orientation {
    /// Decode an externally supplied rotation value: 0, 1 and 3 select 0°,
    /// 90° and 270°; anything else falls in the 180° bucket.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Orientation::Deg0,
            1 => Orientation::Deg90,
            3 => Orientation::Deg270,
            _ => Orientation::Deg180,
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            Orientation::Deg0 => 0,
            Orientation::Deg90 => 1,
            Orientation::Deg180 => 2,
            Orientation::Deg270 => 3,
        }
    }
}

/// Map a raw device-space position to logical screen space: apply the
/// per-axis scale, then remap the axes for the active rotation.
///
/// `screen` must be landscape-normalized (`x >= y`).
pub fn physical_to_screen(device_pos: Vec2, scale: Vec2, screen: Vec2, orientation: Orientation) -> Vec2 {
    let p = device_pos * scale;
    match orientation {
        Orientation::Deg0 => p,
        Orientation::Deg90 => Vec2::new(p.y, screen.y - p.x),
        Orientation::Deg270 => Vec2::new(screen.x - p.y, p.x),
        Orientation::Deg180 => Vec2::new(screen.y - p.x, screen.x - p.y),
    }
}

/// Exact inverse of the axis remap in [`physical_to_screen`], without the
/// scale step. Conversion to device units divides by the scale separately.
pub fn screen_to_physical_unscaled(screen_pos: Vec2, screen: Vec2, orientation: Orientation) -> Vec2 {
    let p = screen_pos;
    match orientation {
        Orientation::Deg0 => p,
        Orientation::Deg90 => Vec2::new(screen.y - p.y, p.x),
        Orientation::Deg270 => Vec2::new(p.y, screen.x - p.x),
        Orientation::Deg180 => Vec2::new(screen.y - p.x, screen.x - p.y),
    }
}
