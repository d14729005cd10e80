//! Touchscreen discovery: scan the candidates, classify by capability bits
//! and keep the first multitouch device.

use std::fmt;
use std::path::PathBuf;

use crate::event::{ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_SLOT, ABS_MT_TRACKING_ID};
use crate::port::{AbsBitmap, EventSink, EventSource, PortScanner};
use crate::vec2::Vec2;

/// Discovery came up empty: nothing enumerated, or no candidate passed
/// classification.
#[derive(Debug, thiserror::Error)]
#[error("no multitouch touchscreen among {scanned} input device node(s)")]
pub struct NoTouchscreen {
    /// Candidate nodes inspected before giving up.
    pub scanned: usize,
}

/// A protocol-B touchscreen reports a slot table, per-contact tracking ids
/// and both MT position axes. Anything less is some other kind of device.
pub fn is_touch_device(bits: &AbsBitmap) -> bool {
    bits.is_set(ABS_MT_SLOT)
        && bits.is_set(ABS_MT_TRACKING_ID)
        && bits.is_set(ABS_MT_POSITION_X)
        && bits.is_set(ABS_MT_POSITION_Y)
}

/// An opened, classified touchscreen ready to serve the reader and injector.
pub(crate) struct SelectedDevice {
    pub path: PathBuf,
    pub scale: Vec2,
    pub source: Box<dyn EventSource>,
    pub sink: Box<dyn EventSink>,
}

// The handles are trait objects with nothing to show; render the
// discovery outcome only.
impl fmt::Debug for SelectedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedDevice")
            .field("path", &self.path)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

/// Open candidates in enumeration order and keep the first one that
/// classifies as a touchscreen. Candidates that cannot be opened or queried
/// are skipped, not fatal. `screen` must already be landscape-normalized.
pub(crate) fn select_touch_device(
    scanner: &dyn PortScanner,
    screen: Vec2,
) -> Result<SelectedDevice, NoTouchscreen> {
    let paths = scanner.candidates();
    if paths.is_empty() {
        log::warn!("no input device nodes found");
    }
    let scanned = paths.len();

    for path in paths {
        let mut port = match scanner.open(&path) {
            Ok(port) => port,
            Err(err) => {
                log::debug!("skipping {}: {err}", path.display());
                continue;
            }
        };
        let bits = match port.abs_bits() {
            Ok(bits) => bits,
            Err(err) => {
                log::debug!("skipping {}: capability query failed: {err}", path.display());
                continue;
            }
        };
        if !is_touch_device(&bits) {
            continue;
        }
        let (x_range, y_range) = match (
            port.abs_range(ABS_MT_POSITION_X),
            port.abs_range(ABS_MT_POSITION_Y),
        ) {
            (Ok(x), Ok(y)) => (x, y),
            _ => {
                log::debug!("{}: touch capabilities but unreadable axis ranges", path.display());
                continue;
            }
        };
        if x_range.max <= 0 || y_range.max <= 0 {
            log::debug!(
                "{}: degenerate axis maxima ({}, {})",
                path.display(),
                x_range.max,
                y_range.max
            );
            continue;
        }

        let name = port.name().unwrap_or_else(|_| String::from("unknown"));
        // Touch panels are portrait-native: the device X axis spans the
        // short edge of the landscape-normalized screen.
        let scale = Vec2::new(
            screen.y / x_range.max as f32,
            screen.x / y_range.max as f32,
        );

        match port.split() {
            Ok((source, sink)) => {
                log::info!(
                    "touchscreen {} ({name}): axes {}x{}, scale ({:.4}, {:.4})",
                    path.display(),
                    x_range.max,
                    y_range.max,
                    scale.x,
                    scale.y
                );
                return Ok(SelectedDevice { path, scale, source, sink });
            }
            Err(err) => {
                log::warn!("{}: cannot split device handle: {err}", path.display());
                continue;
            }
        }
    }

    Err(NoTouchscreen { scanned })
}
