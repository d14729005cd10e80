//! The synthetic contact and its protocol-B frame emission.

use crate::event::{
    RawEvent, ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_SLOT, ABS_MT_TRACKING_ID,
};
use crate::port::EventSink;
use crate::transform::{screen_to_physical_unscaled, Orientation};
use crate::vec2::Vec2;

/// Slot the synthetic contact occupies. Kernels fill low slots first, so the
/// top of a ten-slot table stays clear unless nine real fingers are down.
pub const INJECTED_SLOT: i32 = 9;

/// Tracking id of the synthetic contact while it is down.
pub const INJECTED_TRACKING_ID: i32 = 5200;

/// One multitouch contact: its slot, its tracking id (-1 when the slot is
/// empty) and its device-space position.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TouchPoint {
    pub slot: i32,
    pub tracking_id: i32,
    pub position: Vec2,
}

impl TouchPoint {
    pub(crate) fn released(slot: i32) -> Self {
        Self { slot, tracking_id: -1, position: Vec2::default() }
    }

    /// Whether a contact currently occupies the slot.
    pub fn is_active(&self) -> bool {
        self.tracking_id >= 0
    }
}

/// Owns the device's write half and the synthetic contact written into it.
pub(crate) struct Injector {
    sink: Box<dyn EventSink>,
    point: TouchPoint,
    screen: Vec2,
    scale: Vec2,
    physical_coords: bool,
    /// A contact frame went out and no release frame has matched it yet.
    down_emitted: bool,
    /// Bumped on every emitted frame; the watchdog watches it for stalls.
    emit_seq: u64,
    wire: Vec<RawEvent>,
}

impl Injector {
    pub fn new(sink: Box<dyn EventSink>, screen: Vec2, scale: Vec2, physical_coords: bool) -> Self {
        Self {
            sink,
            point: TouchPoint::released(INJECTED_SLOT),
            screen,
            scale,
            physical_coords,
            down_emitted: false,
            emit_seq: 0,
            wire: Vec::with_capacity(5),
        }
    }

    pub fn point(&self) -> TouchPoint {
        self.point
    }

    pub fn emit_seq(&self) -> u64 {
        self.emit_seq
    }

    /// Press or drag: position the contact and emit one frame. In protocol B
    /// a drag is just a position update on the same tracking id.
    pub fn press(&mut self, pos: Vec2, orientation: Orientation) {
        self.point.tracking_id = INJECTED_TRACKING_ID;
        let physical = if self.physical_coords {
            pos
        } else {
            screen_to_physical_unscaled(pos, self.screen, orientation)
        };
        self.point.position = physical / self.scale;
        self.emit_frame();
    }

    /// Lift the contact and emit one frame.
    pub fn release(&mut self) {
        self.point.tracking_id = -1;
        self.emit_frame();
    }

    /// Emit the pending state as one frame. The release pair goes out only on
    /// the active-to-released transition; the SYN_REPORT terminator always
    /// goes out, even alone.
    fn emit_frame(&mut self) {
        self.wire.clear();
        if self.point.is_active() {
            self.wire.push(RawEvent::abs(ABS_MT_SLOT, self.point.slot));
            self.wire.push(RawEvent::abs(ABS_MT_TRACKING_ID, self.point.tracking_id));
            self.wire.push(RawEvent::abs(ABS_MT_POSITION_X, self.point.position.x as i32));
            self.wire.push(RawEvent::abs(ABS_MT_POSITION_Y, self.point.position.y as i32));
            self.down_emitted = true;
        } else if self.down_emitted {
            self.wire.push(RawEvent::abs(ABS_MT_SLOT, self.point.slot));
            self.wire.push(RawEvent::abs(ABS_MT_TRACKING_ID, -1));
            self.down_emitted = false;
        }
        self.wire.push(RawEvent::syn_report());
        self.emit_seq = self.emit_seq.wrapping_add(1);
        if let Err(err) = self.sink.write_frame(&self.wire) {
            log::warn!("touch frame write failed: {err}");
        }
    }
}
