//! Background reader: turns the device's raw multitouch stream into slot
//! updates and a published pointer.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::event::{
    RawEvent, ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_SLOT, ABS_MT_TRACKING_ID, EV_ABS,
    EV_SYN, SYN_REPORT,
};
use crate::inject::TouchPoint;
use crate::port::EventSource;
use crate::transform::{physical_to_screen, Orientation};
use crate::vec2::Vec2;

/// Slots tracked per device. Protocol-B panels this crate targets report at
/// most ten contacts; higher slot numbers clamp to the last entry.
pub const SLOT_COUNT: usize = 10;

/// Bounded wait per read, so a stop flag is observed promptly.
pub(crate) const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Last published state of the observed pointer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerState {
    pub down: bool,
    pub position: Vec2,
}

/// Invoked on the reader thread once per hardware frame with a contact down,
/// with the screen-space position. Must return quickly and must not call
/// back into the callback setters.
pub type PositionCallback = Box<dyn Fn(Vec2) + Send + 'static>;

pub(crate) struct Reader {
    source: Box<dyn EventSource>,
    running: Arc<AtomicBool>,
    orientation: Arc<AtomicU8>,
    callback: Arc<Mutex<Option<PositionCallback>>>,
    pointer: Arc<Mutex<PointerState>>,
    scale: Vec2,
    screen: Vec2,
    table: [TouchPoint; SLOT_COUNT],
    current_slot: usize,
    frames: u64,
}

impl Reader {
    pub(crate) fn new(
        source: Box<dyn EventSource>,
        running: Arc<AtomicBool>,
        orientation: Arc<AtomicU8>,
        callback: Arc<Mutex<Option<PositionCallback>>>,
        pointer: Arc<Mutex<PointerState>>,
        scale: Vec2,
        screen: Vec2,
    ) -> Self {
        Self {
            source,
            running,
            orientation,
            callback,
            pointer,
            scale,
            screen,
            table: std::array::from_fn(|slot| TouchPoint::released(slot as i32)),
            current_slot: 0,
            frames: 0,
        }
    }

    /// Consume the device stream until the stop flag drops or the source
    /// fails persistently.
    pub(crate) fn run(mut self) {
        log::info!("touch reader started");
        let mut events: Vec<RawEvent> = Vec::with_capacity(64);
        while self.running.load(Ordering::SeqCst) {
            events.clear();
            match self.source.read_events(READ_TIMEOUT, &mut events) {
                Ok(0) => continue,
                Ok(_) => {
                    for &ev in &events {
                        self.handle(ev);
                    }
                }
                Err(err) => {
                    log::warn!("touch read failed, reader stopping: {err}");
                    break;
                }
            }
        }
        log::debug!("touch reader stopped after {} frame(s)", self.frames);
    }

    fn handle(&mut self, ev: RawEvent) {
        match (ev.kind, ev.code) {
            (EV_ABS, ABS_MT_SLOT) => {
                self.current_slot = (ev.value.max(0) as usize).min(SLOT_COUNT - 1);
            }
            (EV_ABS, ABS_MT_TRACKING_ID) => {
                self.table[self.current_slot].tracking_id = ev.value;
            }
            (EV_ABS, ABS_MT_POSITION_X) => {
                self.table[self.current_slot].position.x = ev.value as f32;
            }
            (EV_ABS, ABS_MT_POSITION_Y) => {
                self.table[self.current_slot].position.y = ev.value as f32;
            }
            (EV_SYN, SYN_REPORT) => self.publish(),
            _ => {}
        }
    }

    /// A SYN_REPORT closed a frame: republish the current slot's contact.
    fn publish(&mut self) {
        self.frames += 1;
        let point = self.table[self.current_slot];
        if point.is_active() {
            let orientation = Orientation::from_raw(self.orientation.load(Ordering::SeqCst) as i32);
            let pos = physical_to_screen(point.position, self.scale, self.screen, orientation);
            if let Some(callback) = crate::lock(&self.callback).as_ref() {
                callback(pos);
            }
            *crate::lock(&self.pointer) = PointerState { down: true, position: pos };
            log::debug!(
                "frame {}: slot {} down at ({:.1}, {:.1})",
                self.frames,
                self.current_slot,
                pos.x,
                pos.y
            );
        } else {
            crate::lock(&self.pointer).down = false;
            log::debug!("frame {}: slot {} up", self.frames, self.current_slot);
        }
    }
}
