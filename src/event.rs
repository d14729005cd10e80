//! Raw Linux `input_event` records: the native-layout codec plus the event
//! and axis codes this crate speaks.

/// Size of one `struct input_event` on this target.
pub const INPUT_EVENT_SIZE: usize = std::mem::size_of::<libc::input_event>();

/// Size of the kernel timestamp prefix (`struct timeval`).
const TIME_SIZE: usize = INPUT_EVENT_SIZE - 8;

pub const EV_SYN: u16 = 0x00;
pub const EV_ABS: u16 = 0x03;

pub const SYN_REPORT: u16 = 0x00;

pub const ABS_MT_SLOT: u16 = 0x2f;
pub const ABS_MT_POSITION_X: u16 = 0x35;
pub const ABS_MT_POSITION_Y: u16 = 0x36;
pub const ABS_MT_TRACKING_ID: u16 = 0x39;

/// Highest `ABS_*` code the kernel defines.
pub const ABS_MAX: u16 = 0x3f;

/// One `(type, code, value)` record with the kernel timestamp stripped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub const fn new(kind: u16, code: u16, value: i32) -> Self {
        Self { kind, code, value }
    }

    /// Shorthand for an absolute-axis record.
    pub const fn abs(code: u16, value: i32) -> Self {
        Self::new(EV_ABS, code, value)
    }

    /// The frame terminator.
    pub const fn syn_report() -> Self {
        Self::new(EV_SYN, SYN_REPORT, 0)
    }
}

/// Decode one record from the front of `buf`, or `None` if fewer than
/// [`INPUT_EVENT_SIZE`] bytes remain.
pub fn parse_input_event(buf: &[u8]) -> Option<RawEvent> {
    if buf.len() < INPUT_EVENT_SIZE {
        return None;
    }
    let t = TIME_SIZE;
    let kind = u16::from_ne_bytes([buf[t], buf[t + 1]]);
    let code = u16::from_ne_bytes([buf[t + 2], buf[t + 3]]);
    let value = i32::from_ne_bytes([buf[t + 4], buf[t + 5], buf[t + 6], buf[t + 7]]);
    Some(RawEvent { kind, code, value })
}

/// Append one record to `out`. The timestamp is left zeroed; the kernel
/// stamps events written into a device node itself.
pub fn encode_input_event(ev: RawEvent, out: &mut Vec<u8>) {
    out.extend_from_slice(&[0u8; TIME_SIZE]);
    out.extend_from_slice(&ev.kind.to_ne_bytes());
    out.extend_from_slice(&ev.code.to_ne_bytes());
    out.extend_from_slice(&ev.value.to_ne_bytes());
}
