//! Transport seam between the touch logic and a device: capability queries,
//! bounded-wait batched reads and single-write frame emission. The real
//! implementation talks to `/dev/input` nodes; the in-memory one backs the
//! tests and hardware-free embedders.

pub mod devnode;
pub mod memory;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::event::{RawEvent, ABS_MAX};

/// Absolute-axis capability bitmask, one bit per `ABS_*` code. Out-of-range
/// bits read as unset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AbsBitmap {
    bytes: [u8; Self::LEN],
}

impl AbsBitmap {
    /// Bitmask length in bytes, enough for `ABS_MAX + 1` bits.
    pub const LEN: usize = (ABS_MAX as usize + 1) / 8;

    pub const fn empty() -> Self {
        Self { bytes: [0; Self::LEN] }
    }

    /// A bitmask with the given bits set. Bits past `ABS_MAX` are ignored.
    pub fn with_bits(bits: &[u16]) -> Self {
        let mut map = Self::empty();
        for &bit in bits {
            map.set(bit);
        }
        map
    }

    pub fn set(&mut self, bit: u16) {
        let bit = bit as usize;
        if bit < Self::LEN * 8 {
            self.bytes[bit / 8] |= 1 << (bit % 8);
        }
    }

    /// Test one capability bit without ever indexing out of bounds.
    pub fn is_set(&self, bit: u16) -> bool {
        let bit = bit as usize;
        bit < Self::LEN * 8 && (self.bytes[bit / 8] >> (bit % 8)) & 1 == 1
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// Reported minimum and maximum of one absolute axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

/// Lists candidate device nodes and opens them.
pub trait PortScanner: Send + Sync {
    /// Candidate node paths in enumeration order. An unreadable directory
    /// yields an empty list; discovery reports that rather than failing.
    fn candidates(&self) -> Vec<PathBuf>;

    fn open(&self, path: &Path) -> io::Result<Box<dyn DevicePort>>;
}

/// An opened device node, not yet split into its reader and writer halves.
pub trait DevicePort: Send {
    /// Absolute-axis capability bitmask (`EVIOCGBIT(EV_ABS)` on hardware).
    fn abs_bits(&mut self) -> io::Result<AbsBitmap>;

    /// Range of one absolute axis (`EVIOCGABS` on hardware).
    fn abs_range(&mut self, axis: u16) -> io::Result<AxisRange>;

    /// Human-readable device name, for diagnostics.
    fn name(&mut self) -> io::Result<String>;

    /// Split into the halves the running system owns separately: the reader
    /// thread takes the source, the injector takes the sink.
    fn split(self: Box<Self>) -> io::Result<(Box<dyn EventSource>, Box<dyn EventSink>)>;
}

/// Read half of a device.
pub trait EventSource: Send {
    /// Wait at most `timeout` for input, then append whole records to `out`.
    /// Returns the number of records appended. `Ok(0)` covers timeouts and
    /// transient conditions; short or misaligned batches are discarded.
    fn read_events(&mut self, timeout: Duration, out: &mut Vec<RawEvent>) -> io::Result<usize>;
}

/// Write half of a device.
pub trait EventSink: Send {
    /// Write `frame` as one buffer in a single call, so concurrent readers of
    /// the same node never observe a partial frame.
    fn write_frame(&mut self, frame: &[RawEvent]) -> io::Result<()>;
}
