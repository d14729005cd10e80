//! In-memory device port: a scriptable touchscreen for tests and for
//! embedders without hardware.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::event::{
    RawEvent, ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_SLOT, ABS_MT_TRACKING_ID,
};
use crate::port::{AbsBitmap, AxisRange, DevicePort, EventSink, EventSource, PortScanner};

#[derive(Default)]
struct Inner {
    name: String,
    bits: AbsBitmap,
    ranges: Vec<(u16, AxisRange)>,
    incoming: VecDeque<RawEvent>,
    written: Vec<Vec<RawEvent>>,
    echo_writes: bool,
}

/// Handle to one scripted device. Clones share state, so a test keeps a
/// handle while the opened port lives inside the manager.
#[derive(Clone, Default)]
pub struct MemoryDevice {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDevice {
    /// A device that classifies as a multitouch touchscreen, reporting the
    /// given position-axis maxima.
    pub fn touchscreen(name: &str, x_max: i32, y_max: i32) -> Self {
        let dev = MemoryDevice::default();
        {
            let mut inner = crate::lock(&dev.inner);
            inner.name = name.to_string();
            inner.bits = AbsBitmap::with_bits(&[
                ABS_MT_SLOT,
                ABS_MT_TRACKING_ID,
                ABS_MT_POSITION_X,
                ABS_MT_POSITION_Y,
            ]);
            inner.ranges = vec![
                (ABS_MT_POSITION_X, AxisRange { min: 0, max: x_max }),
                (ABS_MT_POSITION_Y, AxisRange { min: 0, max: y_max }),
            ];
        }
        dev
    }

    /// A device with arbitrary capability bits and no axis ranges.
    pub fn with_abs_bits(name: &str, bits: AbsBitmap) -> Self {
        let dev = MemoryDevice::default();
        {
            let mut inner = crate::lock(&dev.inner);
            inner.name = name.to_string();
            inner.bits = bits;
        }
        dev
    }

    /// Queue records the device will report to its reader.
    pub fn push_events(&self, events: &[RawEvent]) {
        crate::lock(&self.inner).incoming.extend(events.iter().copied());
    }

    /// When set, frames written into the device are also queued back to the
    /// reader, the way a kernel node delivers injected events to every
    /// client.
    pub fn set_echo_writes(&self, echo: bool) {
        crate::lock(&self.inner).echo_writes = echo;
    }

    /// Every frame written into the device so far, in order.
    pub fn written_frames(&self) -> Vec<Vec<RawEvent>> {
        crate::lock(&self.inner).written.clone()
    }
}

/// Scanner over a fixed set of scripted devices.
#[derive(Default)]
pub struct MemoryScanner {
    devices: Vec<(PathBuf, MemoryDevice)>,
}

impl MemoryScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, path: impl Into<PathBuf>, device: MemoryDevice) -> Self {
        self.devices.push((path.into(), device));
        self
    }
}

impl PortScanner for MemoryScanner {
    fn candidates(&self) -> Vec<PathBuf> {
        self.devices.iter().map(|(path, _)| path.clone()).collect()
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn DevicePort>> {
        self.devices
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, dev)| Box::new(MemoryPort { inner: dev.inner.clone() }) as Box<dyn DevicePort>)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such scripted device"))
    }
}

struct MemoryPort {
    inner: Arc<Mutex<Inner>>,
}

impl DevicePort for MemoryPort {
    fn abs_bits(&mut self) -> io::Result<AbsBitmap> {
        Ok(crate::lock(&self.inner).bits)
    }

    fn abs_range(&mut self, axis: u16) -> io::Result<AxisRange> {
        crate::lock(&self.inner)
            .ranges
            .iter()
            .find(|(a, _)| *a == axis)
            .map(|(_, range)| *range)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "axis not advertised"))
    }

    fn name(&mut self) -> io::Result<String> {
        Ok(crate::lock(&self.inner).name.clone())
    }

    fn split(self: Box<Self>) -> io::Result<(Box<dyn EventSource>, Box<dyn EventSink>)> {
        let source = MemorySource { inner: self.inner.clone() };
        let sink = MemorySink { inner: self.inner };
        Ok((Box::new(source), Box::new(sink)))
    }
}

struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    fn drain(&self, out: &mut Vec<RawEvent>) -> usize {
        let mut inner = crate::lock(&self.inner);
        let count = inner.incoming.len();
        out.extend(inner.incoming.drain(..));
        count
    }
}

impl EventSource for MemorySource {
    /// Checks the queue, sleeps out the timeout if it is empty, then checks
    /// once more. Approximates the device poll without busy-waiting tests.
    fn read_events(&mut self, timeout: Duration, out: &mut Vec<RawEvent>) -> io::Result<usize> {
        let count = self.drain(out);
        if count > 0 {
            return Ok(count);
        }
        thread::sleep(timeout);
        Ok(self.drain(out))
    }
}

struct MemorySink {
    inner: Arc<Mutex<Inner>>,
}

impl EventSink for MemorySink {
    fn write_frame(&mut self, frame: &[RawEvent]) -> io::Result<()> {
        let mut inner = crate::lock(&self.inner);
        inner.written.push(frame.to_vec());
        if inner.echo_writes {
            inner.incoming.extend(frame.iter().copied());
        }
        Ok(())
    }
}
