//! `/dev/input` implementation of the port traits, on raw evdev ioctls.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::event::{self, RawEvent, EV_ABS, INPUT_EVENT_SIZE};
use crate::port::{AbsBitmap, AxisRange, DevicePort, EventSink, EventSource, PortScanner};

/// Directory scanned for event nodes by default.
pub const INPUT_DIR: &str = "/dev/input";

/// Records read per poll wakeup. Evdev queues are shallow; one small batch
/// per wakeup keeps the loop responsive.
const READ_BATCH: usize = 64;

/// `_IOC(_IOC_READ, 'E', nr, len)` request arithmetic from the kernel's
/// ioctl encoding: two direction bits, a 14-bit size, type byte, nr byte.
const fn ioc_read(nr: u8, len: usize) -> u32 {
    const IOC_READ: u32 = 2;
    (IOC_READ << 30) | ((len as u32) << 16) | ((b'E' as u32) << 8) | nr as u32
}

/// `EVIOCGBIT(EV_ABS, len)`: absolute-axis capability bitmask.
const fn eviocgbit_abs(len: usize) -> u32 {
    ioc_read(0x20 + EV_ABS as u8, len)
}

/// `EVIOCGABS(axis)`: `input_absinfo` for one absolute axis.
const fn eviocgabs(axis: u16) -> u32 {
    ioc_read(0x40 + axis as u8, std::mem::size_of::<AbsInfoRaw>())
}

/// `EVIOCGNAME(len)`: device name string.
const fn eviocgname(len: usize) -> u32 {
    ioc_read(0x06, len)
}

/// Kernel `struct input_absinfo`.
#[repr(C)]
#[derive(Clone, Copy, Default)]
struct AbsInfoRaw {
    value: i32,
    minimum: i32,
    maximum: i32,
    fuzz: i32,
    flat: i32,
    resolution: i32,
}

/// Scanner over a real input-device directory.
pub struct DevInputScanner {
    dir: PathBuf,
}

impl DevInputScanner {
    pub fn new() -> Self {
        Self::with_dir(INPUT_DIR)
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Default for DevInputScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl PortScanner for DevInputScanner {
    fn candidates(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("cannot list {}: {err}", self.dir.display());
                return Vec::new();
            }
        };
        let mut paths = Vec::new();
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().starts_with("event") {
                paths.push(entry.path());
            }
        }
        paths
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn DevicePort>> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        set_nonblocking(&file)?;
        Ok(Box::new(DevNodePort { file }))
    }
}

fn set_nonblocking(file: &File) -> io::Result<()> {
    // SAFETY: fcntl on an open descriptor we own.
    let flags = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above.
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

struct DevNodePort {
    file: File,
}

impl DevicePort for DevNodePort {
    fn abs_bits(&mut self) -> io::Result<AbsBitmap> {
        let mut bits = AbsBitmap::empty();
        let buf = bits.bytes_mut();
        // SAFETY: the kernel writes at most `buf.len()` bytes, the length
        // encoded in the request.
        let rc = unsafe {
            libc::ioctl(self.file.as_raw_fd(), eviocgbit_abs(buf.len()) as _, buf.as_mut_ptr())
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(bits)
    }

    fn abs_range(&mut self, axis: u16) -> io::Result<AxisRange> {
        let mut info = AbsInfoRaw::default();
        // SAFETY: `info` is a repr(C) input_absinfo the kernel fills in full.
        let rc = unsafe {
            libc::ioctl(self.file.as_raw_fd(), eviocgabs(axis) as _, &mut info as *mut AbsInfoRaw)
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(AxisRange { min: info.minimum, max: info.maximum })
    }

    fn name(&mut self) -> io::Result<String> {
        let mut buf = [0u8; 256];
        // SAFETY: the kernel writes at most `buf.len()` bytes and
        // NUL-terminates what fits.
        let rc = unsafe {
            libc::ioctl(self.file.as_raw_fd(), eviocgname(buf.len()) as _, buf.as_mut_ptr())
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }

    fn split(self: Box<Self>) -> io::Result<(Box<dyn EventSource>, Box<dyn EventSink>)> {
        let writer = self.file.try_clone()?;
        let source = DevNodeSource {
            file: self.file,
            buf: vec![0; READ_BATCH * INPUT_EVENT_SIZE],
        };
        let sink = DevNodeSink {
            file: writer,
            wire: Vec::new(),
        };
        Ok((Box::new(source), Box::new(sink)))
    }
}

struct DevNodeSource {
    file: File,
    buf: Vec<u8>,
}

impl EventSource for DevNodeSource {
    fn read_events(&mut self, timeout: Duration, out: &mut Vec<RawEvent>) -> io::Result<usize> {
        let mut pfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: `pfd` is one valid pollfd for the duration of the call.
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout.as_millis() as libc::c_int) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }
        if rc == 0 {
            return Ok(0);
        }
        let n = match self.file.read(&mut self.buf) {
            Ok(n) => n,
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::Interrupted =>
            {
                return Ok(0)
            }
            Err(err) => return Err(err),
        };
        // An empty or misaligned batch is a transient glitch; the next poll
        // retries rather than feeding half a record downstream.
        if n == 0 || n % INPUT_EVENT_SIZE != 0 {
            return Ok(0);
        }
        let mut count = 0;
        for chunk in self.buf[..n].chunks_exact(INPUT_EVENT_SIZE) {
            if let Some(ev) = event::parse_input_event(chunk) {
                out.push(ev);
                count += 1;
            }
        }
        Ok(count)
    }
}

struct DevNodeSink {
    file: File,
    wire: Vec<u8>,
}

impl EventSink for DevNodeSink {
    fn write_frame(&mut self, frame: &[RawEvent]) -> io::Result<()> {
        self.wire.clear();
        for &ev in frame {
            event::encode_input_event(ev, &mut self.wire);
        }
        let n = self.file.write(&self.wire)?;
        if n != self.wire.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "device accepted a partial event frame",
            ));
        }
        Ok(())
    }
}
