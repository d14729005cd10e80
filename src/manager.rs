//! The owning facade: device lifecycle, background tasks and the public
//! down/move/up surface.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::discover::{select_touch_device, NoTouchscreen};
use crate::inject::Injector;
use crate::port::devnode::DevInputScanner;
use crate::port::PortScanner;
use crate::reader::{PointerState, PositionCallback, Reader};
use crate::transform::Orientation;
use crate::vec2::Vec2;
use crate::watchdog::{Watchdog, RELEASE_AFTER_TICKS, WATCHDOG_PERIOD};

/// One init-to-close span: its cancellation flag and the chosen device.
/// Threads of an older session keep their own flag, so they can never act
/// on a newer session's device.
struct Session {
    running: Arc<AtomicBool>,
    device_path: PathBuf,
}

/// Drives one synthetic contact into the system's multitouch touchscreen
/// while observing real contacts on the same node.
///
/// Injection enters through the device node itself, so consumers of the
/// node cannot tell synthetic frames from hardware ones. The synthetic
/// contact lives in slot 9 with tracking id 5200; both are visible to the
/// crate's own reader too, like any other contact.
pub struct TouchManager {
    scanner: Box<dyn PortScanner>,
    orientation: Arc<AtomicU8>,
    uploading: Arc<AtomicBool>,
    injector: Arc<Mutex<Option<Injector>>>,
    pointer: Arc<Mutex<PointerState>>,
    callback: Arc<Mutex<Option<PositionCallback>>>,
    session: Option<Session>,
}

impl TouchManager {
    /// Manager over the real `/dev/input` directory.
    pub fn new() -> Self {
        Self::with_scanner(Box::new(DevInputScanner::new()))
    }

    /// Manager over any scanner: tests, containers, unusual layouts.
    pub fn with_scanner(scanner: Box<dyn PortScanner>) -> Self {
        Self {
            scanner,
            orientation: Arc::new(AtomicU8::new(Orientation::Deg0.to_raw() as u8)),
            uploading: Arc::new(AtomicBool::new(false)),
            injector: Arc::new(Mutex::new(None)),
            pointer: Arc::new(Mutex::new(PointerState::default())),
            callback: Arc::new(Mutex::new(None)),
            session: None,
        }
    }

    /// Discover the touchscreen and start the reader and watchdog tasks.
    /// Any previous session is closed first.
    ///
    /// `screen_size` is normalized so the longer edge becomes X. With
    /// `physical_coords` set, injected positions skip the rotation remap;
    /// they are already in the sensor's own orientation.
    pub fn init(&mut self, screen_size: Vec2, physical_coords: bool) -> Result<(), NoTouchscreen> {
        self.close();

        let screen = if screen_size.x >= screen_size.y {
            screen_size
        } else {
            Vec2::new(screen_size.y, screen_size.x)
        };
        let device = select_touch_device(self.scanner.as_ref(), screen)?;
        *crate::lock(&self.injector) =
            Some(Injector::new(device.sink, screen, device.scale, physical_coords));

        let running = Arc::new(AtomicBool::new(true));
        let reader = Reader::new(
            device.source,
            running.clone(),
            self.orientation.clone(),
            self.callback.clone(),
            self.pointer.clone(),
            device.scale,
            screen,
        );
        let watchdog = Watchdog::new(
            running.clone(),
            self.uploading.clone(),
            self.injector.clone(),
            WATCHDOG_PERIOD,
            RELEASE_AFTER_TICKS,
        );
        spawn_task("mtforge-reader", move || reader.run());
        spawn_task("mtforge-watchdog", move || watchdog.run());

        self.session = Some(Session { running, device_path: device.path });
        Ok(())
    }

    /// Stop the background tasks and release the device. A still-active
    /// synthetic contact is lifted first. Safe to call repeatedly; also
    /// runs on drop.
    pub fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        session.running.store(false, Ordering::SeqCst);
        {
            let mut guard = crate::lock(&self.injector);
            if let Some(injector) = guard.as_mut() {
                if injector.point().is_active() {
                    injector.release();
                }
            }
            *guard = None;
        }
        *crate::lock(&self.pointer) = PointerState::default();
        log::info!("released {}", session.device_path.display());
    }

    /// Press the synthetic contact, or drag it if already down. Positions
    /// are screen coordinates unless physical mode was chosen at init.
    /// A no-op while uninitialized.
    pub fn down(&self, pos: Vec2) {
        let orientation = self.orientation();
        let mut guard = crate::lock(&self.injector);
        let Some(injector) = guard.as_mut() else {
            log::debug!("down ({:.1}, {:.1}) ignored: no touch device", pos.x, pos.y);
            return;
        };
        self.uploading.store(true, Ordering::SeqCst);
        injector.press(pos, orientation);
        self.uploading.store(false, Ordering::SeqCst);
    }

    /// Alias of [`down`](Self::down): a protocol-B drag is a position
    /// update on the same contact.
    pub fn move_to(&self, pos: Vec2) {
        self.down(pos);
    }

    /// Lift the synthetic contact. A no-op while uninitialized.
    pub fn up(&self) {
        let mut guard = crate::lock(&self.injector);
        let Some(injector) = guard.as_mut() else {
            log::debug!("up ignored: no touch device");
            return;
        };
        self.uploading.store(true, Ordering::SeqCst);
        injector.release();
        self.uploading.store(false, Ordering::SeqCst);
    }

    /// Change the rotation applied by every subsequent transform, on both
    /// the injection and observation paths.
    pub fn set_orientation(&self, orientation: Orientation) {
        self.orientation.store(orientation.to_raw() as u8, Ordering::SeqCst);
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::from_raw(self.orientation.load(Ordering::SeqCst) as i32)
    }

    /// Install the per-frame position callback, replacing any previous one.
    /// It runs on the reader thread and must return quickly.
    pub fn set_position_callback(&self, callback: impl Fn(Vec2) + Send + 'static) {
        *crate::lock(&self.callback) = Some(Box::new(callback));
    }

    pub fn clear_position_callback(&self) {
        *crate::lock(&self.callback) = None;
    }

    /// Latest published state of the observed pointer.
    pub fn pointer(&self) -> PointerState {
        *crate::lock(&self.pointer)
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Node path of the selected touchscreen, while initialized.
    pub fn device_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|session| session.device_path.as_path())
    }
}

impl Default for TouchManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TouchManager {
    fn drop(&mut self) {
        self.close();
    }
}

/// Background tasks run detached; they exit through the session flag. A
/// spawn failure degrades that one task and logs, rather than failing init.
fn spawn_task(name: &str, task: impl FnOnce() + Send + 'static) {
    if let Err(err) = thread::Builder::new().name(name.to_string()).spawn(task) {
        log::warn!("cannot start {name} thread: {err}");
    }
}
