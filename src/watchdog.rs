//! Stuck-contact monitor: forces a release when the synthetic contact stays
//! down with no injector traffic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::inject::Injector;

/// Monitor period.
pub(crate) const WATCHDOG_PERIOD: Duration = Duration::from_millis(100);

/// Consecutive stalled periods with an active contact before a forced
/// release. Two seconds outlasts any long-press a live caller drives.
pub(crate) const RELEASE_AFTER_TICKS: u32 = 20;

pub(crate) struct Watchdog {
    running: Arc<AtomicBool>,
    uploading: Arc<AtomicBool>,
    injector: Arc<Mutex<Option<Injector>>>,
    period: Duration,
    release_after: u32,
}

impl Watchdog {
    pub(crate) fn new(
        running: Arc<AtomicBool>,
        uploading: Arc<AtomicBool>,
        injector: Arc<Mutex<Option<Injector>>>,
        period: Duration,
        release_after: u32,
    ) -> Self {
        Self { running, uploading, injector, period, release_after }
    }

    /// Tick until the stop flag drops.
    pub(crate) fn run(self) {
        let mut stalled = 0u32;
        let mut last_seq = 0u64;
        while self.running.load(Ordering::SeqCst) {
            thread::sleep(self.period);
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            if !self.tick(&mut stalled, &mut last_seq) {
                break;
            }
        }
        log::debug!("watchdog stopped");
    }

    /// One monitor cycle; false means the session is over. A cycle with an
    /// injection in flight is skipped outright; the hint only saves
    /// contention, the injector mutex is the actual exclusion. The stop flag
    /// is re-read under that lock: a close plus re-init can complete while
    /// this thread sleeps, and a monitor that outslept its own session must
    /// not count against, or release, the successor's contact.
    fn tick(&self, stalled: &mut u32, last_seq: &mut u64) -> bool {
        if self.uploading.load(Ordering::SeqCst) {
            *stalled = 0;
            return true;
        }
        let mut guard = crate::lock(&self.injector);
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        let Some(injector) = guard.as_mut() else {
            *stalled = 0;
            return true;
        };
        let seq = injector.emit_seq();
        if injector.point().is_active() && seq == *last_seq {
            *stalled += 1;
            if *stalled >= self.release_after {
                log::warn!("synthetic contact stalled for {stalled} cycle(s), forcing release");
                injector.release();
                *stalled = 0;
            }
        } else {
            *stalled = 0;
        }
        *last_seq = injector.emit_seq();
        true
    }
}
