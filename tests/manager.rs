//! End-to-end scenarios over the in-memory device port.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use mtforge::event::{
    RawEvent, ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_SLOT, ABS_MT_TRACKING_ID, EV_ABS,
};
use mtforge::port::memory::{MemoryDevice, MemoryScanner};
use mtforge::port::AbsBitmap;
use mtforge::{Orientation, TouchManager, Vec2, INJECTED_SLOT, INJECTED_TRACKING_ID};

const SCREEN: Vec2 = Vec2::new(1280.0, 720.0);

/// Panel with axis maxima double the screen extents, so both scale factors
/// come out at 0.5.
fn half_scale_panel() -> MemoryDevice {
    MemoryDevice::touchscreen("panel", 1440, 2560)
}

fn manager_for(dev: &MemoryDevice) -> TouchManager {
    let scanner = MemoryScanner::new().add("event0", dev.clone());
    let mut manager = TouchManager::with_scanner(Box::new(scanner));
    manager.init(SCREEN, false).expect("init over a scripted touchscreen");
    manager
}

fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

fn contact_frame(x: i32, y: i32) -> Vec<RawEvent> {
    vec![
        RawEvent::abs(ABS_MT_SLOT, INJECTED_SLOT),
        RawEvent::abs(ABS_MT_TRACKING_ID, INJECTED_TRACKING_ID),
        RawEvent::abs(ABS_MT_POSITION_X, x),
        RawEvent::abs(ABS_MT_POSITION_Y, y),
        RawEvent::syn_report(),
    ]
}

fn release_frame() -> Vec<RawEvent> {
    vec![
        RawEvent::abs(ABS_MT_SLOT, INJECTED_SLOT),
        RawEvent::abs(ABS_MT_TRACKING_ID, -1),
        RawEvent::syn_report(),
    ]
}

#[test]
fn down_then_up_writes_scaled_protocol_frames() {
    let dev = half_scale_panel();
    let manager = manager_for(&dev);

    manager.down(Vec2::new(200.0, 200.0));
    manager.up();

    assert_eq!(dev.written_frames(), vec![contact_frame(400, 400), release_frame()]);
}

#[test]
fn repeated_up_adds_only_frame_boundaries() {
    let dev = half_scale_panel();
    let manager = manager_for(&dev);

    manager.down(Vec2::new(100.0, 100.0));
    manager.up();
    manager.up();
    manager.up();

    let frames = dev.written_frames();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[1], release_frame());
    assert_eq!(frames[2], vec![RawEvent::syn_report()]);
    assert_eq!(frames[3], vec![RawEvent::syn_report()]);
}

#[test]
fn drag_reuses_the_contact_without_a_release() {
    let dev = half_scale_panel();
    let manager = manager_for(&dev);

    manager.down(Vec2::new(100.0, 100.0));
    manager.move_to(Vec2::new(150.0, 100.0));
    manager.move_to(Vec2::new(200.0, 120.0));
    manager.up();

    let frames = dev.written_frames();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[1], contact_frame(300, 200));
    assert_eq!(frames[2], contact_frame(400, 240));
    assert_eq!(frames[3], release_frame());
}

#[test]
fn injected_positions_follow_the_active_rotation() {
    let dev = half_scale_panel();
    let manager = manager_for(&dev);

    manager.set_orientation(Orientation::Deg90);
    manager.down(Vec2::new(100.0, 200.0));

    // The 90 degree inverse maps (100, 200) to (720 - 200, 100); the 0.5
    // scale then doubles both components on the way to device units.
    assert_eq!(dev.written_frames(), vec![contact_frame(1040, 200)]);
}

#[test]
fn uninitialized_manager_is_inert() {
    let dev = half_scale_panel();
    let scanner = MemoryScanner::new().add("event0", dev.clone());
    let manager = TouchManager::with_scanner(Box::new(scanner));

    assert!(!manager.is_initialized());
    assert_eq!(manager.device_path(), None);

    manager.down(Vec2::new(10.0, 10.0));
    manager.move_to(Vec2::new(20.0, 20.0));
    manager.up();
    manager.set_orientation(Orientation::Deg180);

    assert!(dev.written_frames().is_empty());
    assert!(!manager.pointer().down);
}

#[test]
fn init_without_a_touchscreen_reports_the_scan_size() {
    let pen = MemoryDevice::with_abs_bits("pen", AbsBitmap::with_bits(&[ABS_MT_POSITION_X]));
    let scanner = MemoryScanner::new().add("event0", pen);
    let mut manager = TouchManager::with_scanner(Box::new(scanner));

    let err = manager.init(SCREEN, false).unwrap_err();
    assert_eq!(err.scanned, 1);
    assert!(!manager.is_initialized());

    let mut empty = TouchManager::with_scanner(Box::new(MemoryScanner::new()));
    assert_eq!(empty.init(SCREEN, false).unwrap_err().scanned, 0);
}

#[test]
fn portrait_screen_sizes_are_normalized_to_landscape() {
    let dev = half_scale_panel();
    let scanner = MemoryScanner::new().add("event0", dev.clone());
    let mut manager = TouchManager::with_scanner(Box::new(scanner));
    manager.init(Vec2::new(720.0, 1280.0), false).unwrap();

    manager.down(Vec2::new(200.0, 200.0));
    assert_eq!(dev.written_frames(), vec![contact_frame(400, 400)]);
}

#[test]
fn real_touches_flow_to_callback_and_pointer() {
    let dev = half_scale_panel();
    let manager = manager_for(&dev);

    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let hits = hits.clone();
        let seen = seen.clone();
        manager.set_position_callback(move |pos| {
            hits.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push(pos);
        });
    }

    dev.push_events(&[
        RawEvent::abs(ABS_MT_SLOT, 0),
        RawEvent::abs(ABS_MT_TRACKING_ID, 7),
        RawEvent::abs(ABS_MT_POSITION_X, 100),
        RawEvent::abs(ABS_MT_POSITION_Y, 200),
        RawEvent::syn_report(),
    ]);

    assert!(wait_until(Duration::from_millis(500), || manager.pointer().down));
    assert_eq!(manager.pointer().position, Vec2::new(50.0, 100.0));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(*seen.lock().unwrap(), vec![Vec2::new(50.0, 100.0)]);

    dev.push_events(&[RawEvent::abs(ABS_MT_TRACKING_ID, -1), RawEvent::syn_report()]);
    assert!(wait_until(Duration::from_millis(500), || !manager.pointer().down));
    // The last position outlives the release; only the button state drops.
    assert_eq!(manager.pointer().position, Vec2::new(50.0, 100.0));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn cleared_callback_stops_firing_but_pointer_updates_continue() {
    let dev = half_scale_panel();
    let manager = manager_for(&dev);

    let hits = Arc::new(AtomicUsize::new(0));
    {
        let hits = hits.clone();
        manager.set_position_callback(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }
    manager.clear_position_callback();

    dev.push_events(&[
        RawEvent::abs(ABS_MT_SLOT, 0),
        RawEvent::abs(ABS_MT_TRACKING_ID, 3),
        RawEvent::abs(ABS_MT_POSITION_X, 10),
        RawEvent::abs(ABS_MT_POSITION_Y, 10),
        RawEvent::syn_report(),
    ]);

    assert!(wait_until(Duration::from_millis(500), || manager.pointer().down));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn injected_frames_echo_back_through_the_reader() {
    let dev = half_scale_panel();
    dev.set_echo_writes(true);
    let manager = manager_for(&dev);

    manager.down(Vec2::new(200.0, 300.0));
    assert!(wait_until(Duration::from_millis(500), || manager.pointer().down));
    // Device units scale straight back to the injected screen position.
    assert_eq!(manager.pointer().position, Vec2::new(200.0, 300.0));

    manager.up();
    assert!(wait_until(Duration::from_millis(500), || !manager.pointer().down));
}

#[test]
fn close_lifts_an_active_contact_and_stops_the_session() {
    let dev = half_scale_panel();
    let mut manager = manager_for(&dev);

    manager.down(Vec2::new(100.0, 100.0));
    manager.close();

    assert!(!manager.is_initialized());
    assert_eq!(dev.written_frames().last(), Some(&release_frame()));

    // The reader exits within one bounded read; give it that long before
    // scripting more traffic, then check nothing surfaces.
    thread::sleep(Duration::from_millis(50));
    dev.push_events(&[
        RawEvent::abs(ABS_MT_SLOT, 0),
        RawEvent::abs(ABS_MT_TRACKING_ID, 5),
        RawEvent::abs(ABS_MT_POSITION_X, 10),
        RawEvent::abs(ABS_MT_POSITION_Y, 10),
        RawEvent::syn_report(),
    ]);
    thread::sleep(Duration::from_millis(50));
    assert!(!manager.pointer().down);

    // Injection is inert too; close is idempotent.
    let frames_before = dev.written_frames().len();
    manager.down(Vec2::new(50.0, 50.0));
    manager.close();
    assert_eq!(dev.written_frames().len(), frames_before);
}

#[test]
fn drop_releases_like_close() {
    let dev = half_scale_panel();
    {
        let manager = manager_for(&dev);
        manager.down(Vec2::new(100.0, 100.0));
    }
    assert_eq!(dev.written_frames().last(), Some(&release_frame()));
}

#[test]
fn reinit_replaces_the_session_cleanly() {
    let dev = half_scale_panel();
    let mut manager = manager_for(&dev);

    manager.down(Vec2::new(100.0, 100.0));
    manager.init(SCREEN, false).unwrap();

    // The implicit close lifted the old contact before the new session.
    let frames = dev.written_frames();
    assert_eq!(frames.last(), Some(&release_frame()));
    assert!(manager.is_initialized());
    assert_eq!(manager.device_path().unwrap().to_string_lossy(), "event0");

    manager.down(Vec2::new(200.0, 200.0));
    assert_eq!(dev.written_frames().last(), Some(&contact_frame(400, 400)));
}

#[test]
fn tracking_ids_stay_sentinel_or_released_under_concurrent_use() {
    let dev = half_scale_panel();
    let manager = manager_for(&dev);

    thread::scope(|scope| {
        for t in 0..3 {
            let manager = &manager;
            scope.spawn(move || {
                for i in 0..200 {
                    let pos = Vec2::new((t * 100 + i) as f32 % 1280.0, (i * 7) as f32 % 720.0);
                    manager.down(pos);
                    manager.move_to(pos + Vec2::new(1.0, 1.0));
                    if i % 3 == 0 {
                        manager.up();
                    }
                }
            });
        }
    });
    manager.up();

    let frames = dev.written_frames();
    assert!(!frames.is_empty());
    for frame in &frames {
        for ev in frame {
            if ev.kind == EV_ABS && ev.code == ABS_MT_TRACKING_ID {
                assert!(
                    ev.value == -1 || ev.value == INJECTED_TRACKING_ID,
                    "unexpected tracking id {}",
                    ev.value
                );
            }
            if ev.kind == EV_ABS && ev.code == ABS_MT_SLOT {
                assert_eq!(ev.value, INJECTED_SLOT);
            }
        }
    }
}

#[test]
fn watchdog_releases_an_abandoned_contact() {
    let dev = half_scale_panel();
    let manager = manager_for(&dev);

    manager.down(Vec2::new(100.0, 100.0));

    // No further traffic: the monitor lifts the contact after its stall
    // budget (twenty 100ms cycles) runs out.
    assert!(wait_until(Duration::from_secs(4), || {
        dev.written_frames().last() == Some(&release_frame())
    }));
}
