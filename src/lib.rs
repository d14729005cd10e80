//! Single-finger touch injection for Linux multitouch touchscreens.
//!
//! The crate discovers the system's protocol-B touchscreen under
//! `/dev/input`, then presents one synthetic contact to the OS by writing
//! multitouch frames into that node: [`TouchManager::down`],
//! [`TouchManager::move_to`] and [`TouchManager::up`] in screen
//! coordinates. Because frames enter through the real device node, nothing
//! downstream can tell them from hardware touches.
//!
//! Alongside injection, a background reader parses the node's own event
//! stream, so real contacts surface as a [`PointerState`] snapshot and an
//! optional per-frame position callback. A watchdog force-releases the
//! synthetic contact if a caller abandons it mid-press.
//!
//! The device seam is a set of traits under [`port`]; tests and
//! hardware-free embedders script an in-memory device instead of a node.

pub mod discover;
pub mod event;
pub mod inject;
pub mod manager;
pub mod port;
pub mod reader;
pub mod transform;
pub mod vec2;

mod watchdog;

pub use discover::{is_touch_device, NoTouchscreen};
pub use inject::{TouchPoint, INJECTED_SLOT, INJECTED_TRACKING_ID};
pub use manager::TouchManager;
pub use reader::{PointerState, PositionCallback, SLOT_COUNT};
pub use transform::{physical_to_screen, screen_to_physical_unscaled, Orientation};
pub use vec2::Vec2;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, absorbing poison. A panicked holder leaves state no worse
/// than any other interleaving here, and the touch surface must not panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
