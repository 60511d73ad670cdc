//! Touch stream validation and repair
//!
//! Input sources drop frames. A lost `down` leaves clients seeing a contact
//! move that never started; a lost `up` leaves a contact stuck forever; an
//! id that vanishes and is replaced by another looks like teleporting. The
//! validator keeps the last frame it delivered for each device and, before
//! delivering a new frame, injects the releases and downs needed so that
//! downstream every contact goes `down`, `change`*, `up` exactly once.
//!
//! ```text
//!   last delivered        incoming             dispatched
//!   {5: down}        ──►  {7: change}   ──►   {5: up}
//!                                             {7: down}
//!                                             {7: change}
//! ```
//!
//! Repair only looks across frames. Duplicate ids inside one frame are
//! rejected upstream by [`EventBuilder`](super::EventBuilder).

use super::{DeviceId, InputEvent, TouchAction, TouchEvent};
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Receives validated events in order
pub type DispatchFn = Box<dyn Fn(InputEvent) + Send + Sync>;

/// Counters for repair activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidatorStats {
    /// Touch events received
    pub touch_events: u64,
    /// Non-touch events passed through
    pub passthrough_events: u64,
    /// Synthetic releases dispatched
    pub releases_inserted: u64,
    /// Synthetic downs dispatched
    pub downs_inserted: u64,
}

#[derive(Default)]
struct ValidatorState {
    /// Last frame delivered per device
    last_event_by_device: HashMap<DeviceId, TouchEvent>,
    stats: ValidatorStats,
}

pub struct Validator {
    dispatch: DispatchFn,
    state: Mutex<ValidatorState>,
}

impl Validator {
    pub fn new<F>(dispatch: F) -> Self
    where
        F: Fn(InputEvent) + Send + Sync + 'static,
    {
        Self {
            dispatch: Box::new(dispatch),
            state: Mutex::new(ValidatorState::default()),
        }
    }

    /// Deliver `event`, preceded by whatever synthetic touch frames are
    /// needed to keep the device's stream consistent. Non-touch events are
    /// passed through untouched.
    pub fn validate_and_dispatch(&self, event: InputEvent) {
        let touch = match event {
            InputEvent::Touch(touch) => touch,
            other => {
                self.state.lock().stats.passthrough_events += 1;
                (self.dispatch)(other);
                return;
            }
        };

        // Held across dispatch so frames from one device stay ordered.
        let mut state = self.state.lock();
        state.stats.touch_events += 1;

        // Stays stored until the real frame replaces it.
        let baseline = match state.last_event_by_device.get(&touch.device_id) {
            Some(last) => last.clone(),
            None => {
                debug!("👆 First touch event from device {}", touch.device_id);
                TouchEvent::new(touch.device_id, wall_clock_ns())
            }
        };

        self.ensure_stream_validity(&mut state.stats, &touch, &baseline);

        state
            .last_event_by_device
            .insert(touch.device_id, touch.clone());
        (self.dispatch)(InputEvent::Touch(touch));
    }

    /// Drop the baseline for a removed device. A later event from the same
    /// id is treated as coming from a fresh device.
    pub fn forget_device(&self, device_id: DeviceId) -> bool {
        self.state
            .lock()
            .last_event_by_device
            .remove(&device_id)
            .is_some()
    }

    /// Number of devices with a stored baseline
    pub fn tracked_devices(&self) -> usize {
        self.state.lock().last_event_by_device.len()
    }

    pub fn stats(&self) -> ValidatorStats {
        self.state.lock().stats
    }

    fn ensure_stream_validity(
        &self,
        stats: &mut ValidatorStats,
        event: &TouchEvent,
        last: &TouchEvent,
    ) {
        let expected = last.live_ids();
        let found = event.ids();

        // Running baseline: what downstream believes is in contact after
        // each synthetic frame. Synthetic frames take the incoming frame's
        // time so timestamps never go backwards.
        let mut repaired = last.without_releases();
        repaired.device_id = event.device_id;
        repaired.event_time = event.event_time;
        repaired.modifiers = event.modifiers;

        for &missing_up in expected.difference(&found) {
            let mut inject = repaired.as_changes();
            inject.set_action(missing_up, TouchAction::Up);

            debug!(
                "👆 Device {}: inserting release for touch {}",
                event.device_id, missing_up
            );
            stats.releases_inserted += 1;
            repaired = inject.without_releases();
            (self.dispatch)(InputEvent::Touch(inject));
        }

        for &missing_down in found.difference(&expected) {
            let Some(point) = event.point(missing_down) else {
                continue;
            };
            if point.action == TouchAction::Down {
                continue;
            }

            let mut inject = repaired.as_changes();
            let mut down = *point;
            down.action = TouchAction::Down;
            inject.upsert_point(down);

            debug!(
                "👆 Device {}: inserting down for touch {}",
                event.device_id, missing_down
            );
            stats.downs_inserted += 1;
            repaired = inject.clone();
            (self.dispatch)(InputEvent::Touch(inject));
        }

        trace!(
            "👆 Device {}: delivering {} point(s) after repair",
            event.device_id,
            event.points.len()
        );
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Validator")
            .field("tracked_devices", &state.last_event_by_device.len())
            .field("stats", &state.stats)
            .finish_non_exhaustive()
    }
}

fn wall_clock_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
