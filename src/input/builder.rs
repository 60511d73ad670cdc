//! Typed event construction for the input translator
//!
//! Everything that reaches the [`Validator`](super::Validator) is assumed to
//! be internally consistent: no id appears twice in one frame and ids stay
//! within the range the seat can track. Those checks live here, where raw
//! device reports become events.

use super::{
    DeviceId, KeyAction, KeyEvent, PointerAction, PointerEvent, TouchEvent, TouchId, TouchPoint,
};
use crate::config::InputConfig;
use thiserror::Error;

/// Maximum contacts carried by one touch frame
pub const MAX_TOUCH_POINTS: usize = 16;

/// Largest touch id the seat tracks
pub const MAX_TOUCH_ID: TouchId = 31;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("touch id {0} appears more than once in one event")]
    DuplicateTouchId(TouchId),

    #[error("touch id {id} is outside 0..={max}")]
    TouchIdOutOfRange { id: TouchId, max: TouchId },

    #[error("touch event already holds the maximum of {max} points")]
    TooManyTouchPoints { max: usize },
}

/// Builds key, pointer and touch events with intra-event checks
#[derive(Debug, Clone)]
pub struct EventBuilder {
    max_touch_points: usize,
    max_touch_id: TouchId,
}

impl Default for EventBuilder {
    fn default() -> Self {
        Self {
            max_touch_points: MAX_TOUCH_POINTS,
            max_touch_id: MAX_TOUCH_ID,
        }
    }
}

impl EventBuilder {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            max_touch_points: config.max_touch_points,
            max_touch_id: config.max_touch_id,
        }
    }

    pub fn touch_event(&self, device_id: DeviceId, event_time: u64, modifiers: u32) -> TouchEvent {
        TouchEvent {
            modifiers,
            ..TouchEvent::new(device_id, event_time)
        }
    }

    /// Append a contact, rejecting it if the frame is full, the id is out of
    /// range or already present.
    pub fn add_touch(&self, event: &mut TouchEvent, point: TouchPoint) -> Result<(), InputError> {
        if event.points.len() >= self.max_touch_points {
            return Err(InputError::TooManyTouchPoints {
                max: self.max_touch_points,
            });
        }
        self.check_id(point.id)?;
        if event.point(point.id).is_some() {
            return Err(InputError::DuplicateTouchId(point.id));
        }

        event.points.push(point);
        Ok(())
    }

    /// Run the same checks as [`EventBuilder::add_touch`] over a complete
    /// frame, e.g. one deserialized from a recording.
    pub fn check_touch_event(&self, event: &TouchEvent) -> Result<(), InputError> {
        if event.points.len() > self.max_touch_points {
            return Err(InputError::TooManyTouchPoints {
                max: self.max_touch_points,
            });
        }

        let mut seen = Vec::with_capacity(event.points.len());
        for point in &event.points {
            self.check_id(point.id)?;
            if seen.contains(&point.id) {
                return Err(InputError::DuplicateTouchId(point.id));
            }
            seen.push(point.id);
        }

        Ok(())
    }

    pub fn key_event(
        &self,
        device_id: DeviceId,
        event_time: u64,
        action: KeyAction,
        key_code: u32,
        scan_code: i32,
        modifiers: u32,
    ) -> KeyEvent {
        KeyEvent {
            device_id,
            event_time,
            modifiers,
            action,
            key_code,
            scan_code,
            cookie: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn pointer_event(
        &self,
        device_id: DeviceId,
        event_time: u64,
        modifiers: u32,
        action: PointerAction,
        buttons: u32,
        position: (f32, f32),
        scroll: (f32, f32),
        relative: (f32, f32),
    ) -> PointerEvent {
        PointerEvent {
            device_id,
            event_time,
            modifiers,
            action,
            buttons,
            x: position.0,
            y: position.1,
            hscroll: scroll.0,
            vscroll: scroll.1,
            relative_x: relative.0,
            relative_y: relative.1,
            cookie: None,
        }
    }

    fn check_id(&self, id: TouchId) -> Result<(), InputError> {
        if id < 0 || id > self.max_touch_id {
            return Err(InputError::TouchIdOutOfRange {
                id,
                max: self.max_touch_id,
            });
        }
        Ok(())
    }
}
