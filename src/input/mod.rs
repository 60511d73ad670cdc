//! Input events as seen by the seat
//!
//! Events arrive from the input translator already typed. The seat only
//! distinguishes touch events (which go through stream repair) from
//! everything else (which passes straight through), but keeps the other
//! kinds typed so cookie eligibility can be decided per kind.

pub mod builder;
pub mod validator;

pub use builder::{EventBuilder, InputError};
pub use validator::{Validator, ValidatorStats};

use crate::cookie::Cookie;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type DeviceId = i64;
pub type TouchId = i32;

/// Per-point touch action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchAction {
    Down,
    Change,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    Unknown,
    #[default]
    Finger,
    Stylus,
}

/// One contact within a touch event.
///
/// Only `id` identifies the contact; everything else is payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub id: TouchId,
    pub action: TouchAction,
    #[serde(default)]
    pub tool_type: ToolType,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub pressure: f32,
    #[serde(default)]
    pub touch_major: f32,
    #[serde(default)]
    pub touch_minor: f32,
    #[serde(default)]
    pub size: f32,
}

impl TouchPoint {
    /// A finger contact at the origin with no axis data
    pub fn new(id: TouchId, action: TouchAction) -> Self {
        Self {
            id,
            action,
            tool_type: ToolType::Finger,
            x: 0.0,
            y: 0.0,
            pressure: 0.0,
            touch_major: 0.0,
            touch_minor: 0.0,
            size: 0.0,
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }
}

/// A touch frame from one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub device_id: DeviceId,
    /// Nanoseconds
    pub event_time: u64,
    #[serde(default)]
    pub modifiers: u32,
    #[serde(default)]
    pub points: Vec<TouchPoint>,
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<Cookie>,
}

impl TouchEvent {
    pub fn new(device_id: DeviceId, event_time: u64) -> Self {
        Self {
            device_id,
            event_time,
            modifiers: 0,
            points: Vec::new(),
            cookie: None,
        }
    }

    /// Append a point without any consistency checks; see [`EventBuilder`]
    /// for the checked path.
    pub fn with_point(mut self, point: TouchPoint) -> Self {
        self.points.push(point);
        self
    }

    pub fn point(&self, id: TouchId) -> Option<&TouchPoint> {
        self.points.iter().find(|p| p.id == id)
    }

    pub fn ids(&self) -> BTreeSet<TouchId> {
        self.points.iter().map(|p| p.id).collect()
    }

    /// Ids that are still in contact after this event
    pub fn live_ids(&self) -> BTreeSet<TouchId> {
        self.points
            .iter()
            .filter(|p| p.action != TouchAction::Up)
            .map(|p| p.id)
            .collect()
    }

    pub fn has_action(&self, action: TouchAction) -> bool {
        self.points.iter().any(|p| p.action == action)
    }

    /// Rewrite the action of `id`. Returns false if the id is not present.
    pub fn set_action(&mut self, id: TouchId, action: TouchAction) -> bool {
        match self.points.iter_mut().find(|p| p.id == id) {
            Some(point) => {
                point.action = action;
                true
            }
            None => false,
        }
    }

    /// Replace the point with the same id, or append it.
    pub(crate) fn upsert_point(&mut self, point: TouchPoint) {
        match self.points.iter_mut().find(|p| p.id == point.id) {
            Some(existing) => *existing = point,
            None => self.points.push(point),
        }
    }

    /// Copy with every action rewritten to `change`. This is always a valid
    /// successor of `self` in a touch stream.
    pub(crate) fn as_changes(&self) -> TouchEvent {
        let mut out = self.clone();
        out.cookie = None;
        for point in &mut out.points {
            point.action = TouchAction::Change;
        }
        out
    }

    /// Copy with released points dropped
    pub(crate) fn without_releases(&self) -> TouchEvent {
        let mut out = self.clone();
        out.cookie = None;
        out.points.retain(|p| p.action != TouchAction::Up);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Down,
    Up,
    Repeat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub device_id: DeviceId,
    pub event_time: u64,
    #[serde(default)]
    pub modifiers: u32,
    pub action: KeyAction,
    /// xkb keysym
    pub key_code: u32,
    #[serde(default)]
    pub scan_code: i32,
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<Cookie>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerAction {
    ButtonDown,
    ButtonUp,
    Enter,
    Leave,
    Motion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub device_id: DeviceId,
    pub event_time: u64,
    #[serde(default)]
    pub modifiers: u32,
    pub action: PointerAction,
    /// Bitmask of pressed buttons
    #[serde(default)]
    pub buttons: u32,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub hscroll: f32,
    #[serde(default)]
    pub vscroll: f32,
    #[serde(default)]
    pub relative_x: f32,
    #[serde(default)]
    pub relative_y: f32,
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<Cookie>,
}

/// Every event kind the seat handles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    Key(KeyEvent),
    Pointer(PointerEvent),
    Touch(TouchEvent),
    /// Tells clients to re-query keyboard state; carries no device data.
    KeyboardResync,
}

impl InputEvent {
    pub fn device_id(&self) -> Option<DeviceId> {
        match self {
            InputEvent::Key(ev) => Some(ev.device_id),
            InputEvent::Pointer(ev) => Some(ev.device_id),
            InputEvent::Touch(ev) => Some(ev.device_id),
            InputEvent::KeyboardResync => None,
        }
    }

    pub fn event_time(&self) -> Option<u64> {
        match self {
            InputEvent::Key(ev) => Some(ev.event_time),
            InputEvent::Pointer(ev) => Some(ev.event_time),
            InputEvent::Touch(ev) => Some(ev.event_time),
            InputEvent::KeyboardResync => None,
        }
    }

    /// Whether this event represents deliberate user action and so should
    /// carry a cookie: any key event, pointer button presses and releases,
    /// and touch frames where a contact starts or ends.
    pub fn needs_cookie(&self) -> bool {
        match self {
            InputEvent::Key(_) => true,
            InputEvent::Pointer(ev) => matches!(
                ev.action,
                PointerAction::ButtonDown | PointerAction::ButtonUp
            ),
            InputEvent::Touch(ev) => {
                ev.has_action(TouchAction::Down) || ev.has_action(TouchAction::Up)
            }
            InputEvent::KeyboardResync => false,
        }
    }

    pub fn cookie(&self) -> Option<&Cookie> {
        match self {
            InputEvent::Key(ev) => ev.cookie.as_ref(),
            InputEvent::Pointer(ev) => ev.cookie.as_ref(),
            InputEvent::Touch(ev) => ev.cookie.as_ref(),
            InputEvent::KeyboardResync => None,
        }
    }

    /// Attach a cookie. Returns false for kinds that cannot carry one.
    pub fn set_cookie(&mut self, cookie: Cookie) -> bool {
        let slot = match self {
            InputEvent::Key(ev) => &mut ev.cookie,
            InputEvent::Pointer(ev) => &mut ev.cookie,
            InputEvent::Touch(ev) => &mut ev.cookie,
            InputEvent::KeyboardResync => return false,
        };
        *slot = Some(cookie);
        true
    }

    pub fn as_touch(&self) -> Option<&TouchEvent> {
        match self {
            InputEvent::Touch(ev) => Some(ev),
            _ => None,
        }
    }
}

impl From<TouchEvent> for InputEvent {
    fn from(ev: TouchEvent) -> Self {
        InputEvent::Touch(ev)
    }
}

impl From<KeyEvent> for InputEvent {
    fn from(ev: KeyEvent) -> Self {
        InputEvent::Key(ev)
    }
}

impl From<PointerEvent> for InputEvent {
    fn from(ev: PointerEvent) -> Self {
        InputEvent::Pointer(ev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::CookieAuthority;

    fn pointer(action: PointerAction) -> InputEvent {
        InputEvent::Pointer(PointerEvent {
            device_id: 2,
            event_time: 10,
            modifiers: 0,
            action,
            buttons: 1,
            x: 0.0,
            y: 0.0,
            hscroll: 0.0,
            vscroll: 0.0,
            relative_x: 0.0,
            relative_y: 0.0,
            cookie: None,
        })
    }

    #[test]
    fn test_live_ids_exclude_releases() {
        let ev = TouchEvent::new(0, 0)
            .with_point(TouchPoint::new(0, TouchAction::Change))
            .with_point(TouchPoint::new(1, TouchAction::Up))
            .with_point(TouchPoint::new(2, TouchAction::Down));

        assert_eq!(ev.ids(), BTreeSet::from([0, 1, 2]));
        assert_eq!(ev.live_ids(), BTreeSet::from([0, 2]));
    }

    #[test]
    fn test_as_changes_and_without_releases() {
        let ev = TouchEvent::new(0, 0)
            .with_point(TouchPoint::new(0, TouchAction::Down))
            .with_point(TouchPoint::new(1, TouchAction::Up));

        let changes = ev.as_changes();
        assert!(changes.points.iter().all(|p| p.action == TouchAction::Change));
        assert_eq!(changes.points.len(), 2);

        let kept = ev.without_releases();
        assert_eq!(kept.ids(), BTreeSet::from([0]));
    }

    #[test]
    fn test_set_action_and_upsert() {
        let mut ev = TouchEvent::new(0, 0).with_point(TouchPoint::new(4, TouchAction::Change));

        assert!(ev.set_action(4, TouchAction::Up));
        assert!(!ev.set_action(5, TouchAction::Up));

        ev.upsert_point(TouchPoint::new(4, TouchAction::Down).at(3.0, 4.0));
        ev.upsert_point(TouchPoint::new(6, TouchAction::Down));
        assert_eq!(ev.points.len(), 2);
        assert_eq!(ev.point(4).map(|p| p.x), Some(3.0));
    }

    #[test]
    fn test_cookie_eligibility() {
        let key = InputEvent::Key(KeyEvent {
            device_id: 1,
            event_time: 5,
            modifiers: 0,
            action: KeyAction::Repeat,
            key_code: 0x61,
            scan_code: 30,
            cookie: None,
        });
        assert!(key.needs_cookie());

        assert!(pointer(PointerAction::ButtonDown).needs_cookie());
        assert!(pointer(PointerAction::ButtonUp).needs_cookie());
        assert!(!pointer(PointerAction::Motion).needs_cookie());
        assert!(!pointer(PointerAction::Enter).needs_cookie());

        let moving = TouchEvent::new(0, 0).with_point(TouchPoint::new(0, TouchAction::Change));
        assert!(!InputEvent::from(moving.clone()).needs_cookie());
        let lifted = moving.with_point(TouchPoint::new(1, TouchAction::Up));
        assert!(InputEvent::from(lifted).needs_cookie());

        assert!(!InputEvent::KeyboardResync.needs_cookie());
    }

    #[test]
    fn test_set_cookie() {
        let authority = CookieAuthority::create_from(b"0123456789").unwrap();
        let mut ev = pointer(PointerAction::ButtonDown);
        assert!(ev.set_cookie(authority.make_cookie(10)));
        assert_eq!(ev.cookie().map(|c| c.timestamp()), Some(10));

        let mut resync = InputEvent::KeyboardResync;
        assert!(!resync.set_cookie(authority.make_cookie(10)));
        assert!(resync.cookie().is_none());
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{"type":"touch","device_id":3,"event_time":100,
            "points":[{"id":1,"action":"change","x":1.5}]}"#;
        let ev: InputEvent = serde_json::from_str(json).unwrap();

        let touch = ev.as_touch().unwrap();
        assert_eq!(touch.device_id, 3);
        assert_eq!(touch.points[0].action, TouchAction::Change);
        assert_eq!(touch.points[0].tool_type, ToolType::Finger);
        assert_eq!(touch.points[0].x, 1.5);

        let resync: InputEvent = serde_json::from_str(r#"{"type":"keyboard_resync"}"#).unwrap();
        assert_eq!(resync, InputEvent::KeyboardResync);
    }
}
