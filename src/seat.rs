//! Seat input pipeline
//!
//! Wires touch stream repair and cookie stamping together:
//!
//! ```text
//! ┌────────────┐    ┌─────────────┐    ┌──────────────┐    ┌──────────┐
//! │ Translator │───►│  Validator  │───►│ EventStamper │───►│   Sink   │
//! │  (events)  │    │  (repair)   │    │  (cookies)   │    │ (focus)  │
//! └────────────┘    └─────────────┘    └──────────────┘    └──────────┘
//!                                              │
//!                   client request ──► verify_client_cookie
//! ```
//!
//! The stamper runs after repair, so synthetic downs and ups get cookies
//! like any other contact start or end.

use crate::config::InputConfig;
use crate::cookie::{CookieAuthority, CookieError};
use crate::input::{EventBuilder, InputError, InputEvent, Validator, ValidatorStats};
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Attaches cookies to events that represent deliberate user action
#[derive(Debug)]
pub struct EventStamper {
    authority: Arc<CookieAuthority>,
    /// Event time of the most recent stamped event
    last_signed: Mutex<Option<u64>>,
}

impl EventStamper {
    pub fn new(authority: Arc<CookieAuthority>) -> Self {
        Self {
            authority,
            last_signed: Mutex::new(None),
        }
    }

    /// Stamp `event` if it is eligible. Returns whether a cookie was
    /// attached.
    pub fn stamp(&self, event: &mut InputEvent) -> bool {
        if !event.needs_cookie() {
            return false;
        }
        let Some(event_time) = event.event_time() else {
            return false;
        };

        let stamped = event.set_cookie(self.authority.make_cookie(event_time));
        if stamped {
            *self.last_signed.lock() = Some(event_time);
        }
        stamped
    }

    /// Event time of the latest signed event, if any
    pub fn latest_signed_timestamp(&self) -> Option<u64> {
        *self.last_signed.lock()
    }

    /// Check cookie bytes a client attached to a request and return the
    /// event time they vouch for.
    pub fn verify_client_cookie(&self, raw: &[u8]) -> Result<u64, CookieError> {
        let cookie = self.authority.verify_cookie(raw)?;
        debug!("🍪 Client cookie verified for event time {}", cookie.timestamp());
        Ok(cookie.timestamp())
    }

    pub fn authority(&self) -> &Arc<CookieAuthority> {
        &self.authority
    }
}

/// Validator, stamper and sink assembled for one seat
pub struct InputPipeline {
    validator: Validator,
    stamper: Arc<EventStamper>,
    /// Present when malformed touch frames should be dropped here
    revalidator: Option<EventBuilder>,
    dropped: AtomicU64,
}

impl InputPipeline {
    pub fn new<F>(authority: Arc<CookieAuthority>, config: &InputConfig, sink: F) -> Self
    where
        F: Fn(InputEvent) + Send + Sync + 'static,
    {
        let stamper = Arc::new(EventStamper::new(authority));
        let stage = stamper.clone();
        let validator = Validator::new(move |mut event| {
            stage.stamp(&mut event);
            sink(event);
        });

        let revalidator = config
            .revalidate_touch_events
            .then(|| EventBuilder::new(config));

        Self {
            validator,
            stamper,
            revalidator,
            dropped: AtomicU64::new(0),
        }
    }

    /// Feed one event from the translator. Only fails when revalidation is
    /// enabled and the event is a malformed touch frame, which is dropped.
    pub fn dispatch(&self, event: InputEvent) -> Result<(), InputError> {
        if let (Some(builder), Some(touch)) = (&self.revalidator, event.as_touch()) {
            if let Err(e) = builder.check_touch_event(touch) {
                warn!(
                    "👆 Dropping malformed touch event from device {}: {}",
                    touch.device_id, e
                );
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        }

        self.validator.validate_and_dispatch(event);
        Ok(())
    }

    pub fn stamper(&self) -> &Arc<EventStamper> {
        &self.stamper
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn validator_stats(&self) -> ValidatorStats {
        self.validator.stats()
    }

    /// Touch frames rejected by revalidation
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{
        KeyAction, KeyEvent, PointerAction, PointerEvent, TouchAction, TouchEvent, TouchPoint,
    };
    use std::sync::Mutex as StdMutex;

    fn authority() -> Arc<CookieAuthority> {
        Arc::new(CookieAuthority::create_from(b"seat-test-secret").unwrap())
    }

    fn pipeline(config: &InputConfig) -> (InputPipeline, Arc<StdMutex<Vec<InputEvent>>>) {
        let sink = Arc::new(StdMutex::new(Vec::new()));
        let captured = sink.clone();
        let pipeline = InputPipeline::new(authority(), config, move |ev| {
            captured.lock().unwrap().push(ev)
        });
        (pipeline, sink)
    }

    fn motion(event_time: u64) -> InputEvent {
        InputEvent::Pointer(PointerEvent {
            device_id: 1,
            event_time,
            modifiers: 0,
            action: PointerAction::Motion,
            buttons: 0,
            x: 1.0,
            y: 1.0,
            hscroll: 0.0,
            vscroll: 0.0,
            relative_x: 0.0,
            relative_y: 0.0,
            cookie: None,
        })
    }

    #[test]
    fn test_stamper_only_signs_eligible_events() {
        let stamper = EventStamper::new(authority());

        let mut ev = motion(5);
        assert!(!stamper.stamp(&mut ev));
        assert!(ev.cookie().is_none());
        assert_eq!(stamper.latest_signed_timestamp(), None);

        let mut key = InputEvent::Key(KeyEvent {
            device_id: 1,
            event_time: 77,
            modifiers: 0,
            action: KeyAction::Down,
            key_code: 0x61,
            scan_code: 30,
            cookie: None,
        });
        assert!(stamper.stamp(&mut key));
        assert_eq!(key.cookie().map(|c| c.timestamp()), Some(77));
        assert_eq!(stamper.latest_signed_timestamp(), Some(77));

        let mut resync = InputEvent::KeyboardResync;
        assert!(!stamper.stamp(&mut resync));
    }

    #[test]
    fn test_stamped_cookie_verifies() {
        let stamper = EventStamper::new(authority());
        let mut touch: InputEvent = TouchEvent::new(0, 1234)
            .with_point(TouchPoint::new(0, TouchAction::Down))
            .into();
        assert!(stamper.stamp(&mut touch));

        let raw = touch.cookie().unwrap().serialize();
        assert_eq!(stamper.verify_client_cookie(&raw).unwrap(), 1234);

        let mut forged = raw;
        forged[20] ^= 0xFF;
        assert!(stamper
            .verify_client_cookie(&forged)
            .unwrap_err()
            .is_security_failure());
    }

    #[test]
    fn test_pipeline_stamps_synthetic_frames() {
        let (pipeline, sink) = pipeline(&InputConfig::default());
        pipeline
            .dispatch(
                TouchEvent::new(0, 500)
                    .with_point(TouchPoint::new(3, TouchAction::Change))
                    .into(),
            )
            .unwrap();

        let events = sink.lock().unwrap();
        assert_eq!(events.len(), 2);
        // Synthetic down carries a cookie, the plain change does not.
        assert_eq!(events[0].cookie().map(|c| c.timestamp()), Some(500));
        assert!(events[1].cookie().is_none());
        assert_eq!(pipeline.validator_stats().downs_inserted, 1);
    }

    #[test]
    fn test_pipeline_trusts_producer_by_default() {
        let (pipeline, sink) = pipeline(&InputConfig::default());
        let dup = TouchEvent::new(0, 1)
            .with_point(TouchPoint::new(1, TouchAction::Down))
            .with_point(TouchPoint::new(1, TouchAction::Down));

        assert!(pipeline.dispatch(dup.into()).is_ok());
        assert_eq!(sink.lock().unwrap().len(), 1);
        assert_eq!(pipeline.dropped_events(), 0);
    }

    #[test]
    fn test_pipeline_revalidation_drops_malformed_frames() {
        let config = InputConfig {
            revalidate_touch_events: true,
            ..InputConfig::default()
        };
        let (pipeline, sink) = pipeline(&config);

        let dup = TouchEvent::new(0, 1)
            .with_point(TouchPoint::new(1, TouchAction::Down))
            .with_point(TouchPoint::new(1, TouchAction::Down));
        assert_eq!(
            pipeline.dispatch(dup.into()),
            Err(InputError::DuplicateTouchId(1))
        );

        let out_of_range = TouchEvent::new(0, 2).with_point(TouchPoint::new(40, TouchAction::Down));
        assert!(pipeline.dispatch(out_of_range.into()).is_err());

        // Non-touch events are never rejected.
        assert!(pipeline.dispatch(motion(3)).is_ok());

        assert_eq!(sink.lock().unwrap().len(), 1);
        assert_eq!(pipeline.dropped_events(), 2);
        assert_eq!(pipeline.validator().tracked_devices(), 0);
    }
}
