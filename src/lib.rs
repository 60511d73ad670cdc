//! # Seatguard
//!
//! Input trust primitives for a Wayland compositor seat.
//!
//! ## Architecture
//!
//! Seatguard is built from a few small modules:
//! - `input`: Typed input events, the translator-side event builder, and the
//!   touch stream validator that repairs lost downs and ups per device
//! - `cookie`: HMAC-SHA1 event cookies that let clients prove a request
//!   follows real user input
//! - `seat`: The pipeline that repairs, stamps and delivers events
//! - `config`: Configuration parsing and management
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use seatguard::{CookieAuthority, InputPipeline, SeatGuardConfig};
//! use seatguard::input::{TouchAction, TouchEvent, TouchPoint};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = SeatGuardConfig::default();
//!     let authority = Arc::new(CookieAuthority::create()?);
//!     let pipeline = InputPipeline::new(authority, &config.input, |event| {
//!         println!("{:?}", event);
//!     });
//!
//!     let frame = TouchEvent::new(0, 1_000).with_point(TouchPoint::new(0, TouchAction::Change));
//!     pipeline.dispatch(frame.into())?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod cookie;
pub mod input;
pub mod seat;

// Re-export main types for easy access
pub use config::SeatGuardConfig;
pub use cookie::{Cookie, CookieAuthority, CookieError};
pub use input::{EventBuilder, InputEvent, Validator};
pub use seat::{EventStamper, InputPipeline};

// Re-export common error types
pub use anyhow::{Context, Error, Result};

/// Version information for Seatguard
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
