//! Event cookies
//!
//! A cookie binds an input event timestamp to a MAC computed with a secret
//! only the compositor knows. Clients receive cookies alongside high-trust
//! input events (key presses, button clicks, touch down/up) and hand them
//! back when requesting something that needs proof of recent user input,
//! such as focus activation. The compositor verifies the cookie before
//! honoring the request.
//!
//! # Wire format
//!
//! ```text
//! ┌────────┬──────────────────────┬──────────────────────────────┐
//! │ format │ timestamp (u64, LE)  │ HMAC-SHA1 digest (20 bytes)  │
//! │ 1 byte │ 8 bytes              │                              │
//! └────────┴──────────────────────┴──────────────────────────────┘
//!   0        1..9                   9..29
//! ```

mod authority;
mod entropy;

pub use authority::CookieAuthority;
pub use entropy::EntropySource;

use serde::{Serialize, Serializer};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Length of the MAC carried by a cookie
pub const MAC_SIZE: usize = 20;

/// Length of a serialized cookie
pub const COOKIE_SIZE: usize = 1 + 8 + MAC_SIZE;

const TIMESTAMP_RANGE: std::ops::Range<usize> = 1..9;
const MAC_RANGE: std::ops::Range<usize> = 9..COOKIE_SIZE;

/// MAC construction used by a cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CookieFormat {
    /// HMAC-SHA1 over the little-endian timestamp
    HmacSha1_8 = 0,
}

impl CookieFormat {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CookieFormat::HmacSha1_8),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// An authenticated event timestamp.
///
/// Cookies are only produced by [`CookieAuthority`], either freshly from a
/// timestamp or by verifying serialized bytes, so holding one means its MAC
/// matched the authority's secret at the time it was made.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Cookie {
    format: CookieFormat,
    timestamp: u64,
    mac: [u8; MAC_SIZE],
}

impl Cookie {
    pub(crate) fn new(format: CookieFormat, timestamp: u64, mac: [u8; MAC_SIZE]) -> Self {
        Self {
            format,
            timestamp,
            mac,
        }
    }

    pub fn format(&self) -> CookieFormat {
        self.format
    }

    /// Event time the cookie was issued for, in nanoseconds
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn mac(&self) -> &[u8; MAC_SIZE] {
        &self.mac
    }

    /// Serialize into the fixed 29 byte layout
    pub fn serialize(&self) -> [u8; COOKIE_SIZE] {
        let mut out = [0u8; COOKIE_SIZE];
        out[0] = self.format.tag();
        out[TIMESTAMP_RANGE].copy_from_slice(&self.timestamp.to_le_bytes());
        out[MAC_RANGE].copy_from_slice(&self.mac);
        out
    }

    /// Lowercase hex of the serialized form
    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Split raw bytes into their fields without checking the MAC.
    pub(crate) fn parse_unverified(raw: &[u8]) -> Result<(CookieFormat, u64, [u8; MAC_SIZE]), CookieError> {
        if raw.len() != COOKIE_SIZE {
            return Err(SecurityCheckFailure::WrongLength { actual: raw.len() }.into());
        }

        let format = CookieFormat::from_tag(raw[0])
            .ok_or(SecurityCheckFailure::UnknownFormat(raw[0]))?;

        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&raw[TIMESTAMP_RANGE]);

        let mut mac = [0u8; MAC_SIZE];
        mac.copy_from_slice(&raw[MAC_RANGE]);

        Ok((format, u64::from_le_bytes(timestamp), mac))
    }
}

// The MAC stays out of logs.
impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("format", &self.format)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

// Hex of the wire bytes. No Deserialize: cookies only come from an authority.
impl Serialize for Cookie {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Why a cookie was not trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityCheckFailure {
    WrongLength { actual: usize },
    UnknownFormat(u8),
    MacMismatch,
}

impl fmt::Display for SecurityCheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityCheckFailure::WrongLength { actual } => write!(
                f,
                "cookie is {} bytes, expected {}",
                actual, COOKIE_SIZE
            ),
            SecurityCheckFailure::UnknownFormat(tag) => {
                write!(f, "unknown cookie format tag {}", tag)
            }
            SecurityCheckFailure::MacMismatch => write!(f, "cookie MAC does not match"),
        }
    }
}

/// Errors raised while creating authorities or checking cookies
#[derive(Debug, Error)]
pub enum CookieError {
    /// The caller supplied a secret below the minimum size.
    #[error("secret is {actual} bytes, at least {minimum} are required")]
    SecretTooSmall { actual: usize, minimum: usize },

    /// A cookie failed verification and must not be trusted.
    #[error("cookie failed security check: {0}")]
    SecurityCheck(SecurityCheckFailure),

    /// The random device could not be opened, polled or read.
    #[error("entropy source {}: {source}", path.display())]
    EntropySource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The kernel did not report available entropy in time.
    #[error("no entropy became available within {0:?}")]
    EntropyTimeout(Duration),
}

impl CookieError {
    /// True for verification failures, as opposed to setup failures.
    pub fn is_security_failure(&self) -> bool {
        matches!(self, CookieError::SecurityCheck(_))
    }
}

impl From<SecurityCheckFailure> for CookieError {
    fn from(failure: SecurityCheckFailure) -> Self {
        CookieError::SecurityCheck(failure)
    }
}
