//! Cookie authority: issues and verifies event cookies

use super::{
    Cookie, CookieError, CookieFormat, EntropySource, SecurityCheckFailure, MAC_SIZE,
};
use hmac::{Hmac, Mac};
use log::{info, warn};
use sha1::Sha1;
use std::fmt;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

/// Issues cookies for event timestamps and verifies cookies handed back by
/// clients.
///
/// The secret is absorbed into a keyed HMAC state at construction. Each
/// cookie is computed on a clone of that state, so concurrent callers never
/// share digest state and `&self` is all any operation needs.
#[derive(Clone)]
pub struct CookieAuthority {
    keyed: HmacSha1,
}

impl CookieAuthority {
    /// Smallest secret accepted by [`CookieAuthority::create_from`]
    pub const fn minimum_secret_size() -> usize {
        8
    }

    /// HMAC-SHA1 block size; shorter secrets are zero padded, longer ones
    /// are hashed down by the HMAC key schedule.
    pub const fn optimal_secret_size() -> usize {
        64
    }

    /// Build an authority around a caller supplied secret.
    pub fn create_from(secret: &[u8]) -> Result<Self, CookieError> {
        if secret.len() < Self::minimum_secret_size() {
            return Err(CookieError::SecretTooSmall {
                actual: secret.len(),
                minimum: Self::minimum_secret_size(),
            });
        }

        // HMAC accepts keys of any length; this never fails in practice.
        let keyed = HmacSha1::new_from_slice(secret).map_err(|_| CookieError::SecretTooSmall {
            actual: secret.len(),
            minimum: Self::minimum_secret_size(),
        })?;

        info!("🍪 Cookie authority created ({} byte secret)", secret.len());
        Ok(Self { keyed })
    }

    /// Generate a fresh secret and return it alongside the authority, so it
    /// can be handed to a verifying peer.
    pub fn create_saving() -> Result<(Self, Vec<u8>), CookieError> {
        Self::create_saving_with(&EntropySource::default())
    }

    /// [`CookieAuthority::create_saving`] with an explicit entropy source.
    pub fn create_saving_with(source: &EntropySource) -> Result<(Self, Vec<u8>), CookieError> {
        let secret = source.fill(Self::optimal_secret_size())?;
        let authority = Self::create_from(&secret)?;
        Ok((authority, secret))
    }

    /// Generate a secret that nothing outside this authority ever sees.
    pub fn create() -> Result<Self, CookieError> {
        Self::create_with(&EntropySource::default())
    }

    pub fn create_with(source: &EntropySource) -> Result<Self, CookieError> {
        Self::create_saving_with(source).map(|(authority, _secret)| authority)
    }

    /// Issue a cookie for `timestamp`.
    pub fn make_cookie(&self, timestamp: u64) -> Cookie {
        Cookie::new(CookieFormat::HmacSha1_8, timestamp, self.mac_for(timestamp))
    }

    /// Parse and verify a serialized cookie.
    ///
    /// Fails with [`CookieError::SecurityCheck`] when the length or format
    /// tag is wrong or the MAC was not produced with this authority's secret.
    pub fn verify_cookie(&self, raw: &[u8]) -> Result<Cookie, CookieError> {
        let (format, timestamp, mac) = Cookie::parse_unverified(raw).map_err(|e| {
            warn!("🍪 Rejected cookie: {}", e);
            e
        })?;

        let expected = self.mac_for(timestamp);
        if !bool::from(expected[..].ct_eq(&mac[..])) {
            warn!("🍪 Rejected cookie: MAC mismatch");
            return Err(SecurityCheckFailure::MacMismatch.into());
        }

        Ok(Cookie::new(format, timestamp, mac))
    }

    fn mac_for(&self, timestamp: u64) -> [u8; MAC_SIZE] {
        let mut mac = self.keyed.clone();
        mac.update(&timestamp.to_le_bytes());
        let digest = mac.finalize().into_bytes();

        let mut out = [0u8; MAC_SIZE];
        out.copy_from_slice(&digest);
        out
    }
}

impl fmt::Debug for CookieAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieAuthority").finish_non_exhaustive()
    }
}
