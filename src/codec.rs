//! Timestamped, HMAC-signed tokens carrying a JSON payload.
//!
//! Layout: `base64url(json) "." base64url(timestamp) "." base64url(mac)`, all unpadded. The MAC
//! covers the textual `payload.timestamp` prefix, so editing either part invalidates the token.
//!
//! This is primarily useful for testing and debugging; the layer uses it internally.

use std::{borrow::Cow, fmt, sync::Arc};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Serialize, de::DeserializeOwned};
use sha2::Sha256;
use time::{Duration, OffsetDateTime};

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

const SEPARATOR: char = '.';

/// Salt used when none is given. Session and flash cookies use distinct salts.
pub const DEFAULT_SALT: &str = "mojito.session";

/// Signs and verifies tokens with a process-wide secret.
///
/// The secret is immutable once the signer is built, so clones can be shared freely across
/// concurrent requests.
#[derive(Clone)]
pub struct Signer {
    secret: Arc<[u8]>,
    salt: Cow<'static, str>,
    mac: HmacSha256,
}

impl Signer {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self::derive(Arc::from(secret.as_ref()), Cow::Borrowed(DEFAULT_SALT))
    }

    /// Returns a signer over the same secret whose tokens do not verify under any other salt.
    #[must_use]
    pub fn with_salt<S: Into<Cow<'static, str>>>(&self, salt: S) -> Self {
        Self::derive(self.secret.clone(), salt.into())
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    fn derive(secret: Arc<[u8]>, salt: Cow<'static, str>) -> Self {
        let mut derive = new_mac(&secret);
        derive.update(salt.as_bytes());
        let key = derive.finalize().into_bytes();

        Self {
            mac: new_mac(&key),
            secret,
            salt,
        }
    }

    /// Encode `payload` signed with the current time.
    pub fn encode<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String> {
        self.encode_at(payload, OffsetDateTime::now_utc())
    }

    /// Encode `payload` signed as of `at`.
    ///
    /// Fails with [`Error::TimestampOutOfRange`] when `at` is before the unix epoch.
    pub fn encode_at<T: Serialize + ?Sized>(
        &self,
        payload: &T,
        at: OffsetDateTime,
    ) -> Result<String> {
        let timestamp =
            u64::try_from(at.unix_timestamp()).map_err(|_| Error::TimestampOutOfRange(at))?;
        let json = serde_json::to_vec(payload)?;

        let mut token = URL_SAFE_NO_PAD.encode(json);
        token.push(SEPARATOR);
        token.push_str(&URL_SAFE_NO_PAD.encode(timestamp_bytes(timestamp)));

        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        let signature = mac.finalize().into_bytes();

        token.push(SEPARATOR);
        token.push_str(&URL_SAFE_NO_PAD.encode(signature));
        Ok(token)
    }

    /// Verify `token` and return its payload.
    ///
    /// `max_age` of `None` skips the age check.
    pub fn decode<T: DeserializeOwned>(
        &self,
        token: &str,
        max_age: Option<Duration>,
    ) -> Result<T> {
        self.decode_with_timestamp(token, max_age)
            .map(|(payload, _)| payload)
    }

    /// Like [`Signer::decode`], also returning the time the token was signed.
    pub fn decode_with_timestamp<T: DeserializeOwned>(
        &self,
        token: &str,
        max_age: Option<Duration>,
    ) -> Result<(T, OffsetDateTime)> {
        self.decode_at(token, max_age, OffsetDateTime::now_utc())
    }

    /// Verify `token` as if the current time were `now`.
    pub fn decode_at<T: DeserializeOwned>(
        &self,
        token: &str,
        max_age: Option<Duration>,
        now: OffsetDateTime,
    ) -> Result<(T, OffsetDateTime)> {
        let (signed, signature) = token
            .rsplit_once(SEPARATOR)
            .ok_or(Error::InvalidSignature)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| Error::InvalidSignature)?;

        let mut mac = self.mac.clone();
        mac.update(signed.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| Error::InvalidSignature)?;

        let (payload, timestamp) = signed
            .rsplit_once(SEPARATOR)
            .ok_or(Error::InvalidSignature)?;
        let timestamp = decode_timestamp(timestamp)?;

        if let Some(max_age) = max_age {
            let age = now - timestamp;
            if age > max_age {
                return Err(Error::Expired { age, max_age });
            }
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| Error::InvalidSignature)?;
        let payload = serde_json::from_slice(&json).map_err(|_| Error::InvalidSignature)?;

        Ok((payload, timestamp))
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("salt", &self.salt)
            .finish_non_exhaustive()
    }
}

// HMAC accepts keys of any length, so this cannot fail.
#[allow(clippy::expect_used)]
fn new_mac(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any size")
}

// Big-endian with leading zero bytes dropped.
fn timestamp_bytes(timestamp: u64) -> Vec<u8> {
    let bytes = timestamp.to_be_bytes();
    let first = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

fn decode_timestamp(encoded: &str) -> Result<OffsetDateTime> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| Error::InvalidSignature)?;
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(Error::InvalidSignature);
    }

    let timestamp = bytes
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    let timestamp = i64::try_from(timestamp).map_err(|_| Error::InvalidSignature)?;

    OffsetDateTime::from_unix_timestamp(timestamp).map_err(|_| Error::InvalidSignature)
}
