use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use hmac::{Hmac, Mac};
use http::Request;
use sha2::Sha256;

use crate::adapter::single_header;
use crate::error::SignatureError;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Default signature header for directly signed requests.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Default timestamp header for directly signed requests.
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";

/// Current secret plus an optional next one, so signatures made with
/// either verify while a rotation is in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningSecrets {
    pub current: Vec<u8>,
    pub next: Option<Vec<u8>>,
}

impl SigningSecrets {
    pub fn new(current: impl Into<Vec<u8>>) -> Self {
        Self {
            current: current.into(),
            next: None,
        }
    }

    pub fn with_next(mut self, next: impl Into<Vec<u8>>) -> Self {
        self.next = Some(next.into());
        self
    }

    fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        std::iter::once(self.current.as_slice()).chain(self.next.as_deref())
    }
}

pub(crate) fn mac(secret: &[u8]) -> Option<HmacSha256> {
    HmacSha256::new_from_slice(secret).ok()
}

/// Hex HMAC-SHA256 over `timestamp || payload`.
pub fn compute_signature(secret: &[u8], payload: &[u8], timestamp: &str) -> String {
    let Some(mut mac) = mac(secret) else {
        return String::new();
    };
    mac.update(timestamp.as_bytes());
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature.
pub fn verify_signature(secret: &[u8], payload: &[u8], timestamp: &str, signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Some(mut mac) = mac(secret) else {
        return false;
    };
    mac.update(timestamp.as_bytes());
    mac.update(payload);
    mac.verify_slice(&signature).is_ok()
}

/// Whether `timestamp_secs` lies within `max_age_secs` of `now_secs`.
/// Timestamps from the future are rejected.
pub fn is_timestamp_fresh(timestamp_secs: u64, now_secs: u64, max_age_secs: u64) -> bool {
    if now_secs >= timestamp_secs {
        now_secs - timestamp_secs <= max_age_secs
    } else {
        false
    }
}

/// Header names and freshness window for directly signed requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureScheme {
    pub signature_header: String,
    pub timestamp_header: String,
    pub max_age_secs: u64,
}

impl Default for SignatureScheme {
    fn default() -> Self {
        Self {
            signature_header: SIGNATURE_HEADER.to_string(),
            timestamp_header: TIMESTAMP_HEADER.to_string(),
            max_age_secs: 300,
        }
    }
}

/// Verify a signed request against every secret in rotation.
///
/// The signature covers the exact body bytes, not a decoded form.
pub fn verify_signed_request(
    request: &Request<Bytes>,
    secrets: &SigningSecrets,
    scheme: &SignatureScheme,
    now_secs: u64,
) -> Result<(), SignatureError> {
    let signature = single_header(request, &scheme.signature_header)
        .map_err(|_| SignatureError::Malformed)?
        .ok_or(SignatureError::Missing)?;
    let timestamp_str = single_header(request, &scheme.timestamp_header)
        .map_err(|_| SignatureError::InvalidTimestamp)?
        .ok_or(SignatureError::MissingTimestamp)?;
    let timestamp = timestamp_str
        .parse::<u64>()
        .map_err(|_| SignatureError::InvalidTimestamp)?;

    if !is_timestamp_fresh(timestamp, now_secs, scheme.max_age_secs) {
        return Err(SignatureError::StaleTimestamp);
    }

    let valid = secrets
        .iter()
        .any(|secret| verify_signature(secret, request.body(), timestamp_str, signature));

    if valid {
        Ok(())
    } else {
        Err(SignatureError::Invalid)
    }
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
