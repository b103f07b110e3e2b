//! Webhook signature schemes.
//!
//! Every check runs over the raw request bytes exactly as received. The
//! body must not be parsed before it has been authenticated.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

use super::WebhookError;

/// Parsed `t=<unix-ts>,v1=<hex>[,v1=<hex>...]` header.
///
/// Several `v1` entries appear while a signing secret is being rolled; any
/// one of them matching is enough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part.trim().split_once('=').ok_or_else(|| {
                WebhookError::MalformedSignatureHeader("invalid header format".to_string())
            })?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::MalformedSignatureHeader("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    let bytes = hex::decode(value).map_err(|_| {
                        WebhookError::MalformedSignatureHeader("invalid v1 signature hex".to_string())
                    })?;
                    signatures.push(bytes);
                }
                // v0 and unknown schemes are ignored
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            WebhookError::MalformedSignatureHeader("missing timestamp".to_string())
        })?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedSignatureHeader(
                "missing v1 signature".to_string(),
            ));
        }

        Ok(SignatureHeader {
            timestamp,
            signatures,
        })
    }
}

/// Rejects timestamps further than `tolerance` from `now`, in either
/// direction. Independent of whether the HMAC matches.
pub fn check_freshness(
    timestamp: i64,
    now: DateTime<Utc>,
    tolerance: Duration,
) -> Result<(), WebhookError> {
    // `timestamp` is unauthenticated; a drift that overflows is out of range.
    let drift = now.timestamp().checked_sub(timestamp);
    let fresh = drift.is_some_and(|d| d.unsigned_abs() <= tolerance.num_seconds().unsigned_abs());
    if !fresh {
        tracing::warn!(
            security = true,
            timestamp,
            drift_secs = ?drift,
            "webhook timestamp outside freshness window"
        );
        return Err(WebhookError::TimestampOutOfRange);
    }
    Ok(())
}

/// HMAC-SHA256 over `"{t}.{raw body}"`.
pub fn compute_timestamped_signature(secret: &[u8], timestamp: i64, body: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("HMAC accepts any key");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

/// Full check of a timestamped signature header against the raw body.
pub fn verify_timestamped_signature(
    secret: &[u8],
    header: &str,
    body: &[u8],
    now: DateTime<Utc>,
    tolerance: Duration,
) -> Result<(), WebhookError> {
    let header = SignatureHeader::parse(header)?;
    check_freshness(header.timestamp, now, tolerance)?;

    let expected = compute_timestamped_signature(secret, header.timestamp, body);
    if header
        .signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature)
    }
}

/// Lowercase hex HMAC-SHA512, as sent by crypto payment processors.
pub fn hmac_sha512_hex(secret: &[u8], message: &[u8]) -> String {
    let mut mac = Hmac::<Sha512>::new_from_slice(secret).expect("HMAC accepts any key");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Compares a provided hex HMAC-SHA512 against the message.
pub fn verify_hmac_sha512_hex(
    secret: &[u8],
    message: &[u8],
    provided_hex: &str,
) -> Result<(), WebhookError> {
    let provided = hex::decode(provided_hex.trim().to_ascii_lowercase())
        .map_err(|_| WebhookError::MalformedSignatureHeader("signature is not hex".to_string()))?;

    let mut mac = Hmac::<Sha512>::new_from_slice(secret).expect("HMAC accepts any key");
    mac.update(message);
    let expected = mac.finalize().into_bytes();

    if constant_time_compare(&expected, &provided) {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature)
    }
}

/// Constant-time comparison; length mismatch short-circuits since lengths
/// are public.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Builds a valid `t=..,v1=..` header for test fixtures.
#[cfg(test)]
pub fn sign_for_test(secret: &str, timestamp: i64, body: &[u8]) -> String {
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(compute_timestamped_signature(secret.as_bytes(), timestamp, body))
    )
}
