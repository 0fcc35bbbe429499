//! Webhook signature verification
//!
//! Signatures are hex HMAC-SHA256 over the raw body, or over
//! `timestamp + "." + body` when the sender supplies a timestamp. A leading
//! `sha256=` is accepted. Comparison is constant-time.

use hmac::{Hmac, Mac};
use hookgate_core::Timestamp;
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Why a signature was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// No secret is configured for the source
    #[error("no secret configured for source '{0}'")]
    UnknownSource(String),

    /// The request carried no signature
    #[error("signature missing")]
    Missing,

    /// The signature is not valid hex
    #[error("signature is not valid hex")]
    Malformed,

    /// The timestamp header is not an integer number of seconds
    #[error("timestamp '{0}' is not a unix time in seconds")]
    InvalidTimestamp(String),

    /// The timestamp is outside the accepted window
    #[error("timestamp is {skew_secs}s away from server time")]
    Stale { skew_secs: i64 },

    /// The signature does not match the payload
    #[error("signature mismatch")]
    Mismatch,
}

/// Per-source secrets plus the freshness window
#[derive(Clone)]
pub struct SignatureVerifier {
    secrets: HashMap<String, Vec<u8>>,
    tolerance: Option<Duration>,
}

impl SignatureVerifier {
    /// Creates a verifier with no sources and no freshness check
    pub fn new() -> Self {
        Self {
            secrets: HashMap::new(),
            tolerance: None,
        }
    }

    /// Registers the secret for `source`
    pub fn with_source(mut self, source: impl Into<String>, secret: impl AsRef<[u8]>) -> Self {
        self.secrets
            .insert(source.into(), secret.as_ref().to_vec());
        self
    }

    /// Rejects timestamped signatures further than `tolerance` from server time
    ///
    /// A zero tolerance disables the check.
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = if tolerance.is_zero() {
            None
        } else {
            Some(tolerance)
        };
        self
    }

    /// Returns true if a secret is configured for `source`
    pub fn knows_source(&self, source: &str) -> bool {
        self.secrets.contains_key(source)
    }

    /// Names of all configured sources
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.secrets.keys().map(String::as_str)
    }

    /// Verifies `signature` for `body` received from `source`
    pub fn verify(
        &self,
        source: &str,
        signature: Option<&str>,
        timestamp: Option<&str>,
        body: &[u8],
        now: Timestamp,
    ) -> Result<(), SignatureError> {
        let secret = self
            .secrets
            .get(source)
            .ok_or_else(|| SignatureError::UnknownSource(source.to_string()))?;

        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(SignatureError::Missing)?;
        let signature = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);
        let expected = hex::decode(signature).map_err(|_| SignatureError::Malformed)?;

        let timestamp = timestamp.map(str::trim).filter(|t| !t.is_empty());
        if let (Some(ts), Some(tolerance)) = (timestamp, self.tolerance) {
            let sent: i64 = ts
                .parse()
                .map_err(|_| SignatureError::InvalidTimestamp(ts.to_string()))?;
            let skew_secs = now.as_seconds() - sent;
            if skew_secs.unsigned_abs() > tolerance.as_secs() {
                return Err(SignatureError::Stale { skew_secs });
            }
        }

        keyed_mac(secret, timestamp, body)
            .map_err(|_| SignatureError::Mismatch)?
            .verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sources: Vec<&str> = self.sources().collect();
        sources.sort_unstable();
        f.debug_struct("SignatureVerifier")
            .field("sources", &sources)
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

fn keyed_mac(
    secret: &[u8],
    timestamp: Option<&str>,
    body: &[u8],
) -> Result<HmacSha256, hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret)?;
    if let Some(ts) = timestamp {
        mac.update(ts.as_bytes());
        mac.update(b".");
    }
    mac.update(body);
    Ok(mac)
}

/// Computes the hex signature a sender would attach
pub fn sign(secret: &[u8], timestamp: Option<&str>, body: &[u8]) -> String {
    keyed_mac(secret, timestamp, body)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new()
            .with_source("github", SECRET)
            .with_tolerance(Duration::from_secs(300))
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"id":1}"#;
        let sig = sign(SECRET.as_bytes(), None, body);
        assert!(verifier()
            .verify("github", Some(&sig), None, body, Timestamp::now())
            .is_ok());
    }

    #[test]
    fn test_prefixed_signature() {
        let body = b"{}";
        let sig = format!("sha256={}", sign(SECRET.as_bytes(), None, body));
        assert!(verifier()
            .verify("github", Some(&sig), None, body, Timestamp::now())
            .is_ok());
    }

    #[test]
    fn test_timestamp_is_part_of_message() {
        let now = Timestamp::now();
        let ts = now.as_seconds().to_string();
        let body = b"{}";

        let signed_with_ts = sign(SECRET.as_bytes(), Some(&ts), body);
        assert!(verifier()
            .verify("github", Some(&signed_with_ts), Some(&ts), body, now)
            .is_ok());

        let signed_without_ts = sign(SECRET.as_bytes(), None, body);
        assert_eq!(
            verifier().verify("github", Some(&signed_without_ts), Some(&ts), body, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let now = Timestamp::from_millis(1_700_000_000_000);
        let ts = (now.as_seconds() - 301).to_string();
        let sig = sign(SECRET.as_bytes(), Some(&ts), b"{}");

        assert!(matches!(
            verifier().verify("github", Some(&sig), Some(&ts), b"{}", now),
            Err(SignatureError::Stale { skew_secs: 301 })
        ));
    }

    #[test]
    fn test_zero_tolerance_disables_freshness() {
        let now = Timestamp::from_millis(1_700_000_000_000);
        let ts = "1000".to_string();
        let sig = sign(SECRET.as_bytes(), Some(&ts), b"{}");
        let verifier = verifier().with_tolerance(Duration::ZERO);

        assert!(verifier.verify("github", Some(&sig), Some(&ts), b"{}", now).is_ok());
    }

    #[test]
    fn test_failures() {
        let v = verifier();
        let now = Timestamp::now();

        assert_eq!(
            v.verify("stripe", Some("aa"), None, b"{}", now),
            Err(SignatureError::UnknownSource("stripe".to_string()))
        );
        assert_eq!(
            v.verify("github", None, None, b"{}", now),
            Err(SignatureError::Missing)
        );
        assert_eq!(
            v.verify("github", Some("  "), None, b"{}", now),
            Err(SignatureError::Missing)
        );
        assert_eq!(
            v.verify("github", Some("not-hex"), None, b"{}", now),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            v.verify("github", Some("abcd"), None, b"{}", now),
            Err(SignatureError::Mismatch)
        );
        assert!(matches!(
            v.verify("github", Some("abcd"), Some("yesterday"), b"{}", now),
            Err(SignatureError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let sig = sign(SECRET.as_bytes(), None, br#"{"amount":1}"#);
        assert_eq!(
            verifier().verify("github", Some(&sig), None, br#"{"amount":100}"#, Timestamp::now()),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let debug = format!("{:?}", verifier());
        assert!(debug.contains("github"));
        assert!(!debug.contains(SECRET));
    }
}
