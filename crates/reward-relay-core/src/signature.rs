//! Inbound webhook signature verification.
//!
//! The provider signs every delivery with an HMAC over the raw payload bytes,
//! keyed by the per-organization shared secret. Verification must run on the
//! exact bytes received: JSON re-serialization is not byte-stable, so the
//! payload is never parsed before the signature has been checked.

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Digest algorithm used for the signature header.
///
/// The provider's organization hooks default to HMAC-SHA1 (`sha1=` prefix);
/// SHA-256 (`sha256=` prefix) is accepted for deployments that enabled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureScheme {
    #[default]
    Sha1,
    Sha256,
}

impl SignatureScheme {
    /// Prefix carried by the signature header for this scheme.
    pub fn prefix(&self) -> &'static str {
        match self {
            SignatureScheme::Sha1 => "sha1=",
            SignatureScheme::Sha256 => "sha256=",
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureScheme::Sha1 => f.write_str("sha1"),
            SignatureScheme::Sha256 => f.write_str("sha256"),
        }
    }
}

impl FromStr for SignatureScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(SignatureScheme::Sha1),
            "sha256" => Ok(SignatureScheme::Sha256),
            other => Err(format!("unknown signature scheme '{other}'")),
        }
    }
}

/// Verifies inbound payload signatures against a shared secret.
///
/// `verify` never errors: any malformed, missing, or mismatching input is an
/// invalid signature, and an invalid signature rejects the delivery before
/// any classification or side effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier {
    scheme: SignatureScheme,
}

impl SignatureVerifier {
    pub fn new(scheme: SignatureScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// Check `signature` against the HMAC of `payload` keyed by `secret`.
    ///
    /// Returns `false` when the secret or signature is empty, when the header
    /// prefix does not match the configured scheme, when the hex portion does
    /// not decode, or when the digests differ. The digest comparison is
    /// constant-time.
    pub fn verify(&self, secret: &str, payload: &[u8], signature: &str) -> bool {
        if secret.is_empty() || signature.is_empty() {
            return false;
        }

        let Some(hex_digest) = signature.strip_prefix(self.scheme.prefix()) else {
            return false;
        };
        let Ok(provided) = hex::decode(hex_digest) else {
            return false;
        };

        let Some(expected) = compute_digest(self.scheme, secret.as_bytes(), payload) else {
            return false;
        };

        constant_time_compare(&provided, &expected)
    }

    /// Produce the signature header value this verifier would accept.
    ///
    /// Test fixtures and loopback checks use this; the ingestion path only
    /// ever verifies.
    pub fn sign(&self, secret: &str, payload: &[u8]) -> String {
        let digest = compute_digest(self.scheme, secret.as_bytes(), payload).unwrap_or_default();
        format!("{}{}", self.scheme.prefix(), hex::encode(digest))
    }
}

// HMAC accepts keys of any length, so the Option is never None in practice;
// verify treats it as a mismatch rather than panicking.
fn compute_digest(scheme: SignatureScheme, secret: &[u8], payload: &[u8]) -> Option<Vec<u8>> {
    match scheme {
        SignatureScheme::Sha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(secret).ok()?;
            mac.update(payload);
            Some(mac.finalize().into_bytes().to_vec())
        }
        SignatureScheme::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(secret).ok()?;
            mac.update(payload);
            Some(mac.finalize().into_bytes().to_vec())
        }
    }
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    // Length is public information; only the contents need constant time.
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
