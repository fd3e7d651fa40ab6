use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use hm_relay_util::SignatureMode;

type HmacSha256 = Hmac<Sha256>;

/// Text encoding a platform uses for its HMAC-SHA256 signature header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureEncoding {
    Hex,
    Base64,
}

impl SignatureEncoding {
    fn encode(self, digest: &[u8]) -> String {
        match self {
            Self::Hex => hex::encode(digest),
            Self::Base64 => STANDARD.encode(digest),
        }
    }

    fn decode(self, value: &str) -> Option<Vec<u8>> {
        match self {
            Self::Hex => hex::decode(value).ok(),
            Self::Base64 => STANDARD.decode(value).ok(),
        }
    }
}

/// Result of checking one webhook body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Checks are disabled (development).
    Skipped,
    Valid,
    MissingHeader,
    Mismatch,
}

impl Verification {
    pub fn is_failure(self) -> bool {
        matches!(self, Self::MissingHeader | Self::Mismatch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Valid => "valid",
            Self::MissingHeader => "missing_header",
            Self::Mismatch => "mismatch",
        }
    }
}

/// HMAC-SHA256 verifier for one webhook source.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Arc<[u8]>,
    header: &'static str,
    encoding: SignatureEncoding,
    mode: SignatureMode,
    enabled: bool,
}

impl SignatureVerifier {
    pub fn new(
        secret: impl AsRef<[u8]>,
        header: &'static str,
        encoding: SignatureEncoding,
        mode: SignatureMode,
        enabled: bool,
    ) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
            header,
            encoding,
            mode,
            enabled,
        }
    }

    pub fn header(&self) -> &'static str {
        self.header
    }

    pub fn mode(&self) -> SignatureMode {
        self.mode
    }

    /// Whether a failed check must stop the request.
    pub fn rejects(&self, outcome: Verification) -> bool {
        outcome.is_failure() && self.mode == SignatureMode::Strict
    }

    /// Signature the sender is expected to put in the header for `body`.
    pub fn sign(&self, body: &str) -> String {
        self.digest(body)
            .map(|digest| self.encoding.encode(&digest))
            .unwrap_or_default()
    }

    /// Checks `provided` against the HMAC of the raw `body` text.
    pub fn verify(&self, body: &str, provided: Option<&str>) -> Verification {
        if !self.enabled {
            return Verification::Skipped;
        }
        let Some(provided) = provided.map(str::trim).filter(|value| !value.is_empty()) else {
            return Verification::MissingHeader;
        };
        let Some(provided_bytes) = self.encoding.decode(provided) else {
            return Verification::Mismatch;
        };

        let Some(expected) = self.digest(body) else {
            return Verification::Mismatch;
        };
        if expected.as_slice().ct_eq(provided_bytes.as_slice()).into() {
            Verification::Valid
        } else {
            Verification::Mismatch
        }
    }

    fn digest(&self, body: &str) -> Option<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(body.as_bytes());
        Some(mac.finalize().into_bytes().to_vec())
    }
}
