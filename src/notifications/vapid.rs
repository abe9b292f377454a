//! VAPID key handling for Web Push (RFC 8292).
//!
//! The relay signs every delivery with a single P-256 ECDSA keypair supplied
//! through configuration. `generate-keys` produces a fresh pair for operators;
//! at startup the configured pair is validated here before any request is served.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::rand_core::OsRng;

/// VAPID keypair for web push authentication.
///
/// The private key is a P-256 ECDSA signing key stored as the raw 32-byte
/// scalar (base64url). The public key is the uncompressed SEC1 point (65 bytes).
///
/// The raw scalar is what `web_push::VapidSignatureBuilder::from_base64()`
/// expects, so it is handed to the delivery path unchanged.
#[derive(Clone, PartialEq, Eq)]
pub struct VapidKeys {
    /// Raw 32-byte P-256 private key scalar (base64url).
    private_key_b64: String,
    /// Uncompressed public key bytes (base64url, 65 bytes decoded).
    public_key_b64: String,
}

impl std::fmt::Debug for VapidKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidKeys")
            .field("public_key_b64", &self.public_key_b64)
            .field("private_key_b64", &"<redacted>")
            .finish()
    }
}

impl VapidKeys {
    /// Generate a fresh VAPID keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        // SEC1 uncompressed public key (65 bytes: 0x04 || x || y)
        let public_bytes = verifying_key.to_encoded_point(false);
        let public_key_b64 = BASE64URL.encode(public_bytes.as_bytes());

        let private_key_b64 = BASE64URL.encode(signing_key.to_bytes().as_slice());

        Self {
            private_key_b64,
            public_key_b64,
        }
    }

    /// Base64url-encoded uncompressed public key (65 bytes decoded).
    ///
    /// Served to browsers as the `applicationServerKey`.
    pub fn public_key_base64url(&self) -> &str {
        &self.public_key_b64
    }

    /// Base64url-encoded raw 32-byte private key scalar.
    pub fn private_key_base64url(&self) -> &str {
        &self.private_key_b64
    }

    /// Reconstruct from base64url-encoded strings.
    ///
    /// Validates the public key format, the private key scalar, and that the
    /// two halves actually belong together.
    pub fn from_base64url(public_key_b64: &str, private_key_b64: &str) -> Result<Self> {
        let public_key_b64 = public_key_b64.trim();
        let private_key_b64 = private_key_b64.trim();

        let pub_bytes = BASE64URL
            .decode(public_key_b64)
            .context("Invalid base64url for VAPID public key")?;
        anyhow::ensure!(
            pub_bytes.len() == 65 && pub_bytes[0] == 0x04,
            "VAPID public key must be 65-byte uncompressed P-256 point"
        );

        let priv_bytes = BASE64URL
            .decode(private_key_b64)
            .context("Invalid base64url for VAPID private key")?;
        anyhow::ensure!(
            priv_bytes.len() == 32,
            "VAPID private key must be 32-byte P-256 scalar, got {} bytes",
            priv_bytes.len()
        );
        let signing_key = SigningKey::from_bytes(priv_bytes.as_slice().into())
            .context("VAPID private key is not a valid P-256 scalar")?;

        let derived = signing_key.verifying_key().to_encoded_point(false);
        anyhow::ensure!(
            derived.as_bytes() == pub_bytes.as_slice(),
            "VAPID public key does not match private key"
        );

        Ok(Self {
            private_key_b64: private_key_b64.to_string(),
            public_key_b64: public_key_b64.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_vapid_keys() {
        let keys = VapidKeys::generate();

        let pub_bytes = BASE64URL
            .decode(keys.public_key_base64url())
            .expect("decode public key");
        assert_eq!(pub_bytes.len(), 65, "uncompressed P-256 public key is 65 bytes");
        assert_eq!(pub_bytes[0], 0x04, "uncompressed point starts with 0x04");

        let priv_bytes = BASE64URL
            .decode(keys.private_key_base64url())
            .expect("decode private key");
        assert_eq!(priv_bytes.len(), 32, "raw P-256 scalar is 32 bytes");
    }

    #[test]
    fn test_from_base64url_roundtrip() {
        let keys = VapidKeys::generate();
        let reconstructed =
            VapidKeys::from_base64url(keys.public_key_base64url(), keys.private_key_base64url())
                .expect("should reconstruct from base64url");

        assert_eq!(keys, reconstructed);
    }

    #[test]
    fn test_from_base64url_rejects_mismatched_halves() {
        let a = VapidKeys::generate();
        let b = VapidKeys::generate();
        let err = VapidKeys::from_base64url(a.public_key_base64url(), b.private_key_base64url())
            .expect_err("mismatched pair must be rejected");
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_from_base64url_rejects_invalid() {
        assert!(VapidKeys::from_base64url("not-valid-key", "also-bad").is_err());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let keys = VapidKeys::generate();
        let rendered = format!("{keys:?}");
        assert!(!rendered.contains(keys.private_key_base64url()));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_vapid_key_works_with_web_push_from_base64() {
        use web_push::{SubscriptionInfo, VapidSignatureBuilder};

        let keys = VapidKeys::generate();
        let sub = SubscriptionInfo::new(
            "https://push.example.com/test",
            "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            "AAAAAAAAAAAAAAAAAAAAAA",
        );
        let builder = VapidSignatureBuilder::from_base64(keys.private_key_base64url(), &sub);
        assert!(builder.is_ok(), "from_base64 should accept our raw key scalar");
    }
}
