//! Detached signature validation for config responses
//!
//! The response carries a compact JWS in the `Signature` header:
//! `base64url(header).base64url(claims).base64url(signature)`, signed with
//! Ed25519. The claims bind the token to an issuer, a validity window and a
//! digest of the response body.

use crate::error::VerificationError;
use anyhow::{Context, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Response header carrying the token
pub const SIGNATURE_HEADER: &str = "Signature";

/// Only algorithm accepted in the token header
const TOKEN_ALGORITHM: &str = "EdDSA";

/// Tolerated clock skew for `iat` in the future
const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Claims embedded in a config signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigClaims {
    pub iss: String,
    /// Issued-at, unix seconds
    pub iat: i64,
    /// Expiry, unix seconds
    pub exp: i64,
    /// Standard base64 digest of the response body
    #[serde(rename = "content-hash")]
    pub content_hash: String,
    #[serde(rename = "hash-alg")]
    pub hash_alg: String,
}

/// Validates config responses against a pinned public key
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    public_key: VerifyingKey,
    issuer: String,
}

impl SignatureVerifier {
    pub fn new(public_key: VerifyingKey, issuer: impl Into<String>) -> Self {
        Self {
            public_key,
            issuer: issuer.into(),
        }
    }

    /// Build a verifier from a hex-encoded 32-byte Ed25519 public key
    pub fn from_hex(public_key_hex: &str, issuer: impl Into<String>) -> Result<Self> {
        let bytes = hex::decode(public_key_hex.trim()).context("Public key is not valid hex")?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("Public key must be 32 bytes"))?;
        let public_key =
            VerifyingKey::from_bytes(&bytes).context("Public key is not a valid Ed25519 point")?;
        Ok(Self::new(public_key, issuer))
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify `body` against the token in `headers`, returning its claims
    pub fn verify(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<ConfigClaims, VerificationError> {
        let token = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(VerificationError::MissingSignature)?;

        let claims = self.verify_token(token)?;

        if claims.iss != self.issuer {
            return Err(VerificationError::InvalidSignature(format!(
                "unexpected issuer {}",
                claims.iss
            )));
        }

        let now_secs = now.timestamp();
        if now_secs > claims.exp || claims.iat > now_secs + MAX_CLOCK_SKEW_SECS {
            return Err(VerificationError::ExpiredClaim);
        }

        check_content_hash(&claims, body)?;

        Ok(claims)
    }

    /// Check structure, algorithm and signature; claims are returned unvalidated
    fn verify_token(&self, token: &str) -> Result<ConfigClaims, VerificationError> {
        let mut parts = token.split('.');
        let (header_b64, claims_b64, signature_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(c), Some(s), None) => (h, c, s),
                _ => return Err(invalid("token must have three segments")),
            };

        let header: TokenHeader = decode_segment(header_b64)?;
        if header.alg != TOKEN_ALGORITHM {
            return Err(invalid(&format!("unsupported algorithm {}", header.alg)));
        }

        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| invalid("signature is not base64url"))?;
        let signature =
            Signature::from_slice(&signature_bytes).map_err(|_| invalid("signature length"))?;

        let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
        self.public_key
            .verify_strict(signing_input.as_bytes(), &signature)
            .map_err(|_| invalid("signature does not match public key"))?;

        decode_segment(claims_b64)
    }
}

fn invalid(reason: &str) -> VerificationError {
    VerificationError::InvalidSignature(reason.to_string())
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, VerificationError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| invalid("segment is not base64url"))?;
    serde_json::from_slice(&bytes).map_err(|_| invalid("segment is not valid JSON"))
}

fn check_content_hash(claims: &ConfigClaims, body: &[u8]) -> Result<(), VerificationError> {
    match claims.hash_alg.to_ascii_lowercase().as_str() {
        "sha-256" | "sha256" => {}
        _ => return Err(VerificationError::ContentHashMismatch),
    }

    let declared = STANDARD
        .decode(claims.content_hash.trim())
        .map_err(|_| VerificationError::ContentHashMismatch)?;
    let actual = Sha256::digest(body);

    if declared.as_slice() != actual.as_slice() {
        return Err(VerificationError::ContentHashMismatch);
    }
    Ok(())
}

/// Standard base64 SHA-256 digest, as carried in `content-hash`
pub fn content_hash(body: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(body))
}

/// Server-side counterpart of `SignatureVerifier`
pub struct ConfigSigner {
    signing_key: SigningKey,
    issuer: String,
    validity: Duration,
}

impl ConfigSigner {
    pub fn new(secret_key: [u8; 32], issuer: impl Into<String>) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&secret_key),
            issuer: issuer.into(),
            validity: Duration::hours(48),
        }
    }

    /// Build a signer from a hex-encoded 32-byte Ed25519 secret key
    pub fn from_hex(secret_key_hex: &str, issuer: impl Into<String>) -> Result<Self> {
        let bytes = hex::decode(secret_key_hex.trim()).context("Secret key is not valid hex")?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("Secret key must be 32 bytes"))?;
        Ok(Self::new(bytes, issuer))
    }

    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key().as_bytes())
    }

    /// Sign `body` with claims issued at `issued_at`
    pub fn sign(&self, body: &[u8], issued_at: DateTime<Utc>) -> String {
        let claims = ConfigClaims {
            iss: self.issuer.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.validity).timestamp(),
            content_hash: content_hash(body),
            hash_alg: "sha-256".to_string(),
        };
        self.sign_claims(&claims)
    }

    /// Sign arbitrary claims
    pub fn sign_claims(&self, claims: &ConfigClaims) -> String {
        let header = TokenHeader {
            alg: TOKEN_ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };
        // Both structs only hold strings and integers
        let header_json = serde_json::to_vec(&header).unwrap_or_default();
        let claims_json = serde_json::to_vec(claims).unwrap_or_default();

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = self.signing_key.sign(signing_input.as_bytes());
        format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        )
    }
}
