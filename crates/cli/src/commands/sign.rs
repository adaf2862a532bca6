//! Offline signing and verification of config bodies

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use colored::Colorize;
use reqwest::header::{HeaderMap, HeaderValue};
use std::path::Path;
use sync_core::config_sync::{ConfigSigner, SignatureVerifier, SIGNATURE_HEADER};
use sync_core::RemoteConfig;

use crate::output::{print_info, print_json, print_success, OutputFormat};

/// Options for `syncctl sign`
pub struct SignOptions<'a> {
    pub secret_key_hex: &'a str,
    pub issuer: &'a str,
    pub body_file: &'a Path,
    pub issued_at: Option<DateTime<Utc>>,
    pub validity_hours: i64,
}

fn read_config_body(path: &Path) -> Result<(Vec<u8>, RemoteConfig)> {
    let body = std::fs::read(path)
        .with_context(|| format!("Failed to read config body from {}", path.display()))?;
    let config = RemoteConfig::from_slice(&body).context("Config body does not parse")?;
    Ok((body, config))
}

/// Produce the `Signature` header value for a config body
pub fn sign_body(options: &SignOptions<'_>) -> Result<String> {
    let (body, _) = read_config_body(options.body_file)?;
    let signer = ConfigSigner::from_hex(options.secret_key_hex, options.issuer)?
        .with_validity(Duration::hours(options.validity_hours));

    Ok(signer.sign(&body, options.issued_at.unwrap_or_else(Utc::now)))
}

/// Print a signature for a config body along with the matching public key
pub fn sign(options: &SignOptions<'_>, format: OutputFormat) -> Result<()> {
    let token = sign_body(options)?;
    let public_key =
        ConfigSigner::from_hex(options.secret_key_hex, options.issuer)?.public_key_hex();

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "header": SIGNATURE_HEADER,
            "token": token,
            "publicKey": public_key,
        }))?,
        OutputFormat::Table => {
            println!("{}: {}", SIGNATURE_HEADER.bold(), token);
            print_info(&format!("Public key: {}", public_key));
        }
    }

    Ok(())
}

/// Check a token against a config body the way the agent does
pub fn verify(
    public_key_hex: &str,
    issuer: &str,
    body_file: &Path,
    token: &str,
    format: OutputFormat,
) -> Result<()> {
    let (body, config) = read_config_body(body_file)?;
    let verifier = SignatureVerifier::from_hex(public_key_hex, issuer)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        SIGNATURE_HEADER,
        HeaderValue::from_str(token.trim()).context("Token is not a valid header value")?,
    );
    let claims = verifier
        .verify(&headers, &body, Utc::now())
        .context("Signature rejected")?;

    match format {
        OutputFormat::Json => print_json(&claims)?,
        OutputFormat::Table => {
            print_success(&format!(
                "Signature valid for config version {}",
                config.config_version
            ));
            let expires = DateTime::<Utc>::from_timestamp(claims.exp, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| claims.exp.to_string());
            print_info(&format!("Issuer {}, expires {}", claims.iss, expires));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SECRET_HEX: &str = "0707070707070707070707070707070707070707070707070707070707070707";

    fn body_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_signed_body_verifies() {
        let file =
            body_file(r#"{"configVersion":3,"euSharingEnabled":true,"euSharingCountries":[]}"#);
        let options = SignOptions {
            secret_key_hex: SECRET_HEX,
            issuer: "config-service",
            body_file: file.path(),
            issued_at: None,
            validity_hours: 48,
        };

        let token = sign_body(&options).unwrap();
        let public_key = ConfigSigner::from_hex(SECRET_HEX, "config-service")
            .unwrap()
            .public_key_hex();

        let json = OutputFormat::Json;
        assert!(verify(&public_key, "config-service", file.path(), &token, json).is_ok());
        assert!(verify(&public_key, "someone-else", file.path(), &token, json).is_err());
    }

    #[test]
    fn test_rejects_unparseable_body() {
        let file = body_file("not json");
        let options = SignOptions {
            secret_key_hex: SECRET_HEX,
            issuer: "config-service",
            body_file: file.path(),
            issued_at: None,
            validity_hours: 48,
        };

        assert!(sign_body(&options).is_err());
    }

    #[test]
    fn test_rejects_short_key() {
        let file = body_file(r#"{"configVersion":1}"#);
        let options = SignOptions {
            secret_key_hex: "abcd",
            issuer: "config-service",
            body_file: file.path(),
            issued_at: None,
            validity_hours: 48,
        };

        assert!(sign_body(&options).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let file = body_file(r#"{"configVersion":1}"#);
        let options = SignOptions {
            secret_key_hex: SECRET_HEX,
            issuer: "config-service",
            body_file: file.path(),
            issued_at: Some(Utc::now() - Duration::days(5)),
            validity_hours: 48,
        };

        let token = sign_body(&options).unwrap();
        let public_key = ConfigSigner::from_hex(SECRET_HEX, "config-service")
            .unwrap()
            .public_key_hex();

        let json = OutputFormat::Json;
        assert!(verify(&public_key, "config-service", file.path(), &token, json).is_err());
    }
}
