//! Config request target

use anyhow::{Context, Result};
use url::Url;

/// Builds the config URL from the app version, OS version and build number.
///
/// The three inputs are opaque; any change to them produces a new URL and
/// therefore forces a refresh regardless of cache age.
#[derive(Debug, Clone)]
pub struct ConfigEndpoint {
    base_url: Url,
    app_version: String,
    os_version: String,
    build_number: String,
}

impl ConfigEndpoint {
    pub fn new(
        base_url: &str,
        app_version: impl Into<String>,
        os_version: impl Into<String>,
        build_number: impl Into<String>,
    ) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("Invalid config base URL: {}", base_url))?;

        // `join` would drop the last path segment otherwise
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            app_version: app_version.into(),
            os_version: os_version.into(),
            build_number: build_number.into(),
        })
    }

    pub fn request_url(&self) -> Result<Url> {
        let mut url = self
            .base_url
            .join("v1/config")
            .context("Failed to build config URL")?;
        url.query_pairs_mut()
            .append_pair("appversion", &self.app_version)
            .append_pair("osversion", &self.os_version)
            .append_pair("buildnr", &self.build_number);
        Ok(url)
    }
}
