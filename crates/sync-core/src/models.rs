//! Core data models for the config sync engine

use crate::error::FetchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Country offered for cross-region sharing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharingCountry {
    #[serde(rename = "countryCode")]
    pub country_code: String,
    #[serde(rename = "countryNameEN", default)]
    pub name_en: String,
    #[serde(rename = "countryNameLocal", alias = "countryNameMT", default)]
    pub name_local: String,
}

/// SDK tuning parameters, passed through to the SDK unmodified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SdkParameters(pub serde_json::Value);

/// Server-delivered configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    pub config_version: i64,
    #[serde(alias = "forceUpdateRequired", default)]
    pub force_update: bool,
    #[serde(default)]
    pub eu_sharing_enabled: bool,
    #[serde(default)]
    pub eu_sharing_countries: Vec<SharingCountry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_config: Option<SdkParameters>,
}

impl RemoteConfig {
    /// Parse a verified response body, rejecting duplicate country codes
    pub fn from_slice(body: &[u8]) -> Result<Self, FetchError> {
        let config: RemoteConfig =
            serde_json::from_slice(body).map_err(|e| FetchError::Parse(e.to_string()))?;

        let mut seen = HashSet::with_capacity(config.eu_sharing_countries.len());
        for country in &config.eu_sharing_countries {
            if !seen.insert(country.country_code.as_str()) {
                return Err(FetchError::Parse(format!(
                    "duplicate country code {}",
                    country.country_code
                )));
            }
        }

        Ok(config)
    }

    /// Country codes offered by this config, order-independent
    pub fn country_codes(&self) -> BTreeSet<String> {
        country_codes(&self.eu_sharing_countries)
    }
}

/// Key set of a country list
pub fn country_codes(countries: &[SharingCountry]) -> BTreeSet<String> {
    countries.iter().map(|c| c.country_code.clone()).collect()
}

/// Last known good configuration and the request that produced it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigCacheEntry {
    pub config: Option<RemoteConfig>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub last_request_url: Option<String>,
}
