//! Agent configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Installation identifier attached to structured logs
    #[serde(default = "default_installation")]
    pub installation: String,

    /// API server port for control and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// JSON file backing the key-value store
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Base URL of the config service
    #[serde(default = "default_config_base_url")]
    pub config_base_url: String,

    #[serde(default = "default_app_version")]
    pub app_version: String,

    #[serde(default = "default_os_version")]
    pub os_version: String,

    #[serde(default = "default_build_number")]
    pub build_number: String,

    /// Expected `iss` claim of config signatures
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Hex-encoded Ed25519 public key pinned for config signatures
    #[serde(default)]
    pub public_key_hex: String,

    /// URL padding requests are posted to
    #[serde(default = "default_padding_url")]
    pub padding_url: String,

    /// Interval between background execution windows in seconds
    #[serde(default = "default_background_interval")]
    pub background_interval_secs: u64,

    /// Time budget of each background window in seconds
    #[serde(default = "default_background_budget")]
    pub background_budget_secs: u64,

    /// HTTP timeout for config and padding requests in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_installation() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_store_path() -> PathBuf {
    PathBuf::from("/var/lib/sync-agent/store.json")
}

fn default_config_base_url() -> String {
    "http://config-service:8090/".to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_os_version() -> String {
    std::env::consts::OS.to_string()
}

fn default_build_number() -> String {
    "1".to_string()
}

fn default_issuer() -> String {
    "config-service".to_string()
}

fn default_padding_url() -> String {
    "http://config-service:8090/v1/padding".to_string()
}

fn default_background_interval() -> u64 {
    2 * 60 * 60
}

fn default_background_budget() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            installation: default_installation(),
            api_port: default_api_port(),
            store_path: default_store_path(),
            config_base_url: default_config_base_url(),
            app_version: default_app_version(),
            os_version: default_os_version(),
            build_number: default_build_number(),
            issuer: default_issuer(),
            public_key_hex: String::new(),
            padding_url: default_padding_url(),
            background_interval_secs: default_background_interval(),
            background_budget_secs: default_background_budget(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from `SYNC_AGENT_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("SYNC_AGENT"))
            .build()
            .context("Failed to read agent configuration")?;

        let config: AgentConfig = config
            .try_deserialize()
            .context("Invalid agent configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.public_key_hex.trim().is_empty() {
            anyhow::bail!("SYNC_AGENT_PUBLIC_KEY_HEX must be set to the config signing key");
        }
        if self.background_budget_secs == 0 {
            anyhow::bail!("Background budget must be at least one second");
        }
        if self.background_budget_secs >= self.background_interval_secs {
            anyhow::bail!("Background budget must be shorter than the background interval");
        }
        Ok(())
    }
}
