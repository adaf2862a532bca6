//! Sync agent CLI
//!
//! A command-line tool for inspecting and driving a running sync agent,
//! and for signing config bodies offline.

mod client;
mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use commands::{interop, sign, status, telemetry};
use std::path::PathBuf;
use sync_core::telemetry::TelemetryEventType;
use sync_core::InteropChoice;

/// Sync agent CLI
#[derive(Parser)]
#[command(name = "syncctl")]
#[command(author, version, about = "CLI for the interop config sync agent", long_about = None)]
pub struct Cli {
    /// Agent API URL (can also be set via SYNCCTL_AGENT_URL or the config file)
    #[arg(long, env = "SYNCCTL_AGENT_URL")]
    pub agent_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show config, interop and SDK status
    Status,

    /// Inspect and change interop settings
    #[command(subcommand)]
    Interop(InteropCommands),

    /// Remote config operations
    #[command(subcommand)]
    Config(ConfigCommands),

    /// List telemetry entries
    Telemetry {
        /// Only show one event type (config, sync, fakeRequest, nextDayKeyUpload)
        #[arg(long = "type")]
        event_type: Option<TelemetryEventType>,
    },

    /// List notifications posted by the agent
    Notifications,

    /// Sign a config body for the `Signature` response header
    Sign {
        /// Hex-encoded Ed25519 secret key
        #[arg(long, env = "SYNCCTL_SECRET_KEY", hide_env_values = true)]
        secret_key_hex: String,

        /// Token issuer (defaults to the config file value)
        #[arg(long)]
        issuer: Option<String>,

        /// Path to the JSON config body
        #[arg(long)]
        body_file: PathBuf,

        /// Issue time in RFC 3339 (defaults to now)
        #[arg(long)]
        issued_at: Option<DateTime<Utc>>,

        /// Token validity in hours
        #[arg(long, default_value_t = 48)]
        validity_hours: i64,
    },

    /// Verify a signature against a config body
    Verify {
        /// Hex-encoded Ed25519 public key
        #[arg(long)]
        public_key_hex: String,

        /// Expected issuer (defaults to the config file value)
        #[arg(long)]
        issuer: Option<String>,

        /// Path to the JSON config body
        #[arg(long)]
        body_file: PathBuf,

        /// Token from the `Signature` header
        token: String,
    },

    /// Remember the agent URL in the config file
    Target {
        /// Agent API URL
        url: String,
    },
}

#[derive(Subcommand)]
pub enum InteropCommands {
    /// Show the persisted settings
    Show,

    /// Apply a choice (eu, countries, disable, disable-silent)
    Set {
        choice: InteropChoice,
    },

    /// Replace the selected countries
    Select {
        /// Country codes
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// List countries offered by the server
    Countries,

    /// Record that the settings screen was opened
    Open,

    /// Dismiss the pending introduction prompt
    DismissPrompt,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Load the config now, fetching when the cache is stale
    Refresh {
        /// Use the background staleness window
        #[arg(long)]
        background: bool,
    },
}

const DEFAULT_ISSUER: &str = "config-service";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = config::Config::load()?;

    let issuer = |explicit: Option<String>| {
        explicit
            .or_else(|| settings.issuer.clone())
            .unwrap_or_else(|| DEFAULT_ISSUER.to_string())
    };

    // Offline commands do not need the agent
    match cli.command {
        Commands::Sign {
            secret_key_hex,
            issuer: explicit,
            body_file,
            issued_at,
            validity_hours,
        } => {
            let issuer = issuer(explicit);
            let options = sign::SignOptions {
                secret_key_hex: &secret_key_hex,
                issuer: &issuer,
                body_file: &body_file,
                issued_at,
                validity_hours,
            };
            return sign::sign(&options, cli.format);
        }
        Commands::Verify {
            public_key_hex,
            issuer: explicit,
            body_file,
            token,
        } => {
            return sign::verify(&public_key_hex, &issuer(explicit), &body_file, &token, cli.format);
        }
        Commands::Target { url } => {
            url::Url::parse(&url).context("Invalid agent URL")?;
            let updated = config::Config {
                agent_url: Some(url.clone()),
                ..settings.clone()
            };
            updated.save().context("Failed to save CLI config")?;
            output::print_success(&format!("Agent URL set to {}", url));
            return Ok(());
        }
        _ => {}
    }

    // Initialize client
    let client = client::ApiClient::new(&settings.agent_url(cli.agent_url.as_deref()))?;

    let result = match cli.command {
        Commands::Status => status::show_status(&client, cli.format).await,
        Commands::Interop(interop_cmd) => match interop_cmd {
            InteropCommands::Show => interop::show_settings(&client, cli.format).await,
            InteropCommands::Set { choice } => {
                interop::set_choice(&client, choice, cli.format).await
            }
            InteropCommands::Select { codes } => {
                interop::select_countries(&client, codes, cli.format).await
            }
            InteropCommands::Countries => interop::list_countries(&client, cli.format).await,
            InteropCommands::Open => interop::open_settings(&client, cli.format).await,
            InteropCommands::DismissPrompt => interop::dismiss_prompt(&client, cli.format).await,
        },
        Commands::Config(ConfigCommands::Refresh { background }) => {
            status::refresh_config(&client, background, cli.format).await
        }
        Commands::Telemetry { event_type } => {
            telemetry::list_entries(&client, event_type, cli.format).await
        }
        Commands::Notifications => interop::list_notifications(&client, cli.format).await,
        Commands::Sign { .. } | Commands::Verify { .. } | Commands::Target { .. } => Ok(()),
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
