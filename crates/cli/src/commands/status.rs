//! Agent status and config refresh commands

use anyhow::Result;
use colored::Colorize;

use crate::client::{AgentStatus, ApiClient, RefreshResponse};
use crate::output::{
    color_flag, color_status, format_codes, format_timestamp, print_info, print_json,
    print_success, print_warning, OutputFormat,
};

/// Show the agent's config, interop and SDK status
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: AgentStatus = client.get("status").await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => {
            println!("{}", "Remote Config".bold());
            println!("{}", "=".repeat(50));
            match status.config.version {
                Some(version) => println!("Version:      {}", version.to_string().cyan()),
                None => println!("Version:      {}", "none cached".yellow()),
            }
            println!("Fetched at:   {}", format_timestamp(status.config.last_fetched_at));
            if let Some(url) = &status.config.last_request_url {
                println!("Request URL:  {}", url);
            }
            if status.config.force_update {
                print_warning("Server requires an app update");
            }

            println!();
            println!("{}", "Interop".bold());
            println!("{}", "=".repeat(50));
            println!("State:        {}", color_status(&status.interop.state));
            println!("Possible:     {}", color_flag(status.interop.possible));
            println!("Selected:     {}", format_codes(&status.interop.selected_countries));
            println!("Prompt due:   {}", color_flag(status.interop.prompt_required));

            println!();
            println!("{}", "SDK".bold());
            println!("{}", "=".repeat(50));
            println!(
                "Mode:         {}",
                color_status(status.sdk.mode.as_deref().unwrap_or("-"))
            );
            println!("Countries:    {}", format_codes(&status.sdk.countries));
            println!("Last sync:    {}", format_timestamp(status.sdk.last_sync_at));

            println!();
            println!("Notifications posted: {}", status.notifications);
            println!(
                "Warnings reset:       {}",
                format_timestamp(status.last_warning_reset)
            );
        }
    }

    Ok(())
}

/// Ask the agent to load the config now
pub async fn refresh_config(
    client: &ApiClient,
    background: bool,
    format: OutputFormat,
) -> Result<()> {
    let mode = if background { "background" } else { "foreground" };
    let path = format!("config/refresh?mode={}", mode);
    let result: RefreshResponse = client.post_empty(&path).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            let version = result
                .config_version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            if result.outcome == "fetched" {
                print_success(&format!("Fetched config version {}", version));
            } else {
                print_info(&format!(
                    "Cache still fresh for {} mode ({}), version {}",
                    mode,
                    color_status(&result.outcome),
                    version
                ));
            }
        }
    }

    Ok(())
}
