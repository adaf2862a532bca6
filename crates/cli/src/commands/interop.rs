//! Interop settings commands

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use sync_core::{InteropChoice, InteropSettings, SharingCountry};
use tabled::Tabled;

use crate::client::{ApiClient, ChoiceRequest, CountriesRequest, PostedNotification};
use crate::output::{
    color_flag, color_status, format_codes, format_timestamp, print_json, print_success,
    print_table, print_warning, OutputFormat,
};

/// Row for the country table
#[derive(Tabled, Serialize)]
struct CountryRow {
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Local name")]
    local_name: String,
    #[tabled(rename = "Selected")]
    selected: String,
}

/// Row for the notification table
#[derive(Tabled, Serialize)]
struct NotificationRow {
    #[tabled(rename = "Posted")]
    posted_at: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Body")]
    body: String,
}

fn print_settings(settings: &InteropSettings, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(settings)?,
        OutputFormat::Table => {
            println!("{}", "Interop Settings".bold());
            println!("{}", "=".repeat(50));
            println!("State:          {}", color_status(settings.state.as_str()));
            println!("Possible:       {}", color_flag(settings.possible));
            println!("Config version: {}", settings.config_version);
            println!(
                "Available:      {}",
                format_codes(settings.countries.iter().map(|c| &c.country_code))
            );
            println!("Selected:       {}", format_codes(&settings.selected_countries));
            println!("Prompt due:     {}", color_flag(settings.prompt_required));
            if !settings.possible && settings.state.is_engaged() {
                print_warning("Sharing is engaged but the server no longer offers it");
            }
        }
    }
    Ok(())
}

/// Show the persisted interop settings
pub async fn show_settings(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let settings: InteropSettings = client.get("interop").await?;
    print_settings(&settings, format)
}

/// Apply a user choice
pub async fn set_choice(
    client: &ApiClient,
    choice: InteropChoice,
    format: OutputFormat,
) -> Result<()> {
    let settings: InteropSettings = client
        .post("interop/choice", &ChoiceRequest { choice })
        .await?;

    if matches!(format, OutputFormat::Table) {
        print_success(&format!("Interop state is now {}", color_status(settings.state.as_str())));
    }
    print_settings(&settings, format)
}

/// Replace the selected country set
pub async fn select_countries(
    client: &ApiClient,
    codes: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let countries = codes.into_iter().map(|c| c.trim().to_uppercase()).collect();
    let settings: InteropSettings = client
        .post("interop/countries", &CountriesRequest { countries })
        .await?;

    if matches!(format, OutputFormat::Table) {
        print_success(&format!(
            "Selected {}",
            format_codes(&settings.selected_countries)
        ));
    }
    print_settings(&settings, format)
}

/// List the countries offered by the last reconciled config
pub async fn list_countries(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let settings: InteropSettings = client.get("interop").await?;
    let available: Vec<SharingCountry> = client.get("interop/countries").await?;

    let rows: Vec<CountryRow> = available
        .into_iter()
        .map(|c| CountryRow {
            selected: color_flag(settings.selected_countries.contains(&c.country_code)),
            code: c.country_code,
            name: c.name_en,
            local_name: c.name_local,
        })
        .collect();

    print_table(&rows, format);
    Ok(())
}

/// Mark the settings screen as opened
pub async fn open_settings(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let settings: InteropSettings = client.post_empty("interop/open").await?;
    print_settings(&settings, format)
}

/// Clear the pending introduction prompt
pub async fn dismiss_prompt(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let settings: InteropSettings = client.post_empty("interop/prompt/dismiss").await?;

    if matches!(format, OutputFormat::Table) {
        print_success("Interop prompt dismissed");
    }
    print_settings(&settings, format)
}

/// List notifications the agent has posted
pub async fn list_notifications(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let posted: Vec<PostedNotification> = client.get("notifications").await?;

    let rows: Vec<NotificationRow> = posted
        .into_iter()
        .map(|n| NotificationRow {
            posted_at: format_timestamp(Some(n.posted_at)),
            title: n.title,
            body: n.body,
        })
        .collect();

    print_table(&rows, format);
    Ok(())
}
