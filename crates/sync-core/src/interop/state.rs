use crate::sdk::SdkInteropMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sharing mode selected for this installation.
///
/// `Legacy` marks installs that predate interop and never made a choice.
/// It is a permanent state until the user acts, distinct from `Disabled`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteropState {
    #[default]
    Legacy,
    Disabled,
    DisabledSilent,
    Countries,
    CountriesUpdatePending,
    Eu,
}

impl InteropState {
    /// Whether the user has opted into any form of sharing
    pub fn is_engaged(self) -> bool {
        matches!(
            self,
            InteropState::Eu | InteropState::Countries | InteropState::CountriesUpdatePending
        )
    }

    pub fn sdk_mode(self) -> SdkInteropMode {
        match self {
            InteropState::Eu => SdkInteropMode::Eu,
            InteropState::Countries | InteropState::CountriesUpdatePending => {
                SdkInteropMode::Countries
            }
            InteropState::Legacy | InteropState::Disabled | InteropState::DisabledSilent => {
                SdkInteropMode::Disabled
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InteropState::Legacy => "legacy",
            InteropState::Disabled => "disabled",
            InteropState::DisabledSilent => "disabled_silent",
            InteropState::Countries => "countries",
            InteropState::CountriesUpdatePending => "countries_update_pending",
            InteropState::Eu => "eu",
        }
    }
}

impl fmt::Display for InteropState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User action on the interop settings screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteropChoice {
    Eu,
    Countries,
    /// Sharing switched off through the explicit toggle
    DisableExplicit,
    /// Sharing switched off through any other path
    DisableSilent,
}

impl InteropChoice {
    pub fn target_state(self) -> InteropState {
        match self {
            InteropChoice::Eu => InteropState::Eu,
            InteropChoice::Countries => InteropState::Countries,
            InteropChoice::DisableExplicit => InteropState::Disabled,
            InteropChoice::DisableSilent => InteropState::DisabledSilent,
        }
    }
}

impl FromStr for InteropChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "eu" => Ok(InteropChoice::Eu),
            "countries" => Ok(InteropChoice::Countries),
            "disable" | "disable_explicit" => Ok(InteropChoice::DisableExplicit),
            "disable_silent" => Ok(InteropChoice::DisableSilent),
            other => Err(format!("unknown interop choice: {}", other)),
        }
    }
}
