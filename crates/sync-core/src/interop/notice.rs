use serde::Serialize;

/// Localization key shared by every interop notification title
pub const INTEROP_TITLE_KEY: &str = "interop_mode_title";

/// Local notification raised by server-driven reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteropNotice {
    ServiceUnavailable,
    ServiceAvailable,
    CountriesChanged,
}

impl InteropNotice {
    pub fn body_key(self) -> &'static str {
        match self {
            InteropNotice::ServiceUnavailable => "interop_mode_unavailable_text",
            InteropNotice::ServiceAvailable => "interop_mode_available_text",
            InteropNotice::CountriesChanged => "interop_mode_countries_update_pending_text",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InteropNotice::ServiceUnavailable => "service_unavailable",
            InteropNotice::ServiceAvailable => "service_available",
            InteropNotice::CountriesChanged => "countries_changed",
        }
    }
}

/// Local notification dispatch; fire-and-forget
pub trait LocalNotifier: Send + Sync {
    fn post_local_notification(&self, title: &str, body: &str);
}
