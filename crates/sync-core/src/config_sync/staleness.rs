//! Decides whether a cached configuration is due for a refresh

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Maximum config age for foreground loads (12 hours)
pub const FOREGROUND_TTL_SECS: i64 = 12 * 60 * 60;

/// Maximum config age inside background execution windows (6 hours)
pub const BACKGROUND_TTL_SECS: i64 = 6 * 60 * 60;

/// Context a config load runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    Foreground,
    Background,
}

impl FetchMode {
    pub fn is_background(self) -> bool {
        matches!(self, FetchMode::Background)
    }

    pub fn ttl(self) -> Duration {
        match self {
            FetchMode::Foreground => Duration::seconds(FOREGROUND_TTL_SECS),
            FetchMode::Background => Duration::seconds(BACKGROUND_TTL_SECS),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FetchMode::Foreground => "foreground",
            FetchMode::Background => "background",
        }
    }
}

/// Returns true when a network fetch is due.
///
/// A changed request URL (new app or OS version) always forces a refresh.
/// Otherwise the cache is refreshed when it was never filled or is strictly
/// older than the TTL for `mode`.
pub fn should_refresh(
    mode: FetchMode,
    request_url: &str,
    cached_url: Option<&str>,
    last_fetched_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if cached_url != Some(request_url) {
        return true;
    }

    match last_fetched_at {
        None => true,
        Some(fetched_at) => now - fetched_at > mode.ttl(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    const URL: &str = "https://config.example/v1/config?appversion=ios-1.2";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_first_load_refreshes() {
        assert!(should_refresh(FetchMode::Foreground, URL, None, None, now()));
        assert!(should_refresh(FetchMode::Background, URL, Some(URL), None, now()));
    }

    #[test]
    fn test_fresh_cache_is_reused() {
        let fetched = now() - Duration::hours(3);
        assert!(!should_refresh(FetchMode::Foreground, URL, Some(URL), Some(fetched), now()));
        assert!(!should_refresh(FetchMode::Background, URL, Some(URL), Some(fetched), now()));
    }

    #[test]
    fn test_background_ttl_is_shorter() {
        let fetched = now() - Duration::hours(7);
        assert!(!should_refresh(FetchMode::Foreground, URL, Some(URL), Some(fetched), now()));
        assert!(should_refresh(FetchMode::Background, URL, Some(URL), Some(fetched), now()));
    }

    #[test]
    fn test_ttl_boundary_is_exclusive() {
        let fetched = now() - Duration::seconds(FOREGROUND_TTL_SECS);
        assert!(!should_refresh(FetchMode::Foreground, URL, Some(URL), Some(fetched), now()));

        let fetched = now() - Duration::seconds(FOREGROUND_TTL_SECS + 1);
        assert!(should_refresh(FetchMode::Foreground, URL, Some(URL), Some(fetched), now()));
    }

    #[test]
    fn test_changed_url_ignores_timers() {
        let fetched = now() - Duration::minutes(1);
        let old_url = "https://config.example/v1/config?appversion=ios-1.1";
        assert!(should_refresh(FetchMode::Foreground, URL, Some(old_url), Some(fetched), now()));
    }

    proptest! {
        #[test]
        fn prop_url_change_always_refreshes(
            age_secs in 0i64..(30 * 24 * 3600),
            background in any::<bool>(),
            suffix in "[a-z0-9]{1,8}",
        ) {
            let mode = if background { FetchMode::Background } else { FetchMode::Foreground };
            let cached = format!("{}-{}", URL, suffix);
            let fetched = now() - Duration::seconds(age_secs);
            prop_assert!(should_refresh(mode, URL, Some(&cached), Some(fetched), now()));
        }

        #[test]
        fn prop_foreground_within_ttl_is_fresh(age_secs in 0i64..=FOREGROUND_TTL_SECS) {
            let fetched = now() - Duration::seconds(age_secs);
            prop_assert!(!should_refresh(
                FetchMode::Foreground,
                URL,
                Some(URL),
                Some(fetched),
                now()
            ));
        }
    }
}
