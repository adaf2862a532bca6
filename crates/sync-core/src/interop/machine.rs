//! Interop state machine
//!
//! Single writer of the persisted interop settings. User transitions and
//! server reconciliation both run under one lock, push the resulting mode to
//! the SDK explicitly, and then publish a snapshot on the refresh channel.

use super::notice::{InteropNotice, LocalNotifier, INTEROP_TITLE_KEY};
use super::state::{InteropChoice, InteropState};
use crate::models::{country_codes, RemoteConfig, SharingCountry};
use crate::observability::{StructuredLogger, SyncMetrics};
use crate::sdk::ExposureSdk;
use crate::store::{KeyValueStore, KeyValueStoreExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

const POSSIBLE_KEY: &str = "interop.possible";
const STATE_KEY: &str = "interop.state";
const SELECTED_COUNTRIES_KEY: &str = "interop.selectedCountries";
const COUNTRIES_KEY: &str = "interop.countries";
const CONFIG_VERSION_KEY: &str = "interop.configVersion";
const PROMPT_REQUIRED_KEY: &str = "interop.promptRequired";

/// Persisted interop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteropSettings {
    /// Server currently offers cross-region sharing
    pub possible: bool,
    pub state: InteropState,
    pub selected_countries: BTreeSet<String>,
    /// Country list of the last reconciled config, in server order
    pub countries: Vec<SharingCountry>,
    /// Last reconciled config version
    pub config_version: i64,
    /// One-time interop introduction still has to be shown
    pub prompt_required: bool,
}

impl Default for InteropSettings {
    fn default() -> Self {
        Self {
            possible: false,
            state: InteropState::Legacy,
            selected_countries: BTreeSet::new(),
            countries: Vec::new(),
            config_version: 0,
            prompt_required: true,
        }
    }
}

impl InteropSettings {
    fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Self::default();
        Self {
            possible: store.get_as(POSSIBLE_KEY).unwrap_or(defaults.possible),
            state: store.get_as(STATE_KEY).unwrap_or(defaults.state),
            selected_countries: store
                .get_as(SELECTED_COUNTRIES_KEY)
                .unwrap_or(defaults.selected_countries),
            countries: store.get_as(COUNTRIES_KEY).unwrap_or(defaults.countries),
            config_version: store
                .get_as(CONFIG_VERSION_KEY)
                .unwrap_or(defaults.config_version),
            prompt_required: store
                .get_as(PROMPT_REQUIRED_KEY)
                .unwrap_or(defaults.prompt_required),
        }
    }

    fn selected_list(&self) -> Vec<String> {
        self.selected_countries.iter().cloned().collect()
    }

    fn country_list(&self) -> Vec<String> {
        self.countries.iter().map(|c| c.country_code.clone()).collect()
    }
}

/// Outcome of reconciling one server config
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub config_version: i64,
    /// False when this version had already been reconciled
    pub applied: bool,
    pub previous_state: InteropState,
    pub state: InteropState,
    pub countries_changed: bool,
    pub pruned: Vec<String>,
    pub notices: Vec<InteropNotice>,
}

pub struct InteropStateMachine {
    store: Arc<dyn KeyValueStore>,
    sdk: Arc<dyn ExposureSdk>,
    notifier: Arc<dyn LocalNotifier>,
    settings: Mutex<InteropSettings>,
    refresh: watch::Sender<InteropSettings>,
    metrics: SyncMetrics,
    logger: StructuredLogger,
}

impl InteropStateMachine {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        sdk: Arc<dyn ExposureSdk>,
        notifier: Arc<dyn LocalNotifier>,
        logger: StructuredLogger,
    ) -> Self {
        let settings = InteropSettings::load(store.as_ref());
        let (refresh, _) = watch::channel(settings.clone());

        debug!(
            state = %settings.state,
            version = settings.config_version,
            "Loaded interop settings"
        );

        Self {
            store,
            sdk,
            notifier,
            settings: Mutex::new(settings),
            refresh,
            metrics: SyncMetrics::new(),
            logger,
        }
    }

    pub fn settings(&self) -> InteropSettings {
        self.lock().clone()
    }

    pub fn state(&self) -> InteropState {
        self.lock().state
    }

    pub fn available_countries(&self) -> Vec<SharingCountry> {
        self.lock().countries.clone()
    }

    /// UI refresh signal; carries the settings after every transition
    pub fn subscribe(&self) -> watch::Receiver<InteropSettings> {
        self.refresh.subscribe()
    }

    /// Replay persisted settings into the SDK, e.g. at start-up
    pub fn push_to_sdk(&self) {
        let settings = self.lock();
        self.sdk.set_interop_possible(settings.possible);
        self.sdk.set_interop_countries(&settings.country_list());
        self.sdk.set_interop_selected_countries(&settings.selected_list());
        self.sdk.set_interop_state(settings.state.sdk_mode());
    }

    /// User picked a sharing mode
    pub fn apply_choice(&self, choice: InteropChoice) -> InteropSettings {
        let snapshot = {
            let mut settings = self.lock();
            let previous = settings.state;
            settings.state = choice.target_state();
            self.persist(STATE_KEY, &settings.state);
            self.sdk.set_interop_state(settings.state.sdk_mode());

            info!(from = %previous, to = %settings.state, "Interop mode changed by user");
            settings.clone()
        };

        self.refresh.send_replace(snapshot.clone());
        snapshot
    }

    /// Replace the user's country selection.
    ///
    /// Codes outside the current country list are accepted here. They are
    /// only pruned when a later config changes the server's country list.
    pub fn select_countries<I, S>(&self, codes: I) -> InteropSettings
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let snapshot = {
            let mut settings = self.lock();
            settings.selected_countries = codes.into_iter().map(Into::into).collect();
            self.persist(SELECTED_COUNTRIES_KEY, &settings.selected_countries);
            self.sdk
                .set_interop_selected_countries(&settings.selected_list());

            info!(selected = settings.selected_countries.len(), "Interop countries selected");
            settings.clone()
        };

        self.refresh.send_replace(snapshot.clone());
        snapshot
    }

    /// Settings screen entered; resolves a pending country update
    pub fn open_settings_screen(&self) -> InteropSettings {
        let snapshot = {
            let mut settings = self.lock();
            if settings.state != InteropState::CountriesUpdatePending {
                return settings.clone();
            }
            settings.state = InteropState::Countries;
            self.persist(STATE_KEY, &settings.state);
            self.sdk.set_interop_state(settings.state.sdk_mode());

            info!("Pending country update acknowledged");
            settings.clone()
        };

        self.refresh.send_replace(snapshot.clone());
        snapshot
    }

    pub fn dismiss_prompt(&self) -> InteropSettings {
        let snapshot = {
            let mut settings = self.lock();
            if !settings.prompt_required {
                return settings.clone();
            }
            settings.prompt_required = false;
            self.persist(PROMPT_REQUIRED_KEY, &false);
            settings.clone()
        };

        self.refresh.send_replace(snapshot.clone());
        snapshot
    }

    /// Reconcile settings with a newly committed server config.
    ///
    /// Runs at most once per distinct `config_version`. Notifications are
    /// only posted while the user has sharing engaged.
    pub fn reconcile(&self, config: &RemoteConfig) -> ReconcileReport {
        let (report, snapshot) = {
            let mut settings = self.lock();
            let previous_state = settings.state;

            if config.config_version == settings.config_version {
                debug!(version = config.config_version, "Config version already reconciled");
                return ReconcileReport {
                    config_version: config.config_version,
                    applied: false,
                    previous_state,
                    state: previous_state,
                    countries_changed: false,
                    pruned: Vec::new(),
                    notices: Vec::new(),
                };
            }

            let engaged = previous_state.is_engaged();
            let mut notices = Vec::new();

            if settings.possible != config.eu_sharing_enabled && engaged {
                notices.push(if config.eu_sharing_enabled {
                    InteropNotice::ServiceAvailable
                } else {
                    InteropNotice::ServiceUnavailable
                });
            }
            settings.possible = config.eu_sharing_enabled;
            self.persist(POSSIBLE_KEY, &settings.possible);
            self.sdk.set_interop_possible(settings.possible);

            let new_codes = config.country_codes();
            let countries_changed = new_codes != country_codes(&settings.countries);
            let mut pruned = Vec::new();

            if countries_changed {
                if engaged {
                    notices.push(InteropNotice::CountriesChanged);
                }

                settings.countries = config.eu_sharing_countries.clone();
                self.persist(COUNTRIES_KEY, &settings.countries);
                self.sdk.set_interop_countries(&settings.country_list());

                pruned = settings
                    .selected_countries
                    .iter()
                    .filter(|code| !new_codes.contains(*code))
                    .cloned()
                    .collect();
                if !pruned.is_empty() {
                    settings
                        .selected_countries
                        .retain(|code| new_codes.contains(code));
                    self.persist(SELECTED_COUNTRIES_KEY, &settings.selected_countries);
                    self.sdk
                        .set_interop_selected_countries(&settings.selected_list());
                }

                if settings.state == InteropState::Countries {
                    settings.state = InteropState::CountriesUpdatePending;
                    self.persist(STATE_KEY, &settings.state);
                    self.sdk.set_interop_state(settings.state.sdk_mode());
                }
            }

            settings.config_version = config.config_version;
            self.persist(CONFIG_VERSION_KEY, &settings.config_version);

            let report = ReconcileReport {
                config_version: config.config_version,
                applied: true,
                previous_state,
                state: settings.state,
                countries_changed,
                pruned,
                notices,
            };
            (report, settings.clone())
        };

        for notice in &report.notices {
            self.notifier
                .post_local_notification(INTEROP_TITLE_KEY, notice.body_key());
            self.metrics.inc_interop_notification(notice.as_str());
        }

        self.logger.log_interop_reconciled(
            report.config_version,
            report.state.as_str(),
            report.notices.len(),
            report.pruned.len(),
        );
        self.refresh.send_replace(snapshot);

        report
    }

    fn lock(&self) -> MutexGuard<'_, InteropSettings> {
        self.settings.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.store.set_as(key, value) {
            warn!(key = %key, error = %e, "Failed to persist interop setting");
        }
    }
}
