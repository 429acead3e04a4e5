//! Session state and the actions that mutate it.
//!
//! [`Dashboard`] is the only mutation surface. Presentation code reads a
//! cloned [`SessionState`] via [`Dashboard::snapshot`] and calls actions.
//!
//! Every load (`resolve_and_load`, `detect_current_location`) runs as a
//! *cycle* tagged with a sequence number. Starting a cycle supersedes all
//! earlier ones: a superseded cycle stops at its next commit point and writes
//! nothing more, so the most recent user intent wins however the network
//! calls interleave.
//!
//! `change_history_range` runs on its own track. It only competes with newer
//! range changes and with the history step of a load, and it never cancels a
//! location load. Committing a new location discards range changes still
//! pending for the old one.

use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    derived::{self, Alert, SummaryStats},
    error::{ErrorReport, WeatherError},
    location::{
        DETECT_TIMEOUT, FixedDetector, LocationDetector, LocationResolver, UnsupportedDetector,
        detect_within,
    },
    model::{
        AirQualitySample, Coordinates, CurrentConditions, DateRange, Location, LocationQuery,
        Outlook, RecentSearchEntry, RecentSearches, Suggestion, TemperatureUnit, Theme,
    },
    preferences::{FileStore, PersistedPreferences, UnavailableStore},
    provider::{
        CurrentConditionsProvider, ForecastProvider, GeocodingProvider, HistoryProvider,
        OpenMeteoArchive, OpenMeteoForecast, OpenMeteoGeocoding, WeatherstackProvider,
    },
};

/// Minimum input length before suggestions are requested.
pub const MIN_SUGGESTION_CHARS: usize = 2;

const USER_AGENT: &str = concat!("skydash/", env!("CARGO_PKG_VERSION"));

/// Source of "today" for history ranges.
pub trait Clock: Send + Sync + Debug {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Upstream collaborators the dashboard calls through.
#[derive(Debug, Clone)]
pub struct Services {
    pub conditions: Arc<dyn CurrentConditionsProvider>,
    pub forecast: Arc<dyn ForecastProvider>,
    pub history: Arc<dyn HistoryProvider>,
    pub geocoding: Arc<dyn GeocodingProvider>,
    pub detector: Arc<dyn LocationDetector>,
}

impl Services {
    /// Real HTTP clients for the configured endpoints.
    pub fn from_config(config: &Config) -> Result<Self, WeatherError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let endpoints = &config.endpoints;

        let detector: Arc<dyn LocationDetector> = match config.home {
            Some(home) => Arc::new(FixedDetector(home)),
            None => Arc::new(UnsupportedDetector),
        };

        Ok(Self {
            conditions: Arc::new(WeatherstackProvider::new(
                config.conditions_api_key(),
                &endpoints.current,
                http.clone(),
            )),
            forecast: Arc::new(OpenMeteoForecast::new(
                &endpoints.forecast,
                &endpoints.air_quality,
                http.clone(),
            )),
            history: Arc::new(OpenMeteoArchive::new(&endpoints.archive, http.clone())),
            geocoding: Arc::new(OpenMeteoGeocoding::new(&endpoints.geocoding, http)),
            detector,
        })
    }
}

/// Everything the presentation layer can read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub location: Option<Location>,
    pub current: Option<CurrentConditions>,
    pub forecast: Option<Outlook>,
    pub history: Option<Outlook>,
    pub history_range: Option<DateRange>,
    pub air_quality: Option<Vec<AirQualitySample>>,
    pub loading: bool,
    pub error: Option<ErrorReport>,
    pub unit: TemperatureUnit,
    pub theme: Theme,
    pub recent_searches: RecentSearches,
    pub suggestions: Vec<Suggestion>,
    pub suggestions_loading: bool,
    /// Derived from `current`.
    pub alerts: Vec<Alert>,
    /// Derived from `history`.
    pub history_stats: Option<SummaryStats>,
}

impl SessionState {
    fn set_current(&mut self, current: Option<CurrentConditions>) {
        self.alerts = current.as_ref().map(derived::alerts).unwrap_or_default();
        self.current = current;
    }

    fn set_history(&mut self, history: Option<Outlook>, range: Option<DateRange>) {
        self.history_stats = history.as_ref().and_then(|h| derived::summary_stats(&h.daily));
        self.history = history;
        self.history_range = range;
    }

    /// Swap in a new location; data for the previous one goes with it.
    fn replace_location(&mut self, location: Location, current: Option<CurrentConditions>) {
        self.recent_searches.promote(RecentSearchEntry::for_location(&location));
        self.location = Some(location);
        self.set_current(current);
        self.forecast = None;
        self.set_history(None, None);
        self.air_quality = None;
    }

    fn record_error(&mut self, err: &WeatherError) {
        match &self.error {
            None => self.error = Some(ErrorReport::from(err)),
            Some(_) => debug!("Suppressing secondary error: {}", err),
        }
    }
}

pub struct Dashboard {
    services: Services,
    resolver: LocationResolver,
    preferences: PersistedPreferences,
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
    latest_cycle: AtomicU64,
    latest_history: AtomicU64,
    load_pending: AtomicBool,
    history_pending: AtomicBool,
    latest_suggestion: AtomicU64,
}

impl Dashboard {
    /// Build a dashboard; stored preferences are read once here.
    pub fn new(services: Services, preferences: PersistedPreferences, clock: Arc<dyn Clock>) -> Self {
        let prefs = preferences.load();
        let state = SessionState {
            unit: prefs.unit,
            theme: prefs.theme,
            recent_searches: prefs.recent_searches,
            ..SessionState::default()
        };

        Self {
            resolver: LocationResolver::new(services.geocoding.clone()),
            services,
            preferences,
            clock,
            state: Mutex::new(state),
            latest_cycle: AtomicU64::new(0),
            latest_history: AtomicU64::new(0),
            load_pending: AtomicBool::new(false),
            history_pending: AtomicBool::new(false),
            latest_suggestion: AtomicU64::new(0),
        }
    }

    /// Live providers, file-backed preferences and the system clock.
    pub fn from_config(config: &Config) -> Result<Self, WeatherError> {
        let services = Services::from_config(config)?;
        let preferences = match Config::preferences_file_path() {
            Ok(path) => PersistedPreferences::new(Arc::new(FileStore::new(path))),
            Err(e) => {
                warn!("Preferences will not be saved: {}", e);
                PersistedPreferences::new(Arc::new(UnavailableStore))
            }
        };
        Ok(Self::new(services, preferences, Arc::new(SystemClock)))
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.lock().clone()
    }

    /// Load everything for a place name or coordinates.
    pub async fn resolve_and_load(&self, query: LocationQuery) {
        let cycle = self.begin_cycle();
        self.run_load(&cycle, query).await;
    }

    /// Locate the user, then load as for coordinates.
    pub async fn detect_current_location(&self) {
        let cycle = self.begin_cycle();

        let coords = match detect_within(self.services.detector.as_ref(), DETECT_TIMEOUT).await {
            Ok(coords) => coords,
            Err(e) => {
                cycle.fail(&e);
                return;
            }
        };
        debug!("Detected coordinates ({}, {})", coords.latitude, coords.longitude);

        self.run_load(&cycle, LocationQuery::Coordinates(coords)).await;
    }

    /// Reload history for the current location over `start..=end`.
    ///
    /// Does nothing without a loaded location or when `start > end`. A load
    /// running at the same time keeps going; if it commits a different
    /// location first, this result is dropped.
    pub async fn change_history_range(&self, start: NaiveDate, end: NaiveDate) {
        let Ok(range) = DateRange::new(start, end) else {
            debug!("Ignoring inverted history range {} .. {}", start, end);
            return;
        };

        let (cycle, location) = {
            let mut state = self.state.lock();
            let Some(location) = state.location.clone() else {
                debug!("Ignoring history range change: no location loaded");
                return;
            };
            (self.begin_history_locked(&mut state, location.clone()), location)
        };

        if let Err(e) = range.validate_against(self.clock.today()) {
            cycle.fail(&e);
            return;
        }

        let result = self.services.history.history(&location, range).await;
        cycle.settle(result, |state, history| state.set_history(Some(history), Some(range)));
    }

    /// Replace suggestions with matches for `partial`.
    ///
    /// Inputs shorter than [`MIN_SUGGESTION_CHARS`] clear the list without a
    /// request. Failures clear it silently. A response that arrives after a
    /// newer call started is dropped.
    pub async fn load_suggestions(&self, partial: &str) {
        let token = {
            let mut state = self.state.lock();
            let token = self.latest_suggestion.fetch_add(1, Ordering::SeqCst) + 1;
            if partial.chars().count() < MIN_SUGGESTION_CHARS {
                state.suggestions.clear();
                state.suggestions_loading = false;
                return;
            }
            state.suggestions_loading = true;
            token
        };

        let result = self.resolver.suggest(partial).await;

        let mut state = self.state.lock();
        if self.latest_suggestion.load(Ordering::SeqCst) != token {
            debug!("Dropping stale suggestions for '{}'", partial);
            return;
        }
        state.suggestions = result.unwrap_or_else(|e| {
            debug!("Suggestion lookup failed: {}", e);
            Vec::new()
        });
        state.suggestions_loading = false;
    }

    pub fn clear_suggestions(&self) {
        let mut state = self.state.lock();
        self.latest_suggestion.fetch_add(1, Ordering::SeqCst);
        state.suggestions.clear();
        state.suggestions_loading = false;
    }

    pub fn set_unit(&self, unit: TemperatureUnit) {
        self.state.lock().unit = unit;
        self.preferences.save_unit(unit);
    }

    pub fn toggle_unit(&self) -> TemperatureUnit {
        let unit = self.state.lock().unit.toggled();
        self.set_unit(unit);
        unit
    }

    pub fn set_theme(&self, theme: Theme) {
        self.state.lock().theme = theme;
        self.preferences.save_theme(theme);
    }

    pub fn toggle_theme(&self) -> Theme {
        let theme = self.state.lock().theme.toggled();
        self.set_theme(theme);
        theme
    }

    fn begin_cycle(&self) -> Cycle<'_> {
        let mut state = self.state.lock();
        self.begin_cycle_locked(&mut state)
    }

    fn begin_cycle_locked(&self, state: &mut SessionState) -> Cycle<'_> {
        let token = self.latest_cycle.fetch_add(1, Ordering::SeqCst) + 1;
        self.load_pending.store(true, Ordering::SeqCst);
        state.loading = true;
        state.error = None;
        Cycle::new(self, Track::Load, token)
    }

    fn begin_history_locked(&self, state: &mut SessionState, location: Location) -> Cycle<'_> {
        let token = self.history_token_locked();
        self.history_pending.store(true, Ordering::SeqCst);
        // An in-flight load owns the error slot until it finishes.
        if !self.load_pending.load(Ordering::SeqCst) {
            state.error = None;
        }
        state.loading = true;
        let mut cycle = Cycle::new(self, Track::History, token);
        cycle.location = Some(location);
        cycle
    }

    /// Claim the history track. Callers hold the state lock.
    fn history_token_locked(&self) -> u64 {
        self.latest_history.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn sync_loading(&self, state: &mut SessionState) {
        state.loading =
            self.load_pending.load(Ordering::SeqCst) || self.history_pending.load(Ordering::SeqCst);
    }

    async fn run_load(&self, cycle: &Cycle<'_>, query: LocationQuery) {
        let (conditions_query, coords) = match &query {
            LocationQuery::Name(text) => {
                let text = text.trim();
                if text.is_empty() {
                    cycle.fail(&WeatherError::Validation("Enter a city name.".to_string()));
                    return;
                }
                (text.to_string(), None)
            }
            LocationQuery::Coordinates(c) => match Coordinates::new(c.latitude, c.longitude) {
                Ok(c) => (c.as_query(), Some(c)),
                Err(e) => {
                    cycle.fail(&e);
                    return;
                }
            },
        };

        // Soft: conditions are optional and never stop the rest.
        let current = match self.services.conditions.current(&conditions_query).await {
            Ok(current) => Some(current),
            Err(e) => {
                cycle.fail(&e);
                None
            }
        };
        if cycle.commit(|_| ()).is_none() {
            return;
        }

        // Hard: without a location nothing downstream can run.
        let location = match coords {
            Some(coords) => self.resolver.resolve_by_coordinates(coords).await,
            None => {
                let resolved = self.resolver.resolve_by_name(&conditions_query).await;
                match resolved {
                    Ok(Some(location)) => location,
                    Ok(None) => {
                        cycle.fail(&WeatherError::NotFound(conditions_query));
                        return;
                    }
                    Err(e) => {
                        cycle.fail(&e);
                        return;
                    }
                }
            }
        };

        let committed = cycle.commit(|state| {
            state.replace_location(location.clone(), current);
            // Range changes still pending were asked for the old location.
            cycle.history_token.store(self.history_token_locked(), Ordering::SeqCst);
            self.history_pending.store(false, Ordering::SeqCst);
            state.recent_searches.clone()
        });
        let Some(recents) = committed else {
            return;
        };
        info!("Loaded location {}", location.label());
        self.preferences.save_recent_searches(&recents);

        // A failed fetch ends the cycle; the committed location stays. The
        // remaining fetches are skipped on purpose rather than attempted
        // independently.
        let forecast = self.services.forecast.forecast(&location).await;
        if !cycle.settle(forecast, |state, forecast| state.forecast = Some(forecast)) {
            return;
        }

        let range = DateRange::trailing_days(DateRange::DEFAULT_TRAILING_DAYS, self.clock.today());
        let history = self.services.history.history(&location, range).await;
        let go_on = cycle.commit(|state| {
            if !cycle.owns_history() {
                debug!("Keeping the history range picked during this load");
                return true;
            }
            apply(state, history, |state, history| state.set_history(Some(history), Some(range)))
        });
        if go_on != Some(true) {
            return;
        }

        let air = self.services.forecast.air_quality(&location).await;
        cycle.settle(air, |state, air| state.air_quality = Some(air));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Track {
    Load,
    History,
}

/// One load or history cycle. Clears its pending flag on drop unless
/// superseded.
struct Cycle<'a> {
    dashboard: &'a Dashboard,
    track: Track,
    token: u64,
    /// History token a load claimed when it committed its location.
    history_token: AtomicU64,
    /// Location a history cycle was started for.
    location: Option<Location>,
}

impl<'a> Cycle<'a> {
    fn new(dashboard: &'a Dashboard, track: Track, token: u64) -> Self {
        Self { dashboard, track, token, history_token: AtomicU64::new(0), location: None }
    }

    fn is_latest(&self) -> bool {
        let latest = match self.track {
            Track::Load => &self.dashboard.latest_cycle,
            Track::History => &self.dashboard.latest_history,
        };
        latest.load(Ordering::SeqCst) == self.token
    }

    fn is_current(&self, state: &SessionState) -> bool {
        let current = self.is_latest()
            && match &self.location {
                Some(location) => state.location.as_ref() == Some(location),
                None => true,
            };
        if !current {
            debug!(token = self.token, track = ?self.track, "Cycle superseded, discarding results");
        }
        current
    }

    /// Whether no range change started since this load committed its location.
    fn owns_history(&self) -> bool {
        self.dashboard.latest_history.load(Ordering::SeqCst)
            == self.history_token.load(Ordering::SeqCst)
    }

    /// Apply `f` if this cycle is still the latest.
    fn commit<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        let mut state = self.dashboard.state.lock();
        if !self.is_current(&state) {
            return None;
        }
        Some(f(&mut state))
    }

    /// Apply a successful result, or record its error if it is the first one.
    /// Returns whether the cycle should go on.
    fn settle<T>(
        &self,
        result: Result<T, WeatherError>,
        on_success: impl FnOnce(&mut SessionState, T),
    ) -> bool {
        self.commit(|state| apply(state, result, on_success)).unwrap_or(false)
    }

    /// Record `err` unless an earlier error is already shown.
    fn fail(&self, err: &WeatherError) {
        warn!("{}", err);
        self.commit(|state| state.record_error(err));
    }
}

fn apply<T>(
    state: &mut SessionState,
    result: Result<T, WeatherError>,
    on_success: impl FnOnce(&mut SessionState, T),
) -> bool {
    match result {
        Ok(value) => {
            on_success(state, value);
            true
        }
        Err(e) => {
            warn!("{}", e);
            state.record_error(&e);
            false
        }
    }
}

impl Drop for Cycle<'_> {
    fn drop(&mut self) {
        let mut state = self.dashboard.state.lock();
        if self.is_latest() {
            let pending = match self.track {
                Track::Load => &self.dashboard.load_pending,
                Track::History => &self.dashboard.history_pending,
            };
            pending.store(false, Ordering::SeqCst);
            self.dashboard.sync_loading(&mut state);
        }
    }
}
