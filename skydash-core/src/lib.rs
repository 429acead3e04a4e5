//! Core library for the `skydash` weather dashboard.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Clients for the conditions, forecast, archive and geocoding services
//! - The dashboard session: load cycles, derived alerts and statistics
//! - Persisted display preferences and recent searches
//!
//! It is used by `skydash-cli`, but can also drive other front-ends.

pub mod config;
pub mod dashboard;
pub mod derived;
pub mod error;
pub mod location;
pub mod model;
pub mod preferences;
pub mod provider;
pub mod ticker;
pub mod weather_code;

pub use config::{Config, Endpoints, ProviderConfig};
pub use dashboard::{Clock, Dashboard, FixedClock, Services, SessionState, SystemClock};
pub use error::{ErrorKind, ErrorReport, WeatherError};
pub use model::{
    Coordinates, CurrentConditions, DateRange, Location, LocationQuery, Outlook, TemperatureUnit,
    Theme,
};
pub use preferences::{PersistedPreferences, PreferenceStore};
pub use ticker::{Subscription, Ticker};
