//! Turning free text or coordinates into a [`Location`], and detecting where
//! the user is.

use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc, time::Duration};
use tracing::debug;

use crate::{
    error::WeatherError,
    model::{Coordinates, Location, Suggestion},
    provider::{GeocodingProvider, Place},
};

/// Display name used when reverse lookup finds nothing.
pub const FALLBACK_NAME: &str = "Current Location";

/// Timezone passed upstream when the provider doesn't report one.
pub const AUTO_TIMEZONE: &str = "auto";

pub const SUGGESTION_LIMIT: usize = 5;

/// Upper bound on how long coordinate detection may take.
pub const DETECT_TIMEOUT: Duration = Duration::from_secs(10);

impl From<Place> for Location {
    fn from(place: Place) -> Self {
        Self {
            latitude: place.latitude,
            longitude: place.longitude,
            timezone: place.timezone.unwrap_or_else(|| AUTO_TIMEZONE.to_string()),
            display_name: place.name,
            country: place.country,
            country_code: place.country_code,
        }
    }
}

impl From<Place> for Suggestion {
    fn from(place: Place) -> Self {
        Self {
            name: place.name,
            country: place.country,
            country_code: place.country_code,
            latitude: place.latitude,
            longitude: place.longitude,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocationResolver {
    geocoder: Arc<dyn GeocodingProvider>,
}

impl LocationResolver {
    pub fn new(geocoder: Arc<dyn GeocodingProvider>) -> Self {
        Self { geocoder }
    }

    /// Best match for `text`, or `None` when the search has no results.
    pub async fn resolve_by_name(&self, text: &str) -> Result<Option<Location>, WeatherError> {
        debug!("Geocoding location name: {}", text);
        let places = self.geocoder.search(text, 1).await?;
        Ok(places.into_iter().next().map(Location::from))
    }

    /// Name the place at `coords`. Lookup failures degrade to [`FALLBACK_NAME`].
    pub async fn resolve_by_coordinates(&self, coords: Coordinates) -> Location {
        let place = match self.geocoder.reverse(coords.latitude, coords.longitude).await {
            Ok(place) => place,
            Err(e) => {
                debug!("Reverse lookup failed: {}, using fallback name", e);
                None
            }
        };

        // Keep the exact coordinates; the lookup only supplies naming.
        match place {
            Some(p) => Location {
                latitude: coords.latitude,
                longitude: coords.longitude,
                ..Location::from(p)
            },
            None => Location {
                latitude: coords.latitude,
                longitude: coords.longitude,
                timezone: AUTO_TIMEZONE.to_string(),
                display_name: FALLBACK_NAME.to_string(),
                country: String::new(),
                country_code: String::new(),
            },
        }
    }

    pub async fn suggest(&self, partial: &str) -> Result<Vec<Suggestion>, WeatherError> {
        let places = self.geocoder.search(partial, SUGGESTION_LIMIT).await?;
        Ok(places.into_iter().take(SUGGESTION_LIMIT).map(Suggestion::from).collect())
    }
}

/// Source of the device's coordinates.
#[async_trait]
pub trait LocationDetector: Send + Sync + Debug {
    async fn detect(&self) -> Result<Coordinates, WeatherError>;
}

/// For environments with no way to locate the user.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedDetector;

#[async_trait]
impl LocationDetector for UnsupportedDetector {
    async fn detect(&self) -> Result<Coordinates, WeatherError> {
        Err(WeatherError::UnsupportedEnvironment("Location detection".to_string()))
    }
}

/// Reports a fixed position, such as configured home coordinates.
#[derive(Debug, Clone, Copy)]
pub struct FixedDetector(pub Coordinates);

#[async_trait]
impl LocationDetector for FixedDetector {
    async fn detect(&self) -> Result<Coordinates, WeatherError> {
        Ok(self.0)
    }
}

/// Run `detector`, failing with `LocationUnavailable` after `timeout`.
pub async fn detect_within(
    detector: &dyn LocationDetector,
    timeout: Duration,
) -> Result<Coordinates, WeatherError> {
    match tokio::time::timeout(timeout, detector.detect()).await {
        Ok(result) => result,
        Err(_) => Err(WeatherError::LocationUnavailable(format!(
            "timed out after {} seconds",
            timeout.as_secs()
        ))),
    }
}
