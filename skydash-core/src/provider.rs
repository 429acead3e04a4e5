use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

use crate::{
    error::WeatherError,
    model::{AirQualitySample, CurrentConditions, DateRange, Location, Outlook},
};

pub mod open_meteo;
pub mod weatherstack;

pub use open_meteo::{OpenMeteoArchive, OpenMeteoForecast, OpenMeteoGeocoding};
pub use weatherstack::WeatherstackProvider;

/// A place returned by the location-search provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub name: String,
    pub country: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: Option<String>,
}

/// Point-in-time conditions for a city name or `lat,lon` query.
#[async_trait]
pub trait CurrentConditionsProvider: Send + Sync + Debug {
    async fn current(&self, query: &str) -> Result<CurrentConditions, WeatherError>;
}

/// Multi-day outlook and hourly air quality.
#[async_trait]
pub trait ForecastProvider: Send + Sync + Debug {
    async fn forecast(&self, location: &Location) -> Result<Outlook, WeatherError>;

    async fn air_quality(&self, location: &Location)
    -> Result<Vec<AirQualitySample>, WeatherError>;
}

/// Retrospective daily and hourly data.
#[async_trait]
pub trait HistoryProvider: Send + Sync + Debug {
    async fn history(&self, location: &Location, range: DateRange)
    -> Result<Outlook, WeatherError>;
}

/// Forward and reverse place lookup.
#[async_trait]
pub trait GeocodingProvider: Send + Sync + Debug {
    async fn search(&self, name: &str, count: usize) -> Result<Vec<Place>, WeatherError>;

    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Place>, WeatherError>;
}

/// GET `url` and return the body of a 2xx response.
pub(crate) async fn get_text(
    http: &Client,
    url: &str,
    query: &[(&str, String)],
    what: &str,
) -> Result<String, WeatherError> {
    tracing::debug!(url, what, "Sending request");

    let res = http
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| WeatherError::Transport(format!("Failed to send {what} request: {e}")))?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| WeatherError::Transport(format!("Failed to read {what} response: {e}")))?;

    if !status.is_success() {
        return Err(WeatherError::upstream(
            Some(status.as_u16()),
            format!("{what} request failed: {}", truncate_body(&body)),
        ));
    }

    Ok(body)
}

pub(crate) fn parse_json<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, WeatherError> {
    serde_json::from_str(body).map_err(|e| WeatherError::MalformedResponse(format!("{what}: {e}")))
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_body_untouched() {
        assert_eq!(truncate_body("oops"), "oops");
    }

    #[test]
    fn truncate_long_body_on_char_boundary() {
        let body = "é".repeat(300);
        let out = truncate_body(&body);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 203);
    }

    #[test]
    fn parse_json_reports_malformed() {
        let err = parse_json::<serde_json::Value>("{not json", "forecast").unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse(ref m) if m.starts_with("forecast")));
    }
}
