use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Client;
use serde::Deserialize;

use crate::{error::WeatherError, model::CurrentConditions};

use super::{CurrentConditionsProvider, get_text, parse_json};

const WHAT: &str = "current conditions";

#[derive(Debug, Clone)]
pub struct WeatherstackProvider {
    api_key: Option<String>,
    base_url: String,
    http: Client,
}

impl WeatherstackProvider {
    pub fn new(api_key: Option<String>, base_url: &str, http: Client) -> Self {
        Self { api_key, base_url: base_url.trim_end_matches('/').to_string(), http }
    }
}

#[derive(Debug, Deserialize)]
struct WsError {
    #[serde(default)]
    info: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WsLocation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    localtime: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WsCurrent {
    temperature: f64,
    feelslike: f64,
    humidity: f64,
    wind_speed: f64,
    #[serde(default)]
    wind_dir: String,
    pressure: f64,
    visibility: f64,
    uv_index: f64,
    precip: f64,
    #[serde(default)]
    weather_code: Option<i32>,
    #[serde(default)]
    weather_descriptions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WsResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<WsError>,
    #[serde(default)]
    location: Option<WsLocation>,
    #[serde(default)]
    current: Option<WsCurrent>,
}

fn normalize(parsed: WsResponse) -> Result<CurrentConditions, WeatherError> {
    if parsed.success == Some(false) || parsed.error.is_some() {
        let message = parsed
            .error
            .and_then(|e| e.info.or(e.kind))
            .unwrap_or_else(|| "Failed to fetch current weather.".to_string());
        return Err(WeatherError::upstream(None, message));
    }

    let current = parsed
        .current
        .ok_or_else(|| WeatherError::MalformedResponse(format!("{WHAT}: missing current")))?;
    let location = parsed.location;

    let observed_at = location
        .as_ref()
        .and_then(|l| l.localtime.as_deref())
        .and_then(|t| NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M").ok());

    let location_name = match location {
        Some(l) if !l.country.is_empty() => format!("{}, {}", l.name, l.country),
        Some(l) => l.name,
        None => String::new(),
    };

    let description = current
        .weather_descriptions
        .first()
        .cloned()
        .unwrap_or_else(|| "Unknown".to_string());

    Ok(CurrentConditions {
        location_name,
        temperature: current.temperature,
        feels_like: current.feelslike,
        humidity: current.humidity,
        wind_speed: current.wind_speed,
        wind_direction: current.wind_dir,
        pressure: current.pressure,
        visibility: current.visibility,
        uv_index: current.uv_index,
        precipitation: current.precip,
        description,
        weather_code: current.weather_code,
        observed_at,
    })
}

#[async_trait]
impl CurrentConditionsProvider for WeatherstackProvider {
    async fn current(&self, query: &str) -> Result<CurrentConditions, WeatherError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            WeatherError::upstream(
                None,
                "No API key configured for current conditions. Run `skydash configure`.",
            )
        })?;

        let url = format!("{}/current", self.base_url);
        let body = get_text(
            &self.http,
            &url,
            &[
                ("access_key", api_key.to_string()),
                ("query", query.to_string()),
                ("units", "m".to_string()),
            ],
            WHAT,
        )
        .await?;

        normalize(parse_json(&body, WHAT)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<CurrentConditions, WeatherError> {
        normalize(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn normalizes_success_payload() {
        let cc = parse(json!({
            "location": { "name": "London", "country": "United Kingdom", "localtime": "2024-01-01 12:14" },
            "current": {
                "temperature": 13, "feelslike": 11, "humidity": 81, "wind_speed": 17,
                "wind_dir": "WSW", "pressure": 1010, "visibility": 10, "uv_index": 2,
                "precip": 0.3, "weather_code": 113, "weather_descriptions": ["Sunny"]
            }
        }))
        .unwrap();

        assert_eq!(cc.location_name, "London, United Kingdom");
        assert_eq!(cc.temperature, 13.0);
        assert_eq!(cc.description, "Sunny");
        assert_eq!(cc.wind_direction, "WSW");
        assert_eq!(cc.observed_at.unwrap().to_string(), "2024-01-01 12:14:00");
    }

    #[test]
    fn success_false_is_upstream_error() {
        let err = parse(json!({
            "success": false,
            "error": { "code": 101, "type": "invalid_access_key", "info": "You have not supplied a valid API Access Key." }
        }))
        .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::Upstream);
        assert!(err.user_message().contains("valid API Access Key"));
    }

    #[test]
    fn missing_current_is_malformed() {
        let err = parse(json!({ "location": { "name": "X" } })).unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_request() {
        let provider = WeatherstackProvider::new(None, "http://127.0.0.1:9", Client::new());
        let err = provider.current("London").await.unwrap_err();
        assert!(err.user_message().contains("No API key configured"));
    }
}
