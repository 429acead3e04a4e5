//! Open-Meteo forecast, archive, air-quality and geocoding clients.
//!
//! Open-Meteo answers with index-aligned parallel arrays (`time[]`,
//! `temperature_2m_max[]`, ...). They are zipped into records here and never
//! leave this module as arrays. Upstream order is kept as-is.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::WeatherError,
    model::{AirQualitySample, DailyRecord, DateRange, HourlyRecord, Location, Outlook},
    weather_code,
};

use super::{ForecastProvider, GeocodingProvider, HistoryProvider, Place, get_text, parse_json};

pub const FORECAST_DAYS: u32 = 16;

const FORECAST_DAILY: &str = "weathercode,temperature_2m_max,temperature_2m_min,precipitation_sum,precipitation_probability_max,windspeed_10m_max,sunrise,sunset";
const FORECAST_HOURLY: &str = "temperature_2m,precipitation_probability,weathercode,windspeed_10m";
const ARCHIVE_DAILY: &str =
    "weathercode,temperature_2m_max,temperature_2m_min,precipitation_sum,windspeed_10m_max,sunrise,sunset";
const ARCHIVE_HOURLY: &str = "temperature_2m,precipitation,weathercode";
const AIR_QUALITY_HOURLY: &str = "pm10,pm2_5,us_aqi";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

fn trimmed(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

fn coordinate_params(location: &Location) -> Vec<(&'static str, String)> {
    vec![
        ("latitude", location.latitude.to_string()),
        ("longitude", location.longitude.to_string()),
        ("timezone", location.timezone.clone()),
    ]
}

/// 16-day forecast and hourly air quality.
#[derive(Debug, Clone)]
pub struct OpenMeteoForecast {
    forecast_url: String,
    air_quality_url: String,
    http: Client,
}

impl OpenMeteoForecast {
    pub fn new(forecast_base: &str, air_quality_base: &str, http: Client) -> Self {
        Self {
            forecast_url: format!("{}/v1/forecast", trimmed(forecast_base)),
            air_quality_url: format!("{}/v1/air-quality", trimmed(air_quality_base)),
            http,
        }
    }
}

#[async_trait]
impl ForecastProvider for OpenMeteoForecast {
    async fn forecast(&self, location: &Location) -> Result<Outlook, WeatherError> {
        const WHAT: &str = "forecast";

        let mut query = coordinate_params(location);
        query.push(("daily", FORECAST_DAILY.to_string()));
        query.push(("hourly", FORECAST_HOURLY.to_string()));
        query.push(("forecast_days", FORECAST_DAYS.to_string()));

        let body = get_text(&self.http, &self.forecast_url, &query, WHAT).await?;
        normalize_outlook(parse_json(&body, WHAT)?, WHAT)
    }

    async fn air_quality(
        &self,
        location: &Location,
    ) -> Result<Vec<AirQualitySample>, WeatherError> {
        const WHAT: &str = "air quality";

        let mut query = coordinate_params(location);
        query.push(("hourly", AIR_QUALITY_HOURLY.to_string()));

        let body = get_text(&self.http, &self.air_quality_url, &query, WHAT).await?;
        normalize_air_quality(parse_json(&body, WHAT)?)
    }
}

/// Archive (history) data for a date range.
#[derive(Debug, Clone)]
pub struct OpenMeteoArchive {
    archive_url: String,
    http: Client,
}

impl OpenMeteoArchive {
    pub fn new(archive_base: &str, http: Client) -> Self {
        Self { archive_url: format!("{}/v1/archive", trimmed(archive_base)), http }
    }
}

#[async_trait]
impl HistoryProvider for OpenMeteoArchive {
    async fn history(
        &self,
        location: &Location,
        range: DateRange,
    ) -> Result<Outlook, WeatherError> {
        const WHAT: &str = "history";

        let mut query = coordinate_params(location);
        query.push(("start_date", range.start().format(DATE_FORMAT).to_string()));
        query.push(("end_date", range.end().format(DATE_FORMAT).to_string()));
        query.push(("daily", ARCHIVE_DAILY.to_string()));
        query.push(("hourly", ARCHIVE_HOURLY.to_string()));

        let body = get_text(&self.http, &self.archive_url, &query, WHAT).await?;
        normalize_outlook(parse_json(&body, WHAT)?, WHAT)
    }
}

/// Location search against the Open-Meteo geocoding API.
#[derive(Debug, Clone)]
pub struct OpenMeteoGeocoding {
    search_url: String,
    http: Client,
}

impl OpenMeteoGeocoding {
    pub fn new(geocoding_base: &str, http: Client) -> Self {
        Self { search_url: format!("{}/v1/search", trimmed(geocoding_base)), http }
    }

    async fn lookup(&self, mut query: Vec<(&str, String)>) -> Result<Vec<Place>, WeatherError> {
        const WHAT: &str = "location search";

        query.push(("language", "en".to_string()));
        query.push(("format", "json".to_string()));

        let body = get_text(&self.http, &self.search_url, &query, WHAT).await?;
        let parsed: GeoResponse = parse_json(&body, WHAT)?;

        Ok(parsed.results.unwrap_or_default().into_iter().map(Place::from).collect())
    }
}

#[async_trait]
impl GeocodingProvider for OpenMeteoGeocoding {
    async fn search(&self, name: &str, count: usize) -> Result<Vec<Place>, WeatherError> {
        self.lookup(vec![("name", name.to_string()), ("count", count.to_string())]).await
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Place>, WeatherError> {
        let places = self
            .lookup(vec![
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("count", "1".to_string()),
            ])
            .await?;
        Ok(places.into_iter().next())
    }
}

#[derive(Debug, Deserialize)]
struct GeoResult {
    name: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    results: Option<Vec<GeoResult>>,
}

impl From<GeoResult> for Place {
    fn from(r: GeoResult) -> Self {
        Self {
            name: r.name,
            country: r.country.unwrap_or_default(),
            country_code: r.country_code.unwrap_or_default(),
            latitude: r.latitude,
            longitude: r.longitude,
            timezone: r.timezone,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<String>,
    weathercode: Vec<Option<i32>>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Option<Vec<Option<f64>>>,
    windspeed_10m_max: Vec<Option<f64>>,
    sunrise: Vec<Option<String>>,
    sunset: Vec<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct OmHourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    weathercode: Vec<Option<i32>>,
    #[serde(default)]
    precipitation_probability: Option<Vec<Option<f64>>>,
    #[serde(default)]
    precipitation: Option<Vec<Option<f64>>>,
    #[serde(default)]
    windspeed_10m: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct OmOutlookResponse {
    #[serde(default)]
    daily: Option<OmDaily>,
    #[serde(default)]
    hourly: Option<OmHourly>,
}

#[derive(Debug, Deserialize)]
struct OmAirHourly {
    time: Vec<String>,
    #[serde(default)]
    us_aqi: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pm2_5: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pm10: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct OmAirResponse {
    #[serde(default)]
    hourly: Option<OmAirHourly>,
}

/// Rejects a column that is not index-aligned with `time[]`.
fn aligned<T>(what: &str, field: &str, column: &[T], len: usize) -> Result<(), WeatherError> {
    if column.len() != len {
        return Err(WeatherError::MalformedResponse(format!(
            "{what}: {field} has {} entries, expected {len}",
            column.len()
        )));
    }
    Ok(())
}

fn aligned_opt<T>(
    what: &str,
    field: &str,
    column: Option<&Vec<T>>,
    len: usize,
) -> Result<(), WeatherError> {
    column.map_or(Ok(()), |c| aligned(what, field, c, len))
}

fn at<T: Copy>(column: &[Option<T>], i: usize) -> Option<T> {
    column.get(i).copied().flatten()
}

fn at_opt<T: Copy>(column: Option<&Vec<Option<T>>>, i: usize) -> Option<T> {
    column.and_then(|c| at(c, i))
}

fn parse_date(what: &str, raw: &str) -> Result<NaiveDate, WeatherError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| WeatherError::MalformedResponse(format!("{what}: bad date '{raw}': {e}")))
}

fn parse_time(what: &str, raw: &str) -> Result<NaiveDateTime, WeatherError> {
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .map_err(|e| WeatherError::MalformedResponse(format!("{what}: bad time '{raw}': {e}")))
}

fn parse_time_opt(what: &str, raw: Option<&String>) -> Result<Option<NaiveDateTime>, WeatherError> {
    raw.map(|r| parse_time(what, r)).transpose()
}

fn normalize_daily(daily: OmDaily, what: &str) -> Result<Vec<DailyRecord>, WeatherError> {
    let len = daily.time.len();
    aligned(what, "weathercode", &daily.weathercode, len)?;
    aligned(what, "temperature_2m_max", &daily.temperature_2m_max, len)?;
    aligned(what, "temperature_2m_min", &daily.temperature_2m_min, len)?;
    aligned(what, "precipitation_sum", &daily.precipitation_sum, len)?;
    aligned_opt(
        what,
        "precipitation_probability_max",
        daily.precipitation_probability_max.as_ref(),
        len,
    )?;
    aligned(what, "windspeed_10m_max", &daily.windspeed_10m_max, len)?;
    aligned(what, "sunrise", &daily.sunrise, len)?;
    aligned(what, "sunset", &daily.sunset, len)?;

    daily
        .time
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let code = at(&daily.weathercode, i);
            Ok(DailyRecord {
                date: parse_date(what, raw)?,
                weather_code: code,
                descriptor: code.map_or(weather_code::UNKNOWN, weather_code::resolve),
                temp_max: at(&daily.temperature_2m_max, i),
                temp_min: at(&daily.temperature_2m_min, i),
                precipitation_total: at(&daily.precipitation_sum, i),
                rain_probability: at_opt(daily.precipitation_probability_max.as_ref(), i),
                wind_speed_max: at(&daily.windspeed_10m_max, i),
                sunrise: parse_time_opt(what, daily.sunrise[i].as_ref())?,
                sunset: parse_time_opt(what, daily.sunset[i].as_ref())?,
            })
        })
        .collect()
}

fn normalize_hourly(hourly: OmHourly, what: &str) -> Result<Vec<HourlyRecord>, WeatherError> {
    let len = hourly.time.len();
    aligned(what, "hourly.temperature_2m", &hourly.temperature_2m, len)?;
    aligned(what, "hourly.weathercode", &hourly.weathercode, len)?;
    aligned_opt(
        what,
        "hourly.precipitation_probability",
        hourly.precipitation_probability.as_ref(),
        len,
    )?;
    aligned_opt(what, "hourly.precipitation", hourly.precipitation.as_ref(), len)?;
    aligned_opt(what, "hourly.windspeed_10m", hourly.windspeed_10m.as_ref(), len)?;

    hourly
        .time
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            Ok(HourlyRecord {
                timestamp: parse_time(what, raw)?,
                temperature: at(&hourly.temperature_2m, i),
                precipitation_probability: at_opt(hourly.precipitation_probability.as_ref(), i),
                precipitation: at_opt(hourly.precipitation.as_ref(), i),
                weather_code: at(&hourly.weathercode, i),
                wind_speed: at_opt(hourly.windspeed_10m.as_ref(), i),
            })
        })
        .collect()
}

fn normalize_outlook(parsed: OmOutlookResponse, what: &str) -> Result<Outlook, WeatherError> {
    let daily = parsed
        .daily
        .ok_or_else(|| WeatherError::MalformedResponse(format!("{what}: missing daily")))?;

    let daily = normalize_daily(daily, what)?;
    let hourly = match parsed.hourly {
        Some(h) => normalize_hourly(h, what)?,
        None => Vec::new(),
    };

    Ok(Outlook { daily, hourly })
}

fn normalize_air_quality(parsed: OmAirResponse) -> Result<Vec<AirQualitySample>, WeatherError> {
    const WHAT: &str = "air quality";

    let hourly = parsed
        .hourly
        .ok_or_else(|| WeatherError::MalformedResponse(format!("{WHAT}: missing hourly")))?;
    let len = hourly.time.len();
    aligned_opt(WHAT, "us_aqi", hourly.us_aqi.as_ref(), len)?;
    aligned_opt(WHAT, "pm2_5", hourly.pm2_5.as_ref(), len)?;
    aligned_opt(WHAT, "pm10", hourly.pm10.as_ref(), len)?;

    hourly
        .time
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            Ok(AirQualitySample {
                timestamp: parse_time(WHAT, raw)?,
                us_aqi: at_opt(hourly.us_aqi.as_ref(), i),
                pm2_5: at_opt(hourly.pm2_5.as_ref(), i),
                pm10: at_opt(hourly.pm10.as_ref(), i),
            })
        })
        .collect()
}
