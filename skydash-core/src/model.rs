use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::{error::WeatherError, weather_code::WeatherDescriptor};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, WeatherError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return Err(WeatherError::Validation(format!(
                "Invalid coordinates ({latitude}, {longitude})."
            )));
        }
        Ok(Self { latitude, longitude })
    }

    /// The `lat,lon` form accepted by the conditions provider as a query.
    pub fn as_query(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

/// What the user asked to load.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    Name(String),
    Coordinates(Coordinates),
}

impl LocationQuery {
    pub fn name(text: impl Into<String>) -> Self {
        Self::Name(text.into())
    }
}

/// A resolved place. Replaced wholesale on every search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub display_name: String,
    pub country: String,
    pub country_code: String,
}

impl Location {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates { latitude: self.latitude, longitude: self.longitude }
    }

    /// `"name, country"`, or just the name when the country is unknown.
    pub fn label(&self) -> String {
        label(&self.display_name, &self.country)
    }
}

fn label(name: &str, country: &str) -> String {
    if country.is_empty() { name.to_string() } else { format!("{name}, {country}") }
}

/// Point-in-time snapshot from the conditions provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub location_name: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub wind_direction: String,
    pub pressure: f64,
    pub visibility: f64,
    pub uv_index: f64,
    pub precipitation: f64,
    pub description: String,
    pub weather_code: Option<i32>,
    pub observed_at: Option<NaiveDateTime>,
}

/// One calendar day of forecast or archive data, in provider-local time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub weather_code: Option<i32>,
    pub descriptor: WeatherDescriptor,
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub precipitation_total: Option<f64>,
    /// Absent for archive days.
    pub rain_probability: Option<f64>,
    pub wind_speed_max: Option<f64>,
    pub sunrise: Option<NaiveDateTime>,
    pub sunset: Option<NaiveDateTime>,
}

/// One hour of forecast or archive data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyRecord {
    pub timestamp: NaiveDateTime,
    pub temperature: Option<f64>,
    pub precipitation_probability: Option<f64>,
    pub precipitation: Option<f64>,
    pub weather_code: Option<i32>,
    pub wind_speed: Option<f64>,
}

/// Daily and hourly records for one location.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Outlook {
    pub daily: Vec<DailyRecord>,
    pub hourly: Vec<HourlyRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirQualitySample {
    pub timestamp: NaiveDateTime,
    pub us_aqi: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
}

/// Earliest day the archive provider serves.
pub fn archive_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(1940, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Inclusive calendar range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub const DEFAULT_TRAILING_DAYS: u32 = 7;

    /// Presets offered for history: a week up to twenty years.
    pub const QUICK_PRESETS: &'static [u32] = &[7, 30, 90, 180, 365, 3650, 7300];

    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, WeatherError> {
        if start > end {
            return Err(WeatherError::Validation(format!(
                "Start date {start} is after end date {end}."
            )));
        }
        Ok(Self { start, end })
    }

    /// `days` days ending yesterday, clamped to the archive start.
    pub fn trailing_days(days: u32, today: NaiveDate) -> Self {
        let end = yesterday(today);
        let start = end
            .checked_sub_days(Days::new(u64::from(days.max(1) - 1)))
            .unwrap_or(NaiveDate::MIN)
            .max(archive_start());
        Self { start, end: end.max(start) }
    }

    /// Check the range against what the archive can answer on `today`.
    pub fn validate_against(&self, today: NaiveDate) -> Result<(), WeatherError> {
        if self.start < archive_start() {
            return Err(WeatherError::Validation(format!(
                "History is only available from {}.",
                archive_start()
            )));
        }
        let latest = yesterday(today);
        if self.end > latest {
            return Err(WeatherError::Validation(format!(
                "History is only available up to {latest}."
            )));
        }
        Ok(())
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start, self.end)
    }
}

fn yesterday(today: NaiveDate) -> NaiveDate {
    today.pred_opt().unwrap_or(NaiveDate::MIN)
}

/// Temperature unit preference. Providers always report Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Celsius => "celsius",
            Self::Fahrenheit => "fahrenheit",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Celsius => Self::Fahrenheit,
            Self::Fahrenheit => Self::Celsius,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }

    pub fn convert(&self, celsius: f64) -> f64 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// Rounded value with unit symbol, e.g. `"12°C"`.
    pub fn format(&self, celsius: f64) -> String {
        format!("{:.0}{}", self.convert(celsius), self.symbol())
    }
}

impl FromStr for TemperatureUnit {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "celsius" => Ok(Self::Celsius),
            "fahrenheit" => Ok(Self::Fahrenheit),
            other => Err(WeatherError::Validation(format!("Unknown unit '{other}'."))),
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

impl FromStr for Theme {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            other => Err(WeatherError::Validation(format!("Unknown theme '{other}'."))),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentSearchEntry {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub country: String,
}

impl RecentSearchEntry {
    pub fn new(name: impl Into<String>, country: impl Into<String>) -> Self {
        let name = name.into();
        let country = country.into();
        Self { key: label(&name, &country), name, country }
    }

    pub fn for_location(location: &Location) -> Self {
        Self::new(location.display_name.clone(), location.country.clone())
    }
}

/// Most-recent-first list of searches, unique by key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<RecentSearchEntry>", into = "Vec<RecentSearchEntry>")]
pub struct RecentSearches(Vec<RecentSearchEntry>);

impl RecentSearches {
    pub const MAX_ENTRIES: usize = 5;

    /// Insert at the front; an existing entry with the same key moves instead.
    pub fn promote(&mut self, entry: RecentSearchEntry) {
        self.0.retain(|e| e.key != entry.key);
        self.0.insert(0, entry);
        self.0.truncate(Self::MAX_ENTRIES);
    }

    pub fn entries(&self) -> &[RecentSearchEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<RecentSearchEntry>> for RecentSearches {
    fn from(entries: Vec<RecentSearchEntry>) -> Self {
        let mut list: Vec<RecentSearchEntry> = Vec::with_capacity(Self::MAX_ENTRIES);
        for entry in entries {
            if list.len() == Self::MAX_ENTRIES {
                break;
            }
            if !list.iter().any(|e| e.key == entry.key) {
                list.push(entry);
            }
        }
        Self(list)
    }
}

impl From<RecentSearches> for Vec<RecentSearchEntry> {
    fn from(list: RecentSearches) -> Self {
        list.0
    }
}

/// A place offered while the user is still typing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub name: String,
    pub country: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Suggestion {
    pub fn label(&self) -> String {
        label(&self.name, &self.country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn coordinates_validate_bounds() {
        assert!(Coordinates::new(51.5, -0.12).is_ok());
        assert!(Coordinates::new(91.0, 0.0).is_err());
        assert!(Coordinates::new(0.0, -181.0).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
        assert_eq!(Coordinates::new(1.5, 2.25).unwrap().as_query(), "1.5,2.25");
    }

    #[test]
    fn date_range_rejects_inverted() {
        let err = DateRange::new(date("2024-01-02"), date("2024-01-01")).unwrap_err();
        assert!(matches!(err, WeatherError::Validation(_)));
        assert_eq!(DateRange::new(date("2024-01-01"), date("2024-01-01")).unwrap().num_days(), 1);
    }

    #[test]
    fn trailing_week_ends_yesterday() {
        let range = DateRange::trailing_days(7, date("2024-03-10"));
        assert_eq!(range.start(), date("2024-03-03"));
        assert_eq!(range.end(), date("2024-03-09"));
        assert_eq!(range.num_days(), 7);
    }

    #[test]
    fn trailing_days_clamp_to_archive_start() {
        let range = DateRange::trailing_days(7300, date("1950-06-01"));
        assert_eq!(range.start(), archive_start());
        assert_eq!(range.end(), date("1950-05-31"));
    }

    #[test]
    fn validate_against_bounds() {
        let today = date("2024-03-10");
        assert!(DateRange::trailing_days(7, today).validate_against(today).is_ok());

        let same_day = DateRange::new(date("2024-03-01"), today).unwrap();
        assert!(same_day.validate_against(today).is_err());

        let too_early = DateRange::new(date("1939-12-31"), date("1940-01-10")).unwrap();
        assert!(too_early.validate_against(today).is_err());
    }

    #[test]
    fn unit_parse_and_convert() {
        assert_eq!("fahrenheit".parse::<TemperatureUnit>().unwrap(), TemperatureUnit::Fahrenheit);
        assert!("kelvin".parse::<TemperatureUnit>().is_err());
        assert_eq!(TemperatureUnit::Fahrenheit.convert(100.0), 212.0);
        assert_eq!(TemperatureUnit::Celsius.format(11.6), "12°C");
        assert_eq!(TemperatureUnit::Celsius.toggled(), TemperatureUnit::Fahrenheit);
    }

    #[test]
    fn theme_parse_and_toggle() {
        assert_eq!("light".parse::<Theme>().unwrap(), Theme::Light);
        assert!("sepia".parse::<Theme>().is_err());
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
    }

    #[test]
    fn recent_searches_bounded_and_deduplicated() {
        let mut recents = RecentSearches::default();
        for name in ["A", "B", "C", "D", "E", "F"] {
            recents.promote(RecentSearchEntry::new(name, "X"));
        }
        assert_eq!(recents.len(), RecentSearches::MAX_ENTRIES);
        assert_eq!(recents.entries()[0].key, "F, X");

        recents.promote(RecentSearchEntry::new("C", "X"));
        assert_eq!(recents.len(), 5);
        assert_eq!(recents.entries()[0].key, "C, X");
        assert_eq!(recents.entries().iter().filter(|e| e.key == "C, X").count(), 1);
    }

    #[test]
    fn recent_entry_key_without_country() {
        let entry = RecentSearchEntry::new("Current Location", "");
        assert_eq!(entry.key, "Current Location");
    }

    #[test]
    fn recent_searches_from_untrusted_vec() {
        let raw: Vec<RecentSearchEntry> = (0..8)
            .map(|i| RecentSearchEntry::new(format!("City{}", i % 6), ""))
            .collect();
        let recents = RecentSearches::from(raw);
        assert_eq!(recents.len(), 5);
        assert_eq!(recents.entries()[0].key, "City0");
    }
}
