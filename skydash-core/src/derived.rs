//! Pure derivations from loaded data: threshold alerts, summary statistics,
//! air-quality classification.

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{AirQualitySample, CurrentConditions, DailyRecord, HourlyRecord};

pub const HIGH_WIND_KMH: f64 = 50.0;
pub const HEAVY_RAIN_MM: f64 = 20.0;
pub const HIGH_UV: f64 = 8.0;
pub const EXTREME_HEAT_C: f64 = 40.0;
pub const FROST_C: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Wind,
    Rain,
    Uv,
    Heat,
    Frost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: &'static str,
}

pub fn alerts(current: &CurrentConditions) -> Vec<Alert> {
    let checks = [
        (current.wind_speed > HIGH_WIND_KMH, AlertKind::Wind, "🌪️ High Wind Warning"),
        (current.precipitation > HEAVY_RAIN_MM, AlertKind::Rain, "🌊 Heavy Rain Warning"),
        (current.uv_index > HIGH_UV, AlertKind::Uv, "☀️ High UV Warning"),
        (current.temperature > EXTREME_HEAT_C, AlertKind::Heat, "🌡️ Extreme Heat Warning"),
        (current.temperature < FROST_C, AlertKind::Frost, "❄️ Frost Warning"),
    ];

    checks
        .into_iter()
        .filter(|(hit, ..)| *hit)
        .map(|(_, kind, message)| Alert { kind, message })
        .collect()
}

/// A day singled out by one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayExtreme {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub days: usize,
    pub hottest: Option<DayExtreme>,
    pub coldest: Option<DayExtreme>,
    pub wettest: Option<DayExtreme>,
    /// Mean of the daily `(max + min) / 2`, over days reporting both.
    pub average_temperature: Option<f64>,
    pub total_precipitation: f64,
}

/// Pick the day whose `metric` wins under `better`; earliest day wins ties.
fn extreme(
    days: &[DailyRecord],
    metric: impl Fn(&DailyRecord) -> Option<f64>,
    better: impl Fn(f64, f64) -> bool,
) -> Option<DayExtreme> {
    days.iter().fold(None, |best: Option<DayExtreme>, day| match metric(day) {
        Some(value) if best.is_none_or(|b| better(value, b.value)) => {
            Some(DayExtreme { date: day.date, value })
        }
        _ => best,
    })
}

pub fn summary_stats(days: &[DailyRecord]) -> Option<SummaryStats> {
    if days.is_empty() {
        return None;
    }

    let means: Vec<f64> = days
        .iter()
        .filter_map(|d| Some((d.temp_max? + d.temp_min?) / 2.0))
        .collect();
    let average_temperature =
        (!means.is_empty()).then(|| means.iter().sum::<f64>() / means.len() as f64);

    Some(SummaryStats {
        days: days.len(),
        hottest: extreme(days, |d| d.temp_max, |a, b| a > b),
        coldest: extreme(days, |d| d.temp_min, |a, b| a < b),
        wettest: extreme(days, |d| d.precipitation_total, |a, b| a > b),
        average_temperature,
        total_precipitation: days.iter().filter_map(|d| d.precipitation_total).sum(),
    })
}

/// US AQI bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub fn classify(us_aqi: f64) -> Self {
        match us_aqi {
            a if a <= 50.0 => Self::Good,
            a if a <= 100.0 => Self::Moderate,
            a if a <= 150.0 => Self::UnhealthyForSensitive,
            a if a <= 200.0 => Self::Unhealthy,
            a if a <= 300.0 => Self::VeryUnhealthy,
            _ => Self::Hazardous,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthyForSensitive => "Unhealthy for sensitive",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Good => "😊",
            Self::Moderate => "😐",
            Self::UnhealthyForSensitive => "😷",
            Self::Unhealthy => "🤒",
            Self::VeryUnhealthy => "😨",
            Self::Hazardous => "☠️",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Good => "Air quality is considered satisfactory.",
            Self::Moderate => {
                "Acceptable air quality; some pollutants may be a concern for a small number of sensitive people."
            }
            Self::UnhealthyForSensitive => {
                "Sensitive groups should reduce prolonged or heavy exertion outdoors."
            }
            Self::Unhealthy => {
                "Everyone may begin to experience health effects; sensitive groups more serious."
            }
            Self::VeryUnhealthy => {
                "Health alert: everyone may experience more serious health effects."
            }
            Self::Hazardous => "Emergency conditions: everyone should avoid all outdoor exertion.",
        }
    }
}

/// Most recent sample.
pub fn latest_air_quality(samples: &[AirQualitySample]) -> Option<&AirQualitySample> {
    samples.last()
}

/// The last `hours` samples, oldest first.
pub fn recent_air_quality(samples: &[AirQualitySample], hours: usize) -> &[AirQualitySample] {
    &samples[samples.len().saturating_sub(hours)..]
}

/// Hours belonging to calendar day `date`, in upstream order.
pub fn hourly_for_date(hours: &[HourlyRecord], date: NaiveDate) -> Vec<&HourlyRecord> {
    hours.iter().filter(|h| h.timestamp.date() == date).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather_code;

    fn conditions(temperature: f64, wind: f64, precip: f64, uv: f64) -> CurrentConditions {
        CurrentConditions {
            location_name: "Test".into(),
            temperature,
            feels_like: temperature,
            humidity: 50.0,
            wind_speed: wind,
            wind_direction: "N".into(),
            pressure: 1013.0,
            visibility: 10.0,
            uv_index: uv,
            precipitation: precip,
            description: "Sunny".into(),
            weather_code: Some(113),
            observed_at: None,
        }
    }

    fn day(date: &str, max: Option<f64>, min: Option<f64>, rain: Option<f64>) -> DailyRecord {
        DailyRecord {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            weather_code: Some(0),
            descriptor: weather_code::resolve(0),
            temp_max: max,
            temp_min: min,
            precipitation_total: rain,
            rain_probability: None,
            wind_speed_max: None,
            sunrise: None,
            sunset: None,
        }
    }

    #[test]
    fn calm_weather_has_no_alerts() {
        assert!(alerts(&conditions(20.0, 10.0, 0.0, 3.0)).is_empty());
    }

    #[test]
    fn thresholds_are_strict() {
        assert!(alerts(&conditions(40.0, 50.0, 20.0, 8.0)).is_empty());
        assert!(alerts(&conditions(0.0, 0.0, 0.0, 0.0)).is_empty());
    }

    #[test]
    fn multiple_alerts_in_fixed_order() {
        let kinds: Vec<_> =
            alerts(&conditions(41.0, 60.0, 25.0, 9.0)).into_iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::Wind, AlertKind::Rain, AlertKind::Uv, AlertKind::Heat]);

        let frost = alerts(&conditions(-3.0, 0.0, 0.0, 0.0));
        assert_eq!(frost, vec![Alert { kind: AlertKind::Frost, message: "❄️ Frost Warning" }]);
    }

    #[test]
    fn aggregate_max_attributed_to_day() {
        let days = [
            day("2024-01-01", Some(10.0), Some(2.0), Some(0.0)),
            day("2024-01-02", Some(12.0), Some(3.0), Some(1.5)),
        ];
        let stats = summary_stats(&days).unwrap();

        let hottest = stats.hottest.unwrap();
        assert_eq!(hottest.value, 12.0);
        assert_eq!(hottest.date.to_string(), "2024-01-02");

        let coldest = stats.coldest.unwrap();
        assert_eq!(coldest.value, 2.0);
        assert_eq!(coldest.date.to_string(), "2024-01-01");

        assert_eq!(stats.wettest.unwrap().date.to_string(), "2024-01-02");
        assert_eq!(stats.average_temperature, Some(6.75));
        assert_eq!(stats.total_precipitation, 1.5);
        assert_eq!(stats.days, 2);
    }

    #[test]
    fn ties_keep_earliest_day() {
        let days = [
            day("2024-01-01", Some(12.0), Some(3.0), Some(0.0)),
            day("2024-01-02", Some(12.0), Some(3.0), Some(0.0)),
        ];
        let stats = summary_stats(&days).unwrap();
        assert_eq!(stats.hottest.unwrap().date.to_string(), "2024-01-01");
        assert_eq!(stats.coldest.unwrap().date.to_string(), "2024-01-01");
    }

    #[test]
    fn missing_values_are_skipped() {
        let days = [
            day("2024-01-01", None, None, None),
            day("2024-01-02", Some(5.0), Some(1.0), None),
        ];
        let stats = summary_stats(&days).unwrap();
        assert_eq!(stats.hottest.unwrap().date.to_string(), "2024-01-02");
        assert_eq!(stats.average_temperature, Some(3.0));
        assert!(stats.wettest.is_none());
        assert_eq!(stats.total_precipitation, 0.0);
    }

    #[test]
    fn empty_history_has_no_stats() {
        assert!(summary_stats(&[]).is_none());
    }

    #[test]
    fn aqi_bands() {
        assert_eq!(AqiCategory::classify(0.0), AqiCategory::Good);
        assert_eq!(AqiCategory::classify(50.0), AqiCategory::Good);
        assert_eq!(AqiCategory::classify(51.0), AqiCategory::Moderate);
        assert_eq!(AqiCategory::classify(150.0), AqiCategory::UnhealthyForSensitive);
        assert_eq!(AqiCategory::classify(200.0), AqiCategory::Unhealthy);
        assert_eq!(AqiCategory::classify(300.0), AqiCategory::VeryUnhealthy);
        assert_eq!(AqiCategory::classify(301.0), AqiCategory::Hazardous);
        assert_eq!(AqiCategory::Hazardous.label(), "Hazardous");
    }

    fn sample(hour: u32, aqi: f64) -> AirQualitySample {
        AirQualitySample {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(hour, 0, 0).unwrap(),
            us_aqi: Some(aqi),
            pm2_5: None,
            pm10: None,
        }
    }

    #[test]
    fn air_quality_windows() {
        let samples: Vec<_> = (0..5).map(|h| sample(h, f64::from(h * 10))).collect();
        assert_eq!(latest_air_quality(&samples).unwrap().us_aqi, Some(40.0));
        assert_eq!(recent_air_quality(&samples, 2).len(), 2);
        assert_eq!(recent_air_quality(&samples, 24).len(), 5);
        assert!(latest_air_quality(&[]).is_none());
    }

    #[test]
    fn hourly_filtered_by_day() {
        let at = |d: u32, h: u32| HourlyRecord {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, d).unwrap().and_hms_opt(h, 0, 0).unwrap(),
            temperature: Some(1.0),
            precipitation_probability: None,
            precipitation: None,
            weather_code: None,
            wind_speed: None,
        };
        let hours = vec![at(1, 22), at(1, 23), at(2, 0), at(2, 1)];
        let day2 = hourly_for_date(&hours, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(day2.len(), 2);
        assert_eq!(day2[0].timestamp.to_string(), "2024-01-02 00:00:00");
    }
}
