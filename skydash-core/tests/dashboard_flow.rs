//! End-to-end Dashboard tests against a wiremock server standing in for
//! every upstream service.

use chrono::NaiveDate;
use serde_json::json;
use skydash_core::{
    Config, Dashboard, Endpoints, ErrorKind, FixedClock, LocationQuery, PersistedPreferences,
    Services, TemperatureUnit,
    preferences::{MemoryStore, PreferenceStore, RECENTS_KEY},
};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn daily(days: &[&str], max: f64, rain: f64) -> serde_json::Value {
    let n = days.len();
    json!({
        "time": days,
        "weathercode": vec![3; n],
        "temperature_2m_max": vec![max; n],
        "temperature_2m_min": vec![max - 6.0; n],
        "precipitation_sum": vec![rain; n],
        "windspeed_10m_max": vec![15.0; n],
        "sunrise": vec![serde_json::Value::Null; n],
        "sunset": vec![serde_json::Value::Null; n],
    })
}

async fn mount_services(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "location": { "name": "Oslo", "country": "Norway" },
            "current": {
                "temperature": 55, "feelslike": 50, "humidity": 20, "wind_speed": 5,
                "wind_dir": "N", "pressure": 1010, "visibility": 10, "uv_index": 3,
                "precip": 0, "weather_code": 113, "weather_descriptions": ["Sunny"]
            }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("name", "Oslo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "name": "Oslo", "country": "Norway", "country_code": "NO",
                "latitude": 59.91, "longitude": 10.75, "timezone": "Europe/Oslo"
            }]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("name", "Atlantis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "daily": daily(&["2024-03-10", "2024-03-11", "2024-03-12"], 8.0, 1.0),
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/air-quality"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hourly": { "time": ["2024-03-10T00:00"], "us_aqi": [30.0] }
        })))
        .mount(server)
        .await;
}

fn dashboard(server: &MockServer, store: Arc<MemoryStore>) -> Dashboard {
    let mut config = Config { endpoints: Endpoints::all(&server.uri()), ..Config::default() };
    config.set_conditions_api_key("test-key".to_string());

    let services = Services::from_config(&config).unwrap();
    Dashboard::new(
        services,
        PersistedPreferences::new(store),
        Arc::new(FixedClock(date("2024-03-10"))),
    )
}

#[tokio::test]
async fn test_full_load_against_mock_services() {
    let mock_server = MockServer::start().await;
    mount_services(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/v1/archive"))
        .and(query_param("start_date", "2024-03-03"))
        .and(query_param("end_date", "2024-03-09"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "daily": daily(&["2024-03-03", "2024-03-04"], 5.0, 2.0),
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryStore::default());
    let dash = dashboard(&mock_server, store.clone());
    dash.resolve_and_load(LocationQuery::name("Oslo")).await;

    let s = dash.snapshot();
    assert!(s.error.is_none(), "unexpected error: {:?}", s.error);
    assert!(!s.loading);
    assert_eq!(s.location.as_ref().unwrap().timezone, "Europe/Oslo");
    assert_eq!(s.current.as_ref().unwrap().location_name, "Oslo, Norway");
    assert_eq!(s.forecast.as_ref().unwrap().daily.len(), 3);
    assert!(s.forecast.as_ref().unwrap().hourly.is_empty());
    assert_eq!(s.air_quality.as_ref().unwrap().len(), 1);

    // 55 degrees trips the extreme-heat alert.
    assert_eq!(s.alerts.len(), 1);

    let stats = s.history_stats.unwrap();
    assert_eq!(stats.days, 2);
    assert_eq!(stats.total_precipitation, 4.0);

    assert!(store.get(RECENTS_KEY).unwrap().unwrap().contains("Oslo, Norway"));
}

#[tokio::test]
async fn test_history_failure_keeps_location_and_forecast() {
    let mock_server = MockServer::start().await;
    mount_services(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/v1/archive"))
        .respond_with(ResponseTemplate::new(500).set_body_string("archive down"))
        .mount(&mock_server)
        .await;

    let dash = dashboard(&mock_server, Arc::new(MemoryStore::default()));
    dash.resolve_and_load(LocationQuery::name("Oslo")).await;

    let s = dash.snapshot();
    assert_eq!(s.location.unwrap().display_name, "Oslo");
    assert!(s.forecast.is_some());
    assert!(s.history.is_none());
    // The failed history fetch ends the cycle before air quality.
    assert!(s.air_quality.is_none());
    assert_eq!(s.error.unwrap().kind, ErrorKind::Upstream);
}

#[tokio::test]
async fn test_unknown_place_reports_not_found() {
    let mock_server = MockServer::start().await;
    mount_services(&mock_server).await;

    let dash = dashboard(&mock_server, Arc::new(MemoryStore::default()));
    dash.resolve_and_load(LocationQuery::name("Atlantis")).await;

    let s = dash.snapshot();
    assert!(s.location.is_none());
    let error = s.error.unwrap();
    assert_eq!(error.kind, ErrorKind::NotFound);
    assert!(error.message.contains("Atlantis"));
}

#[tokio::test]
async fn test_unit_preference_survives_restart() {
    let mock_server = MockServer::start().await;
    let store = Arc::new(MemoryStore::default());

    dashboard(&mock_server, store.clone()).set_unit(TemperatureUnit::Fahrenheit);

    let reopened = dashboard(&mock_server, store);
    assert_eq!(reopened.snapshot().unit, TemperatureUnit::Fahrenheit);
}
