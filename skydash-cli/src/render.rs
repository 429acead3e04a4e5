//! Plain-text rendering of a dashboard snapshot.

use chrono::Local;
use skydash_core::{
    DateRange, Outlook, SessionState, TemperatureUnit,
    derived::{self, AqiCategory, SummaryStats},
    model::{AirQualitySample, CurrentConditions, DailyRecord},
};

const AIR_QUALITY_TREND_HOURS: usize = 24;

fn temp(unit: TemperatureUnit, celsius: Option<f64>) -> String {
    celsius.map_or_else(|| "--".to_string(), |c| unit.format(c))
}

fn opt(value: Option<f64>, suffix: &str) -> String {
    value.map_or_else(|| "--".to_string(), |v| format!("{v:.1}{suffix}"))
}

pub fn heading(title: &str) {
    println!();
    println!("{title}");
    println!("{}", "-".repeat(title.chars().count()));
}

/// Everything `show` prints, in order.
pub fn dashboard(state: &SessionState) {
    if let Some(location) = &state.location {
        println!("📍 {} ({:.2}, {:.2})", location.label(), location.latitude, location.longitude);
    }

    if let Some(current) = &state.current {
        today(current, state.unit);
    }

    if !state.alerts.is_empty() {
        heading("Alerts");
        for alert in &state.alerts {
            println!("  {}", alert.message);
        }
    }

    if let Some(forecast) = &state.forecast {
        hourly_today(forecast, state.unit);
        heading(&format!("{}-day forecast", forecast.daily.len()));
        daily_table(&forecast.daily, state.unit);
    }

    if let (Some(range), Some(stats)) = (&state.history_range, &state.history_stats) {
        history_summary(range, stats, state.unit);
    }

    if let Some(samples) = &state.air_quality {
        air_quality(samples);
    }

    error(state);
}

pub fn today(current: &CurrentConditions, unit: TemperatureUnit) {
    heading("Now");
    if !current.location_name.is_empty() {
        println!("  {}", current.location_name);
    }
    println!(
        "  {} {} (feels like {})",
        unit.format(current.temperature),
        current.description,
        unit.format(current.feels_like)
    );
    println!("  Humidity    {:.0}%", current.humidity);
    println!("  Wind        {:.0} km/h {}", current.wind_speed, current.wind_direction);
    println!("  Pressure    {:.0} hPa", current.pressure);
    println!("  Visibility  {:.0} km", current.visibility);
    println!("  UV index    {:.0}", current.uv_index);
    println!("  Precip      {:.1} mm", current.precipitation);
    if let Some(observed) = current.observed_at {
        println!("  Observed    {}", observed.format("%Y-%m-%d %H:%M"));
    }
}

fn hourly_today(forecast: &Outlook, unit: TemperatureUnit) {
    let hours = derived::hourly_for_date(&forecast.hourly, Local::now().date_naive());
    if hours.is_empty() {
        return;
    }
    heading("Today, hourly");
    for hour in hours {
        println!(
            "  {}  {:>6}  rain {:>5}",
            hour.timestamp.format("%H:%M"),
            temp(unit, hour.temperature),
            opt(hour.precipitation_probability, "%"),
        );
    }
}

pub fn daily_table(days: &[DailyRecord], unit: TemperatureUnit) {
    for day in days {
        println!(
            "  {}  {} {:<24} {:>6} / {:<6} {:>8} {:>7}",
            day.date.format("%a %d %b"),
            day.descriptor.emoji,
            day.descriptor.description,
            temp(unit, day.temp_max),
            temp(unit, day.temp_min),
            opt(day.precipitation_total, "mm"),
            opt(day.rain_probability, "%"),
        );
    }
}

fn extreme(label: &str, day: Option<derived::DayExtreme>, value: impl Fn(f64) -> String) {
    if let Some(d) = day {
        println!("  {label:<10} {} on {}", value(d.value), d.date.format("%Y-%m-%d"));
    }
}

pub fn history_summary(range: &DateRange, stats: &SummaryStats, unit: TemperatureUnit) {
    heading(&format!("History {range}"));
    println!("  Days       {}", stats.days);
    extreme("Hottest", stats.hottest, |v| unit.format(v));
    extreme("Coldest", stats.coldest, |v| unit.format(v));
    extreme("Wettest", stats.wettest, |v| format!("{v:.1} mm"));
    println!("  Average    {}", temp(unit, stats.average_temperature));
    println!("  Total rain {:.1} mm", stats.total_precipitation);
}

pub fn history(state: &SessionState) {
    match (&state.history, &state.history_range, &state.history_stats) {
        (Some(history), Some(range), Some(stats)) => {
            history_summary(range, stats, state.unit);
            heading("Daily");
            daily_table(&history.daily, state.unit);

            let presets: Vec<String> =
                DateRange::QUICK_PRESETS.iter().map(|d| d.to_string()).collect();
            println!();
            println!("Other ranges: --last {}", presets.join("|"));
        }
        _ => println!("No history loaded."),
    }
    error(state);
}

fn air_quality(samples: &[AirQualitySample]) {
    let Some(latest) = derived::latest_air_quality(samples) else {
        return;
    };
    heading("Air quality");
    match latest.us_aqi {
        Some(aqi) => {
            let category = AqiCategory::classify(aqi);
            println!("  US AQI {:.0} {} {}", aqi, category.emoji(), category.label());
            println!("  {}", category.recommendation());
        }
        None => println!("  US AQI --"),
    }
    println!("  PM2.5 {}  PM10 {}", opt(latest.pm2_5, " µg/m³"), opt(latest.pm10, " µg/m³"));

    let peak = derived::recent_air_quality(samples, AIR_QUALITY_TREND_HOURS)
        .iter()
        .filter_map(|s| s.us_aqi)
        .fold(None, |max: Option<f64>, v| Some(max.map_or(v, |m| m.max(v))));
    if let Some(peak) = peak {
        println!("  Peak over last {AIR_QUALITY_TREND_HOURS} samples: {peak:.0}");
    }
}

/// Print the session error, if any, to stderr.
pub fn error(state: &SessionState) {
    if let Some(error) = &state.error {
        eprintln!();
        eprintln!("⚠️  {}", error.message);
    }
}
