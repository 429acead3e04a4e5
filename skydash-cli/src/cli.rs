use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use inquire::{Password, Select, Text};
use skydash_core::{
    Config, Coordinates, Dashboard, DateRange, LocationQuery, TemperatureUnit, Theme, Ticker,
};
use std::time::Duration;
use tracing::debug;

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skydash", version, about = "Weather dashboard for the terminal")]
pub struct Cli {
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the Weatherstack API key, default city and home coordinates.
    Configure,

    /// Show conditions, forecast, history and air quality.
    Show {
        /// City name; defaults to the configured city.
        query: Option<String>,

        #[arg(long, requires = "lon", conflicts_with = "query", allow_negative_numbers = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
    },

    /// Show the dashboard for the detected (home) location.
    Here,

    /// Summarize past weather for a city.
    History {
        query: String,

        /// First day, YYYY-MM-DD.
        #[arg(long, requires = "end", conflicts_with = "last")]
        start: Option<NaiveDate>,

        /// Last day, YYYY-MM-DD.
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,

        /// Number of days ending yesterday.
        #[arg(long)]
        last: Option<u32>,
    },

    /// Find matching places and pick one to show.
    Search { partial: String },

    /// List recent searches, newest first.
    Recent,

    /// Set the temperature unit, or toggle it when omitted.
    Unit { unit: Option<TemperatureUnit> },

    /// Set the theme, or toggle it when omitted.
    Theme { theme: Option<Theme> },

    /// Print the local time every second.
    Clock {
        /// Stop after this many ticks instead of waiting for Ctrl-C.
        #[arg(long)]
        ticks: Option<u32>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { query, lat, lon } => {
                let config = Config::load()?;
                let query = match (lat, lon) {
                    (Some(lat), Some(lon)) => LocationQuery::Coordinates(Coordinates::new(lat, lon)?),
                    _ => LocationQuery::name(query.unwrap_or_else(|| config.default_city().to_string())),
                };
                let dashboard = open(&config)?;
                dashboard.resolve_and_load(query).await;
                finish(&dashboard)
            }
            Command::Here => {
                let dashboard = open(&Config::load()?)?;
                dashboard.detect_current_location().await;
                finish(&dashboard)
            }
            Command::History { query, start, end, last } => {
                let dashboard = open(&Config::load()?)?;
                // The load fetches the default trailing week before the
                // requested range replaces it, so an explicit range costs a
                // second archive request.
                dashboard.resolve_and_load(LocationQuery::name(query)).await;

                let range = match (start, end, last) {
                    (Some(start), Some(end), _) => Some((start, end)),
                    (_, _, Some(days)) => {
                        let range = DateRange::trailing_days(days, Local::now().date_naive());
                        Some((range.start(), range.end()))
                    }
                    _ => None,
                };
                if let Some((start, end)) = range {
                    if start > end {
                        bail!("--start must not be after --end");
                    }
                    debug!(%start, %end, "Requesting history range");
                    dashboard.change_history_range(start, end).await;
                }

                render::history(&dashboard.snapshot());
                Ok(())
            }
            Command::Search { partial } => search(&partial).await,
            Command::Recent => {
                let state = open(&Config::load()?)?.snapshot();
                if state.recent_searches.is_empty() {
                    println!("No recent searches.");
                }
                for (i, entry) in state.recent_searches.entries().iter().enumerate() {
                    println!("{}. {}", i + 1, entry.key);
                }
                Ok(())
            }
            Command::Unit { unit } => {
                let dashboard = open(&Config::load()?)?;
                let unit = match unit {
                    Some(unit) => {
                        dashboard.set_unit(unit);
                        unit
                    }
                    None => dashboard.toggle_unit(),
                };
                println!("Temperature unit: {unit}");
                Ok(())
            }
            Command::Theme { theme } => {
                let dashboard = open(&Config::load()?)?;
                let theme = match theme {
                    Some(theme) => {
                        dashboard.set_theme(theme);
                        theme
                    }
                    None => dashboard.toggle_theme(),
                };
                println!("Theme: {theme}");
                Ok(())
            }
            Command::Clock { ticks } => clock(ticks).await,
        }
    }
}

fn open(config: &Config) -> Result<Dashboard> {
    debug!(endpoints = ?config.endpoints, "Opening dashboard");
    Dashboard::from_config(config).context("Failed to set up weather clients")
}

/// Render the dashboard; fail only when nothing could be loaded.
fn finish(dashboard: &Dashboard) -> Result<()> {
    let state = dashboard.snapshot();
    if state.location.is_none() {
        let message = state
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| "No location loaded.".to_string());
        bail!(message);
    }
    render::dashboard(&state);
    Ok(())
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let key_prompt = match config.stored_conditions_api_key() {
        Some(_) => "Weatherstack API key (leave empty to keep current):",
        None => "Weatherstack API key:",
    };
    let api_key = Password::new(key_prompt)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        config.set_conditions_api_key(api_key.trim().to_string());
    }

    let city = Text::new("Default city:")
        .with_default(config.default_city())
        .prompt()
        .context("Failed to read default city")?;
    config.default_city = Some(city.trim().to_string()).filter(|c| !c.is_empty());

    let current_home = config
        .home
        .map(|h| format!("{},{}", h.latitude, h.longitude))
        .unwrap_or_default();
    let home = Text::new("Home coordinates as lat,lon (empty for none):")
        .with_initial_value(&current_home)
        .prompt()
        .context("Failed to read home coordinates")?;
    config.home = parse_coordinates(&home)?;

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn parse_coordinates(raw: &str) -> Result<Option<Coordinates>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let Some((lat, lon)) = raw.split_once(',') else {
        bail!("Expected coordinates as lat,lon, got '{raw}'");
    };
    let lat: f64 = lat.trim().parse().with_context(|| format!("Invalid latitude '{lat}'"))?;
    let lon: f64 = lon.trim().parse().with_context(|| format!("Invalid longitude '{lon}'"))?;
    Ok(Some(Coordinates::new(lat, lon)?))
}

async fn search(partial: &str) -> Result<()> {
    let dashboard = open(&Config::load()?)?;
    dashboard.load_suggestions(partial).await;

    let suggestions = dashboard.snapshot().suggestions;
    if suggestions.is_empty() {
        println!("No matches for '{partial}'.");
        return Ok(());
    }

    let labels: Vec<String> = suggestions.iter().map(|s| s.label()).collect();
    let picked = Select::new("Pick a location:", labels.clone())
        .prompt()
        .context("No location picked")?;
    let Some(choice) = labels.iter().position(|l| *l == picked).map(|i| &suggestions[i]) else {
        bail!("Unknown choice '{picked}'");
    };

    dashboard.clear_suggestions();
    dashboard.resolve_and_load(LocationQuery::name(choice.name.clone())).await;
    finish(&dashboard)
}

async fn clock(ticks: Option<u32>) -> Result<()> {
    let mut subscription = Ticker::subscribe(Duration::from_secs(1));
    let mut seen = 0;

    loop {
        tokio::select! {
            tick = subscription.next() => {
                let Some(now) = tick else { break };
                println!("{}", now.format("%A %d %B %Y  %H:%M:%S"));
                seen += 1;
                if ticks.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    subscription.unsubscribe();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_home_coordinates() {
        let coords = parse_coordinates(" 51.5, -0.12 ").unwrap().unwrap();
        assert_eq!(coords.latitude, 51.5);
        assert_eq!(coords.longitude, -0.12);
        assert!(parse_coordinates("").unwrap().is_none());
    }

    #[test]
    fn rejects_bad_coordinates() {
        assert!(parse_coordinates("51.5").is_err());
        assert!(parse_coordinates("abc,1").is_err());
        assert!(parse_coordinates("91,0").is_err());
    }

    #[test]
    fn parses_history_flags() {
        let cli = Cli::try_parse_from([
            "skydash", "history", "Oslo", "--start", "2024-01-01", "--end", "2024-01-31",
        ])
        .unwrap();
        match cli.command {
            Command::History { start, end, last, .. } => {
                assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1));
                assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 31));
                assert!(last.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn start_conflicts_with_last() {
        let parsed = Cli::try_parse_from([
            "skydash", "history", "Oslo", "--start", "2024-01-01", "--end", "2024-01-02",
            "--last", "7",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn show_accepts_negative_coordinates() {
        let cli = Cli::try_parse_from(["skydash", "show", "--lat", "-33.87", "--lon", "151.21"])
            .unwrap();
        match cli.command {
            Command::Show { lat, lon, query } => {
                assert_eq!(lat, Some(-33.87));
                assert_eq!(lon, Some(151.21));
                assert!(query.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unit_argument_parses() {
        let cli = Cli::try_parse_from(["skydash", "-v", "unit", "fahrenheit"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Unit { unit: Some(TemperatureUnit::Fahrenheit) }));
    }
}
