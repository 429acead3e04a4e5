use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes surfaced by provider clients and the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Upstream error{}: {message}", status_suffix(.status))]
    Upstream { status: Option<u16>, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

/// Coarse error class, stable across message wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Upstream,
    MalformedResponse,
    NotFound,
    Validation,
    UnsupportedEnvironment,
    LocationUnavailable,
}

impl WeatherError {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream { status, message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::UnsupportedEnvironment(_) => ErrorKind::UnsupportedEnvironment,
            Self::LocationUnavailable(_) => ErrorKind::LocationUnavailable,
        }
    }

    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => "Network error. Check your connection.".to_string(),
            Self::Upstream { message, .. } => message.clone(),
            Self::MalformedResponse(detail) => format!("Unexpected provider response ({detail})."),
            Self::NotFound(query) => format!("Could not resolve \"{query}\" to a location."),
            Self::Validation(msg) => msg.clone(),
            Self::UnsupportedEnvironment(what) => format!("{what} is not available here."),
            Self::LocationUnavailable(msg) => format!("Failed to detect location: {msg}"),
        }
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// The single user-visible error kept for an action cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&WeatherError> for ErrorReport {
    fn from(err: &WeatherError) -> Self {
        Self { kind: err.kind(), message: err.user_message() }
    }
}
