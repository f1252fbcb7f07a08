use thiserror::Error;

/// Socket failed to open or dropped while the dashboard was using it.
/// Terminal: the dashboard shows it and stops.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("invalid WebSocket URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to connect to {url}: {source}")]
    Handshake {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("WebSocket error: {0}")]
    Stream(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("connection closed by server")]
    Closed,
}

/// A frame that could not be read as a snapshot. The frame is dropped.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is a JSON {found}, expected an array of alerts")]
    NotAnArray { found: &'static str },

    #[error("binary frame is not valid UTF-8")]
    NotUtf8,
}

/// One malformed element inside an otherwise valid frame. Only that element is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElementError {
    #[error("element {index} is not an object")]
    NotAnObject { index: usize },

    #[error("element {index} has no id")]
    MissingId { index: usize },

    #[error("element {index} has an id that is neither a string nor a number")]
    InvalidId { index: usize },
}

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Please enter a valid number for the value")]
    InvalidValue(String),

    #[error("Failed to create alert (HTTP {0})")]
    Rejected(reqwest::StatusCode),

    #[error("An error occurred while creating the alert: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification sink unavailable: {0}")]
    Unavailable(String),
}
