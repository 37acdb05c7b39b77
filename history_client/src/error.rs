use history_core::HistoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Authentication rejected ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<TransportError> for HistoryError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Auth { .. } => HistoryError::Auth(err.to_string()),
            other => HistoryError::Transport(other.to_string()),
        }
    }
}
