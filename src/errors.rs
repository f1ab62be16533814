use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum DashError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("trading account not connected")]
    TradingNotConnected,
}

impl DashError {
    /// True for failures caused by user input rather than the network or backend.
    pub fn is_validation(&self) -> bool {
        matches!(self, DashError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DashError::Status { status: 404, .. })
    }
}

impl From<serde_json::Error> for DashError {
    fn from(e: serde_json::Error) -> Self {
        DashError::Decode(e.to_string())
    }
}

/// FastAPI error body: `{"detail": "..."}`.
#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Build a `Status` error from a non-2xx response body.
pub(crate) fn status_error(status: u16, body: &str) -> DashError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| match b.detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "no response body".into()
            } else {
                body.trim().chars().take(200).collect()
            }
        });
    DashError::Status { status, message }
}
