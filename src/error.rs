use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("Provider {provider} API error: {message}")]
    ProviderApi { provider: String, message: String },

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed summary: {0}")]
    Parse(String),

    #[error("Failed to store summary for {full_name} ({provider}): {reason}")]
    StoreWrite {
        full_name: String,
        provider: String,
        reason: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the enricher may try the same provider again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Timeout(_) | AppError::ProviderApi { .. } | AppError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification_follows_taxonomy() {
        assert!(AppError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(AppError::ProviderApi {
            provider: "deepseek".into(),
            message: "429".into(),
        }
        .is_retryable());

        assert!(!AppError::Parse("not json".into()).is_retryable());
        assert!(!AppError::ProviderUnavailable {
            provider: "gemini".into(),
            reason: "GEMINI_API_KEY is missing".into(),
        }
        .is_retryable());
    }
}
