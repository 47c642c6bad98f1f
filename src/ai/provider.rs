use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::models::ProviderId;

/// One AI backend able to turn a prompt into summary text.
///
/// Implementations make a single request per call. Retries and timeouts are
/// applied by the [`Enricher`](super::Enricher), never by the adapter.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn summarize(&self, prompt: &str, config: &ProviderConfig) -> Result<String>;
}

/// Returns the API key or fails fast when the provider is not configured.
pub(crate) fn require_api_key(provider: ProviderId, config: &ProviderConfig) -> Result<&str> {
    match config.api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(AppError::ProviderUnavailable {
            provider: provider.to_string(),
            reason: "API key is missing".to_string(),
        }),
    }
}
