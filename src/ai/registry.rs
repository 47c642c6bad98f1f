use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;

use crate::error::Result;
use crate::models::ProviderId;

use super::gemini::GeminiProvider;
use super::openai::OpenAiProvider;
use super::provider::SummaryProvider;

/// Fixed mapping from provider identifier to adapter, resolved at startup.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<ProviderId, Arc<dyn SummaryProvider>>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registers the HTTP adapter of every known provider on one shared client.
    pub fn with_defaults() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("trending-digest/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::empty()
            .with(
                ProviderId::ChatGpt,
                Arc::new(OpenAiProvider::new(ProviderId::ChatGpt, client.clone())),
            )
            .with(
                ProviderId::DeepSeek,
                Arc::new(OpenAiProvider::new(ProviderId::DeepSeek, client.clone())),
            )
            .with(ProviderId::Gemini, Arc::new(GeminiProvider::new(client))))
    }

    pub fn with(mut self, id: ProviderId, adapter: Arc<dyn SummaryProvider>) -> Self {
        self.adapters.insert(id, adapter);
        self
    }

    pub fn get(&self, id: ProviderId) -> Option<Arc<dyn SummaryProvider>> {
        self.adapters.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }
}
