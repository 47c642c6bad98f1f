use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::models::ProviderId;

use super::provider::{require_api_key, SummaryProvider};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Adapter for OpenAI-compatible `chat/completions` APIs (ChatGPT, DeepSeek).
pub struct OpenAiProvider {
    client: Client,
    id: ProviderId,
}

impl OpenAiProvider {
    pub fn new(id: ProviderId, client: Client) -> Self {
        Self { client, id }
    }
}

#[async_trait]
impl SummaryProvider for OpenAiProvider {
    async fn summarize(&self, prompt: &str, config: &ProviderConfig) -> Result<String> {
        let api_key = require_api_key(self.id, config)?;

        let request = ChatRequest {
            model: &config.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: config.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", config.base_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::ProviderApi {
                provider: self.id.to_string(),
                message: format!("HTTP {status}: {error_text}"),
            });
        }

        let chat_response: ChatResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::ProviderApi {
                provider: self.id.to_string(),
                message: "No choices returned from API".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let provider = OpenAiProvider::new(ProviderId::DeepSeek, Client::new());
        // Unroutable base URL: reaching the network would hang or error differently.
        let config = ProviderConfig::new("deepseek-chat", "http://192.0.2.1:9");

        let err = provider.summarize("hello", &config).await.unwrap_err();
        assert!(matches!(err, AppError::ProviderUnavailable { .. }));
    }

    #[test]
    fn request_serializes_in_chat_completions_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![Message {
                role: "user",
                content: "hi",
            }],
            temperature: 0.5,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["model"], "gpt-4o-mini");
    }

    #[test]
    fn response_parses_first_choice() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"done"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("done"));
    }
}
