//! HTTP client for the external completion service (chat-style API).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::CompletionError;
use crate::generate::{CompletionClient, CompletionResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        format!("{}... (truncated)", &body[..MAX_ERROR_BODY_LENGTH])
    } else {
        body.to_string()
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: WireUsage,
    #[serde(default)]
    model: String,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    total_tokens: u64,
}

pub struct HttpCompletionClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpCompletionClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn classify_transport(e: reqwest::Error) -> CompletionError {
        if e.is_timeout() {
            CompletionError::Timeout(e.to_string())
        } else {
            CompletionError::Service(e.to_string())
        }
    }

    fn classify_status(status: StatusCode, body: &str) -> CompletionError {
        let detail = format!("HTTP {}: {}", status.as_u16(), truncate_body(body));
        match status {
            StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited(detail),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                CompletionError::Timeout(detail)
            }
            _ => CompletionError::Service(detail),
        }
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<CompletionResponse, CompletionError> {
        let request = WireRequest {
            model: &self.model,
            messages: vec![WireMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.7,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Service(format!("Malformed response: {}", e)))?;

        let text = wire
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CompletionError::Service("Response carried no choices".to_string()))?;

        Ok(CompletionResponse {
            text,
            model: if wire.model.is_empty() {
                self.model.clone()
            } else {
                wire.model
            },
            tokens_used: wire.usage.total_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            HttpCompletionClient::classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            CompletionError::RateLimited(_)
        ));
        assert!(matches!(
            HttpCompletionClient::classify_status(StatusCode::GATEWAY_TIMEOUT, ""),
            CompletionError::Timeout(_)
        ));
        assert!(matches!(
            HttpCompletionClient::classify_status(StatusCode::BAD_GATEWAY, "oops"),
            CompletionError::Service(_)
        ));
    }

    #[test]
    fn test_wire_response_parses_chat_shape() {
        let wire: WireResponse = serde_json::from_str(
            r#"{
                "model": "writer-large",
                "choices": [{"message": {"content": "{\"hook\": \"hi\"}"}}],
                "usage": {"total_tokens": 321}
            }"#,
        )
        .unwrap();
        assert_eq!(wire.choices.len(), 1);
        assert_eq!(wire.usage.total_tokens, 321);
        assert_eq!(wire.model, "writer-large");
    }

    #[test]
    fn test_wire_response_tolerates_missing_usage() {
        let wire: WireResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "x"}}]}"#).unwrap();
        assert_eq!(wire.usage.total_tokens, 0);
    }
}
