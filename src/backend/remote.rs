//! Remote chat-completion backend
//!
//! One non-streaming call to a hosted model, with the stored memory attached
//! as system context. Uses a long-lived reqwest::Client for connection pooling.

use super::{GenerationBackend, GenerationRequest, ReplyHandle};
use crate::error::AssistantError;
use crate::models::{BackendKind, Message};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// Reusable remote client (connection-pooled)
pub struct RemoteModel {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    system_prompt: String,
}

impl RemoteModel {
    pub fn new(
        api_key: String,
        endpoint: String,
        model: String,
        system_prompt: String,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint,
            model,
            system_prompt,
        })
    }

    pub fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn build_request(&self, request: &GenerationRequest<'_>) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(build_system_prompt(
                    &self.system_prompt,
                    &request.memory.recall_text(),
                )),
                Message::user(request.prompt),
            ],
        }
    }
}

#[async_trait]
impl GenerationBackend for RemoteModel {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn tracks_history(&self) -> bool {
        false
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<ReplyHandle> {
        if !self.has_key() {
            return Err(AssistantError::ConfigError(
                "Remote API key not configured".to_string(),
            ));
        }

        let body = self.build_request(request);

        info!("Calling remote model {}", self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Remote API request failed: {}", e);
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Remote API error response ({}): {}", status, error_text);
            let err = AssistantError::RemoteHttpError {
                status: status.as_u16(),
            };
            return Ok(ReplyHandle::Complete(format!("{}.", err)));
        }

        let text = response.text().await?;
        let chat_response: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            error!("Failed to parse remote response: {}", e);
            e
        })?;

        let answer = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                AssistantError::RemoteResponseError("no choices in remote reply".to_string())
            })?;

        info!("Remote response received ({} chars)", answer.len());

        Ok(ReplyHandle::Complete(answer))
    }
}

/// System prompt with the stored memory appended
fn build_system_prompt(base_prompt: &str, recall: &str) -> String {
    format!("{}\n\nStored memory:\n- {}", base_prompt, recall)
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}
