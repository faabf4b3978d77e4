//! Local model runtime over an OpenAI-compatible inference server
//!
//! Talks to a model served on this machine (llama.cpp server, Ollama, ...)
//! and reads its streamed completion as server-sent events:
//! `data: {chunk}` lines terminated by `data: [DONE]`.

use super::local::{ModelRuntime, LOCAL_TEMPERATURE};
use super::stream::DeltaSink;
use crate::error::AssistantError;
use crate::models::Message;
use crate::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest silence tolerated between two body chunks of a stream
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct HttpStreamRuntime {
    client: Client,
    base_url: String,
    model: String,
    idle_timeout: Duration,
}

impl HttpStreamRuntime {
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

#[async_trait]
impl ModelRuntime for HttpStreamRuntime {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn load(&self) -> Result<()> {
        let url = format!("{}/models", self.base_url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            AssistantError::ModelInitError(format!("Model server unreachable at {}: {}", url, e))
        })?;

        if !response.status().is_success() {
            return Err(AssistantError::ModelInitError(format!(
                "Model server returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let models: ModelList = response.json().await.map_err(|e| {
            AssistantError::ModelInitError(format!("Unreadable model list: {}", e))
        })?;

        if !models.data.iter().any(|m| m.id == self.model) {
            return Err(AssistantError::ModelInitError(format!(
                "Model {} is not served at {}",
                self.model, self.base_url
            )));
        }

        info!("Model server at {} serves {}", self.base_url, self.model);
        Ok(())
    }

    async fn stream_chat(&self, messages: Vec<Message>, sink: &DeltaSink) -> Result<()> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = StreamRequest {
            model: &self.model,
            messages: &messages,
            temperature: LOCAL_TEMPERATURE,
            stream: true,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(AssistantError::StreamError(format!(
                "Model server returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        loop {
            let chunk = match tokio::time::timeout(self.idle_timeout, body.next()).await {
                Ok(Some(chunk)) => chunk?,
                Ok(None) => break,
                Err(_) => {
                    warn!("Model server stalled for {:?}", self.idle_timeout);
                    return Err(AssistantError::StreamError(format!(
                        "Model server sent nothing for {:?}",
                        self.idle_timeout
                    )));
                }
            };
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);

                match parse_sse_line(line.trim_end())? {
                    Some(SseEvent::Delta(text)) => {
                        if !sink.delta(text).await {
                            debug!("Stream consumer went away, stopping generation");
                            return Ok(());
                        }
                    }
                    Some(SseEvent::Done) => return Ok(()),
                    None => {}
                }
            }
        }

        // Trailing line without a newline
        let rest = String::from_utf8_lossy(&buffer);
        if let Some(SseEvent::Delta(text)) = parse_sse_line(rest.trim())? {
            sink.delta(text).await;
        }

        warn!("Model stream closed without [DONE]");
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SseEvent {
    Delta(String),
    Done,
}

/// Parse one server-sent-event line. Non-data lines yield `None`.
fn parse_sse_line(line: &str) -> Result<Option<SseEvent>> {
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let payload = payload.trim();

    if payload.is_empty() {
        return Ok(None);
    }
    if payload == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }

    let chunk: StreamChunk = serde_json::from_str(payload)
        .map_err(|e| AssistantError::StreamError(format!("Malformed stream chunk: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(AssistantError::StreamError(format!("Model error: {}", error)));
    }

    let delta = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|text| !text.is_empty());

    Ok(delta.map(SseEvent::Delta))
}

#[derive(Debug, Serialize)]
struct StreamRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}
