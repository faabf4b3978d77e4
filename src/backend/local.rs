//! Local model backend
//!
//! Wraps a model runtime that lives next to the assistant. Initialization is
//! asynchronous and may fail; until it succeeds the backend reports not-ready
//! and refuses to generate.

use super::stream::{delta_channel, DeltaSink};
use super::{GenerationBackend, GenerationRequest, ReplyHandle};
use crate::error::AssistantError;
use crate::history::context_window;
use crate::models::{BackendKind, Message};
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Sampling temperature used for local replies
pub const LOCAL_TEMPERATURE: f32 = 0.7;

/// Trait for a streaming model runtime
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    /// Human-readable model identifier
    fn model_name(&self) -> &str;

    /// Make the model usable (download, load weights, check a server...)
    async fn load(&self) -> Result<()>;

    /// Stream a chat completion into `sink`. Returns once the model is done;
    /// an error means the stream was abandoned.
    async fn stream_chat(&self, messages: Vec<Message>, sink: &DeltaSink) -> Result<()>;
}

pub struct LocalModel {
    runtime: Arc<dyn ModelRuntime>,
    ready: AtomicBool,
    context_messages: usize,
}

impl LocalModel {
    pub fn new(runtime: Arc<dyn ModelRuntime>, context_messages: usize) -> Self {
        Self {
            runtime,
            ready: AtomicBool::new(false),
            context_messages,
        }
    }

    pub fn model_name(&self) -> &str {
        self.runtime.model_name()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Load the runtime and record the outcome in the readiness flag
    pub async fn initialize(&self) -> Result<()> {
        info!("Loading local model {}", self.runtime.model_name());

        match self.runtime.load().await {
            Ok(()) => {
                self.ready.store(true, Ordering::Release);
                info!("Local model {} ready", self.runtime.model_name());
                Ok(())
            }
            Err(e) => {
                self.ready.store(false, Ordering::Release);
                error!("Local model load failed: {}", e);
                Err(AssistantError::ModelInitError(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl GenerationBackend for LocalModel {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn tracks_history(&self) -> bool {
        true
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<ReplyHandle> {
        if !self.is_ready() {
            return Err(AssistantError::ModelInitError(format!(
                "{} is not ready",
                self.runtime.model_name()
            )));
        }

        let mut messages = context_window(request.history, self.context_messages);
        messages.push(Message::user(request.prompt));

        debug!("Local generation with {} context messages", messages.len());

        let (sink, stream) = delta_channel();
        let runtime = Arc::clone(&self.runtime);

        tokio::spawn(async move {
            match runtime.stream_chat(messages, &sink).await {
                Ok(()) => sink.end().await,
                Err(e) => {
                    error!("Local model stream failed: {}", e);
                    sink.fail(e.to_string()).await;
                }
            }
        });

        Ok(ReplyHandle::Stream(stream))
    }
}
