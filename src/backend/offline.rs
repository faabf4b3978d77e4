//! Offline template backend
//!
//! Keeps the assistant answering with no network and no loaded model.

use super::{GenerationBackend, GenerationRequest, ReplyHandle};
use crate::models::BackendKind;
use crate::Result;
use async_trait::async_trait;

/// Deterministic template reply
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTemplate;

impl OfflineTemplate {
    pub fn render(recall: &str, prompt: &str) -> String {
        format!(
            r#"[Goldn MAX Offline Mode]

Stored memory:
- {}

User said: "{}"

Reasoning:
1. I interpret your question.
2. I compare it with your known preferences.
3. I answer calmly in a Jarvis-style tone.

(Offline template mode – local LLM unavailable.)"#,
            recall, prompt
        )
    }
}

#[async_trait]
impl GenerationBackend for OfflineTemplate {
    fn kind(&self) -> BackendKind {
        BackendKind::Offline
    }

    fn tracks_history(&self) -> bool {
        false
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<ReplyHandle> {
        Ok(ReplyHandle::Complete(Self::render(
            &request.memory.recall_text(),
            request.prompt,
        )))
    }
}
