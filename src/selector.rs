//! Backend selector
//!
//! Picks the generation backend for a prompt:
//! - Remote: freshness-sensitive prompts ("weather", "news", ...) when a remote key is configured
//! - Local: everything else while the local model is ready
//! - Offline: when neither is available
//!
//! Memory commands are handled by the session and never reach the selector.

use crate::models::{BackendKind, Capabilities};

/// Static keyword list for time-sensitive / external-world topics
const REMOTE_KEYWORDS: &[&str] = &["news", "today", "current price", "weather"];

/// Stateless backend selector
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendSelector;

impl BackendSelector {
    /// Choose a backend; first matching rule wins
    pub fn select(prompt: &str, capabilities: Capabilities) -> BackendKind {
        if capabilities.remote_key_configured && needs_fresh_data(prompt) {
            BackendKind::Remote
        } else if capabilities.local_ready {
            BackendKind::Local
        } else {
            BackendKind::Offline
        }
    }
}

fn needs_fresh_data(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    REMOTE_KEYWORDS.iter().any(|kw| lower.contains(kw))
}
