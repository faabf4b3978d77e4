//! Goldn MAX assistant core
//!
//! Reply routing and session memory for a conversational assistant:
//! - Memory commands answered directly from a durable fact store
//! - Per-message backend selection (local model, remote API, offline template)
//! - Streamed replies forwarded in order, final reply spoken exactly once
//! - One generation in flight per session, one offline retry on failure
//!
//! FLOW:
//! SUBMIT → COMMAND? → SELECT → GENERATE → DELIVER

pub mod api;
pub mod backend;
pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod error;
pub mod history;
pub mod memory;
pub mod models;
pub mod selector;
pub mod session;
pub mod voice;

#[cfg(test)]
mod test_support;

pub use error::{AssistantError, Result};

// Re-export common types
pub use models::*;
pub use selector::BackendSelector;
pub use session::{ConversationSession, SessionObserver, SessionState};
