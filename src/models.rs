//! Core data models for the assistant

use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Messages =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message as sent to generation backends
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

//
// ================= Backend routing =================
//

/// Which generation strategy handles a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
    Offline,
}

/// Runtime capabilities consulted by the backend selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub local_ready: bool,
    pub remote_key_configured: bool,
}

//
// ================= Session results =================
//

/// What a single `submit` call did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Empty or whitespace-only input
    Ignored,
    /// A generation was already in flight
    Busy,
    /// A memory command was handled without touching any backend
    Command { reply: String },
    /// A backend produced the reply
    Reply {
        reply: String,
        backend: BackendKind,
        fell_back: bool,
    },
}

impl SubmitOutcome {
    pub fn reply(&self) -> Option<&str> {
        match self {
            SubmitOutcome::Command { reply } | SubmitOutcome::Reply { reply, .. } => Some(reply),
            SubmitOutcome::Ignored | SubmitOutcome::Busy => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendKind::Local => "local model",
            BackendKind::Remote => "remote model",
            BackendKind::Offline => "offline template",
        };
        write!(f, "{}", s)
    }
}
