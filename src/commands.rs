//! Memory command parsing
//!
//! Recognizes the two commands the session answers without a backend:
//! `remember <fact>` and a small set of recall phrases.

/// Prefix that marks a remember command (matched case-insensitively)
const REMEMBER_PREFIX: &str = "remember ";

/// Exact phrases (case-insensitive) that ask for a recall
const RECALL_PHRASES: &[&str] = &["show memory", "recall memory", "what do you remember"];

pub const REMEMBER_CONFIRMATION: &str = "Got it. I've stored that in your memory vault.";

const RECALL_PREAMBLE: &str = "Here's what I remember so far:\n- ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryCommand<'a> {
    Remember(&'a str),
    Recall,
}

impl<'a> MemoryCommand<'a> {
    /// Parse already-trimmed input
    pub fn parse(text: &'a str) -> Option<Self> {
        if let Some(head) = text.get(..REMEMBER_PREFIX.len()) {
            if head.eq_ignore_ascii_case(REMEMBER_PREFIX) {
                return Some(MemoryCommand::Remember(&text[REMEMBER_PREFIX.len()..]));
            }
        }

        let lower = text.to_lowercase();
        if RECALL_PHRASES.contains(&lower.as_str()) {
            return Some(MemoryCommand::Recall);
        }

        None
    }
}

/// User-facing reply for a recall command
pub fn recall_reply(recall: &str) -> String {
    format!("{}{}", RECALL_PREAMBLE, recall)
}
