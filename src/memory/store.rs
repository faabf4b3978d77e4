//! Durable key-fact memory
//!
//! Stores user-declared facts as one JSON record under a fixed key. Every
//! operation fails soft: storage and decoding problems are logged and degrade
//! to an empty state or a skipped write.

use crate::memory::storage::StorageBackend;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Storage key for the fact list
pub const MEMORY_KEY: &str = "goldn_max_memory_v1";

/// Returned by `recall` when nothing has been stored
pub const EMPTY_RECALL: &str = "No stored memories yet.";

/// Separator placed between facts in recall output
const RECALL_SEPARATOR: &str = "\n- ";

/// The persisted fact list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryState {
    #[serde(default)]
    pub facts: Vec<String>,
}

impl MemoryState {
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Facts joined for prompt interpolation
    pub fn recall_text(&self) -> String {
        if self.facts.is_empty() {
            return EMPTY_RECALL.to_string();
        }
        self.facts.join(RECALL_SEPARATOR)
    }
}

/// Fact store over an injected storage backend
pub struct MemoryStore {
    storage: Arc<dyn StorageBackend>,
}

impl MemoryStore {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Load the current state. Never fails; corrupt or unreadable records
    /// load as empty.
    pub async fn load(&self) -> MemoryState {
        let raw = match self.storage.get(MEMORY_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return MemoryState::default(),
            Err(e) => {
                error!("Error loading memory from {} storage: {}", self.storage.name(), e);
                return MemoryState::default();
            }
        };

        match serde_json::from_str::<Option<MemoryState>>(&raw) {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                error!("Error decoding stored memory: {}", e);
                MemoryState::default()
            }
        }
    }

    /// Persist the state. Write failures are logged, not raised.
    pub async fn save(&self, state: &MemoryState) {
        let encoded = match serde_json::to_string(state) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("Error encoding memory: {}", e);
                return;
            }
        };

        if let Err(e) = self.storage.set(MEMORY_KEY, &encoded).await {
            error!("Error saving memory to {} storage: {}", self.storage.name(), e);
        }
    }

    /// Append a fact. Whitespace-only input is ignored.
    pub async fn remember(&self, text: &str) {
        let fact = text.trim();
        if fact.is_empty() {
            return;
        }

        let mut state = self.load().await;
        state.facts.push(fact.to_string());
        self.save(&state).await;

        debug!("Stored fact #{}", state.facts.len());
    }

    /// All facts joined by a line-and-dash marker, or the empty sentinel
    pub async fn recall(&self) -> String {
        self.load().await.recall_text()
    }
}
