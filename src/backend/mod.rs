//! Generation backends
//!
//! Three strategies behind one trait:
//! - `LocalModel`: streaming in-process model runtime, tracks history
//! - `RemoteModel`: single hosted chat-completion call
//! - `OfflineTemplate`: deterministic fallback that never fails

use crate::memory::MemoryState;
use crate::models::{BackendKind, Message};
use crate::Result;
use async_trait::async_trait;

pub mod http_runtime;
pub mod local;
pub mod offline;
pub mod remote;
pub mod stream;

pub use http_runtime::HttpStreamRuntime;
pub use local::{LocalModel, ModelRuntime};
pub use offline::OfflineTemplate;
pub use remote::RemoteModel;
pub use stream::{delta_channel, DeltaSink, DeltaStream, StreamEvent};

/// Inputs for one generation: the trimmed prompt plus read-only views of
/// memory and history
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub history: &'a [Message],
    pub memory: &'a MemoryState,
}

/// Result of starting a generation
#[derive(Debug)]
pub enum ReplyHandle {
    Complete(String),
    Stream(DeltaStream),
}

/// Trait for reply generation
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Whether successful replies from this backend belong in session history
    fn tracks_history(&self) -> bool;

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<ReplyHandle>;
}
