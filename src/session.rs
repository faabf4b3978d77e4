//! Conversation session
//!
//! Owns the message history and runs one message at a time through:
//!
//! INPUT → MEMORY COMMAND? → SELECT BACKEND → GENERATE (stream) → DELIVER
//!
//! The session is either `Idle` or `Generating`. A submit while generating
//! is rejected, never queued. A failed generation is retried once against
//! the offline template.

use crate::backend::{
    GenerationBackend, GenerationRequest, LocalModel, OfflineTemplate, RemoteModel, ReplyHandle,
    StreamEvent,
};
use crate::commands::{recall_reply, MemoryCommand, REMEMBER_CONFIRMATION};
use crate::error::AssistantError;
use crate::history::ConversationHistory;
use crate::memory::MemoryStore;
use crate::models::{BackendKind, Capabilities, Message, SubmitOutcome};
use crate::selector::BackendSelector;
use crate::voice::{SilentSpeech, SpeechOutput};
use crate::Result;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{debug, info, warn};

const NO_RESPONSE: &str = "(no response)";
const STATUS_READY: &str = "Ready";
const STATUS_LOAD_FAILED: &str = "LLM load failed; using offline template replies.";

/// UI collaborator callbacks
pub trait SessionObserver: Send + Sync {
    /// Incremental text of a streaming reply, in emission order
    fn on_delta(&self, _delta: &str) {}

    /// The finished reply, once per handled message
    fn on_final_reply(&self, _reply: &str) {}

    fn on_status_change(&self, _status: &str) {}
}

/// Observer that ignores every callback
#[derive(Debug, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Generating,
}

/// Returns the session to `Idle` however generation ends
struct GeneratingGuard<'a> {
    state: &'a Mutex<SessionState>,
}

impl Drop for GeneratingGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = SessionState::Idle;
    }
}

pub struct ConversationSession {
    memory: Arc<MemoryStore>,
    /// Held across each load-append-save of the fact store
    memory_writes: AsyncMutex<()>,
    local: Option<Arc<LocalModel>>,
    remote: Option<Arc<RemoteModel>>,
    offline: OfflineTemplate,
    history: RwLock<ConversationHistory>,
    state: Mutex<SessionState>,
    observer: Arc<dyn SessionObserver>,
    speech: Arc<dyn SpeechOutput>,
}

impl ConversationSession {
    pub fn new(memory: Arc<MemoryStore>, system_prompt: &str) -> Self {
        Self {
            memory,
            memory_writes: AsyncMutex::new(()),
            local: None,
            remote: None,
            offline: OfflineTemplate,
            history: RwLock::new(ConversationHistory::new(system_prompt)),
            state: Mutex::new(SessionState::Idle),
            observer: Arc::new(NoopObserver),
            speech: Arc::new(SilentSpeech),
        }
    }

    pub fn with_local(mut self, local: Arc<LocalModel>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn with_remote(mut self, remote: Arc<RemoteModel>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechOutput>) -> Self {
        self.speech = speech;
        self
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            local_ready: self.local.as_ref().is_some_and(|l| l.is_ready()),
            remote_key_configured: self.remote.as_ref().is_some_and(|r| r.has_key()),
        }
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn speech(&self) -> &Arc<dyn SpeechOutput> {
        &self.speech
    }

    /// Store a fact. Chat commands and the HTTP memory endpoint both come
    /// through here; writers queue behind one another.
    pub async fn remember(&self, fact: &str) {
        let _writer = self.memory_writes.lock().await;
        self.memory.remember(fact).await;
    }

    /// Snapshot of the conversation so far
    pub async fn history(&self) -> Vec<Message> {
        self.history.read().await.snapshot()
    }

    /// Load the local model, reporting progress through status changes.
    /// Without a local model this is a no-op.
    pub async fn initialize_local(&self) -> Result<()> {
        let Some(local) = &self.local else {
            return Ok(());
        };

        self.observer
            .on_status_change(&format!("Loading local model {}…", local.model_name()));

        match local.initialize().await {
            Ok(()) => {
                self.observer.on_status_change(&format!(
                    "Model ready ✔ ({} running on this device)",
                    local.model_name()
                ));
                Ok(())
            }
            Err(e) => {
                self.observer.on_status_change(STATUS_LOAD_FAILED);
                Err(e)
            }
        }
    }

    /// Sole entry point for user input, typed or transcribed
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let prompt = text.trim();
        if prompt.is_empty() {
            return SubmitOutcome::Ignored;
        }

        if self.state() == SessionState::Generating {
            debug!("Submit rejected while a generation is in flight");
            return SubmitOutcome::Busy;
        }

        if let Some(command) = MemoryCommand::parse(prompt) {
            let reply = self.run_command(command).await;
            self.deliver(&reply);
            return SubmitOutcome::Command { reply };
        }

        let Some(_guard) = self.begin_generation() else {
            debug!("Submit rejected while a generation is in flight");
            return SubmitOutcome::Busy;
        };

        self.generate(prompt).await
    }

    async fn run_command(&self, command: MemoryCommand<'_>) -> String {
        match command {
            MemoryCommand::Remember(fact) => {
                self.remember(fact).await;
                info!("Memory command: remember");
                REMEMBER_CONFIRMATION.to_string()
            }
            MemoryCommand::Recall => {
                info!("Memory command: recall");
                recall_reply(&self.memory.recall().await)
            }
        }
    }

    fn begin_generation(&self) -> Option<GeneratingGuard<'_>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SessionState::Generating {
            return None;
        }
        *state = SessionState::Generating;

        Some(GeneratingGuard { state: &self.state })
    }

    async fn generate(&self, prompt: &str) -> SubmitOutcome {
        let kind = BackendSelector::select(prompt, self.capabilities());
        let backend = self.backend_for(kind);

        info!("Routing message to {}", kind);
        self.observer.on_status_change(&format!("Thinking ({})…", kind));

        let memory = self.memory.load().await;
        let history = self.history.read().await.snapshot();
        let request = GenerationRequest {
            prompt,
            history: &history,
            memory: &memory,
        };

        let (reply, backend_kind, fell_back) = match self.run_backend(backend, &request).await {
            Ok(reply) => {
                if backend.tracks_history() {
                    self.history.write().await.push_exchange(prompt, &reply);
                }
                // History keeps the empty reply; only the user sees the placeholder
                let reply = if reply.is_empty() {
                    NO_RESPONSE.to_string()
                } else {
                    reply
                };
                (reply, backend.kind(), false)
            }
            Err(e) => {
                warn!("{} failed, falling back to offline template: {}", kind, e);
                let reply = self
                    .run_backend(&self.offline, &request)
                    .await
                    .unwrap_or_else(|_| {
                        OfflineTemplate::render(&memory.recall_text(), prompt)
                    });
                (reply, BackendKind::Offline, true)
            }
        };

        self.deliver(&reply);
        self.observer.on_status_change(STATUS_READY);

        SubmitOutcome::Reply {
            reply,
            backend: backend_kind,
            fell_back,
        }
    }

    fn backend_for(&self, kind: BackendKind) -> &dyn GenerationBackend {
        match kind {
            BackendKind::Local => match &self.local {
                Some(local) => &**local,
                None => &self.offline,
            },
            BackendKind::Remote => match &self.remote {
                Some(remote) => &**remote,
                None => &self.offline,
            },
            BackendKind::Offline => &self.offline,
        }
    }

    /// Run one backend to a final reply, forwarding stream deltas
    async fn run_backend(
        &self,
        backend: &dyn GenerationBackend,
        request: &GenerationRequest<'_>,
    ) -> Result<String> {
        let mut stream = match backend.generate(request).await? {
            ReplyHandle::Complete(reply) => return Ok(reply),
            ReplyHandle::Stream(stream) => stream,
        };

        let mut reply = String::new();
        loop {
            match stream.next().await {
                Some(StreamEvent::Delta(delta)) => {
                    self.observer.on_delta(&delta);
                    reply.push_str(&delta);
                }
                Some(StreamEvent::End) => break,
                Some(StreamEvent::Error(reason)) => {
                    return Err(AssistantError::StreamError(reason));
                }
                None => {
                    return Err(AssistantError::StreamError(
                        "stream closed before end-of-stream".to_string(),
                    ));
                }
            }
        }

        Ok(reply)
    }

    fn deliver(&self, reply: &str) {
        self.observer.on_final_reply(reply);
        self.speech.speak(reply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::local::testing::{ScriptedRuntime, Step};
    use crate::memory::{InMemoryStorage, StorageBackend};
    use crate::models::Role;
    use crate::test_support::spawn_server;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::time::Duration;

    /// In-memory storage with slow reads, widening the load/save gap
    struct SlowStorage {
        inner: InMemoryStorage,
    }

    #[async_trait]
    impl StorageBackend for SlowStorage {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn get(&self, key: &str) -> Result<Option<String>> {
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.inner.set(key, value).await
        }
    }

    #[derive(Default)]
    struct Recorder {
        deltas: Mutex<Vec<String>>,
        finals: Mutex<Vec<String>>,
        statuses: Mutex<Vec<String>>,
        spoken: Mutex<Vec<String>>,
    }

    impl SessionObserver for Recorder {
        fn on_delta(&self, delta: &str) {
            self.deltas.lock().unwrap().push(delta.to_string());
        }

        fn on_final_reply(&self, reply: &str) {
            self.finals.lock().unwrap().push(reply.to_string());
        }

        fn on_status_change(&self, status: &str) {
            self.statuses.lock().unwrap().push(status.to_string());
        }
    }

    impl SpeechOutput for Recorder {
        fn speak(&self, text: &str) {
            self.spoken.lock().unwrap().push(text.to_string());
        }
    }

    fn base_session(recorder: &Arc<Recorder>) -> ConversationSession {
        let memory = Arc::new(MemoryStore::new(Arc::new(InMemoryStorage::new())));
        ConversationSession::new(memory, "You are a test assistant.")
            .with_observer(recorder.clone())
            .with_speech(recorder.clone())
    }

    async fn ready_local(runtime: &Arc<ScriptedRuntime>) -> Arc<LocalModel> {
        let local = Arc::new(LocalModel::new(runtime.clone(), 10));
        local.initialize().await.unwrap();
        local
    }

    fn remote_at(endpoint: String) -> Arc<RemoteModel> {
        Arc::new(
            RemoteModel::new(
                "sk-test".to_string(),
                endpoint,
                "test-model".to_string(),
                "You are a test assistant.".to_string(),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_empty_input_is_ignored() {
        let recorder = Arc::new(Recorder::default());
        let session = base_session(&recorder);

        assert_eq!(session.submit("   \n\t").await, SubmitOutcome::Ignored);
        assert!(recorder.finals.lock().unwrap().is_empty());
        assert!(recorder.statuses.lock().unwrap().is_empty());
        assert_eq!(session.history().await.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_commands_skip_backends_and_history() {
        let recorder = Arc::new(Recorder::default());
        let runtime = Arc::new(ScriptedRuntime::new(vec![Step::Delta("unused")]));
        let session = base_session(&recorder).with_local(ready_local(&runtime).await);

        let outcome = session.submit("  Remember I like green tea ").await;
        assert_eq!(
            outcome,
            SubmitOutcome::Command {
                reply: REMEMBER_CONFIRMATION.to_string()
            }
        );

        session.submit("remember works nights").await;
        let outcome = session.submit("What do you remember").await;
        assert_eq!(
            outcome.reply(),
            Some("Here's what I remember so far:\n- I like green tea\n- works nights")
        );

        assert_eq!(runtime.calls(), 0);
        assert_eq!(session.history().await.len(), 1);
        assert_eq!(recorder.spoken.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_offline_when_nothing_available() {
        let recorder = Arc::new(Recorder::default());
        let session = base_session(&recorder);
        session.memory().remember("likes tea").await;

        let outcome = session.submit("what's the weather").await;
        let SubmitOutcome::Reply { reply, backend, fell_back } = outcome else {
            panic!("expected a reply");
        };
        assert_eq!(backend, BackendKind::Offline);
        assert!(!fell_back);
        assert!(reply.contains("User said: \"what's the weather\""));
        assert!(reply.contains("- likes tea"));

        assert_eq!(session.history().await.len(), 1);
        assert_eq!(*recorder.spoken.lock().unwrap(), vec![reply]);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_local_stream_appends_history() {
        let recorder = Arc::new(Recorder::default());
        let runtime = Arc::new(ScriptedRuntime::new(vec![Step::Delta("Hel"), Step::Delta("lo")]));
        let session = base_session(&recorder).with_local(ready_local(&runtime).await);

        let outcome = session.submit("  say hello ").await;
        assert_eq!(
            outcome,
            SubmitOutcome::Reply {
                reply: "Hello".to_string(),
                backend: BackendKind::Local,
                fell_back: false,
            }
        );

        assert_eq!(*recorder.deltas.lock().unwrap(), vec!["Hel", "lo"]);
        assert_eq!(*recorder.finals.lock().unwrap(), vec!["Hello"]);
        assert_eq!(*recorder.spoken.lock().unwrap(), vec!["Hello"]);

        let history = session.history().await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], Message::user("say hello"));
        assert_eq!(history[2], Message::assistant("Hello"));

        // The next turn sees the previous exchange
        session.submit("again").await;
        let seen = runtime.seen.lock().unwrap();
        assert_eq!(seen[1].len(), 4);
        assert_eq!(seen[1][0].role, Role::System);
    }

    #[tokio::test]
    async fn test_empty_stream_reports_no_response() {
        let recorder = Arc::new(Recorder::default());
        let runtime = Arc::new(ScriptedRuntime::new(vec![]));
        let session = base_session(&recorder).with_local(ready_local(&runtime).await);

        let outcome = session.submit("hello").await;
        assert_eq!(outcome.reply(), Some("(no response)"));
        assert_eq!(*recorder.spoken.lock().unwrap(), vec!["(no response)"]);

        let history = session.history().await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[2], Message::assistant(""));
    }

    #[tokio::test]
    async fn test_concurrent_remember_keeps_every_fact() {
        let recorder = Arc::new(Recorder::default());
        let storage = Arc::new(SlowStorage {
            inner: InMemoryStorage::new(),
        });
        let memory = Arc::new(MemoryStore::new(storage));
        let session = ConversationSession::new(memory, "You are a test assistant.")
            .with_observer(recorder.clone())
            .with_speech(recorder.clone());

        let (first, second, ()) = tokio::join!(
            session.submit("remember likes tea"),
            session.submit("remember works nights"),
            session.remember("has a cat"),
        );
        assert_eq!(first.reply(), Some(REMEMBER_CONFIRMATION));
        assert_eq!(second.reply(), Some(REMEMBER_CONFIRMATION));

        let facts = session.memory().load().await.facts;
        assert_eq!(facts.len(), 3);
        for fact in ["likes tea", "works nights", "has a cat"] {
            assert!(facts.iter().any(|f| f == fact), "missing {}", fact);
        }
    }

    #[tokio::test]
    async fn test_stream_error_falls_back_to_offline_once() {
        let recorder = Arc::new(Recorder::default());
        let runtime = Arc::new(ScriptedRuntime::new(vec![
            Step::Delta("Hel"),
            Step::Delta("lo"),
            Step::Fail("gpu lost"),
        ]));
        let session = base_session(&recorder).with_local(ready_local(&runtime).await);

        let outcome = session.submit("tell me something").await;
        let SubmitOutcome::Reply { reply, backend, fell_back } = outcome else {
            panic!("expected a reply");
        };
        assert_eq!(backend, BackendKind::Offline);
        assert!(fell_back);
        assert!(reply.starts_with("[Goldn MAX Offline Mode]"));

        assert_eq!(*recorder.deltas.lock().unwrap(), vec!["Hel", "lo"]);
        assert_eq!(*recorder.finals.lock().unwrap(), vec![reply.clone()]);
        assert_eq!(*recorder.spoken.lock().unwrap(), vec![reply]);
        assert_eq!(runtime.calls(), 1);

        let history = session.history().await;
        assert_eq!(history.len(), 1);
        assert!(history.iter().all(|m| m.role != Role::Assistant));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_submit_while_generating_is_rejected() {
        let recorder = Arc::new(Recorder::default());
        let runtime = Arc::new(ScriptedRuntime::gated(vec![Step::Delta("done")]));
        let session = Arc::new(base_session(&recorder).with_local(ready_local(&runtime).await));

        let first = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.submit("first question").await })
        };

        runtime.started.notified().await;
        assert_eq!(session.state(), SessionState::Generating);

        assert_eq!(session.submit("second question").await, SubmitOutcome::Busy);
        assert_eq!(session.submit("remember nope").await, SubmitOutcome::Busy);
        assert_eq!(session.history().await.len(), 1);
        assert_eq!(runtime.calls(), 1);

        runtime.gate.as_ref().unwrap().notify_one();
        let outcome = first.await.unwrap();
        assert_eq!(outcome.reply(), Some("done"));

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.history().await.len(), 3);
        assert_eq!(recorder.spoken.lock().unwrap().len(), 1);
        assert_eq!(session.memory().recall().await, "No stored memories yet.");
    }

    #[tokio::test]
    async fn test_fresh_topic_routes_to_remote() {
        let router = Router::new().route(
            "/chat",
            post(|| async {
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "Sunny, 21°C."}}]
                }))
            }),
        );
        let base = spawn_server(router).await;

        let recorder = Arc::new(Recorder::default());
        let runtime = Arc::new(ScriptedRuntime::new(vec![Step::Delta("local")]));
        let session = base_session(&recorder)
            .with_local(ready_local(&runtime).await)
            .with_remote(remote_at(format!("{}/chat", base)));

        let outcome = session.submit("what's the weather").await;
        assert_eq!(
            outcome,
            SubmitOutcome::Reply {
                reply: "Sunny, 21°C.".to_string(),
                backend: BackendKind::Remote,
                fell_back: false,
            }
        );
        assert_eq!(runtime.calls(), 0);
        assert_eq!(session.history().await.len(), 1);

        let outcome = session.submit("tell me a joke").await;
        assert_eq!(outcome.reply(), Some("local"));
    }

    #[tokio::test]
    async fn test_remote_http_error_is_the_reply() {
        let router = Router::new().route(
            "/chat",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let base = spawn_server(router).await;

        let recorder = Arc::new(Recorder::default());
        let runtime = Arc::new(ScriptedRuntime::new(vec![Step::Delta("local")]));
        let session = base_session(&recorder)
            .with_local(ready_local(&runtime).await)
            .with_remote(remote_at(format!("{}/chat", base)));

        let outcome = session.submit("any news today?").await;
        assert_eq!(
            outcome,
            SubmitOutcome::Reply {
                reply: "Remote API returned HTTP 503.".to_string(),
                backend: BackendKind::Remote,
                fell_back: false,
            }
        );

        assert_eq!(
            *recorder.finals.lock().unwrap(),
            vec!["Remote API returned HTTP 503."]
        );
        assert_eq!(
            *recorder.spoken.lock().unwrap(),
            vec!["Remote API returned HTTP 503."]
        );
        assert_eq!(runtime.calls(), 0);
        assert_eq!(session.history().await.len(), 1);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_remote_garbage_falls_back_to_offline() {
        let router = Router::new().route("/chat", post(|| async { "not json" }));
        let base = spawn_server(router).await;

        let recorder = Arc::new(Recorder::default());
        let session = base_session(&recorder).with_remote(remote_at(format!("{}/chat", base)));

        let outcome = session.submit("any news today?").await;
        let SubmitOutcome::Reply { backend, fell_back, .. } = outcome else {
            panic!("expected a reply");
        };
        assert_eq!(backend, BackendKind::Offline);
        assert!(fell_back);
        assert_eq!(recorder.finals.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_local_init_reports_status() {
        let recorder = Arc::new(Recorder::default());
        let local = Arc::new(LocalModel::new(Arc::new(ScriptedRuntime::failing_load()), 10));
        let session = base_session(&recorder).with_local(local);

        assert!(session.initialize_local().await.is_err());
        assert!(!session.capabilities().local_ready);

        let statuses = recorder.statuses.lock().unwrap();
        assert_eq!(statuses.last().map(String::as_str), Some(STATUS_LOAD_FAILED));
        drop(statuses);

        let outcome = session.submit("hello").await;
        assert!(matches!(
            outcome,
            SubmitOutcome::Reply { backend: BackendKind::Offline, fell_back: false, .. }
        ));
    }
}
