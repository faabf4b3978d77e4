//! Session wiring from configuration

use crate::backend::{HttpStreamRuntime, LocalModel, RemoteModel};
use crate::config::AssistantConfig;
use crate::memory::{FileStorage, MemoryStore, PostgresStorage, StorageBackend};
use crate::session::{ConversationSession, SessionObserver};
use crate::voice::SpeechOutput;
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Pick the storage backend: postgres when a database URL is configured,
/// otherwise one JSON file per record under the data directory.
pub fn build_storage(config: &AssistantConfig) -> Arc<dyn StorageBackend> {
    if let Some(url) = &config.database_url {
        match PostgresStorage::connect_lazy(url) {
            Ok(storage) => return Arc::new(storage),
            Err(error) => {
                warn!(
                    "Failed to initialize postgres memory storage, falling back to files: {}",
                    error
                );
            }
        }
    }

    info!("Memory storage backend: file ({})", config.data_dir.display());
    Arc::new(FileStorage::new(config.data_dir.clone()))
}

/// Build a session with every backend the configuration enables.
/// The local model is attached but not yet initialized.
pub fn build_session(
    config: &AssistantConfig,
    observer: Arc<dyn SessionObserver>,
    speech: Arc<dyn SpeechOutput>,
) -> Result<ConversationSession> {
    let memory = Arc::new(MemoryStore::new(build_storage(config)));

    let mut session = ConversationSession::new(memory, &config.system_prompt)
        .with_observer(observer)
        .with_speech(speech);

    if config.local_enabled {
        let runtime = HttpStreamRuntime::new(&config.local_url, config.local_model.clone())?;
        session = session.with_local(Arc::new(LocalModel::new(
            Arc::new(runtime),
            config.context_messages,
        )));
    }

    if let Some(api_key) = &config.remote_api_key {
        let remote = RemoteModel::new(
            api_key.clone(),
            config.remote_url.clone(),
            config.remote_model.clone(),
            config.system_prompt.clone(),
        )?;
        info!("Remote model {} configured", config.remote_model);
        session = session.with_remote(Arc::new(remote));
    }

    Ok(session)
}

/// Start local model initialization in the background. The session answers
/// from the offline template until the model is ready.
pub fn spawn_local_init(session: &Arc<ConversationSession>) {
    let session = Arc::clone(session);
    tokio::spawn(async move {
        if let Err(e) = session.initialize_local().await {
            warn!("Continuing without local model: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::NoopObserver;
    use crate::voice::SilentSpeech;

    #[tokio::test]
    async fn test_build_session_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = AssistantConfig {
            remote_api_key: Some("sk-test".to_string()),
            data_dir: dir.path().to_path_buf(),
            ..AssistantConfig::default()
        };

        let session = build_session(&config, Arc::new(NoopObserver), Arc::new(SilentSpeech)).unwrap();
        let caps = session.capabilities();
        assert!(caps.remote_key_configured);
        assert!(!caps.local_ready);

        session.submit("remember persisted fact").await;
        assert!(dir.path().join("goldn_max_memory_v1.json").exists());
    }

    #[tokio::test]
    async fn test_memory_survives_new_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = AssistantConfig {
            local_enabled: false,
            data_dir: dir.path().to_path_buf(),
            ..AssistantConfig::default()
        };

        let first = build_session(&config, Arc::new(NoopObserver), Arc::new(SilentSpeech)).unwrap();
        first.submit("remember likes tea").await;
        drop(first);

        let second = build_session(&config, Arc::new(NoopObserver), Arc::new(SilentSpeech)).unwrap();
        assert_eq!(second.memory().recall().await, "likes tea");
    }
}
