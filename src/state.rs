use std::sync::Arc;

use crate::agent::AgentRuntime;
use crate::checkpoint::{CheckpointStore, SharedCheckpoints};
use crate::config::AppConfig;
use crate::llm::provider::{ChatProvider, EmbeddingProvider};
use crate::llm::MistralProvider;
use crate::retrieval::{Retriever, SqliteVectorStore};

/// Process-wide services, constructed once at startup and shared read-only.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub chat: Arc<dyn ChatProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub vector_store: SqliteVectorStore,
    pub retriever: Arc<dyn Retriever>,
    pub checkpoints: SharedCheckpoints,
    pub agent: Arc<AgentRuntime>,
}

impl AppState {
    pub async fn initialize() -> anyhow::Result<Arc<Self>> {
        let config = AppConfig::from_env();
        let provider = Arc::new(MistralProvider::new(&config));
        Self::with_providers(config, provider.clone(), provider).await
    }

    /// Wire the state from explicit collaborators. Tests inject mocks here.
    pub async fn with_providers(
        config: AppConfig,
        chat: Arc<dyn ChatProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> anyhow::Result<Arc<Self>> {
        let checkpoints: SharedCheckpoints =
            Arc::new(CheckpointStore::new(&config.db_path).await?);
        let vector_store =
            SqliteVectorStore::with_pool(checkpoints.pool(), embedder.clone()).await?;
        let retriever: Arc<dyn Retriever> = Arc::new(vector_store.clone());

        let agent = Arc::new(AgentRuntime::new(
            chat.clone(),
            retriever.clone(),
            checkpoints.clone(),
            config.agent_max_steps,
        ));

        Ok(Arc::new(AppState {
            config,
            chat,
            embedder,
            vector_store,
            retriever,
            checkpoints,
            agent,
        }))
    }
}
