//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both the CLI and
//! the REST API. Services are generic over the repository trait; AppState
//! pins them to the SQLite implementation.

use std::path::PathBuf;
use std::sync::Arc;

use delve_core::event::EventBus;
use delve_core::research::orchestrator::{ResearchOrchestrator, ResearchSettings};
use delve_core::research::worker::ResearchWorkerPool;
use delve_core::search::box_provider::BoxSearchProvider;
use delve_core::service::chat::ChatService;
use delve_core::service::research::ResearchService;
use delve_infra::config::{
    ANTHROPIC_API_KEY_ENV, BRAVE_API_KEY_ENV, load_config, resolve_data_dir, secret_from_env,
};
use delve_infra::llm::create_provider_or_unavailable;
use delve_infra::search::BraveSearchProvider;
use delve_infra::sqlite::pool::{DatabasePool, database_url};
use delve_infra::sqlite::research::SqliteResearchRepository;
use delve_types::config::AppConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteResearchService = ResearchService<SqliteResearchRepository>;
pub type ConcreteWorkerPool = ResearchWorkerPool<SqliteResearchRepository>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub research_service: Arc<ConcreteResearchService>,
    pub worker_pool: Arc<ConcreteWorkerPool>,
    pub chat_service: Arc<ChatService>,
    pub event_bus: EventBus,
    pub config: Arc<AppConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Connect to the database and wire services. Workers are not started.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        let llm = Arc::new(create_provider_or_unavailable(
            &config.llm,
            secret_from_env(ANTHROPIC_API_KEY_ENV),
        )?);
        let search = Arc::new(BoxSearchProvider::new(BraveSearchProvider::new(
            &config.search,
            secret_from_env(BRAVE_API_KEY_ENV),
        )?));

        let repo = Arc::new(SqliteResearchRepository::new(db_pool.clone()));
        let event_bus = EventBus::default();
        let orchestrator = Arc::new(ResearchOrchestrator::new(
            llm.clone(),
            search,
            ResearchSettings::from_config(&config),
        ));
        let worker_pool = Arc::new(ResearchWorkerPool::new(
            repo.clone(),
            orchestrator,
            event_bus.clone(),
            config.research.workers,
        ));
        let research_service = ResearchService::new(
            repo,
            worker_pool.clone(),
            config.research.list_limit,
        );
        let chat_service = ChatService::new(llm, &config.llm);

        tracing::debug!(data_dir = %data_dir.display(), "application state initialized");

        Ok(Self {
            research_service: Arc::new(research_service),
            worker_pool,
            chat_service: Arc::new(chat_service),
            event_bus,
            config: Arc::new(config),
            data_dir,
            db_pool,
        })
    }

    /// Stop workers, then close the database.
    pub async fn shutdown(&self) {
        self.worker_pool.shutdown().await;
        self.db_pool.close().await;
    }
}
