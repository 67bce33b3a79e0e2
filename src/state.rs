use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::mail::{Mailer, build_mailer};
use crate::services::{
    AccessService, AccountService, ResearchService, SeaOrmAccessService, SeaOrmAccountService,
    SeaOrmResearchService,
};
use crate::templates::Templates;

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub mailer: Arc<dyn Mailer>,

    pub templates: Arc<Templates>,

    pub account_service: Arc<dyn AccountService>,

    pub research_service: Arc<dyn ResearchService>,

    pub access_service: Arc<dyn AccessService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let mailer = build_mailer(&config.mail);
        Self::with_mailer(config, mailer).await
    }

    /// Builds the state around a caller-supplied mailer, e.g. an in-memory
    /// outbox the caller keeps a handle to.
    pub async fn with_mailer(config: Config, mailer: Arc<dyn Mailer>) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let templates = Arc::new(Templates::load()?);
        let config = Arc::new(RwLock::new(config));

        let account_service = Arc::new(SeaOrmAccountService::new(
            store.clone(),
            config.clone(),
            mailer.clone(),
            templates.clone(),
        )) as Arc<dyn AccountService>;

        let research_service = Arc::new(SeaOrmResearchService::new(
            store.clone(),
            config.clone(),
            mailer.clone(),
            templates.clone(),
        )) as Arc<dyn ResearchService>;

        let access_service =
            Arc::new(SeaOrmAccessService::new(store.clone(), config.clone())) as Arc<dyn AccessService>;

        Ok(Self {
            config,
            store,
            mailer,
            templates,
            account_service,
            research_service,
            access_service,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
