//! Shared handles for the inbound router and HTTP layer.

use std::sync::Arc;

use anyhow::Context;
use posthere_core::config::{PostHereConfig, StorageBackend};
use posthere_core::nlu::ChatConfig;
use posthere_core::prompt::system_prompt;
use posthere_core::{
    create_normalizer, create_sender, ChatCompletionClient, MemoryStore, MessageSender,
    NluBackend, Normalizer, ReportStore, SessionStore,
};
use sqlx::PgPool;

use crate::subsystems::locks::IdentityLocks;
use crate::subsystems::matcher::Matcher;
use crate::subsystems::notifier::Notifier;
use crate::subsystems::reports::PgReportStore;
use crate::subsystems::sessions::PgSessionStore;

pub struct AppContext {
    pub config: PostHereConfig,
    pub reports: Arc<dyn ReportStore>,
    pub sessions: Arc<dyn SessionStore>,
    /// `None` when assisted mode has no API key; assisted turns then get the busy reply.
    pub nlu: Option<Arc<dyn NluBackend>>,
    pub matcher: Matcher,
    pub locks: IdentityLocks,
    pub system_prompt: String,
    /// Present for the Postgres backend; used by `/health`.
    pub pool: Option<PgPool>,
}

impl AppContext {
    pub fn new(
        config: PostHereConfig,
        reports: Arc<dyn ReportStore>,
        sessions: Arc<dyn SessionStore>,
        normalizer: Arc<dyn Normalizer>,
        nlu: Option<Arc<dyn NluBackend>>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        let matcher = Matcher::new(
            reports.clone(),
            normalizer,
            Notifier::new(sender),
            config.matching.clone(),
            config.bot.verification_point.clone(),
        );
        let system_prompt = system_prompt(&config.bot.verification_point);
        Self {
            config,
            reports,
            sessions,
            nlu,
            matcher,
            locks: IdentityLocks::new(),
            system_prompt,
            pool: None,
        }
    }

    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn storage_name(&self) -> &str {
        self.reports.name()
    }
}

/// Wire stores and capability clients from configuration.
pub async fn build_context(config: PostHereConfig) -> anyhow::Result<AppContext> {
    let normalizer: Arc<dyn Normalizer> = Arc::from(
        create_normalizer(&config.translate).context("Failed to build translate client")?,
    );
    let sender: Arc<dyn MessageSender> =
        Arc::from(create_sender(&config.messaging).context("Failed to build message sender")?);

    let nlu: Option<Arc<dyn NluBackend>> =
        match ChatCompletionClient::new(ChatConfig::from_config(&config.nlu, None)) {
            Ok(client) => Some(Arc::new(client) as Arc<dyn NluBackend>),
            Err(e) => {
                if config.bot.mode == posthere_core::config::BotMode::Assisted {
                    tracing::warn!(error = %e, "NLU unavailable; assisted turns will get the busy reply");
                }
                None
            }
        };

    tracing::info!(
        normalizer = normalizer.name(),
        sender = sender.name(),
        mode = ?config.bot.mode,
        "Capabilities configured"
    );

    match config.database.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; reports and sessions are lost on restart");
            let store = Arc::new(MemoryStore::new());
            Ok(AppContext::new(config, store.clone(), store, normalizer, nlu, sender))
        }
        StorageBackend::Postgres => {
            let pool = posthere_core::db::create_pool(&config.database)
                .await
                .context("Failed to connect to PostgreSQL")?;
            posthere_core::db::ensure_schema(&pool)
                .await
                .context("Failed to create schema")?;
            let reports = Arc::new(PgReportStore::new(pool.clone()));
            let sessions = Arc::new(PgSessionStore::new(pool.clone()));
            Ok(AppContext::new(config, reports, sessions, normalizer, nlu, sender).with_pool(pool))
        }
    }
}
