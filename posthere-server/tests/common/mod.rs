//! Harness shared by the integration tests. Fakes come from `posthere-test-utils`.
#![allow(dead_code)]

use std::sync::Arc;

use posthere_core::config::PostHereConfig;
use posthere_core::translate::PassthroughNormalizer;
use posthere_core::{MemoryStore, NluBackend};
use posthere_server::AppContext;

pub use posthere_test_utils::{FlakyReportStore, RecordingSender, ScriptedNlu};

pub struct Harness {
    pub ctx: Arc<AppContext>,
    pub store: Arc<MemoryStore>,
    pub sender: Arc<RecordingSender>,
}

pub fn harness(config: PostHereConfig, nlu: Option<Arc<dyn NluBackend>>) -> Harness {
    harness_with_sender(config, nlu, RecordingSender::new())
}

pub fn harness_with_sender(
    config: PostHereConfig,
    nlu: Option<Arc<dyn NluBackend>>,
    sender: RecordingSender,
) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let sender = Arc::new(sender);
    let ctx = AppContext::new(
        config,
        store.clone(),
        store.clone(),
        Arc::new(PassthroughNormalizer),
        nlu,
        sender.clone(),
    );
    Harness {
        ctx: Arc::new(ctx),
        store,
        sender,
    }
}

/// Guided config with the second secret turned off, so one secret completes a report.
pub fn single_secret_config() -> PostHereConfig {
    let mut config = PostHereConfig::default();
    config.bot.ask_second_secret = false;
    config
}
