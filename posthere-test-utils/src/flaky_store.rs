use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use posthere_core::models::{MatchStatus, NewReport, Report, ReportKind};
use posthere_core::{MemoryStore, PostHereError, ReportStore};
use uuid::Uuid;

/// Memory-backed report store whose inserts fail until `set_failing(false)`.
pub struct FlakyReportStore {
    inner: Arc<MemoryStore>,
    failing: AtomicBool,
}

impl FlakyReportStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(true),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReportStore for FlakyReportStore {
    async fn insert(&self, report: NewReport) -> Result<Uuid, PostHereError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PostHereError::Other("connection refused".to_string()));
        }
        self.inner.insert(report).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Report>, PostHereError> {
        self.inner.get(id).await
    }

    async fn find_candidates(
        &self,
        canonical_key: &str,
        location: Option<&str>,
        kind: ReportKind,
        status: MatchStatus,
    ) -> Result<Vec<Report>, PostHereError> {
        self.inner.find_candidates(canonical_key, location, kind, status).await
    }

    async fn latest_for_identity(&self, identity: &str) -> Result<Option<Report>, PostHereError> {
        self.inner.latest_for_identity(identity).await
    }

    async fn mark_status(&self, id: Uuid, next: MatchStatus) -> Result<(), PostHereError> {
        self.inner.mark_status(id, next).await
    }

    async fn claim(&self, id: Uuid, counterpart_id: Uuid, claim_code: &str) -> Result<(), PostHereError> {
        self.inner.claim(id, counterpart_id, claim_code).await
    }

    async fn list(&self, status: Option<MatchStatus>, limit: usize) -> Result<Vec<Report>, PostHereError> {
        self.inner.list(status, limit).await
    }

    fn name(&self) -> &str {
        "flaky"
    }
}
