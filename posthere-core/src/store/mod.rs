//! Storage seams for reports and sessions.
//!
//! The service process keeps no conversation state of its own: everything lives behind these
//! traits. `posthere-server` provides the PostgreSQL implementations; `MemoryStore` backs
//! tests and single-process development runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::PostHereError;
use crate::models::{MatchStatus, NewReport, Report, ReportKind, Session};

pub mod memory;

pub use memory::MemoryStore;

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist a new report as `Open`. Returns the generated id.
    async fn insert(&self, report: NewReport) -> Result<Uuid, PostHereError>;

    async fn get(&self, id: Uuid) -> Result<Option<Report>, PostHereError>;

    /// Reports of `kind` in `status` sharing at least one match token with `canonical_key`.
    /// Tokens are OR-combined. `location`, when given, must appear in the stored location
    /// (case-insensitive).
    async fn find_candidates(
        &self,
        canonical_key: &str,
        location: Option<&str>,
        kind: ReportKind,
        status: MatchStatus,
    ) -> Result<Vec<Report>, PostHereError>;

    async fn latest_for_identity(&self, identity: &str) -> Result<Option<Report>, PostHereError>;

    /// Guarded status transition. Fails with `InvalidTransition` without mutating anything
    /// when the current status does not allow `next`.
    async fn mark_status(&self, id: Uuid, next: MatchStatus) -> Result<(), PostHereError>;

    /// Move an `Open` report to `PendingApproval`, recording the counterpart and claim code.
    async fn claim(
        &self,
        id: Uuid,
        counterpart_id: Uuid,
        claim_code: &str,
    ) -> Result<(), PostHereError>;

    /// Newest first.
    async fn list(
        &self,
        status: Option<MatchStatus>,
        limit: usize,
    ) -> Result<Vec<Report>, PostHereError>;

    fn name(&self) -> &str;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, identity: &str) -> Result<Option<Session>, PostHereError>;

    /// Compare-and-swap save. `session.version` must equal the stored version (`0` for a
    /// session that was never saved); otherwise `SessionConflict`. Returns the new version.
    async fn save(&self, session: &Session) -> Result<i64, PostHereError>;

    /// Returns true if a session existed.
    async fn delete(&self, identity: &str) -> Result<bool, PostHereError>;

    /// Delete sessions not updated since `cutoff`. Returns the number removed.
    async fn delete_idle(&self, cutoff: DateTime<Utc>) -> Result<u64, PostHereError>;

    fn name(&self) -> &str;
}

/// Status check shared by every `ReportStore` implementation.
pub fn check_transition(from: MatchStatus, to: MatchStatus) -> Result<(), PostHereError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(PostHereError::InvalidTransition { from, to })
    }
}
