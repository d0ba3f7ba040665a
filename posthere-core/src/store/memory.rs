use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::PostHereError;
use crate::models::{
    item_tokens, shares_token, MatchStatus, NewReport, Report, ReportKind, Session,
};
use crate::store::{check_transition, ReportStore, SessionStore};

/// Process-local store. Sessions do not survive a restart.
#[derive(Default)]
pub struct MemoryStore {
    reports: Mutex<Vec<Report>>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn report_count(&self) -> usize {
        self.reports.lock().await.len()
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn insert(&self, report: NewReport) -> Result<Uuid, PostHereError> {
        let id = Uuid::new_v4();
        let record = Report {
            id,
            kind: report.kind,
            canonical_item_key: report.canonical_item_key,
            item_tokens: report.item_tokens,
            raw_description: report.raw_description,
            location: report.location,
            secret_detail_1: report.secret_detail_1,
            secret_detail_2: report.secret_detail_2,
            reporter_identity: report.reporter_identity,
            drop_off_point: report.drop_off_point,
            match_status: MatchStatus::Open,
            claim_code: None,
            matched_report_id: None,
            created_at: Utc::now(),
        };
        self.reports.lock().await.push(record);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Report>, PostHereError> {
        Ok(self.reports.lock().await.iter().find(|r| r.id == id).cloned())
    }

    async fn find_candidates(
        &self,
        canonical_key: &str,
        location: Option<&str>,
        kind: ReportKind,
        status: MatchStatus,
    ) -> Result<Vec<Report>, PostHereError> {
        let tokens = item_tokens(canonical_key);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let location = location.map(|l| l.trim().to_lowercase());

        let reports = self.reports.lock().await;
        Ok(reports
            .iter()
            .filter(|r| r.kind == kind && r.match_status == status)
            .filter(|r| shares_token(&r.item_tokens, &tokens))
            .filter(|r| match &location {
                Some(loc) => r.location.to_lowercase().contains(loc.as_str()),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn latest_for_identity(&self, identity: &str) -> Result<Option<Report>, PostHereError> {
        let reports = self.reports.lock().await;
        // max_by_key keeps the last maximum, so later inserts win ties on created_at.
        Ok(reports
            .iter()
            .filter(|r| r.reporter_identity == identity)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn mark_status(&self, id: Uuid, next: MatchStatus) -> Result<(), PostHereError> {
        let mut reports = self.reports.lock().await;
        let report = reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(PostHereError::NotFound(id))?;
        check_transition(report.match_status, next)?;
        report.match_status = next;
        Ok(())
    }

    async fn claim(
        &self,
        id: Uuid,
        counterpart_id: Uuid,
        claim_code: &str,
    ) -> Result<(), PostHereError> {
        let mut reports = self.reports.lock().await;
        let report = reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(PostHereError::NotFound(id))?;
        if report.match_status != MatchStatus::Open {
            return Err(PostHereError::InvalidTransition {
                from: report.match_status,
                to: MatchStatus::PendingApproval,
            });
        }
        report.match_status = MatchStatus::PendingApproval;
        report.matched_report_id = Some(counterpart_id);
        report.claim_code = Some(claim_code.to_string());
        Ok(())
    }

    async fn list(
        &self,
        status: Option<MatchStatus>,
        limit: usize,
    ) -> Result<Vec<Report>, PostHereError> {
        let reports = self.reports.lock().await;
        let mut selected: Vec<Report> = reports
            .iter()
            .filter(|r| status.map_or(true, |s| r.match_status == s))
            .cloned()
            .collect();
        selected.reverse();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        selected.truncate(limit);
        Ok(selected)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, identity: &str) -> Result<Option<Session>, PostHereError> {
        Ok(self.sessions.lock().await.get(identity).cloned())
    }

    async fn save(&self, session: &Session) -> Result<i64, PostHereError> {
        let mut sessions = self.sessions.lock().await;
        let stored_version = sessions.get(&session.identity).map_or(0, |s| s.version);
        if stored_version != session.version {
            return Err(PostHereError::SessionConflict(session.identity.clone()));
        }
        let mut saved = session.clone();
        saved.version = stored_version + 1;
        saved.updated_at = Utc::now();
        sessions.insert(saved.identity.clone(), saved);
        Ok(stored_version + 1)
    }

    async fn delete(&self, identity: &str) -> Result<bool, PostHereError> {
        Ok(self.sessions.lock().await.remove(identity).is_some())
    }

    async fn delete_idle(&self, cutoff: DateTime<Utc>) -> Result<u64, PostHereError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.updated_at >= cutoff);
        Ok((before - sessions.len()) as u64)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
