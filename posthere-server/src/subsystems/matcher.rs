//! Matcher: save a submitted report, find verified counterparts, notify them.
//!
//! Recall comes from shared item tokens; precision comes from the secret details, which must be
//! equal on both sides. A candidate only becomes a match once it has been claimed
//! (Open → PendingApproval) under this submission's claim code.

use std::sync::Arc;

use posthere_core::config::MatchingConfig;
use posthere_core::models::{MatchStatus, NewReport, Report, ReportKind, ReportSubmission};
use posthere_core::{normalize_item_key, Normalizer, PostHereError, ReportStore};
use rand::Rng;
use uuid::Uuid;

use crate::subsystems::notifier::{compose_alert, Notifier};

/// Result of one submission.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub report_id: Uuid,
    pub kind: ReportKind,
    pub canonical_item_key: String,
    /// Counterpart reports, as they were before being claimed.
    pub verified_matches: Vec<Report>,
    /// Issued only when at least one match survived claiming.
    pub claim_code: Option<String>,
    pub notifications_delivered: usize,
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        !self.verified_matches.is_empty()
    }
}

#[derive(Clone)]
pub struct Matcher {
    reports: Arc<dyn ReportStore>,
    normalizer: Arc<dyn Normalizer>,
    notifier: Notifier,
    config: MatchingConfig,
    verification_point: String,
}

impl Matcher {
    pub fn new(
        reports: Arc<dyn ReportStore>,
        normalizer: Arc<dyn Normalizer>,
        notifier: Notifier,
        config: MatchingConfig,
        verification_point: String,
    ) -> Self {
        Self {
            reports,
            normalizer,
            notifier,
            config,
            verification_point,
        }
    }

    /// Persist `submission` for `reporter`, then match and notify.
    pub async fn match_and_notify(
        &self,
        submission: &ReportSubmission,
        reporter: &str,
    ) -> Result<MatchOutcome, PostHereError> {
        let new_report = self.prepare(submission, reporter).await;
        self.record(new_report).await
    }

    /// Normalize the item name. Nothing is written.
    pub async fn prepare(&self, submission: &ReportSubmission, reporter: &str) -> NewReport {
        let canonical_key = normalize_item_key(self.normalizer.as_ref(), &submission.item).await;
        NewReport::from_submission(submission, canonical_key, reporter)
    }

    /// Insert `new_report`, then claim and notify its verified counterparts.
    ///
    /// Only the insert can fail this call. Everything after it degrades to "fewer matches"
    /// so a saved report is never reported back as a failure.
    pub async fn record(&self, new_report: NewReport) -> Result<MatchOutcome, PostHereError> {
        let report_id = self.reports.insert(new_report.clone()).await?;
        let reporter = new_report.reporter_identity.clone();

        let mut outcome = MatchOutcome {
            report_id,
            kind: new_report.kind,
            canonical_item_key: new_report.canonical_item_key.clone(),
            verified_matches: Vec::new(),
            claim_code: None,
            notifications_delivered: 0,
        };

        let location = self
            .config
            .require_location_match
            .then_some(new_report.location.as_str());
        let candidates = match self
            .reports
            .find_candidates(
                &new_report.canonical_item_key,
                location,
                new_report.kind.opposite(),
                MatchStatus::Open,
            )
            .await
        {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(report_id = %report_id, error = %e, "Candidate lookup failed, report left open");
                return Ok(outcome);
            }
        };

        let verified: Vec<Report> = candidates
            .into_iter()
            .filter(|c| c.id != report_id)
            .filter(|c| secrets_match(&new_report, c, self.config.require_both_secrets))
            .collect();

        tracing::info!(
            report_id = %report_id,
            reporter = %reporter,
            verified = verified.len(),
            "Candidates verified"
        );

        if verified.is_empty() {
            return Ok(outcome);
        }

        let claim_code = generate_claim_code();
        let mut claimed = Vec::with_capacity(verified.len());
        for candidate in verified {
            match self.reports.claim(candidate.id, report_id, &claim_code).await {
                Ok(()) => claimed.push(candidate),
                Err(e) => {
                    tracing::info!(
                        report_id = %report_id,
                        candidate_id = %candidate.id,
                        error = %e,
                        "Candidate no longer claimable, dropped"
                    );
                }
            }
        }

        if claimed.is_empty() {
            return Ok(outcome);
        }

        if let Err(e) = self.reports.claim(report_id, claimed[0].id, &claim_code).await {
            tracing::warn!(report_id = %report_id, error = %e, "Could not mark new report pending approval");
        }

        let alerts: Vec<_> = claimed
            .iter()
            .map(|c| {
                let handover = handover_point(&new_report, c).unwrap_or(&self.verification_point);
                compose_alert(c, handover, &claim_code)
            })
            .collect();
        outcome.notifications_delivered = self.notifier.notify_all(&alerts).await;
        outcome.verified_matches = claimed;
        outcome.claim_code = Some(claim_code);

        Ok(outcome)
    }
}

/// Exact comparison of the normalized secret details.
pub fn secrets_match(new_report: &NewReport, candidate: &Report, require_both: bool) -> bool {
    if new_report.secret_detail_1.is_empty() || new_report.secret_detail_1 != candidate.secret_detail_1 {
        return false;
    }
    if !require_both {
        return true;
    }
    match (&new_report.secret_detail_2, &candidate.secret_detail_2) {
        (Some(a), Some(b)) => !a.is_empty() && a == b,
        _ => false,
    }
}

/// Drop-off point recorded by whichever side found the item.
fn handover_point<'a>(new_report: &'a NewReport, candidate: &'a Report) -> Option<&'a str> {
    match new_report.kind {
        ReportKind::Found => new_report.drop_off_point.as_deref(),
        ReportKind::Lost => candidate.drop_off_point.as_deref(),
    }
}

pub fn generate_claim_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use posthere_test_utils::{submission, RecordingSender};
    use posthere_core::translate::PassthroughNormalizer;
    use posthere_core::MemoryStore;

    fn matcher(store: Arc<MemoryStore>, sender: Arc<RecordingSender>, config: MatchingConfig) -> Matcher {
        Matcher::new(
            store,
            Arc::new(PassthroughNormalizer),
            Notifier::new(sender),
            config,
            "Main Police Station".to_string(),
        )
    }

    // ========================================================================
    // TEST 1: found then lost with the same secret -> one verified match
    // ========================================================================
    #[tokio::test]
    async fn test_found_then_lost_matches_on_secret() {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(RecordingSender::new());
        let m = matcher(store.clone(), sender.clone(), MatchingConfig::default());

        let found = submission(ReportKind::Found, "Samsung phone", "Cracked screen bottom left");
        let first = m.match_and_notify(&found, "whatsapp:+243A").await.unwrap();
        assert!(!first.is_matched());
        assert!(sender.sent().await.is_empty());

        let lost = submission(ReportKind::Lost, "phone", "cracked screen bottom left ");
        let outcome = m.match_and_notify(&lost, "whatsapp:+243B").await.unwrap();

        assert_eq!(outcome.verified_matches.len(), 1);
        assert_eq!(outcome.verified_matches[0].id, first.report_id);
        assert_eq!(outcome.notifications_delivered, 1);
        let code = outcome.claim_code.clone().unwrap();
        assert_eq!(code.len(), 6);

        let sent = sender.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "whatsapp:+243A");
        assert!(!sent[0].1.contains(&code), "the finder never receives the claim code");
        assert!(!sent[0].1.contains("+243B"));

        let finder_report = store.get(first.report_id).await.unwrap().unwrap();
        assert_eq!(finder_report.match_status, MatchStatus::PendingApproval);
        assert_eq!(finder_report.matched_report_id, Some(outcome.report_id));
        let owner_report = store.get(outcome.report_id).await.unwrap().unwrap();
        assert_eq!(owner_report.match_status, MatchStatus::PendingApproval);
        assert_eq!(owner_report.claim_code.as_deref(), Some(code.as_str()));
    }

    // ========================================================================
    // TEST 2: different secret -> saved, no match, no notification
    // ========================================================================
    #[tokio::test]
    async fn test_secret_mismatch_saves_without_match() {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(RecordingSender::new());
        let m = matcher(store.clone(), sender.clone(), MatchingConfig::default());

        m.match_and_notify(&submission(ReportKind::Found, "Samsung phone", "cracked screen"), "A")
            .await
            .unwrap();
        let outcome = m
            .match_and_notify(&submission(ReportKind::Lost, "phone", "blue case"), "B")
            .await
            .unwrap();

        assert!(!outcome.is_matched());
        assert_eq!(outcome.claim_code, None);
        assert!(sender.sent().await.is_empty());
        assert_eq!(store.report_count().await, 2);
        let saved = store.get(outcome.report_id).await.unwrap().unwrap();
        assert_eq!(saved.match_status, MatchStatus::Open);
    }

    // ========================================================================
    // TEST 3: found report notifies the owner with the claim code
    // ========================================================================
    #[tokio::test]
    async fn test_found_after_lost_sends_code_to_owner() {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(RecordingSender::new());
        let m = matcher(store.clone(), sender.clone(), MatchingConfig::default());

        m.match_and_notify(&submission(ReportKind::Lost, "black wallet", "three receipts"), "owner")
            .await
            .unwrap();
        let mut found = submission(ReportKind::Found, "wallet", "Three receipts");
        found.drop_off_point = Some("Himbi police post".to_string());
        let outcome = m.match_and_notify(&found, "finder").await.unwrap();

        let code = outcome.claim_code.unwrap();
        let sent = sender.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "owner");
        assert!(sent[0].1.contains(&code));
        assert!(sent[0].1.contains("Himbi police post"));
    }

    #[tokio::test]
    async fn test_claimed_report_is_not_matched_twice() {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(RecordingSender::new());
        let m = matcher(store.clone(), sender.clone(), MatchingConfig::default());

        m.match_and_notify(&submission(ReportKind::Found, "phone", "sticker"), "A").await.unwrap();
        let first = m.match_and_notify(&submission(ReportKind::Lost, "phone", "sticker"), "B").await.unwrap();
        let second = m.match_and_notify(&submission(ReportKind::Lost, "phone", "sticker"), "C").await.unwrap();

        assert!(first.is_matched());
        assert!(!second.is_matched());
        assert_eq!(sender.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_notification_count_equals_matches_even_when_delivery_fails() {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(RecordingSender::failing());
        let m = matcher(store.clone(), sender.clone(), MatchingConfig::default());

        m.match_and_notify(&submission(ReportKind::Found, "keys", "red ribbon"), "A").await.unwrap();
        m.match_and_notify(&submission(ReportKind::Found, "car keys", "red ribbon"), "A2").await.unwrap();
        let outcome = m
            .match_and_notify(&submission(ReportKind::Lost, "keys", "red ribbon"), "B")
            .await
            .unwrap();

        assert_eq!(outcome.verified_matches.len(), 2);
        assert_eq!(sender.attempts(), 2);
        assert_eq!(outcome.notifications_delivered, 0);
    }

    #[tokio::test]
    async fn test_location_filter_is_opt_in() {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(RecordingSender::new());
        let strict = MatchingConfig {
            require_location_match: true,
            ..Default::default()
        };
        let m = matcher(store.clone(), sender.clone(), strict);

        let mut found = submission(ReportKind::Found, "phone", "sticker");
        found.location = "Katindo".to_string();
        m.match_and_notify(&found, "A").await.unwrap();
        let outcome = m.match_and_notify(&submission(ReportKind::Lost, "phone", "sticker"), "B").await.unwrap();
        assert!(!outcome.is_matched());
    }

    #[test]
    fn test_secrets_match_requires_both_when_configured() {
        let mut lost = submission(ReportKind::Lost, "phone", "sticker");
        lost.secret_detail_2 = Some("Blue Case".to_string());
        let new_report = NewReport::from_submission(&lost, "phone".to_string(), "B");

        let mut candidate = posthere_test_utils::report(ReportKind::Found, "phone", "sticker", "A");
        assert!(secrets_match(&new_report, &candidate, false));
        assert!(!secrets_match(&new_report, &candidate, true));

        candidate.secret_detail_2 = Some("blue case".to_string());
        assert!(secrets_match(&new_report, &candidate, true));

        candidate.secret_detail_1 = "other".to_string();
        assert!(!secrets_match(&new_report, &candidate, false));
    }

    #[test]
    fn test_claim_code_is_six_digits() {
        for _ in 0..50 {
            let code = generate_claim_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
