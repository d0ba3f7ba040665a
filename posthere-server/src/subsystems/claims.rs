//! Handover approval and claim resolution at the verification point.

use posthere_core::models::MatchStatus;
use posthere_core::{PostHereError, ReportStore};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ClaimError {
    #[error("Report has no pending claim")]
    NoClaim,

    #[error("Claim code does not match")]
    CodeMismatch,

    #[error(transparent)]
    Store(#[from] PostHereError),
}

/// PendingApproval -> Approved.
pub async fn approve(reports: &dyn ReportStore, report_id: Uuid) -> Result<(), PostHereError> {
    reports.mark_status(report_id, MatchStatus::Approved).await?;
    tracing::info!(report_id = %report_id, "Handover approved");
    Ok(())
}

/// Resolve `report_id` and its counterpart when `claim_code` matches. Returns the ids resolved.
pub async fn resolve_claim(
    reports: &dyn ReportStore,
    report_id: Uuid,
    claim_code: &str,
) -> Result<Vec<Uuid>, ClaimError> {
    let report = reports
        .get(report_id)
        .await?
        .ok_or(PostHereError::NotFound(report_id))?;

    if !matches!(report.match_status, MatchStatus::PendingApproval | MatchStatus::Approved) {
        return Err(ClaimError::Store(PostHereError::InvalidTransition {
            from: report.match_status,
            to: MatchStatus::Resolved,
        }));
    }
    let expected = report.claim_code.as_deref().ok_or(ClaimError::NoClaim)?;
    if expected != claim_code.trim() {
        tracing::warn!(report_id = %report_id, "Claim code rejected");
        return Err(ClaimError::CodeMismatch);
    }

    reports.mark_status(report_id, MatchStatus::Resolved).await?;
    let mut resolved = vec![report_id];

    if let Some(counterpart) = report.matched_report_id {
        match reports.mark_status(counterpart, MatchStatus::Resolved).await {
            Ok(()) => resolved.push(counterpart),
            Err(e) => {
                tracing::warn!(report_id = %report_id, counterpart_id = %counterpart, error = %e, "Counterpart not resolved");
            }
        }
    }

    tracing::info!(report_id = %report_id, resolved = resolved.len(), "Claim resolved");
    Ok(resolved)
}
