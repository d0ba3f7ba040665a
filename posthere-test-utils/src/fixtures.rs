use chrono::Utc;
use posthere_core::models::{item_tokens, normalize_secret, MatchStatus, Report, ReportKind, ReportSubmission};
use uuid::Uuid;

/// A submission located in Himbi with one secret detail.
pub fn submission(kind: ReportKind, item: &str, secret: &str) -> ReportSubmission {
    ReportSubmission {
        kind,
        item: item.to_string(),
        location: "Himbi".to_string(),
        description: "test description".to_string(),
        drop_off_point: None,
        secret_detail_1: secret.to_string(),
        secret_detail_2: None,
    }
}

/// An open stored report, as the store would return it.
pub fn report(kind: ReportKind, item: &str, secret: &str, identity: &str) -> Report {
    Report {
        id: Uuid::new_v4(),
        kind,
        canonical_item_key: item.to_string(),
        item_tokens: item_tokens(item),
        raw_description: "test description".to_string(),
        location: "Himbi".to_string(),
        secret_detail_1: normalize_secret(secret),
        secret_detail_2: None,
        reporter_identity: identity.to_string(),
        drop_off_point: None,
        match_status: MatchStatus::Open,
        claim_code: None,
        matched_report_id: None,
        created_at: Utc::now(),
    }
}
