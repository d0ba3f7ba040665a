use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PostHereError;

/// Tokens shorter than this never take part in matching.
pub const MIN_TOKEN_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Lost,
    Found,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Lost => "lost",
            ReportKind::Found => "found",
        }
    }

    /// The kind a counterpart report must have to match this one.
    pub fn opposite(&self) -> ReportKind {
        match self {
            ReportKind::Lost => ReportKind::Found,
            ReportKind::Found => ReportKind::Lost,
        }
    }

    /// Parse free user input. Accepts English and French keywords.
    pub fn from_user_input(input: &str) -> Option<ReportKind> {
        let text = input.trim().to_lowercase();
        let lost = ["lost", "perdu", "perdue", "loss"]
            .iter()
            .any(|k| text.split(|c: char| !c.is_alphanumeric()).any(|w| w == *k));
        let found = ["found", "trouvé", "trouve", "trouvée", "find"]
            .iter()
            .any(|k| text.split(|c: char| !c.is_alphanumeric()).any(|w| w == *k));
        match (lost, found) {
            (true, false) => Some(ReportKind::Lost),
            (false, true) => Some(ReportKind::Found),
            _ => None,
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = PostHereError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lost" => Ok(ReportKind::Lost),
            "found" => Ok(ReportKind::Found),
            other => Err(PostHereError::Other(format!("unknown report kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Open,
    PendingApproval,
    Approved,
    Resolved,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Open => "open",
            MatchStatus::PendingApproval => "pending_approval",
            MatchStatus::Approved => "approved",
            MatchStatus::Resolved => "resolved",
        }
    }

    pub fn can_transition_to(&self, next: MatchStatus) -> bool {
        matches!(
            (self, next),
            (MatchStatus::Open, MatchStatus::PendingApproval)
                | (MatchStatus::Open, MatchStatus::Resolved)
                | (MatchStatus::PendingApproval, MatchStatus::Approved)
                | (MatchStatus::PendingApproval, MatchStatus::Resolved)
                | (MatchStatus::Approved, MatchStatus::Resolved)
        )
    }

    /// Statuses from which `next` may be entered.
    pub fn allowed_sources(next: MatchStatus) -> Vec<MatchStatus> {
        [
            MatchStatus::Open,
            MatchStatus::PendingApproval,
            MatchStatus::Approved,
            MatchStatus::Resolved,
        ]
        .into_iter()
        .filter(|from| from.can_transition_to(next))
        .collect()
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = PostHereError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(MatchStatus::Open),
            "pending_approval" => Ok(MatchStatus::PendingApproval),
            "approved" => Ok(MatchStatus::Approved),
            "resolved" => Ok(MatchStatus::Resolved),
            other => Err(PostHereError::Other(format!("unknown match status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub kind: ReportKind,
    pub canonical_item_key: String,
    pub item_tokens: Vec<String>,
    pub raw_description: String,
    pub location: String,
    #[serde(skip_serializing)]
    pub secret_detail_1: String,
    #[serde(skip_serializing)]
    pub secret_detail_2: Option<String>,
    pub reporter_identity: String,
    pub drop_off_point: Option<String>,
    pub match_status: MatchStatus,
    #[serde(skip_serializing)]
    pub claim_code: Option<String>,
    pub matched_report_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A report as submitted by the conversation layer, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSubmission {
    pub kind: ReportKind,
    pub item: String,
    pub location: String,
    pub description: String,
    pub drop_off_point: Option<String>,
    pub secret_detail_1: String,
    pub secret_detail_2: Option<String>,
}

/// A normalized report ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub kind: ReportKind,
    pub canonical_item_key: String,
    pub item_tokens: Vec<String>,
    pub raw_description: String,
    pub location: String,
    pub secret_detail_1: String,
    pub secret_detail_2: Option<String>,
    pub reporter_identity: String,
    pub drop_off_point: Option<String>,
}

impl NewReport {
    /// Build from a submission and an already-normalized item key.
    pub fn from_submission(
        submission: &ReportSubmission,
        canonical_item_key: String,
        reporter_identity: &str,
    ) -> Self {
        let item_tokens = item_tokens(&canonical_item_key);
        let drop_off_point = match submission.kind {
            ReportKind::Found => submission
                .drop_off_point
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            ReportKind::Lost => None,
        };
        Self {
            kind: submission.kind,
            canonical_item_key,
            item_tokens,
            raw_description: submission.description.trim().to_string(),
            location: submission.location.trim().to_string(),
            secret_detail_1: normalize_secret(&submission.secret_detail_1),
            secret_detail_2: submission
                .secret_detail_2
                .as_deref()
                .map(normalize_secret)
                .filter(|s| !s.is_empty()),
            reporter_identity: reporter_identity.to_string(),
            drop_off_point,
        }
    }
}

/// Secrets are compared exactly, so they are stored trimmed and lowercased.
pub fn normalize_secret(secret: &str) -> String {
    secret.trim().to_lowercase()
}

/// Fallback canonical key when the normalize capability is unavailable.
pub fn fallback_item_key(raw: &str) -> String {
    raw.to_lowercase().trim().to_string()
}

/// Split a canonical key into distinct match tokens of at least `MIN_TOKEN_CHARS` characters.
pub fn item_tokens(canonical_item_key: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in canonical_item_key
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
    {
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// True when some stored token contains some query token ("smartphone" recalls "phone").
pub fn shares_token(stored: &[String], query: &[String]) -> bool {
    query
        .iter()
        .any(|q| stored.iter().any(|t| t.contains(q.as_str())))
}
