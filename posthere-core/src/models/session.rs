use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::report::{ReportKind, ReportSubmission};

/// Guided intake steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Start,
    CollectingKind,
    CollectingItem,
    CollectingLocation,
    CollectingDescription,
    CollectingSecret1,
    CollectingSecret2,
    Complete,
}

/// Partial report accumulated across guided turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectedFields {
    pub kind: Option<ReportKind>,
    pub item: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub drop_off_point: Option<String>,
    pub secret_detail_1: Option<String>,
    pub secret_detail_2: Option<String>,
}

impl CollectedFields {
    /// Returns a submission once every required field is present.
    pub fn to_submission(&self) -> Option<ReportSubmission> {
        Some(ReportSubmission {
            kind: self.kind?,
            item: self.item.clone()?,
            location: self.location.clone()?,
            description: self.description.clone()?,
            drop_off_point: self.drop_off_point.clone(),
            secret_detail_1: self.secret_detail_1.clone()?,
            secret_detail_2: self.secret_detail_2.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Mode-dependent conversation state, persisted as the session's state blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SessionState {
    Guided { step: Step, fields: CollectedFields },
    Assisted { transcript: Vec<ChatTurn> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub identity: String,
    pub state: SessionState,
    /// Bumped on every save; `0` means the session has never been persisted.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn guided(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            state: SessionState::Guided {
                step: Step::Start,
                fields: CollectedFields::default(),
            },
            version: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn assisted(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            state: SessionState::Assisted {
                transcript: Vec::new(),
            },
            version: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, ttl_hours: u64, now: DateTime<Utc>) -> bool {
        if ttl_hours == 0 {
            return false;
        }
        now - self.updated_at > Duration::hours(ttl_hours as i64)
    }
}
