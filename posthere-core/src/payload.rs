//! Structured report payload embedded in NLU replies.
//!
//! The assisted-mode prompt asks the model to append exactly one fenced ```json block once it
//! has a complete report. Extraction makes a single tolerant attempt: a fenced block first,
//! then the outermost `{...}` span. Anything that does not parse, or parses without the
//! required fields, means "not complete yet" and is never an error.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::models::{ReportKind, ReportSubmission};

/// Raw payload as emitted by the model. Accepts the legacy `type`/`unique_detail_*` keys.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ReportPayload {
    #[serde(default, alias = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub drop_off_point: Option<String>,
    #[serde(default, alias = "unique_detail_1")]
    pub secret_detail_1: Option<String>,
    #[serde(default, alias = "unique_detail_2")]
    pub secret_detail_2: Option<String>,
}

impl ReportPayload {
    /// Returns a submission only when kind, item, location, description and the first secret
    /// are all present and non-blank.
    pub fn to_submission(&self) -> Option<ReportSubmission> {
        let kind = self.kind.as_deref().and_then(ReportKind::from_user_input)?;
        Some(ReportSubmission {
            kind,
            item: non_blank(&self.item)?,
            location: non_blank(&self.location)?,
            description: non_blank(&self.description)?,
            drop_off_point: non_blank(&self.drop_off_point),
            secret_detail_1: non_blank(&self.secret_detail_1)?,
            secret_detail_2: non_blank(&self.secret_detail_2),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// An NLU reply split into the text shown to the user and the optional payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NluReply {
    pub visible_text: String,
    pub payload: Option<ReportPayload>,
}

fn fenced_block() -> Option<&'static Regex> {
    static FENCED: OnceLock<Option<Regex>> = OnceLock::new();
    FENCED
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").ok())
        .as_ref()
}

pub fn extract_payload(reply: &str) -> NluReply {
    if let Some(caps) = fenced_block().and_then(|re| re.captures(reply)) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        let payload = caps
            .get(1)
            .and_then(|m| serde_json::from_str::<ReportPayload>(m.as_str()).ok());
        if payload.is_none() {
            tracing::debug!("Fenced block in NLU reply did not parse as a report payload");
        }
        // The fence is stripped even when it does not parse: raw JSON is never shown.
        return NluReply {
            visible_text: strip_range(reply, whole),
            payload,
        };
    }

    if let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) {
        if start < end {
            if let Ok(payload) = serde_json::from_str::<ReportPayload>(&reply[start..=end]) {
                return NluReply {
                    visible_text: strip_range(reply, start..end + 1),
                    payload: Some(payload),
                };
            }
        }
    }

    NluReply {
        visible_text: reply.trim().to_string(),
        payload: None,
    }
}

fn strip_range(text: &str, range: std::ops::Range<usize>) -> String {
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..range.start]);
    out.push_str(&text[range.end..]);
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_payload_is_extracted_and_stripped() {
        let reply = "Thank you, we registered your report.\n\n```json\n{\n  \"kind\": \"lost\",\n  \"item\": \"phone\",\n  \"location\": \"Himbi\",\n  \"description\": \"black Samsung\",\n  \"secret_detail_1\": \"Cracked screen bottom left\"\n}\n```";
        let parsed = extract_payload(reply);
        assert_eq!(parsed.visible_text, "Thank you, we registered your report.");
        let submission = parsed.payload.unwrap().to_submission().unwrap();
        assert_eq!(submission.kind, ReportKind::Lost);
        assert_eq!(submission.secret_detail_1, "Cracked screen bottom left");
        assert_eq!(submission.secret_detail_2, None);
    }

    #[test]
    fn test_legacy_keys_are_accepted() {
        let reply = r#"Done. ```json {"type": "found", "item": "wallet", "location": "Mugunga", "description": "brown", "unique_detail_1": "three cards", "unique_detail_2": "", "phone": "+243"} ```"#;
        let submission = extract_payload(reply).payload.unwrap().to_submission().unwrap();
        assert_eq!(submission.kind, ReportKind::Found);
        assert_eq!(submission.secret_detail_1, "three cards");
        assert_eq!(submission.secret_detail_2, None);
    }

    #[test]
    fn test_bare_object_is_extracted() {
        let reply = r#"Got it {"kind": "lost", "item": "bag"} thanks"#;
        let parsed = extract_payload(reply);
        assert_eq!(parsed.visible_text, "Got it  thanks");
        let payload = parsed.payload.unwrap();
        assert_eq!(payload.item.as_deref(), Some("bag"));
        assert!(payload.to_submission().is_none(), "missing fields means incomplete");
    }

    #[test]
    fn test_malformed_fence_is_stripped_without_payload() {
        let reply = "Almost there!\n```json\n{\"kind\": \"lost\", \"item\": }\n```";
        let parsed = extract_payload(reply);
        assert!(parsed.payload.is_none());
        assert_eq!(parsed.visible_text, "Almost there!");
    }

    #[test]
    fn test_plain_reply_has_no_payload() {
        let parsed = extract_payload("  Where did you lose it?  ");
        assert!(parsed.payload.is_none());
        assert_eq!(parsed.visible_text, "Where did you lose it?");
    }

    #[test]
    fn test_blank_secret_is_incomplete() {
        let payload = ReportPayload {
            kind: Some("lost".to_string()),
            item: Some("keys".to_string()),
            location: Some("Katindo".to_string()),
            description: Some("three keys".to_string()),
            secret_detail_1: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(payload.to_submission().is_none());
    }
}
