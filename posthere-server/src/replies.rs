//! User-facing reply texts.
//!
//! Nothing here may include another reporter's identity, a secret detail, or error internals.

use posthere_core::models::ReportKind;

use crate::subsystems::matcher::MatchOutcome;

pub const GREETING: &str = "Welcome to PostHere, the community lost & found registry.\n\
     Did you LOSE something or FIND something? Reply \"lost\" or \"found\".";

pub const KIND_REPROMPT: &str =
    "Sorry, I did not understand. Please reply \"lost\" if you lost something, or \"found\" if you found something.";

pub const EMPTY_MESSAGE: &str =
    "Please send a text message. Reply \"lost\" or \"found\" to start a report, or \"status\" to check an existing one.";

pub const BUSY: &str = "Our service is busy right now. Please try again in a few minutes.";

pub const CONFLICT: &str =
    "Your previous message is still being processed. Please send your last answer again.";

pub const SAVE_FAILED: &str =
    "Sorry, we could not save your report. Nothing was lost: send any message to try again.";

pub const NO_ACTIVE_REPORT: &str =
    "You have no active report. Reply \"lost\" or \"found\" to create one.";

pub const RESET_ASSISTED: &str =
    "Your previous conversation was cleared. Tell me: did you lose something or find something?";

pub const ASSISTED_FALLBACK: &str = "Could you tell me a bit more about the item?";

pub const SECRET2_SKIP_WORDS: &[&str] = &["skip", "none", "no", "non", "aucun", "passer"];

pub const RESET_GUIDED: &str = "Your previous report was discarded.";

pub fn item_prompt(kind: ReportKind) -> &'static str {
    match kind {
        ReportKind::Lost => "Sorry for your loss. What item did you lose? (for example: phone, wallet, ID card)",
        ReportKind::Found => "Thank you for helping! What item did you find? (for example: phone, wallet, ID card)",
    }
}

pub fn location_prompt(kind: ReportKind) -> &'static str {
    match kind {
        ReportKind::Lost => "Where did you lose it? Give a neighborhood, street or landmark.",
        ReportKind::Found => "Where did you find it? Give a neighborhood, street or landmark.",
    }
}

pub fn description_prompt(kind: ReportKind, verification_point: &str) -> String {
    match kind {
        ReportKind::Lost => "Describe the item: brand, color, size, anything visible.".to_string(),
        ReportKind::Found => format!(
            "Describe the item: brand, color, size, anything visible. \
             Please keep it safe and bring it to {}.",
            verification_point
        ),
    }
}

pub fn secret1_prompt(kind: ReportKind) -> &'static str {
    match kind {
        ReportKind::Lost => {
            "Now tell us one hidden detail only the real owner would know (a scratch, a sticker, \
             what is inside). It is never shown to anyone and is used to confirm ownership."
        }
        ReportKind::Found => {
            "Now tell us one hidden detail that is not obvious at first glance (a scratch, a sticker, \
             what is inside). It is never shown to anyone and is used to confirm the owner."
        }
    }
}

pub fn secret2_prompt(required: bool) -> &'static str {
    if required {
        "Please give a second hidden detail. Both details are needed to confirm ownership."
    } else {
        "Optional: a second hidden detail makes the match safer. Send it now, or reply \"skip\"."
    }
}

pub fn field_reprompt(step_prompt: &str) -> String {
    format!("I did not get that. {}", step_prompt)
}

/// Final reply to the reporter whose submission was just saved.
pub fn submitted(outcome: &MatchOutcome, verification_point: &str) -> String {
    match (outcome.kind, outcome.claim_code.as_deref()) {
        (ReportKind::Lost, Some(code)) => format!(
            "Good news! Your report is saved and a found \"{}\" matches your hidden details. \
             Go to {} to verify and collect it. Your claim code is {}. Keep it private.",
            outcome.canonical_item_key, verification_point, code
        ),
        (ReportKind::Found, Some(_)) => format!(
            "Thank you! Your report is saved and the owner of this \"{}\" has been identified. \
             Please bring the item to {}. The owner will present a claim code there.",
            outcome.canonical_item_key, verification_point
        ),
        (ReportKind::Lost, None) => format!(
            "Your report for \"{}\" is saved. We are still searching and will message you as soon \
             as a matching item is found. Reply \"status\" at any time.",
            outcome.canonical_item_key
        ),
        (ReportKind::Found, None) => format!(
            "Thank you! Your report for \"{}\" is saved. We are still searching for the owner. \
             Please bring the item to {}.",
            outcome.canonical_item_key, verification_point
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::matcher::MatchOutcome;
    use posthere_test_utils::report;
    use uuid::Uuid;

    fn outcome(kind: ReportKind, code: Option<&str>) -> MatchOutcome {
        MatchOutcome {
            report_id: Uuid::new_v4(),
            kind,
            canonical_item_key: "phone".to_string(),
            verified_matches: code
                .map(|_| vec![report(kind.opposite(), "phone", "secret", "whatsapp:+243999")])
                .unwrap_or_default(),
            claim_code: code.map(str::to_string),
            notifications_delivered: 0,
        }
    }

    #[test]
    fn test_owner_reply_includes_claim_code() {
        let reply = submitted(&outcome(ReportKind::Lost, Some("123456")), "City Hall");
        assert!(reply.contains("123456"));
        assert!(reply.contains("City Hall"));
        assert!(!reply.contains("+243999"));
    }

    #[test]
    fn test_unmatched_reply_says_still_searching() {
        let reply = submitted(&outcome(ReportKind::Lost, None), "City Hall");
        assert!(reply.contains("still searching"));
        let reply = submitted(&outcome(ReportKind::Found, Some("123456")), "City Hall");
        assert!(!reply.contains("123456"));
    }
}
