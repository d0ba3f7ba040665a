//! Status-check bypass: answers "any news?" from the store without touching the session.

use posthere_core::models::{normalize_secret, MatchStatus, Report};
use posthere_core::PostHereError;

use crate::context::AppContext;
use crate::replies;

/// True when the normalized text equals or starts with one of `keywords`.
pub fn is_status_query(text: &str, keywords: &[String]) -> bool {
    let lowered = text.trim().to_lowercase();
    keywords.iter().any(|k| {
        let k = k.trim().to_lowercase();
        !k.is_empty()
            && (lowered == k
                || lowered
                    .strip_prefix(&k)
                    .is_some_and(|rest| rest.starts_with(|c: char| !c.is_alphanumeric())))
    })
}

pub async fn status_reply(ctx: &AppContext, identity: &str) -> Result<String, PostHereError> {
    let report = match ctx.reports.latest_for_identity(identity).await? {
        Some(r) => r,
        None => return Ok(replies::NO_ACTIVE_REPORT.to_string()),
    };

    let reply = match report.match_status {
        MatchStatus::Open => {
            let candidates = ctx
                .reports
                .find_candidates(
                    &report.canonical_item_key,
                    ctx.config
                        .matching
                        .require_location_match
                        .then_some(report.location.as_str()),
                    report.kind.opposite(),
                    MatchStatus::Open,
                )
                .await?;
            let verified = candidates
                .iter()
                .filter(|c| verifies(&report, c, ctx.config.matching.require_both_secrets))
                .count();
            if verified > 0 {
                format!(
                    "Your {} report for \"{}\" has {} possible match(es) waiting for confirmation. \
                     Please visit {} to verify.",
                    report.kind,
                    report.canonical_item_key,
                    verified,
                    ctx.config.bot.verification_point
                )
            } else {
                format!(
                    "Your {} report for \"{}\" is open. No matching report yet; we will message you \
                     as soon as there is one.",
                    report.kind, report.canonical_item_key
                )
            }
        }
        MatchStatus::PendingApproval => format!(
            "Your {} report for \"{}\" has a verified match. Please visit {} to complete the handover.",
            report.kind, report.canonical_item_key, ctx.config.bot.verification_point
        ),
        MatchStatus::Approved => format!(
            "Your {} report for \"{}\" has been approved for handover at {}.",
            report.kind, report.canonical_item_key, ctx.config.bot.verification_point
        ),
        MatchStatus::Resolved => format!(
            "Your {} report for \"{}\" is resolved. Reply \"lost\" or \"found\" to start a new report.",
            report.kind, report.canonical_item_key
        ),
    };
    Ok(reply)
}

fn verifies(report: &Report, candidate: &Report, require_both: bool) -> bool {
    let first = normalize_secret(&report.secret_detail_1);
    if first.is_empty() || first != candidate.secret_detail_1 {
        return false;
    }
    !require_both
        || matches!(
            (&report.secret_detail_2, &candidate.secret_detail_2),
            (Some(a), Some(b)) if !a.is_empty() && a == b
        )
}
