//! Guided intake: fixed prompts, one field per message.
//!
//! `advance` is the pure transition function. `handle_guided` persists its result and hands a
//! completed report on as a pending submission.

use posthere_core::config::BotConfig;
use posthere_core::models::{CollectedFields, ReportKind, Session, SessionState, Step};
use posthere_core::PostHereError;

use crate::context::AppContext;
use crate::replies;
use crate::subsystems::submission::{PendingSubmission, Turn};

/// What one guided message produced.
#[derive(Debug, Clone, PartialEq)]
pub enum GuidedOutcome {
    /// Stay in the conversation at `step` and send `reply`.
    Prompt {
        step: Step,
        fields: CollectedFields,
        reply: String,
    },
    /// Every required field is collected.
    Complete { fields: CollectedFields },
}

/// Apply one user message to the guided state machine.
pub fn advance(
    step: Step,
    mut fields: CollectedFields,
    text: &str,
    bot: &BotConfig,
    require_both_secrets: bool,
) -> GuidedOutcome {
    let text = text.trim();
    let kind = fields.kind.unwrap_or(ReportKind::Lost);
    let ask_second = bot.ask_second_secret || require_both_secrets;

    let prompt = |step: Step, fields: CollectedFields, reply: String| GuidedOutcome::Prompt {
        step,
        fields,
        reply,
    };

    match step {
        Step::Start => prompt(Step::CollectingKind, fields, replies::GREETING.to_string()),
        Step::CollectingKind => match ReportKind::from_user_input(text) {
            Some(kind) => {
                fields.kind = Some(kind);
                prompt(Step::CollectingItem, fields, replies::item_prompt(kind).to_string())
            }
            None => prompt(Step::CollectingKind, fields, replies::KIND_REPROMPT.to_string()),
        },
        Step::CollectingItem => {
            if text.is_empty() {
                return prompt(step, fields, replies::field_reprompt(replies::item_prompt(kind)));
            }
            fields.item = Some(text.to_string());
            prompt(Step::CollectingLocation, fields, replies::location_prompt(kind).to_string())
        }
        Step::CollectingLocation => {
            if text.is_empty() {
                return prompt(step, fields, replies::field_reprompt(replies::location_prompt(kind)));
            }
            fields.location = Some(text.to_string());
            prompt(
                Step::CollectingDescription,
                fields,
                replies::description_prompt(kind, &bot.verification_point),
            )
        }
        Step::CollectingDescription => {
            if text.is_empty() {
                return prompt(
                    step,
                    fields,
                    replies::field_reprompt(&replies::description_prompt(kind, &bot.verification_point)),
                );
            }
            fields.description = Some(text.to_string());
            if kind == ReportKind::Found {
                fields.drop_off_point = Some(bot.verification_point.clone());
            }
            prompt(Step::CollectingSecret1, fields, replies::secret1_prompt(kind).to_string())
        }
        Step::CollectingSecret1 => {
            if text.is_empty() {
                return prompt(step, fields, replies::field_reprompt(replies::secret1_prompt(kind)));
            }
            fields.secret_detail_1 = Some(text.to_string());
            if ask_second {
                prompt(
                    Step::CollectingSecret2,
                    fields,
                    replies::secret2_prompt(require_both_secrets).to_string(),
                )
            } else {
                GuidedOutcome::Complete { fields }
            }
        }
        Step::CollectingSecret2 => {
            let skipped = text.is_empty() || is_skip(text);
            if skipped && require_both_secrets {
                return prompt(step, fields, replies::secret2_prompt(true).to_string());
            }
            fields.secret_detail_2 = (!skipped).then(|| text.to_string());
            GuidedOutcome::Complete { fields }
        }
        // A previous submission failed to save; any message retries it.
        Step::Complete => GuidedOutcome::Complete { fields },
    }
}

fn is_skip(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    replies::SECRET2_SKIP_WORDS.iter().any(|w| lowered == *w)
}

/// Handle one guided message for a loaded (or fresh) session.
pub async fn handle_guided(
    ctx: &AppContext,
    mut session: Session,
    text: &str,
) -> Result<Turn, PostHereError> {
    let (step, fields) = match &session.state {
        SessionState::Guided { step, fields } => (*step, fields.clone()),
        SessionState::Assisted { .. } => (Step::Start, CollectedFields::default()),
    };

    match advance(
        step,
        fields,
        text,
        &ctx.config.bot,
        ctx.config.matching.require_both_secrets,
    ) {
        GuidedOutcome::Prompt { step, fields, reply } => {
            tracing::debug!(identity = %session.identity, ?step, "Guided step");
            session.state = SessionState::Guided { step, fields };
            ctx.sessions.save(&session).await?;
            Ok(Turn::Reply(reply))
        }
        GuidedOutcome::Complete { fields } => prepare_submission(ctx, session, fields).await,
    }
}

async fn prepare_submission(
    ctx: &AppContext,
    session: Session,
    fields: CollectedFields,
) -> Result<Turn, PostHereError> {
    let submission = match fields.to_submission() {
        Some(s) => s,
        None => {
            // Unreachable through `advance`; a hand-edited blob could still get here.
            tracing::warn!(identity = %session.identity, "Incomplete fields at Complete, restarting");
            ctx.sessions.delete(&session.identity).await?;
            return Ok(Turn::Reply(replies::GREETING.to_string()));
        }
    };

    let report = ctx.matcher.prepare(&submission, &session.identity).await;
    Ok(Turn::Submit(PendingSubmission {
        session,
        report,
        retry_state: SessionState::Guided {
            step: Step::Complete,
            fields,
        },
        preamble: None,
    }))
}
