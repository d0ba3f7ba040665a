//! Report submission: the part of a turn that runs after the request budget.
//!
//! Conversation handlers do their budgeted work (NLU, item normalization) and hand back a
//! `Turn::Submit`. `Turn::finish` then runs insert, claim, notify and session teardown on a
//! spawned task, so once the report is written nothing can cut the rest short, including a
//! dropped webhook connection.

use std::sync::Arc;

use posthere_core::models::{NewReport, Session, SessionState};
use posthere_core::{PostHereError, SessionStore};

use crate::context::AppContext;
use crate::replies;
use crate::subsystems::locks::IdentityGuard;
use crate::subsystems::matcher::Matcher;

/// Result of the budgeted part of one inbound message.
#[derive(Debug)]
pub enum Turn {
    Reply(String),
    Submit(PendingSubmission),
}

/// A completed report that has not been written yet.
#[derive(Debug)]
pub struct PendingSubmission {
    pub session: Session,
    pub report: NewReport,
    /// Session state persisted when the insert fails, so the next message retries.
    pub retry_state: SessionState,
    /// Text placed before the acknowledgement (the assistant's own words in assisted mode).
    pub preamble: Option<String>,
}

impl Turn {
    /// Run any pending submission to completion and return the reply text.
    pub async fn finish(self, ctx: &AppContext) -> Result<String, PostHereError> {
        self.finish_holding(ctx, None).await
    }

    /// Like `finish`, but keeps the identity lock until the submission task is done.
    pub async fn finish_holding(
        self,
        ctx: &AppContext,
        guard: Option<IdentityGuard>,
    ) -> Result<String, PostHereError> {
        let pending = match self {
            Turn::Reply(reply) => return Ok(reply),
            Turn::Submit(pending) => pending,
        };

        let matcher = ctx.matcher.clone();
        let sessions = ctx.sessions.clone();
        let verification_point = ctx.config.bot.verification_point.clone();
        let task = tokio::spawn(async move {
            let reply = submit(&matcher, sessions, &verification_point, pending).await;
            drop(guard);
            reply
        });

        match task.await {
            Ok(reply) => reply,
            Err(e) => Err(PostHereError::Other(format!("submission task failed: {}", e))),
        }
    }

    pub fn map_reply(self, f: impl FnOnce(String) -> String) -> Turn {
        match self {
            Turn::Reply(reply) => Turn::Reply(f(reply)),
            submit => submit,
        }
    }
}

async fn submit(
    matcher: &Matcher,
    sessions: Arc<dyn SessionStore>,
    verification_point: &str,
    pending: PendingSubmission,
) -> Result<String, PostHereError> {
    let PendingSubmission {
        mut session,
        report,
        retry_state,
        preamble,
    } = pending;

    match matcher.record(report).await {
        Ok(outcome) => {
            if let Err(e) = sessions.delete(&session.identity).await {
                tracing::warn!(identity = %session.identity, error = %e, "Session teardown failed");
            }
            let summary = replies::submitted(&outcome, verification_point);
            Ok(match preamble {
                Some(text) => format!("{}\n\n{}", text, summary),
                None => summary,
            })
        }
        Err(e) => {
            tracing::error!(identity = %session.identity, error = %e, "Report save failed, holding session for retry");
            session.state = retry_state;
            sessions.save(&session).await?;
            Ok(replies::SAVE_FAILED.to_string())
        }
    }
}
