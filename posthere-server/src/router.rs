//! Inbound router: one message in, one reply out.
//!
//! Every failure ends in a user-safe reply; nothing here returns an error to the transport.

use chrono::Utc;
use posthere_core::config::BotMode;
use posthere_core::models::{Session, SessionState};
use posthere_core::PostHereError;

use crate::context::AppContext;
use crate::replies;
use crate::subsystems::submission::Turn;
use crate::subsystems::{assistant, conversation, status};

pub async fn handle_inbound(ctx: &AppContext, identity: &str, text: &str) -> String {
    let identity = identity.trim();
    let text = text.trim();
    if identity.is_empty() || text.is_empty() {
        return replies::EMPTY_MESSAGE.to_string();
    }

    let guard = ctx.locks.acquire(identity).await;
    let budget = std::time::Duration::from_secs(ctx.config.service.request_timeout_seconds.max(1));

    // The budget covers everything up to the insert. A submission that starts always finishes.
    let result = match tokio::time::timeout(budget, dispatch(ctx, identity, text)).await {
        Ok(Ok(turn)) => turn.finish_holding(ctx, Some(guard)).await,
        Ok(Err(e)) => Err(e),
        Err(_) => {
            tracing::warn!(identity = %identity, budget_secs = budget.as_secs(), "Inbound message timed out");
            return replies::BUSY.to_string();
        }
    };

    match result {
        Ok(reply) => reply,
        Err(PostHereError::SessionConflict(_)) => {
            tracing::warn!(identity = %identity, "Session changed concurrently, asking to resend");
            replies::CONFLICT.to_string()
        }
        Err(e) => {
            tracing::error!(identity = %identity, error = %e, "Inbound message failed");
            replies::BUSY.to_string()
        }
    }
}

async fn dispatch(ctx: &AppContext, identity: &str, text: &str) -> Result<Turn, PostHereError> {
    let bot = &ctx.config.bot;

    if status::is_status_query(text, &bot.status_keywords) {
        tracing::info!(identity = %identity, "Status check");
        return status::status_reply(ctx, identity).await.map(Turn::Reply);
    }

    if is_reset(text, &bot.reset_keywords) {
        ctx.sessions.delete(identity).await?;
        tracing::info!(identity = %identity, "Session reset");
        return match bot.mode {
            BotMode::Guided => {
                let turn = conversation::handle_guided(ctx, Session::guided(identity), text).await?;
                Ok(turn.map_reply(|reply| format!("{}\n{}", replies::RESET_GUIDED, reply)))
            }
            BotMode::Assisted => {
                ctx.sessions.save(&Session::assisted(identity)).await?;
                Ok(Turn::Reply(replies::RESET_ASSISTED.to_string()))
            }
        };
    }

    let session = load_session(ctx, identity).await?;
    match bot.mode {
        BotMode::Guided => conversation::handle_guided(ctx, session, text).await,
        BotMode::Assisted => assistant::handle_assisted(ctx, session, text).await,
    }
}

/// Load the identity's session, replacing expired or other-mode state with a fresh one.
async fn load_session(ctx: &AppContext, identity: &str) -> Result<Session, PostHereError> {
    let mode = ctx.config.bot.mode;
    let fresh = || match mode {
        BotMode::Guided => Session::guided(identity),
        BotMode::Assisted => Session::assisted(identity),
    };

    let session = match ctx.sessions.load(identity).await? {
        Some(s) => s,
        None => return Ok(fresh()),
    };

    let stale = session.is_expired(ctx.config.bot.session_ttl_hours, Utc::now());
    let other_mode = !matches!(
        (&session.state, mode),
        (SessionState::Guided { .. }, BotMode::Guided) | (SessionState::Assisted { .. }, BotMode::Assisted)
    );
    if stale || other_mode {
        tracing::info!(identity = %identity, stale, other_mode, "Discarding previous session");
        ctx.sessions.delete(identity).await?;
        return Ok(fresh());
    }
    Ok(session)
}

fn is_reset(text: &str, keywords: &[String]) -> bool {
    let lowered = text.trim().to_lowercase();
    keywords.iter().any(|k| k.trim().to_lowercase() == lowered)
}
