//! Assisted intake: the NLU capability drives the conversation from the full transcript.

use posthere_core::models::{ChatTurn, Session, SessionState};
use posthere_core::{extract_payload, PostHereError};

use crate::context::AppContext;
use crate::replies;
use crate::subsystems::submission::{PendingSubmission, Turn};

/// Keep at most `max_turns` of the most recent turns.
pub fn cap_transcript(transcript: &mut Vec<ChatTurn>, max_turns: usize) {
    if max_turns > 0 && transcript.len() > max_turns {
        let excess = transcript.len() - max_turns;
        transcript.drain(..excess);
    }
}

pub async fn handle_assisted(
    ctx: &AppContext,
    mut session: Session,
    text: &str,
) -> Result<Turn, PostHereError> {
    let nlu = match &ctx.nlu {
        Some(n) => n.clone(),
        None => {
            tracing::warn!(identity = %session.identity, "Assisted turn without an NLU backend");
            return Ok(Turn::Reply(replies::BUSY.to_string()));
        }
    };

    let mut transcript = match &session.state {
        SessionState::Assisted { transcript } => transcript.clone(),
        SessionState::Guided { .. } => Vec::new(),
    };
    transcript.push(ChatTurn::user(text));
    cap_transcript(&mut transcript, ctx.config.nlu.max_transcript_turns);

    let raw = match nlu.complete(&ctx.system_prompt, &transcript).await {
        Ok(r) => r,
        Err(e) => {
            // The user turn is not persisted; resending the same message is a clean retry.
            tracing::warn!(identity = %session.identity, backend = nlu.name(), error = %e, "NLU call failed");
            return Ok(Turn::Reply(replies::BUSY.to_string()));
        }
    };

    let reply = extract_payload(&raw);
    let visible = if reply.visible_text.is_empty() {
        replies::ASSISTED_FALLBACK.to_string()
    } else {
        reply.visible_text.clone()
    };

    let submission = reply
        .payload
        .as_ref()
        .and_then(|p| p.to_submission())
        .filter(|s| !ctx.config.matching.require_both_secrets || s.secret_detail_2.is_some());

    let submission = match submission {
        Some(s) => s,
        None => {
            if reply.payload.is_some() {
                tracing::debug!(identity = %session.identity, "Payload incomplete, continuing conversation");
            }
            transcript.push(ChatTurn::assistant(visible.clone()));
            cap_transcript(&mut transcript, ctx.config.nlu.max_transcript_turns);
            session.state = SessionState::Assisted { transcript };
            ctx.sessions.save(&session).await?;
            return Ok(Turn::Reply(visible));
        }
    };

    // Keep the raw reply on failure so the model sees its own payload and re-emits it next turn.
    transcript.push(ChatTurn::assistant(raw));
    cap_transcript(&mut transcript, ctx.config.nlu.max_transcript_turns);
    let report = ctx.matcher.prepare(&submission, &session.identity).await;
    Ok(Turn::Submit(PendingSubmission {
        session,
        report,
        retry_state: SessionState::Assisted { transcript },
        preamble: Some(visible),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use posthere_core::config::{BotMode, PostHereConfig};
    use posthere_core::models::{MatchStatus, ReportKind};
    use posthere_core::translate::PassthroughNormalizer;
    use posthere_core::{MemoryStore, NluBackend, ReportStore, SessionStore};

    use posthere_test_utils::{FlakyReportStore, RecordingSender, ScriptedNlu};

    const COMPLETE_REPLY: &str = "Thank you, your report is registered.\n```json\n{\"kind\": \"lost\", \"item\": \"phone\", \"location\": \"Himbi\", \"description\": \"black Samsung\", \"secret_detail_1\": \"cracked screen\"}\n```";

    async fn turn(ctx: &AppContext, session: Session, text: &str) -> String {
        handle_assisted(ctx, session, text)
            .await
            .unwrap()
            .finish(ctx)
            .await
            .unwrap()
    }

    fn context(store: Arc<MemoryStore>, reports: Arc<dyn ReportStore>, nlu: Arc<ScriptedNlu>) -> AppContext {
        let mut config = PostHereConfig::default();
        config.bot.mode = BotMode::Assisted;
        config.nlu.max_transcript_turns = 6;
        let nlu: Arc<dyn NluBackend> = nlu;
        AppContext::new(
            config,
            reports,
            store,
            Arc::new(PassthroughNormalizer),
            Some(nlu),
            Arc::new(RecordingSender::new()),
        )
    }

    #[test]
    fn test_cap_transcript_keeps_most_recent() {
        let mut transcript: Vec<ChatTurn> = (0..10).map(|i| ChatTurn::user(i.to_string())).collect();
        cap_transcript(&mut transcript, 4);
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[0].content, "6");
        cap_transcript(&mut transcript, 0);
        assert_eq!(transcript.len(), 4);
    }

    #[tokio::test]
    async fn test_incomplete_reply_is_appended_to_transcript() {
        let store = Arc::new(MemoryStore::new());
        let nlu = Arc::new(ScriptedNlu::new(vec![Ok("Where did you lose it?".to_string())]));
        let ctx = context(store.clone(), store.clone(), nlu);

        let reply = turn(&ctx, Session::assisted("u1"), "I lost my phone").await;
        assert_eq!(reply, "Where did you lose it?");

        let session = store.load("u1").await.unwrap().unwrap();
        match session.state {
            SessionState::Assisted { transcript } => {
                assert_eq!(transcript.len(), 2);
                assert_eq!(transcript[1].content, "Where did you lose it?");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(store.report_count().await, 0);
    }

    #[tokio::test]
    async fn test_complete_payload_submits_and_tears_down() {
        let store = Arc::new(MemoryStore::new());
        let nlu = Arc::new(ScriptedNlu::new(vec![Ok(COMPLETE_REPLY.to_string())]));
        let ctx = context(store.clone(), store.clone(), nlu);

        let reply = turn(&ctx, Session::assisted("u1"), "cracked screen").await;
        assert!(reply.starts_with("Thank you, your report is registered."));
        assert!(!reply.contains("```"));
        assert!(!reply.contains("secret_detail_1"));
        assert!(store.load("u1").await.unwrap().is_none());

        let saved = store.latest_for_identity("u1").await.unwrap().unwrap();
        assert_eq!(saved.kind, ReportKind::Lost);
        assert_eq!(saved.match_status, MatchStatus::Open);
    }

    #[tokio::test]
    async fn test_nlu_failure_returns_busy_and_keeps_state() {
        let store = Arc::new(MemoryStore::new());
        let nlu = Arc::new(ScriptedNlu::new(vec![]));
        let ctx = context(store.clone(), store.clone(), nlu.clone());

        let reply = turn(&ctx, Session::assisted("u1"), "hello").await;
        assert_eq!(reply, replies::BUSY);
        assert_eq!(nlu.calls(), 1);
        assert!(store.load("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_failure_keeps_transcript_for_retry() {
        let store = Arc::new(MemoryStore::new());
        let flaky = Arc::new(FlakyReportStore::new(store.clone()));
        let nlu = Arc::new(ScriptedNlu::new(vec![
            Ok(COMPLETE_REPLY.to_string()),
            Ok(COMPLETE_REPLY.to_string()),
        ]));
        let ctx = context(store.clone(), flaky.clone(), nlu);

        let reply = turn(&ctx, Session::assisted("u1"), "cracked screen").await;
        assert_eq!(reply, replies::SAVE_FAILED);
        let session = store.load("u1").await.unwrap().unwrap();

        flaky.set_failing(false);
        let reply = turn(&ctx, session, "please retry").await;
        assert!(reply.contains("still searching"));
        assert_eq!(store.report_count().await, 1);
    }
}
