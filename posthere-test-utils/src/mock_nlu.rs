use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use posthere_core::models::ChatTurn;
use posthere_core::{NluBackend, NluError};
use tokio::sync::Mutex;

/// Replies from a fixed script; an exhausted script behaves like an unreachable backend.
pub struct ScriptedNlu {
    replies: Mutex<VecDeque<Result<String, NluError>>>,
    calls: AtomicUsize,
}

impl ScriptedNlu {
    pub fn new(replies: Vec<Result<String, NluError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Script of successful completions only.
    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NluBackend for ScriptedNlu {
    async fn complete(&self, _system_prompt: &str, _transcript: &[ChatTurn]) -> Result<String, NluError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or(Err(NluError::MissingCompletion))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
