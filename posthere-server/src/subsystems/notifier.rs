//! Notifier: one-way match alerts to the counterpart of a verified match.
//!
//! Delivery is fire-and-forget: a failure is logged and reported as `false`, never as an error,
//! so it cannot undo a saved report or a verified match. Alert bodies carry only the item name,
//! where to go, and (for owners) the claim code. Never the other party's identity or secrets.

use std::sync::Arc;

use futures::future::join_all;
use posthere_core::models::{Report, ReportKind};
use posthere_core::MessageSender;

/// A single alert to deliver.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub to: String,
    pub body: String,
}

#[derive(Clone)]
pub struct Notifier {
    sender: Arc<dyn MessageSender>,
}

impl Notifier {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self { sender }
    }

    /// Deliver one message. Returns whether the transport accepted it.
    pub async fn notify(&self, identity: &str, message: &str) -> bool {
        match self.sender.send(identity, message).await {
            Ok(()) => {
                tracing::info!(to = %identity, sender = self.sender.name(), "Match alert delivered");
                true
            }
            Err(e) => {
                tracing::warn!(
                    to = %identity,
                    sender = self.sender.name(),
                    error = %e,
                    "Match alert not delivered; match stays recorded"
                );
                false
            }
        }
    }

    /// Deliver every alert exactly once, concurrently. Returns the number delivered.
    pub async fn notify_all(&self, alerts: &[Alert]) -> usize {
        let results = join_all(alerts.iter().map(|a| self.notify(&a.to, &a.body))).await;
        results.into_iter().filter(|delivered| *delivered).count()
    }
}

/// Alert for `recipient`, whose report was just matched by a new report of the opposite kind.
///
/// `handover_point` is the found item's drop-off point when known, otherwise the configured
/// verification point. The claim code is only included when the recipient is the owner.
pub fn compose_alert(recipient: &Report, handover_point: &str, claim_code: &str) -> Alert {
    let body = match recipient.kind {
        ReportKind::Lost => format!(
            "PostHere: good news! An item matching your lost \"{}\" has been reported found and \
             its hidden details match yours. Please go to {} to verify and collect it. \
             Your claim code is {}. Keep it private and present it at the handover.",
            recipient.canonical_item_key, handover_point, claim_code
        ),
        ReportKind::Found => format!(
            "PostHere: thank you for your honesty! The owner of the \"{}\" you reported has been \
             identified through details only they would know. Please bring the item to {} \
             if you have not already. The owner will present a claim code there.",
            recipient.canonical_item_key, handover_point
        ),
    };
    Alert {
        to: recipient.reporter_identity.clone(),
        body,
    }
}
