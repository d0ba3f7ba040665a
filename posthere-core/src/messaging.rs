//! Outbound message delivery.
//!
//! `MessageSender` is the "deliver text T to identity P" capability. `TwilioSender` posts to
//! the Twilio Messages API (SMS and WhatsApp share it); `LogSender` is used when no provider is
//! configured and only records what would have been sent.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::{MessagingConfig, MessagingProvider};

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<(), SendError>;

    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing credentials: {0}")]
    MissingCredentials(&'static str),

    #[error("Outbound delivery is disabled")]
    Disabled,

    #[error("All {attempts} delivery attempts failed")]
    RetryExhausted { attempts: usize },
}

/// Build the sender selected by `[messaging] provider`.
pub fn create_sender(config: &MessagingConfig) -> Result<Box<dyn MessageSender>, SendError> {
    match config.provider {
        MessagingProvider::Log => Ok(Box::new(LogSender)),
        MessagingProvider::Twilio => {
            let account_sid = std::env::var("TWILIO_ACCOUNT_SID")
                .map_err(|_| SendError::MissingCredentials("TWILIO_ACCOUNT_SID"))?;
            let auth_token = std::env::var("TWILIO_AUTH_TOKEN")
                .map_err(|_| SendError::MissingCredentials("TWILIO_AUTH_TOKEN"))?;
            Ok(Box::new(TwilioSender::new(TwilioConfig {
                account_sid,
                auth_token,
                from_number: config.from_number.clone(),
                base_url: config.base_url.trim_end_matches('/').to_string(),
                timeout: Duration::from_secs(config.timeout_seconds),
                max_retries: 2,
                retry_delay_ms: 500,
            })?))
        }
    }
}

// ============================================================================
// TwilioSender
// ============================================================================

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorResponse {
    code: Option<u32>,
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TwilioSender {
    client: Client,
    config: TwilioConfig,
}

impl TwilioSender {
    pub fn new(config: TwilioConfig) -> Result<Self, SendError> {
        if config.account_sid.is_empty() {
            return Err(SendError::MissingCredentials("TWILIO_ACCOUNT_SID"));
        }
        if config.auth_token.is_empty() {
            return Err(SendError::MissingCredentials("TWILIO_AUTH_TOKEN"));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    async fn send_once(&self, to: &str, body: &str) -> Result<(), SendError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.base_url, self.config.account_sid
        );
        let form = [
            ("From", self.config.from_number.as_str()),
            ("To", to),
            ("Body", body),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TwilioErrorResponse>(&error_body)
                .ok()
                .map(|e| match (e.code, e.message) {
                    (Some(code), Some(msg)) => format!("{} (twilio code {})", msg, code),
                    (_, Some(msg)) => msg,
                    _ => error_body.clone(),
                })
                .unwrap_or(error_body);
            return Err(SendError::Api {
                code: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSender for TwilioSender {
    async fn send(&self, to: &str, body: &str) -> Result<(), SendError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(self.config.max_retries);

        Retry::spawn(retry_strategy, || self.send_once(to, body))
            .await
            .map_err(|e| {
                tracing::error!(
                    to = %to,
                    attempts = self.config.max_retries + 1,
                    error = %e,
                    "All delivery attempts failed"
                );
                SendError::RetryExhausted {
                    attempts: self.config.max_retries + 1,
                }
            })
    }

    fn name(&self) -> &str {
        "twilio"
    }
}

// ============================================================================
// LogSender
// ============================================================================

pub struct LogSender;

#[async_trait]
impl MessageSender for LogSender {
    async fn send(&self, to: &str, body: &str) -> Result<(), SendError> {
        tracing::info!(to = %to, chars = body.chars().count(), "Outbound delivery disabled, message not sent");
        Err(SendError::Disabled)
    }

    fn name(&self) -> &str {
        "log"
    }
}

// ============================================================================
// TESTS
// ============================================================================
