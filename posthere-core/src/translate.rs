//! Item-name normalization: translate free text into a canonical English key
//!
//! Provides a `Normalizer` trait with implementations for:
//! - **LibreTranslate** — any LibreTranslate-compatible `/translate` endpoint
//! - **Passthrough** — no translation; the key is the lowercased input
//!
//! `normalize_item_key` wraps either one and never fails: on error it falls back to the
//! lowercased, trimmed raw text so a report is never blocked on translation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TranslateConfig;
use crate::models::fallback_item_key;

#[async_trait]
pub trait Normalizer: Send + Sync {
    /// Translate `text` (any language) into English.
    async fn translate(&self, text: &str) -> Result<String, TranslateError>;

    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },
}

/// Canonical item key for `raw`. Fails open.
pub async fn normalize_item_key(normalizer: &dyn Normalizer, raw: &str) -> String {
    match normalizer.translate(raw).await {
        Ok(translated) if !translated.trim().is_empty() => fallback_item_key(&translated),
        Ok(_) => fallback_item_key(raw),
        Err(e) => {
            tracing::warn!(
                error = %e,
                normalizer = normalizer.name(),
                "Item normalization failed, falling back to raw text"
            );
            fallback_item_key(raw)
        }
    }
}

/// Build the normalizer selected by `[translate] base_url`.
pub fn create_normalizer(config: &TranslateConfig) -> Result<Box<dyn Normalizer>, TranslateError> {
    if config.base_url.trim().is_empty() {
        return Ok(Box::new(PassthroughNormalizer));
    }
    let api_key = std::env::var("LIBRETRANSLATE_API_KEY").ok();
    Ok(Box::new(LibreTranslateClient::new(
        config.base_url.clone(),
        api_key,
        Duration::from_secs(config.timeout_seconds),
    )?))
}

// ============================================================================
// LibreTranslate API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct TranslateErrorResponse {
    error: Option<String>,
}

// ============================================================================
// LibreTranslateClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct LibreTranslateClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl LibreTranslateClient {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TranslateError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl Normalizer for LibreTranslateClient {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let url = format!("{}/translate", self.base_url);
        let request = TranslateRequest {
            q: text,
            source: "auto",
            target: "en",
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TranslateErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
                .unwrap_or(body);
            return Err(TranslateError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let parsed: TranslateResponse = response.json().await?;
        Ok(parsed.translated_text)
    }

    fn name(&self) -> &str {
        "libretranslate"
    }
}

// ============================================================================
// PassthroughNormalizer
// ============================================================================

/// Used when no translation endpoint is configured.
pub struct PassthroughNormalizer;

#[async_trait]
impl Normalizer for PassthroughNormalizer {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

// ============================================================================
// TESTS
// ============================================================================
