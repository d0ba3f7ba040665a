//! PostHere HTTP API
//!
//! Axum server for the messaging webhook and the admin endpoints.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function. The inner functions are directly testable without axum dispatch
//! machinery.
//!
//! Endpoints:
//! - POST /webhook                — Twilio-style form (`From`, `Body`) → TwiML reply
//! - POST /messages               — JSON `{identity, text}` → `{reply}`
//! - GET  /health                 — health check with storage status
//! - GET  /version                — server version info
//! - GET  /reports                — admin listing (`?status=&limit=`)
//! - GET  /reports/latest         — newest report for `?identity=`
//! - POST /reports/:id/approve    — PendingApproval → Approved
//! - POST /reports/:id/resolve    — resolve a claim with `{claim_code}`

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Form, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use posthere_core::models::MatchStatus;
use posthere_core::PostHereError;
use quick_xml::escape::escape;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::context::AppContext;
use crate::router::handle_inbound;
use crate::subsystems::claims::{self, ClaimError};

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppContext>) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/messages", post(messages_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/reports", get(list_reports_handler))
        .route("/reports/latest", get(latest_report_handler))
        .route("/reports/:id/approve", post(approve_handler))
        .route("/reports/:id/resolve", post(resolve_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<AppContext>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("PostHere HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Twilio posts capitalized form fields.
#[derive(Debug, Deserialize, Default)]
pub struct WebhookForm {
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LatestQuery {
    pub identity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub claim_code: Option<String>,
}

fn error_body(msg: impl Into<String>) -> serde_json::Value {
    serde_json::json!({
        "error": msg.into(),
        "status": "error",
    })
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner webhook: always a TwiML document; the reply text is XML-escaped.
pub async fn webhook_inner(ctx: &AppContext, form: WebhookForm) -> String {
    let reply = handle_inbound(ctx, &form.from, &form.body).await;
    twiml_message(&reply)
}

/// Inner messages: JSON transport for the same conversation.
pub async fn messages_inner(ctx: &AppContext, msg: InboundMessage) -> (StatusCode, serde_json::Value) {
    if msg.identity.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, error_body("identity field is required"));
    }
    let reply = handle_inbound(ctx, &msg.identity, &msg.text).await;
    (StatusCode::OK, serde_json::json!({ "reply": reply }))
}

/// Inner health check: pings the database when there is one.
pub async fn health_inner(ctx: &AppContext) -> (StatusCode, serde_json::Value) {
    let storage = match &ctx.pool {
        Some(pool) => match posthere_core::db::health_check(pool).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "Health check failed");
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    serde_json::json!({
                        "status": "unhealthy",
                        "error": "database unavailable",
                    }),
                );
            }
        },
        None => ctx.storage_name().to_string(),
    };

    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "storage": storage,
            "mode": format!("{:?}", ctx.config.bot.mode).to_lowercase(),
        }),
    )
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "posthere",
    })
}

/// Inner list: newest reports first, optionally filtered by status. Secrets are never serialized.
pub async fn list_reports_inner(ctx: &AppContext, query: ListQuery) -> (StatusCode, serde_json::Value) {
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => match raw.parse::<MatchStatus>() {
            Ok(s) => Some(s),
            Err(e) => return (StatusCode::BAD_REQUEST, error_body(e.to_string())),
        },
        None => None,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

    match ctx.reports.list(status, limit).await {
        Ok(reports) => (
            StatusCode::OK,
            serde_json::json!({
                "count": reports.len(),
                "reports": reports,
            }),
        ),
        Err(e) => store_error(e),
    }
}

/// Inner latest: the newest report filed by `identity`.
pub async fn latest_report_inner(ctx: &AppContext, query: LatestQuery) -> (StatusCode, serde_json::Value) {
    let identity = match query.identity.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(i) => i.to_string(),
        None => return (StatusCode::BAD_REQUEST, error_body("identity parameter is required")),
    };
    match ctx.reports.latest_for_identity(&identity).await {
        Ok(Some(report)) => (StatusCode::OK, serde_json::json!({ "report": report })),
        Ok(None) => (StatusCode::NOT_FOUND, error_body("no report for identity")),
        Err(e) => store_error(e),
    }
}

pub async fn approve_inner(ctx: &AppContext, id: Uuid) -> (StatusCode, serde_json::Value) {
    match claims::approve(ctx.reports.as_ref(), id).await {
        Ok(()) => (
            StatusCode::OK,
            serde_json::json!({ "id": id, "match_status": MatchStatus::Approved }),
        ),
        Err(e) => store_error(e),
    }
}

pub async fn resolve_inner(ctx: &AppContext, id: Uuid, req: ResolveRequest) -> (StatusCode, serde_json::Value) {
    let code = match req.claim_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => c.to_string(),
        None => return (StatusCode::BAD_REQUEST, error_body("claim_code field is required")),
    };
    match claims::resolve_claim(ctx.reports.as_ref(), id, &code).await {
        Ok(resolved) => (
            StatusCode::OK,
            serde_json::json!({ "resolved": resolved, "match_status": MatchStatus::Resolved }),
        ),
        Err(ClaimError::CodeMismatch) => (StatusCode::FORBIDDEN, error_body("claim code does not match")),
        Err(ClaimError::NoClaim) => (StatusCode::CONFLICT, error_body("report has no pending claim")),
        Err(ClaimError::Store(e)) => store_error(e),
    }
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn webhook_handler(
    State(state): State<Arc<AppContext>>,
    Form(form): Form<WebhookForm>,
) -> impl IntoResponse {
    let body = webhook_inner(&state, form).await;
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/xml")], body)
}

pub async fn messages_handler(
    State(state): State<Arc<AppContext>>,
    Json(msg): Json<InboundMessage>,
) -> impl IntoResponse {
    let (status, body) = messages_inner(&state, msg).await;
    (status, Json(body))
}

pub async fn health_handler(State(state): State<Arc<AppContext>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn list_reports_handler(
    State(state): State<Arc<AppContext>>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let (status, body) = list_reports_inner(&state, query).await;
    (status, Json(body))
}

pub async fn latest_report_handler(
    State(state): State<Arc<AppContext>>,
    Query(query): Query<LatestQuery>,
) -> impl IntoResponse {
    let (status, body) = latest_report_inner(&state, query).await;
    (status, Json(body))
}

pub async fn approve_handler(
    State(state): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = approve_inner(&state, id).await;
    (status, Json(body))
}

pub async fn resolve_handler(
    State(state): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolveRequest>,
) -> impl IntoResponse {
    let (status, body) = resolve_inner(&state, id, req).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// Map a store error to an HTTP status. Internals are logged, not returned.
pub fn store_error(e: PostHereError) -> (StatusCode, serde_json::Value) {
    match e {
        PostHereError::NotFound(id) => (StatusCode::NOT_FOUND, error_body(format!("report {} not found", id))),
        PostHereError::InvalidTransition { from, to } => (
            StatusCode::CONFLICT,
            error_body(format!("cannot move report from {} to {}", from, to)),
        ),
        other => {
            tracing::error!(error = %other, "Admin request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("internal error"))
        }
    }
}

pub fn twiml_message(text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape(text)
    )
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
