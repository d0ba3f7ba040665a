//! posthere-cli: admin CLI for the PostHere HTTP API
//!
//! Used at the verification point and during development: list reports, approve handovers,
//! resolve claims with the owner's code, and simulate inbound messages without a phone.
//!
//! # Subcommands
//! - `status`                                  — show server health
//! - `reports [--status <s>] [-n <limit>] [--json]` — list reports, newest first
//! - `latest <identity> [--json]`              — newest report filed by an identity
//! - `approve <report-id>`                     — PendingApproval → Approved
//! - `resolve <report-id> <claim-code>`        — resolve a claim and its counterpart
//! - `say <identity> <text>`                   — send a message through the conversation

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8780";
const DEFAULT_LIMIT: usize = 20;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "posthere-cli", version, about = "PostHere lost & found admin CLI")]
struct Cli {
    /// PostHere HTTP server URL (overrides POSTHERE_HTTP_URL env var)
    #[arg(long, env = "POSTHERE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show PostHere server status
    Status,

    /// List reports, newest first
    Reports {
        /// Filter by match status (open, pending_approval, approved, resolved)
        #[arg(long)]
        status: Option<String>,

        /// Maximum number of reports to return
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show the newest report filed by an identity
    Latest {
        /// Reporter identity, e.g. whatsapp:+243970000000
        identity: String,

        #[arg(long)]
        json: bool,
    },

    /// Approve a pending handover
    Approve {
        report_id: String,
    },

    /// Resolve a claim with the owner's claim code
    Resolve {
        report_id: String,
        claim_code: String,
    },

    /// Send a message as `identity` and print the reply
    Say {
        identity: String,
        /// Message text (joined with spaces)
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

// ============================================================================
// API Response Types
// ============================================================================

/// A report as returned by the admin API (secrets are never included)
#[derive(Debug, Deserialize)]
pub struct ReportSummary {
    pub id: String,
    pub kind: String,
    pub canonical_item_key: String,
    pub location: String,
    pub match_status: String,
    pub reporter_identity: String,
    pub matched_report_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportList {
    pub count: usize,
    pub reports: Vec<ReportSummary>,
}

/// One table row: short id, date, kind, status, item @ location.
pub fn format_report_line(r: &ReportSummary) -> String {
    let short_id: String = r.id.chars().take(8).collect();
    let date: String = r.created_at.chars().take(16).collect();
    let item: String = r.canonical_item_key.chars().take(30).collect();
    format!(
        "{}  {}  {:<5}  {:<16}  {} @ {}",
        short_id, date, r.kind, r.match_status, item, r.location
    )
}

fn format_report_detail(r: &ReportSummary) -> String {
    let mut out = format!(
        "Report:   {}\nKind:     {}\nItem:     {}\nLocation: {}\nStatus:   {}\nReporter: {}\nCreated:  {}",
        r.id, r.kind, r.canonical_item_key, r.location, r.match_status, r.reporter_identity, r.created_at
    );
    if let Some(m) = &r.matched_report_id {
        out.push_str(&format!("\nMatched:  {}", m));
    }
    out
}

/// Pull a readable message out of an error body.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?)
}

/// Send the request and return the parsed JSON body, or exit with the server's error.
fn send(request: reqwest::blocking::RequestBuilder, url: &str) -> anyhow::Result<serde_json::Value> {
    let resp = match request.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("posthere-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    if !status.is_success() {
        eprintln!("posthere-cli: server returned {}: {}", status, error_message(&body));
        std::process::exit(1);
    }
    Ok(serde_json::from_str(&body)?)
}

fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let body = send(client()?.get(&url), &url)?;
    println!("PostHere server: {}", body["status"].as_str().unwrap_or("unknown"));
    println!("Version:         {}", body["version"].as_str().unwrap_or("?"));
    println!("Storage:         {}", body["storage"].as_str().unwrap_or("?"));
    println!("Mode:            {}", body["mode"].as_str().unwrap_or("?"));
    Ok(())
}

fn do_reports(server: &str, status: Option<&str>, limit: usize, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/reports", server);
    let mut query: Vec<(&str, String)> = vec![("limit", limit.to_string())];
    if let Some(s) = status {
        query.push(("status", s.to_string()));
    }
    let body = send(client()?.get(&url).query(&query), &url)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let list: ReportList = serde_json::from_value(body)?;
    if list.reports.is_empty() {
        eprintln!("No reports found");
        return Ok(());
    }
    for r in &list.reports {
        println!("{}", format_report_line(r));
    }
    eprintln!("{} report(s)", list.count);
    Ok(())
}

fn do_latest(server: &str, identity: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/reports/latest", server);
    let body = send(client()?.get(&url).query(&[("identity", identity)]), &url)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&body["report"])?);
        return Ok(());
    }
    let report: ReportSummary = serde_json::from_value(body["report"].clone())?;
    println!("{}", format_report_detail(&report));
    Ok(())
}

fn do_approve(server: &str, report_id: &str) -> anyhow::Result<()> {
    let url = format!("{}/reports/{}/approve", server, report_id);
    send(client()?.post(&url).json(&serde_json::json!({})), &url)?;
    println!("Report {} approved for handover", report_id);
    Ok(())
}

fn do_resolve(server: &str, report_id: &str, claim_code: &str) -> anyhow::Result<()> {
    let url = format!("{}/reports/{}/resolve", server, report_id);
    let body = send(
        client()?
            .post(&url)
            .json(&serde_json::json!({ "claim_code": claim_code })),
        &url,
    )?;
    let resolved = body["resolved"].as_array().map(|a| a.len()).unwrap_or(0);
    println!("Claim resolved ({} report(s) closed)", resolved);
    Ok(())
}

fn do_say(server: &str, identity: &str, text: &str) -> anyhow::Result<()> {
    let url = format!("{}/messages", server);
    let body = send(
        client()?
            .post(&url)
            .json(&serde_json::json!({ "identity": identity, "text": text })),
        &url,
    )?;
    println!("{}", body["reply"].as_str().unwrap_or_default());
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Status => do_status(&server),
        Commands::Reports { status, limit, json } => do_reports(&server, status.as_deref(), limit, json),
        Commands::Latest { identity, json } => do_latest(&server, &identity, json),
        Commands::Approve { report_id } => do_approve(&server, &report_id),
        Commands::Resolve { report_id, claim_code } => do_resolve(&server, &report_id, &claim_code),
        Commands::Say { identity, text } => do_say(&server, &identity, &text.join(" ")),
    };

    if let Err(e) = result {
        eprintln!("posthere-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> ReportSummary {
        serde_json::from_value(serde_json::json!({
            "id": "7b5c24ab-1234-5678-9abc-def012345678",
            "kind": "found",
            "canonical_item_key": "samsung phone",
            "item_tokens": ["samsung", "phone"],
            "raw_description": "black",
            "location": "Himbi",
            "reporter_identity": "whatsapp:+243970000001",
            "drop_off_point": null,
            "match_status": "pending_approval",
            "matched_report_id": "deadbeef-cafe-babe-face-feeddeadbeef",
            "created_at": "2026-10-18T09:30:12.123Z"
        }))
        .expect("summary parses")
    }

    // ========================================================================
    // TEST 1: report line uses the short id and minute-precision date
    // ========================================================================
    #[test]
    fn test_format_report_line() {
        let line = format_report_line(&summary());
        assert!(line.starts_with("7b5c24ab  2026-10-18T09:30  found"));
        assert!(line.contains("pending_approval"));
        assert!(line.ends_with("samsung phone @ Himbi"));
    }

    // ========================================================================
    // TEST 2: detail view includes the counterpart link
    // ========================================================================
    #[test]
    fn test_format_report_detail() {
        let detail = format_report_detail(&summary());
        assert!(detail.contains("Reporter: whatsapp:+243970000001"));
        assert!(detail.contains("Matched:  deadbeef-cafe-babe-face-feeddeadbeef"));
    }

    // ========================================================================
    // TEST 3: list response parses with extra fields
    // ========================================================================
    #[test]
    fn test_report_list_parses() {
        let body = serde_json::json!({
            "count": 0,
            "reports": [],
        });
        let list: ReportList = serde_json::from_value(body).unwrap();
        assert_eq!(list.count, 0);
    }

    // ========================================================================
    // TEST 4: error bodies are unwrapped
    // ========================================================================
    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"error": "claim code does not match", "status": "error"}"#),
            "claim code does not match"
        );
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_cli_parses_say() {
        let cli = Cli::try_parse_from(["posthere-cli", "say", "cli:demo", "I", "lost", "my", "phone"]).unwrap();
        match cli.command {
            Commands::Say { identity, text } => {
                assert_eq!(identity, "cli:demo");
                assert_eq!(text.join(" "), "I lost my phone");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
