// crates/decision-link-cli/tests/token_command.rs
// ============================================================================
// Module: CLI Token Command Tests
// Description: Integration tests for token and webhook operator commands.
// Purpose: Ensure issue, supersede, inspect, revoke, and decode agree with
//          the durable store.
// Dependencies: decision-link-cli binary, decision-link-core
// ============================================================================
//! ## Overview
//! Drives the binary against a SQLite store in a temporary directory with
//! secrets supplied through the environment.
//!
//! Security posture: secrets and bearer strings must not reach the audit log.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use decision_link_core::WebhookSecret;
use serde_json::Value;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const SIGNING_KEY: &str = "cli-signing-key-material-0123456789abcdef";
const WEBHOOK_SECRET: &str = "cli-webhook-secret-0123456789";
const ADMIN_TOKENS: &str = "cli-admin-token-0123456789";

struct Workspace {
    dir: TempDir,
    config_path: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().replace('\\', "/");
        let config = format!(
            r#"
[server]
public_base_url = "https://links.example.edu"

[server.audit]
path = "{root}/audit.jsonl"

[store]
type = "sqlite"
path = "{root}/tokens.db"

[collaborators]
dir = "{root}/data"
"#
        );
        let config_path = dir.path().join("decision-link.toml");
        fs::write(&config_path, config).unwrap();
        Self {
            dir,
            config_path,
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        self.run_with_key(args, SIGNING_KEY)
    }

    fn run_with_key(&self, args: &[&str], signing_key: &str) -> Output {
        let config = self.config_path.to_string_lossy().into_owned();
        let mut full: Vec<&str> = args.to_vec();
        full.push("--config");
        full.push(&config);
        Command::new(env!("CARGO_BIN_EXE_decision-link"))
            .args(&full)
            .env("DECISION_LINK_SIGNING_KEY", signing_key)
            .env("DECISION_LINK_WEBHOOK_SECRET", WEBHOOK_SECRET)
            .env("DECISION_LINK_ADMIN_TOKENS", ADMIN_TOKENS)
            .output()
            .expect("run decision-link")
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "command failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    fn audit_log(&self) -> String {
        fs::read_to_string(self.dir.path().join("audit.jsonl")).unwrap_or_default()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Verifies the issue, supersede, inspect, decode, and revoke lifecycle.
#[test]
fn token_lifecycle_round_trips_through_store() {
    let workspace = Workspace::new();
    let issue = ["token", "issue", "--subject", "s-1001", "--action", "enrollment-decision"];

    let first = workspace.json(&issue);
    assert!(first["superseded"].is_null());
    let link = first["link"].as_str().unwrap();
    assert!(link.starts_with("https://links.example.edu/secure-decision/"));

    let second = workspace.json(&issue);
    assert_eq!(second["superseded"], first["token_id"]);

    let claims = workspace.json(&["token", "decode", "--bearer", second["link"].as_str().unwrap()]);
    assert_eq!(claims["token_id"], second["token_id"]);
    assert_eq!(claims["subject_id"], "s-1001");

    let old = workspace.json(&["token", "inspect", "--token-id", first["token_id"].as_str().unwrap()]);
    assert_eq!(old["state"], "revoked");
    assert_eq!(old["effective_state"], "revoked");

    let active = workspace.json(&[
        "token",
        "inspect",
        "--subject",
        "s-1001",
        "--action",
        "enrollment-decision",
    ]);
    assert_eq!(active["token_id"], second["token_id"]);
    assert_eq!(active["effective_state"], "active");

    let revoke = ["token", "revoke", "--subject", "s-1001", "--action", "enrollment-decision"];
    assert_eq!(workspace.json(&revoke)["revoked"], second["token_id"]);
    assert!(workspace.json(&revoke)["revoked"].is_null());

    let audit = workspace.audit_log();
    assert_eq!(audit.lines().filter(|line| line.contains("\"link_issue\"")).count(), 2);
    let bearer = link.rsplit('/').next().unwrap();
    assert!(!audit.contains(bearer));
    assert!(!audit.contains(SIGNING_KEY));
}

/// Verifies links signed with another key are rejected.
#[test]
fn decode_rejects_foreign_key() {
    let workspace = Workspace::new();
    let issued =
        workspace.json(&["token", "issue", "--subject", "s-2", "--action", "form-upload"]);
    let output = workspace.run_with_key(
        &["token", "decode", "--bearer", issued["link"].as_str().unwrap()],
        "another-signing-key-material-0123456789",
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("bearer rejected"));
}

/// Verifies issue refuses a TTL above the configured maximum.
#[test]
fn issue_rejects_excessive_ttl() {
    let workspace = Workspace::new();
    let output = workspace.run(&[
        "token",
        "issue",
        "--subject",
        "s-3",
        "--action",
        "enrollment-decision",
        "--ttl-secs",
        "99999999",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("tokens.max_ttl_secs"));
}

/// Verifies inspect reports a missing token as an error.
#[test]
fn inspect_reports_missing_token() {
    let workspace = Workspace::new();
    let output = workspace.run(&["token", "inspect", "--subject", "nobody", "--action", "form-upload"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no matching token"));
}

/// Verifies webhook signing matches the verifier's scheme.
#[test]
fn webhook_sign_matches_shared_secret() {
    let workspace = Workspace::new();
    let body = br#"{"form":"consent","subject":"s-1"}"#;
    let body_path = workspace.dir.path().join("body.json");
    fs::write(&body_path, body).unwrap();

    let headers = workspace.json(&[
        "webhook",
        "sign",
        "--body",
        body_path.to_string_lossy().as_ref(),
        "--timestamp",
        "1700000000",
    ]);
    let expected = WebhookSecret::new(WEBHOOK_SECRET.as_bytes().to_vec())
        .unwrap()
        .sign("1700000000", body);
    assert_eq!(headers["x_timestamp"], "1700000000");
    assert_eq!(headers["x_signature"], format!("sha256={expected}"));
}
