// crates/decision-link-cli/tests/serve_command.rs
// ============================================================================
// Module: CLI Serve Command Tests
// Description: Integration tests for the CLI serve command safety checks.
// Purpose: Ensure unsafe binds and missing secrets fail before startup.
// Dependencies: decision-link-cli binary
// ============================================================================
//! ## Overview
//! Validates that the CLI refuses to bind the link server to non-loopback
//! addresses without explicit opt-in, and refuses to start without secrets.
//!
//! Security posture: local-only is the default; fail closed.

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
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn decision_link_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_decision-link"))
}

fn serve(config_path: &Path, extra_env: &[(&str, &str)]) -> Output {
    let mut command = Command::new(decision_link_bin());
    command
        .args(["serve", "--config", config_path.to_string_lossy().as_ref()])
        .env_remove("DECISION_LINK_ALLOW_NON_LOOPBACK")
        .env_remove("DECISION_LINK_SIGNING_KEY")
        .env_remove("DECISION_LINK_WEBHOOK_SECRET")
        .env_remove("DECISION_LINK_ADMIN_TOKENS");
    for (name, value) in extra_env {
        command.env(name, value);
    }
    command.output().expect("run decision-link serve")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Verifies non-loopback binds are rejected before server startup.
#[test]
fn cli_serve_rejects_non_loopback_bind() {
    let root = tempfile::tempdir().unwrap();
    let config_path = root.path().join("decision-link.toml");
    let config = r#"
[server]
bind = "0.0.0.0:8080"
public_base_url = "https://links.example.edu"
"#;
    fs::write(&config_path, config.trim()).expect("write config");

    let output = serve(&config_path, &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("non-loopback"), "unexpected stderr: {stderr}");
}

/// Verifies opting in still requires https links.
#[test]
fn cli_serve_rejects_plain_http_links_when_exposed() {
    let root = tempfile::tempdir().unwrap();
    let config_path = root.path().join("decision-link.toml");
    let config = r#"
[server]
bind = "0.0.0.0:8080"
public_base_url = "http://links.example.edu"
"#;
    fs::write(&config_path, config.trim()).expect("write config");

    let output = serve(&config_path, &[("DECISION_LINK_ALLOW_NON_LOOPBACK", "1")]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("https"), "unexpected stderr: {stderr}");
}

/// Verifies an invalid opt-in value fails closed.
#[test]
fn cli_serve_rejects_invalid_opt_in_value() {
    let root = tempfile::tempdir().unwrap();
    let config_path = root.path().join("decision-link.toml");
    fs::write(&config_path, "[server]\nbind = \"0.0.0.0:8080\"\n").expect("write config");

    let output = serve(&config_path, &[("DECISION_LINK_ALLOW_NON_LOOPBACK", "maybe")]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DECISION_LINK_ALLOW_NON_LOOPBACK"), "unexpected stderr: {stderr}");
}

/// Verifies the server refuses to start without its secrets.
#[test]
fn cli_serve_requires_secrets() {
    let root = tempfile::tempdir().unwrap();
    let config_path = root.path().join("decision-link.toml");
    fs::write(&config_path, "[server]\nbind = \"127.0.0.1:0\"\n").expect("write config");

    let output = serve(&config_path, &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DECISION_LINK_SIGNING_KEY is not set"), "unexpected stderr: {stderr}");
}

/// Verifies config validation reports invalid files.
#[test]
fn cli_config_validate_reports_errors() {
    let root = tempfile::tempdir().unwrap();
    let config_path = root.path().join("decision-link.toml");
    fs::write(&config_path, "[store]\ntype = \"sqlite\"\n").expect("write config");

    let output = Command::new(decision_link_bin())
        .args(["config", "validate", "--config", config_path.to_string_lossy().as_ref()])
        .output()
        .expect("run decision-link config validate");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sqlite store requires path"), "unexpected stderr: {stderr}");

    fs::write(&config_path, "[server]\nbind = \"127.0.0.1:9090\"\n").expect("write config");
    let output = Command::new(decision_link_bin())
        .args(["config", "validate", "--config", config_path.to_string_lossy().as_ref()])
        .output()
        .expect("run decision-link config validate");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("config ok"));
}
