//! Secret resolution tests for decision-link-config.
// crates/decision-link-config/tests/secrets.rs
// =============================================================================
// Module: Secret Resolution Tests
// Description: Validate environment-backed secret loading and redaction.
// Purpose: Ensure secrets fail closed and never leak through Debug.
// =============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and debug output are permitted."
)]

use std::collections::HashMap;

use decision_link_config::DecisionLinkConfig;

const SIGNING_KEY: &str = "signing-key-material-0123456789abcdef";
const WEBHOOK_SECRET: &str = "webhook-secret-0123456789";
const ADMIN_A: &str = "admin-token-aaaaaaaaaaaa";
const ADMIN_B: &str = "admin-token-bbbbbbbbbbbb";

fn env_with(entries: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
    let map: HashMap<String, String> =
        entries.iter().map(|(key, value)| ((*key).to_string(), (*value).to_string())).collect();
    move |name| map.get(name).cloned()
}

fn full_env() -> impl Fn(&str) -> Option<String> {
    env_with(&[
        ("DECISION_LINK_SIGNING_KEY", SIGNING_KEY),
        ("DECISION_LINK_WEBHOOK_SECRET", WEBHOOK_SECRET),
        ("DECISION_LINK_ADMIN_TOKENS", &format!("{ADMIN_A}, {ADMIN_B}")),
    ])
}

/// Verifies all secrets resolve and admin tokens split on commas.
#[test]
fn resolves_all_secrets_from_lookup() {
    let config = DecisionLinkConfig::default();
    let secrets = config.resolve_secrets_with(full_env()).unwrap();
    assert_eq!(secrets.admin_tokens.len(), 2);
    assert!(secrets.admin_tokens.iter().any(|token| token.matches(ADMIN_B)));
    assert!(!secrets.admin_tokens.iter().any(|token| token.matches("admin-token-cccccccccccc")));
}

/// Verifies each admin token has its own fingerprint.
#[test]
fn admin_tokens_have_distinct_fingerprints() {
    let secrets = DecisionLinkConfig::default().resolve_secrets_with(full_env()).unwrap();
    assert_ne!(secrets.admin_tokens[0].fingerprint(), secrets.admin_tokens[1].fingerprint());
}

/// Verifies Debug output never contains secret material.
#[test]
fn debug_output_is_redacted() {
    let secrets = DecisionLinkConfig::default().resolve_secrets_with(full_env()).unwrap();
    let debug = format!("{secrets:?}");
    for secret in [SIGNING_KEY, WEBHOOK_SECRET, ADMIN_A, ADMIN_B] {
        assert!(!debug.contains(secret), "debug output leaked a secret");
    }
}

/// Verifies missing variables fail with the variable name only.
#[test]
fn missing_variables_fail_closed() {
    let config = DecisionLinkConfig::default();
    let err = config
        .resolve_secrets_with(env_with(&[("DECISION_LINK_SIGNING_KEY", SIGNING_KEY)]))
        .unwrap_err();
    assert!(err.to_string().contains("DECISION_LINK_WEBHOOK_SECRET is not set"));
}

/// Verifies weak secrets are rejected without echoing them.
#[test]
fn weak_secrets_are_rejected() {
    let config = DecisionLinkConfig::default();
    let err = config
        .resolve_signing_key_with(env_with(&[("DECISION_LINK_SIGNING_KEY", "too-short")]))
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("DECISION_LINK_SIGNING_KEY"));
    assert!(!message.contains("too-short"));

    let err = config
        .resolve_secrets_with(env_with(&[
            ("DECISION_LINK_SIGNING_KEY", SIGNING_KEY),
            ("DECISION_LINK_WEBHOOK_SECRET", WEBHOOK_SECRET),
            ("DECISION_LINK_ADMIN_TOKENS", "short"),
        ]))
        .unwrap_err();
    assert!(err.to_string().contains("admin tokens must be at least"));
}

/// Verifies a list of only separators counts as unset.
#[test]
fn blank_admin_token_list_is_unset() {
    let err = DecisionLinkConfig::default()
        .resolve_secrets_with(env_with(&[
            ("DECISION_LINK_SIGNING_KEY", SIGNING_KEY),
            ("DECISION_LINK_WEBHOOK_SECRET", WEBHOOK_SECRET),
            ("DECISION_LINK_ADMIN_TOKENS", " , ,"),
        ]))
        .unwrap_err();
    assert!(err.to_string().contains("DECISION_LINK_ADMIN_TOKENS is not set"));
}

/// Verifies configured variable names are honoured.
#[test]
fn custom_variable_names_are_used() {
    let config = DecisionLinkConfig::from_toml(
        "[webhook]\nsecret_env = \"FORMS_SECRET\"\n",
    )
    .unwrap();
    let secret = config
        .resolve_webhook_secret_with(env_with(&[("FORMS_SECRET", WEBHOOK_SECRET)]))
        .unwrap();
    assert_eq!(secret.sign("1", b"x").len(), 64);
}
