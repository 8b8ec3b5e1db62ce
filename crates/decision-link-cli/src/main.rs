// crates/decision-link-cli/src/main.rs
// ============================================================================
// Module: Decision Link CLI Entry Point
// Description: Command dispatcher for the link server and token operations.
// Purpose: Provide a safe CLI for serving, issuing, and inspecting links.
// Dependencies: clap, decision-link-core, decision-link-server, serde, tokio.
// ============================================================================

//! ## Overview
//! The Decision Link CLI launches the HTTP server and performs operator tasks
//! against the configured durable store: issuing, revoking, and inspecting
//! single-use links, decoding bearer strings, and signing test webhooks.
//! Secrets are read from the environment variables named in the config and
//! are never printed. Security posture: inputs are untrusted and must be
//! validated.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use decision_link_cli::serve_policy::ALLOW_NON_LOOPBACK_ENV;
use decision_link_cli::serve_policy::BindOutcome;
use decision_link_cli::serve_policy::enforce_local_only;
use decision_link_cli::serve_policy::resolve_allow_non_loopback;
use decision_link_config::DecisionLinkConfig;
use decision_link_config::StoreType;
use decision_link_core::ActionKind;
use decision_link_core::Clock;
use decision_link_core::LinkIssuer;
use decision_link_core::SharedTokenStore;
use decision_link_core::SubjectId;
use decision_link_core::SystemClock;
use decision_link_core::TokenCodec;
use decision_link_core::TokenId;
use decision_link_core::TokenRecord;
use decision_link_core::TokenState;
use decision_link_core::TokenStore;
use decision_link_server::AuditEvent;
use decision_link_server::AuditRecord;
use decision_link_server::LinkServer;
use decision_link_server::audit::IssueAuditEvent;
use decision_link_server::build_audit_sink;
use decision_link_server::build_token_store;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Label recorded as the issuer of CLI-issued links.
const CLI_ISSUER: &str = "cli";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "decision-link", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Decision Link HTTP server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Single-use link administration.
    Token {
        /// Selected token subcommand.
        #[command(subcommand)]
        command: TokenCommand,
    },
    /// Webhook utilities.
    Webhook {
        /// Selected webhook subcommand.
        #[command(subcommand)]
        command: WebhookCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to decision-link.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Allow binding to non-loopback addresses (requires an https public base URL).
    #[arg(long, action = ArgAction::SetTrue)]
    allow_non_loopback: bool,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a config file.
    Validate(ConfigValidateCommand),
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to decision-link.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Also resolve secrets from the configured environment variables.
    #[arg(long, action = ArgAction::SetTrue)]
    check_secrets: bool,
}

/// Token subcommands.
#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Issue a link, superseding any active link for the subject and action.
    Issue(TokenIssueCommand),
    /// Revoke the active link for a subject and action.
    Revoke(TokenTargetCommand),
    /// Show a stored token by id or by subject and action.
    Inspect(TokenInspectCommand),
    /// Verify a bearer string and print its claims without touching the store.
    Decode(TokenDecodeCommand),
}

/// Link action selector.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum ActionArg {
    /// Enrollment decision link.
    EnrollmentDecision,
    /// Signed form upload link.
    FormUpload,
}

impl From<ActionArg> for ActionKind {
    fn from(value: ActionArg) -> Self {
        match value {
            ActionArg::EnrollmentDecision => Self::EnrollmentDecision,
            ActionArg::FormUpload => Self::FormUpload,
        }
    }
}

/// Arguments for `token issue`.
#[derive(Args, Debug)]
struct TokenIssueCommand {
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Subject the link acts on.
    #[arg(long, value_name = "ID")]
    subject: String,
    /// Action the link authorizes.
    #[arg(long, value_enum)]
    action: ActionArg,
    /// Link lifetime in seconds (defaults to `tokens.default_ttl_secs`).
    #[arg(long, value_name = "SECS")]
    ttl_secs: Option<u64>,
}

/// Arguments naming a subject and action.
#[derive(Args, Debug)]
struct TokenTargetCommand {
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Subject the link acts on.
    #[arg(long, value_name = "ID")]
    subject: String,
    /// Action the link authorizes.
    #[arg(long, value_enum)]
    action: ActionArg,
}

/// Arguments for `token inspect`.
#[derive(Args, Debug)]
struct TokenInspectCommand {
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Token identifier (hex).
    #[arg(long, value_name = "HEX", conflicts_with = "subject")]
    token_id: Option<String>,
    /// Subject whose active link to show.
    #[arg(long, value_name = "ID", requires = "action")]
    subject: Option<String>,
    /// Action of the active link to show.
    #[arg(long, value_enum)]
    action: Option<ActionArg>,
}

/// Arguments for `token decode`.
#[derive(Args, Debug)]
struct TokenDecodeCommand {
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Bearer string or full link URL.
    #[arg(long, value_name = "BEARER")]
    bearer: String,
}

/// Webhook subcommands.
#[derive(Subcommand, Debug)]
enum WebhookCommand {
    /// Compute the signature headers for a request body.
    Sign(WebhookSignCommand),
}

/// Arguments for `webhook sign`.
#[derive(Args, Debug)]
struct WebhookSignCommand {
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// File holding the exact request body.
    #[arg(long, value_name = "PATH")]
    body: PathBuf,
    /// Timestamp header value in unix seconds (defaults to now).
    #[arg(long, value_name = "UNIX_SECS")]
    timestamp: Option<i64>,
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// Output of `token issue`.
#[derive(Debug, Serialize)]
struct IssuedView {
    /// Token identifier.
    token_id: String,
    /// Subject identifier.
    subject_id: String,
    /// Authorized action.
    action_kind: ActionKind,
    /// Link to deliver to the recipient.
    link: String,
    /// Expiry instant (unix ms).
    expires_at: i64,
    /// Token superseded by this issue.
    superseded: Option<String>,
}

/// Output of `token revoke`.
#[derive(Debug, Serialize)]
struct RevokedView {
    /// Revoked token, when one was active.
    revoked: Option<String>,
}

/// Output of `token inspect`.
#[derive(Debug, Serialize)]
struct InspectView {
    /// Stored row.
    #[serde(flatten)]
    record: TokenRecord,
    /// State observed now, deriving expiry.
    effective_state: TokenState,
}

/// Output of `webhook sign`.
#[derive(Debug, Serialize)]
struct SignedHeadersView {
    /// `X-Timestamp` header value.
    x_timestamp: String,
    /// `X-Signature` header value.
    x_signature: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors returned by bounded file reads.
#[derive(Debug, Error)]
enum ReadLimitError {
    /// File I/O failure.
    #[error("{0}")]
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    #[error("file is {size} bytes; limit is {limit}")]
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("decision-link {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(&command),
        Commands::Token {
            command,
        } => command_token(command),
        Commands::Webhook {
            command,
        } => command_webhook(&command),
    }
}

/// Prints the top-level help text.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let allow_non_loopback = resolve_allow_non_loopback(command.allow_non_loopback)
        .map_err(|err| CliError::new(err.to_string()))?;
    let outcome =
        enforce_local_only(&config, allow_non_loopback).map_err(|err| CliError::new(err.to_string()))?;
    if outcome.network_exposed {
        warn_network_exposure(&outcome)?;
    }
    let secrets = config
        .resolve_secrets()
        .map_err(|err| CliError::new(format!("failed to resolve secrets: {err}")))?;
    let server = LinkServer::from_config(&config, secrets)
        .map_err(|err| CliError::new(format!("failed to initialize server: {err}")))?;
    write_stderr_line(&format!("decision-link listening on {}", server.bind_addr()))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Emits a security warning banner when the server is network-exposed.
fn warn_network_exposure(outcome: &BindOutcome) -> CliResult<()> {
    let audit = if outcome.audit_enabled { "enabled" } else { "disabled" };
    let message = format!(
        "WARNING: serving on non-loopback address {} (opted in via --allow-non-loopback or \
         {ALLOW_NON_LOOPBACK_ENV}); audit is {audit}. Terminate TLS upstream.",
        outcome.bind_addr
    );
    write_stderr_line(&message).map_err(|err| CliError::new(output_error("stderr", &err)))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(command),
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    if command.check_secrets {
        let secrets = config
            .resolve_secrets()
            .map_err(|err| CliError::new(format!("failed to resolve secrets: {err}")))?;
        write_stdout_line(&format!(
            "config ok; secrets resolved ({} admin tokens)",
            secrets.admin_tokens.len()
        ))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Token Commands
// ============================================================================

/// Dispatches token subcommands.
fn command_token(command: TokenCommand) -> CliResult<ExitCode> {
    match command {
        TokenCommand::Issue(command) => command_token_issue(&command),
        TokenCommand::Revoke(command) => command_token_revoke(&command),
        TokenCommand::Inspect(command) => command_token_inspect(&command),
        TokenCommand::Decode(command) => command_token_decode(&command),
    }
}

/// Executes `token issue`.
fn command_token_issue(command: &TokenIssueCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let ttl = resolve_ttl(&config, command.ttl_secs)?;
    let subject = parse_subject(&command.subject)?;
    let action_kind = ActionKind::from(command.action);
    let store = open_durable_store(&config)?;
    let codec = TokenCodec::new(
        config
            .resolve_signing_key_with(env_lookup)
            .map_err(|err| CliError::new(format!("failed to resolve signing key: {err}")))?,
    );
    let audit = build_audit_sink(&config.server.audit)
        .map_err(|err| CliError::new(format!("failed to open audit log: {err}")))?;

    let now = SystemClock.now();
    let issuer = LinkIssuer::new(codec, store, &config.server.public_base_url);
    let issued = issuer
        .issue(&subject, action_kind, now, ttl)
        .map_err(|err| CliError::new(format!("failed to issue link: {err}")))?;
    let superseded = issued.superseded.as_ref().map(ToString::to_string);
    audit.record(&AuditRecord::new(
        now,
        AuditEvent::LinkIssue(IssueAuditEvent {
            token_id: issued.record.token_id.to_string(),
            subject_id: issued.record.subject_id.to_string(),
            action_kind,
            expires_at: issued.record.expires_at.as_unix_millis(),
            superseded: superseded.clone(),
            issued_by: CLI_ISSUER.to_string(),
        }),
    ));
    write_json(&IssuedView {
        token_id: issued.record.token_id.to_string(),
        subject_id: issued.record.subject_id.to_string(),
        action_kind,
        link: issued.link,
        expires_at: issued.record.expires_at.as_unix_millis(),
        superseded,
    })?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `token revoke`.
fn command_token_revoke(command: &TokenTargetCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let subject = parse_subject(&command.subject)?;
    let store = open_durable_store(&config)?;
    let revoked = store
        .revoke(&subject, command.action.into(), SystemClock.now())
        .map_err(|err| CliError::new(format!("failed to revoke link: {err}")))?;
    write_json(&RevokedView {
        revoked: revoked.map(|token_id| token_id.to_string()),
    })?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `token inspect`.
fn command_token_inspect(command: &TokenInspectCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let store = open_durable_store(&config)?;
    let record = match (&command.token_id, &command.subject, command.action) {
        (Some(token_id), _, _) => {
            let token_id = TokenId::parse(token_id)
                .map_err(|err| CliError::new(format!("invalid --token-id: {err}")))?;
            store.load(&token_id)
        }
        (None, Some(subject), Some(action)) => {
            store.active_for(&parse_subject(subject)?, action.into())
        }
        _ => {
            return Err(CliError::new(
                "token inspect requires --token-id or --subject with --action".to_string(),
            ));
        }
    }
    .map_err(|err| CliError::new(format!("failed to read token store: {err}")))?;
    let Some(record) = record else {
        return Err(CliError::new("no matching token".to_string()));
    };
    let effective_state = record.effective_state(SystemClock.now());
    write_json(&InspectView {
        record,
        effective_state,
    })?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `token decode`.
fn command_token_decode(command: &TokenDecodeCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let codec = TokenCodec::new(
        config
            .resolve_signing_key_with(env_lookup)
            .map_err(|err| CliError::new(format!("failed to resolve signing key: {err}")))?,
    );
    let claims = codec
        .decode(bearer_from_input(&command.bearer))
        .map_err(|err| CliError::new(format!("bearer rejected: {err}")))?;
    write_json(&claims)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Webhook Commands
// ============================================================================

/// Dispatches webhook subcommands.
fn command_webhook(command: &WebhookCommand) -> CliResult<ExitCode> {
    match command {
        WebhookCommand::Sign(command) => command_webhook_sign(command),
    }
}

/// Executes `webhook sign`.
fn command_webhook_sign(command: &WebhookSignCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let body = read_bytes_with_limit(&command.body, config.server.max_body_bytes).map_err(|err| {
        CliError::new(format!("failed to read {}: {err}", command.body.display()))
    })?;
    let secret = config
        .resolve_webhook_secret_with(env_lookup)
        .map_err(|err| CliError::new(format!("failed to resolve webhook secret: {err}")))?;
    let timestamp = command
        .timestamp
        .unwrap_or_else(|| SystemClock.now().as_unix_millis() / 1_000)
        .to_string();
    let signature = secret.sign(&timestamp, &body);
    write_json(&SignedHeadersView {
        x_signature: format!("sha256={signature}"),
        x_timestamp: timestamp,
    })?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<DecisionLinkConfig> {
    DecisionLinkConfig::load(path)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

/// Opens the configured store, refusing the in-memory store.
fn open_durable_store(config: &DecisionLinkConfig) -> CliResult<SharedTokenStore> {
    if config.store.store_type == StoreType::Memory {
        return Err(CliError::new(
            "token commands require a durable store; set [store] type = \"sqlite\"".to_string(),
        ));
    }
    build_token_store(&config.store)
        .map_err(|err| CliError::new(format!("failed to open token store: {err}")))
}

/// Resolves the requested link lifetime against configured bounds.
fn resolve_ttl(config: &DecisionLinkConfig, ttl_secs: Option<u64>) -> CliResult<Duration> {
    let ttl = ttl_secs.map_or_else(|| config.tokens.default_ttl(), Duration::from_secs);
    if ttl.is_zero() {
        return Err(CliError::new("--ttl-secs must be greater than zero".to_string()));
    }
    if ttl > config.tokens.max_ttl() {
        return Err(CliError::new(format!(
            "--ttl-secs must not exceed tokens.max_ttl_secs ({})",
            config.tokens.max_ttl().as_secs()
        )));
    }
    Ok(ttl)
}

/// Parses a subject identifier argument.
fn parse_subject(raw: &str) -> CliResult<SubjectId> {
    SubjectId::new(raw).map_err(|err| CliError::new(format!("invalid --subject: {err}")))
}

/// Extracts the bearer from either a bare bearer or a full link URL.
fn bearer_from_input(input: &str) -> &str {
    let trimmed = input.trim();
    let without_query = trimmed.split(['?', '#']).next().unwrap_or(trimmed);
    without_query.rsplit('/').next().unwrap_or(without_query)
}

/// Reads an environment variable for secret resolution.
fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a value as pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to render output: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
