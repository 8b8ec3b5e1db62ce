// crates/decision-link-config/src/config.rs
// ============================================================================
// Module: Decision Link Configuration
// Description: Configuration loading and validation for Decision Link.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: decision-link-core, decision-link-store-sqlite, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Unknown keys are rejected and invalid values fail closed. Durations are
//! written in whole seconds or milliseconds as the key name says.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use decision_link_core::DispatchConfig;
use decision_link_store_sqlite::SqliteStoreConfig;
use decision_link_store_sqlite::SqliteStoreMode;
use decision_link_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "decision-link.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "DECISION_LINK_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum public base URL length.
pub(crate) const MAX_BASE_URL_LENGTH: usize = 2048;
/// Maximum request body size accepted by the server.
pub(crate) const MAX_BODY_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Maximum environment variable name length.
pub(crate) const MAX_ENV_NAME_LENGTH: usize = 128;
/// Maximum token lifetime in seconds (one year).
pub(crate) const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;
/// Maximum webhook tolerance in seconds.
pub(crate) const MAX_WEBHOOK_TOLERANCE_SECS: u64 = 3_600;
/// Maximum replay cache capacity.
pub(crate) const MAX_REPLAY_CAPACITY: usize = 1_000_000;
/// Maximum dispatch concurrency.
pub(crate) const MAX_DISPATCH_CONCURRENCY: usize = 256;
/// Maximum delivery attempts per subject.
pub(crate) const MAX_DISPATCH_ATTEMPTS: u32 = 10;
/// Minimum per-subject timeout in milliseconds.
pub(crate) const MIN_SUBJECT_TIMEOUT_MS: u64 = 100;
/// Maximum subjects accepted in one bulk request.
pub(crate) const MAX_BULK_SUBJECTS_LIMIT: usize = 10_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Decision Link configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecisionLinkConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Token issuance configuration.
    #[serde(default)]
    pub tokens: TokenConfig,
    /// Webhook verification configuration.
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Token store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Bulk dispatch configuration.
    #[serde(default)]
    pub dispatch: DispatchSettings,
    /// File-backed collaborator configuration.
    #[serde(default)]
    pub collaborators: CollaboratorConfig,
}

impl DecisionLinkConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.tokens.validate()?;
        self.webhook.validate()?;
        self.store.validate()?;
        self.dispatch.validate()?;
        self.collaborators.validate()?;
        let names = [
            ("server.admin_token_env", self.server.admin_token_env.as_str()),
            ("tokens.signing_key_env", self.tokens.signing_key_env.as_str()),
            ("webhook.secret_env", self.webhook.secret_env.as_str()),
        ];
        for (index, (field, name)) in names.iter().enumerate() {
            if names[index + 1..].iter().any(|(_, other)| other == name) {
                return Err(ConfigError::Invalid(format!(
                    "{field} must not reuse another secret's environment variable"
                )));
            }
        }
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Public base URL used to build links.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Maximum subjects accepted in one bulk request.
    #[serde(default = "default_max_bulk_subjects")]
    pub max_bulk_subjects: usize,
    /// Environment variable holding admin bearer tokens (comma separated).
    #[serde(default = "default_admin_token_env")]
    pub admin_token_env: String,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: ServerAuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_base_url: default_public_base_url(),
            max_body_bytes: default_max_body_bytes(),
            max_bulk_subjects: default_max_bulk_subjects(),
            admin_token_env: default_admin_token_env(),
            audit: ServerAuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))
    }

    /// Returns the parsed public base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the URL is not a plain http(s)
    /// prefix with a host.
    pub fn public_base(&self) -> Result<Url, ConfigError> {
        parse_base_url(&self.public_base_url)
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        self.public_base()?;
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between 1 and {MAX_BODY_BYTES_LIMIT}"
            )));
        }
        if self.max_bulk_subjects == 0 || self.max_bulk_subjects > MAX_BULK_SUBJECTS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "server.max_bulk_subjects must be between 1 and {MAX_BULK_SUBJECTS_LIMIT}"
            )));
        }
        validate_env_name("server.admin_token_env", &self.admin_token_env)?;
        self.audit.validate()
    }
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerAuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines); stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ServerAuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl ServerAuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("server.audit.path", path)?;
        }
        Ok(())
    }
}

/// Token issuance configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// Environment variable holding the signing key.
    #[serde(default = "default_signing_key_env")]
    pub signing_key_env: String,
    /// Lifetime used when no deadline is supplied, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Upper bound on any token lifetime, in seconds.
    #[serde(default = "default_max_ttl_secs")]
    pub max_ttl_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            signing_key_env: default_signing_key_env(),
            default_ttl_secs: default_ttl_secs(),
            max_ttl_secs: default_max_ttl_secs(),
        }
    }
}

impl TokenConfig {
    /// Returns the default token lifetime.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Returns the maximum token lifetime.
    #[must_use]
    pub const fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl_secs)
    }

    /// Validates token configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_env_name("tokens.signing_key_env", &self.signing_key_env)?;
        if self.default_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "tokens.default_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "tokens.max_ttl_secs must not exceed {MAX_TOKEN_TTL_SECS}"
            )));
        }
        if self.default_ttl_secs > self.max_ttl_secs {
            return Err(ConfigError::Invalid(
                "tokens.default_ttl_secs must not exceed tokens.max_ttl_secs".to_string(),
            ));
        }
        Ok(())
    }
}

/// Webhook verification configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Environment variable holding the shared secret.
    #[serde(default = "default_webhook_secret_env")]
    pub secret_env: String,
    /// Allowed clock skew in seconds.
    #[serde(default = "default_webhook_tolerance_secs")]
    pub tolerance_secs: u64,
    /// Maximum live replay cache entries.
    #[serde(default = "default_replay_capacity")]
    pub replay_capacity: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret_env: default_webhook_secret_env(),
            tolerance_secs: default_webhook_tolerance_secs(),
            replay_capacity: default_replay_capacity(),
        }
    }
}

impl WebhookConfig {
    /// Returns the tolerance window.
    #[must_use]
    pub const fn tolerance(&self) -> Duration {
        Duration::from_secs(self.tolerance_secs)
    }

    /// Validates webhook configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_env_name("webhook.secret_env", &self.secret_env)?;
        if self.tolerance_secs == 0 || self.tolerance_secs > MAX_WEBHOOK_TOLERANCE_SECS {
            return Err(ConfigError::Invalid(format!(
                "webhook.tolerance_secs must be between 1 and {MAX_WEBHOOK_TOLERANCE_SECS}"
            )));
        }
        if self.replay_capacity == 0 || self.replay_capacity > MAX_REPLAY_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "webhook.replay_capacity must be between 1 and {MAX_REPLAY_CAPACITY}"
            )));
        }
        Ok(())
    }
}

/// Token store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Returns the `SQLite` store settings when the sqlite backend is chosen.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }

    /// Validates token store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self
                    .path
                    .as_ref()
                    .ok_or_else(|| ConfigError::Invalid("sqlite store requires path".to_string()))?;
                validate_path_string("store.path", &path.to_string_lossy())
            }
        }
    }
}

/// Token store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Bulk dispatch configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchSettings {
    /// Maximum subjects processed at once.
    #[serde(default = "default_dispatch_concurrency")]
    pub concurrency: usize,
    /// Maximum delivery attempts per subject.
    #[serde(default = "default_dispatch_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_dispatch_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound on any backoff delay, in milliseconds.
    #[serde(default = "default_dispatch_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Time limit for one issuance or delivery attempt, in milliseconds.
    #[serde(default = "default_dispatch_subject_timeout_ms")]
    pub subject_timeout_ms: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            concurrency: default_dispatch_concurrency(),
            max_attempts: default_dispatch_max_attempts(),
            initial_backoff_ms: default_dispatch_initial_backoff_ms(),
            max_backoff_ms: default_dispatch_max_backoff_ms(),
            subject_timeout_ms: default_dispatch_subject_timeout_ms(),
        }
    }
}

impl DispatchSettings {
    /// Converts settings into the coordinator's tuning struct.
    #[must_use]
    pub const fn to_dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            concurrency: self.concurrency,
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            subject_timeout: Duration::from_millis(self.subject_timeout_ms),
        }
    }

    /// Validates dispatch configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 || self.concurrency > MAX_DISPATCH_CONCURRENCY {
            return Err(ConfigError::Invalid(format!(
                "dispatch.concurrency must be between 1 and {MAX_DISPATCH_CONCURRENCY}"
            )));
        }
        if self.max_attempts == 0 || self.max_attempts > MAX_DISPATCH_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "dispatch.max_attempts must be between 1 and {MAX_DISPATCH_ATTEMPTS}"
            )));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::Invalid(
                "dispatch.initial_backoff_ms must not exceed dispatch.max_backoff_ms".to_string(),
            ));
        }
        if self.subject_timeout_ms < MIN_SUBJECT_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "dispatch.subject_timeout_ms must be at least {MIN_SUBJECT_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// File-backed collaborator configuration for local deployments.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollaboratorConfig {
    /// Directory holding the mail outbox and decision/form ledgers.
    #[serde(default = "default_collaborator_dir")]
    pub dir: String,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            dir: default_collaborator_dir(),
        }
    }
}

impl CollaboratorConfig {
    /// Validates collaborator configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("collaborators.dir", &self.dir)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates an environment variable name.
fn validate_env_name(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() || value.len() > MAX_ENV_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "{field} must be 1..={MAX_ENV_NAME_LENGTH} characters"
        )));
    }
    let valid = value
        .bytes()
        .all(|byte| byte.is_ascii_uppercase() || byte.is_ascii_digit() || byte == b'_')
        && !value.starts_with(|ch: char| ch.is_ascii_digit());
    if !valid {
        return Err(ConfigError::Invalid(format!(
            "{field} must be an upper-case environment variable name"
        )));
    }
    Ok(())
}

/// Parses the public base URL used in links.
fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    if value.len() > MAX_BASE_URL_LENGTH {
        return Err(ConfigError::Invalid("server.public_base_url exceeds max length".to_string()));
    }
    if value.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
        return Err(ConfigError::Invalid(
            "server.public_base_url must not contain whitespace".to_string(),
        ));
    }
    let url = Url::parse(value).map_err(|err| {
        ConfigError::Invalid(format!("server.public_base_url is not a valid url: {err}"))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid("server.public_base_url must be an http(s) url".to_string()));
    }
    if url.cannot_be_a_base() || url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::Invalid("server.public_base_url must include a host".to_string()));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(ConfigError::Invalid(
            "server.public_base_url must not contain credentials".to_string(),
        ));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::Invalid(
            "server.public_base_url must not contain query or fragment".to_string(),
        ));
    }
    Ok(url)
}

/// Default bind address.
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Default public base URL.
fn default_public_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

/// Default maximum request body size in bytes.
pub(crate) const fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Default maximum subjects per bulk request.
pub(crate) const fn default_max_bulk_subjects() -> usize {
    1_000
}

/// Default admin token environment variable.
fn default_admin_token_env() -> String {
    "DECISION_LINK_ADMIN_TOKENS".to_string()
}

/// Default audit enablement.
pub(crate) const fn default_audit_enabled() -> bool {
    true
}

/// Default signing key environment variable.
fn default_signing_key_env() -> String {
    "DECISION_LINK_SIGNING_KEY".to_string()
}

/// Default token lifetime (30 days).
pub(crate) const fn default_ttl_secs() -> u64 {
    30 * 24 * 60 * 60
}

/// Default maximum token lifetime (90 days).
pub(crate) const fn default_max_ttl_secs() -> u64 {
    90 * 24 * 60 * 60
}

/// Default webhook secret environment variable.
fn default_webhook_secret_env() -> String {
    "DECISION_LINK_WEBHOOK_SECRET".to_string()
}

/// Default webhook tolerance.
pub(crate) const fn default_webhook_tolerance_secs() -> u64 {
    300
}

/// Default replay cache capacity.
pub(crate) const fn default_replay_capacity() -> usize {
    10_000
}

/// Default store busy timeout.
pub(crate) const fn default_store_busy_timeout_ms() -> u64 {
    5_000
}

/// Default dispatch concurrency.
pub(crate) const fn default_dispatch_concurrency() -> usize {
    8
}

/// Default delivery attempts.
pub(crate) const fn default_dispatch_max_attempts() -> u32 {
    3
}

/// Default initial backoff.
pub(crate) const fn default_dispatch_initial_backoff_ms() -> u64 {
    200
}

/// Default maximum backoff.
pub(crate) const fn default_dispatch_max_backoff_ms() -> u64 {
    5_000
}

/// Default per-subject timeout.
pub(crate) const fn default_dispatch_subject_timeout_ms() -> u64 {
    10_000
}

/// Default collaborator directory.
fn default_collaborator_dir() -> String {
    "decision-link-data".to_string()
}
