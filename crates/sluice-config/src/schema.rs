// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for Sluice.
//!
//! # Configuration Structure
//!
//! ```yaml
//! quitOnError: true
//! pollIntervalMs: 1
//! registry:
//!   url: "http://localhost:3000"
//!   verbose: false
//! servers:
//!   - serverId: 1
//!     endpoint: "opc.tcp://localhost:48050"
//!     subscriptions:
//!       - isFolder: false
//!         nsIndex: 2
//!         identifiers: ["temp"]
//! logging:
//!   level: info
//! ```
//!
//! Keys are camelCase. Every camelCase key also accepts its all-lowercase
//! spelling, since the YAML source may hand keys over case-folded.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Constants
// =============================================================================

/// Default poll loop interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1;

/// Default registry base URL.
pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:3000";

/// Default registry collection for value-change events.
pub const DEFAULT_EVENTS_PATH: &str = "/events";

/// Default exchange log path.
pub const DEFAULT_EXCHANGE_LOG: &str = "registry.log";

/// Default publishing interval in milliseconds.
pub const DEFAULT_PUBLISH_INTERVAL_MS: f64 = 100.0;

/// Default subscription priority.
pub const DEFAULT_PUBLISH_PRIORITY: u8 = 1;

/// Default subscription lifetime count.
pub const DEFAULT_LIFETIME_COUNT: u32 = 10_000;

/// Default maximum keep-alive count.
pub const DEFAULT_MAX_KEEP_ALIVE_COUNT: u32 = 1;

/// Default maximum notifications per publish.
pub const DEFAULT_MAX_NOTIFICATIONS_PER_PUBLISH: u32 = 10;

// =============================================================================
// Root Configuration
// =============================================================================

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Stop the whole gateway on the first bad connector status.
    #[serde(default, alias = "quitonerror")]
    pub quit_on_error: bool,

    /// Sleep between poll iterations, in milliseconds.
    #[serde(default = "default_poll_interval_ms", alias = "pollintervalms")]
    pub poll_interval_ms: u64,

    /// Run bulk reconciliation against the registry at startup.
    #[serde(default = "default_true", alias = "reconcileonstart")]
    pub reconcile_on_start: bool,

    /// Maximum folder recursion depth; 0 means unbounded.
    #[serde(default, alias = "maxbrowsedepth")]
    pub max_browse_depth: u32,

    /// Registry service settings.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Source Protocol servers, in creation order.
    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval_ms == 0 || self.poll_interval_ms > 60_000 {
            return Err(ConfigError::validation(
                "pollIntervalMs",
                "must be between 1 and 60000",
            ));
        }

        self.registry.validate()?;

        let mut ids = HashSet::new();
        for (index, server) in self.servers.iter().enumerate() {
            if !ids.insert(server.server_id) {
                return Err(ConfigError::duplicate_server_id(server.server_id));
            }
            server.validate(index)?;
        }

        Ok(())
    }

    /// Returns a server configuration by id.
    pub fn get_server(&self, server_id: i32) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.server_id == server_id)
    }

    /// Returns the total number of configured identifiers across all servers.
    pub fn identifier_count(&self) -> usize {
        self.servers
            .iter()
            .flat_map(|s| s.subscriptions.iter())
            .map(|sub| sub.identifiers().count())
            .sum()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            quit_on_error: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            reconcile_on_start: true,
            max_browse_depth: 0,
            registry: RegistryConfig::default(),
            servers: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

// =============================================================================
// Registry Configuration
// =============================================================================

/// Registry service connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Base URL, e.g. `http://localhost:3000`.
    #[serde(default = "default_registry_url")]
    pub url: String,

    /// Basic auth user; empty disables auth.
    #[serde(default)]
    pub username: String,

    /// Basic auth password.
    #[serde(default)]
    pub password: SecretValue,

    /// Mirror every request and response body to the exchange log.
    #[serde(default)]
    pub verbose: bool,

    /// Exchange log path.
    #[serde(default = "default_exchange_log", alias = "logpath")]
    pub log_path: PathBuf,

    /// Request timeout in milliseconds; 0 keeps the client default.
    #[serde(default, alias = "timeoutms")]
    pub timeout_ms: u64,

    /// Collection receiving value-change events.
    #[serde(default = "default_events_path", alias = "eventspath")]
    pub events_path: String,
}

impl RegistryConfig {
    /// Validates the registry configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.url.is_empty() {
            return Err(ConfigError::validation("registry.url", "cannot be empty"));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(ConfigError::validation(
                "registry.url",
                "must start with 'http://' or 'https://'",
            ));
        }
        if !self.events_path.starts_with('/') {
            return Err(ConfigError::validation(
                "registry.eventsPath",
                "must start with '/'",
            ));
        }
        if self.verbose && self.log_path.as_os_str().is_empty() {
            return Err(ConfigError::validation(
                "registry.logPath",
                "required when verbose is enabled",
            ));
        }
        Ok(())
    }

    /// Returns basic auth credentials when a username is configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.username.is_empty() {
            None
        } else {
            Some((self.username.as_str(), self.password.expose()))
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            username: String::new(),
            password: SecretValue::default(),
            verbose: false,
            log_path: default_exchange_log(),
            timeout_ms: 0,
            events_path: default_events_path(),
        }
    }
}

fn default_registry_url() -> String {
    DEFAULT_REGISTRY_URL.to_string()
}

fn default_exchange_log() -> PathBuf {
    PathBuf::from(DEFAULT_EXCHANGE_LOG)
}

fn default_events_path() -> String {
    DEFAULT_EVENTS_PATH.to_string()
}

// =============================================================================
// Server Configuration
// =============================================================================

/// One Source Protocol server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Unique server id.
    #[serde(alias = "serverid")]
    pub server_id: i32,

    /// Endpoint URL, e.g. `opc.tcp://host:4840`.
    pub endpoint: String,

    /// User name; empty connects anonymously.
    #[serde(default)]
    pub username: String,

    /// Password.
    #[serde(default)]
    pub password: SecretValue,

    /// Publishing interval in milliseconds.
    #[serde(default = "default_publish_interval", alias = "subpublishinterval")]
    pub sub_publish_interval: f64,

    /// Subscription priority.
    #[serde(default = "default_publish_priority", alias = "subpublishpriority")]
    pub sub_publish_priority: u8,

    /// Subscriptions, applied in order.
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
}

impl ServerConfig {
    /// Creates a server configuration with default subscription settings.
    pub fn new(server_id: i32, endpoint: impl Into<String>) -> Self {
        Self {
            server_id,
            endpoint: endpoint.into(),
            username: String::new(),
            password: SecretValue::default(),
            sub_publish_interval: DEFAULT_PUBLISH_INTERVAL_MS,
            sub_publish_priority: DEFAULT_PUBLISH_PRIORITY,
            subscriptions: Vec::new(),
        }
    }

    /// Sets credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = SecretValue::new(password);
        self
    }

    /// Appends a subscription.
    pub fn with_subscription(mut self, subscription: SubscriptionConfig) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    /// Validates the server configuration.
    pub fn validate(&self, index: usize) -> ConfigResult<()> {
        let field = |name: &str| format!("servers[{}].{}", index, name);

        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::validation(field("endpoint"), "cannot be empty"));
        }
        if !(self.sub_publish_interval.is_finite() && self.sub_publish_interval > 0.0) {
            return Err(ConfigError::validation(
                field("subPublishInterval"),
                "must be a positive number",
            ));
        }
        for (i, sub) in self.subscriptions.iter().enumerate() {
            if sub.identifiers().next().is_none() {
                return Err(ConfigError::validation(
                    field(&format!("subscriptions[{}]", i)),
                    "requires at least one identifier",
                ));
            }
            if sub.identifiers().any(|id| id.trim().is_empty()) {
                return Err(ConfigError::validation(
                    field(&format!("subscriptions[{}]", i)),
                    "identifiers cannot be empty",
                ));
            }
        }
        Ok(())
    }

    /// Returns `(username, password)` when a username is configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.username.is_empty() {
            None
        } else {
            Some((self.username.as_str(), self.password.expose()))
        }
    }

    /// Returns the subscription parameters for this server.
    pub fn subscription_params(&self) -> SubscriptionParams {
        SubscriptionParams {
            publishing_interval_ms: self.sub_publish_interval,
            priority: self.sub_publish_priority,
            ..SubscriptionParams::default()
        }
    }
}

fn default_publish_interval() -> f64 {
    DEFAULT_PUBLISH_INTERVAL_MS
}

fn default_publish_priority() -> u8 {
    DEFAULT_PUBLISH_PRIORITY
}

// =============================================================================
// Subscription Configuration
// =============================================================================

/// One subscription entry of a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionConfig {
    /// Subscribe to every descendant instead of the node itself.
    #[serde(default, alias = "isfolder")]
    pub is_folder: bool,

    /// Namespace index of the identifiers.
    #[serde(alias = "nsindex")]
    pub ns_index: u16,

    /// Single identifier form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    /// Identifier list form.
    #[serde(default)]
    pub identifiers: Vec<String>,
}

impl SubscriptionConfig {
    /// Creates a subscription to individual nodes.
    pub fn nodes<I, S>(ns_index: u16, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            is_folder: false,
            ns_index,
            identifier: None,
            identifiers: identifiers.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a folder subscription.
    pub fn folder(ns_index: u16, identifier: impl Into<String>) -> Self {
        Self {
            is_folder: true,
            ns_index,
            identifier: None,
            identifiers: vec![identifier.into()],
        }
    }

    /// Iterates every identifier: the single form first, then the list.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> + '_ {
        self.identifier
            .iter()
            .chain(self.identifiers.iter())
            .map(String::as_str)
    }
}

// =============================================================================
// Subscription Parameters
// =============================================================================

/// Parameters for creating a protocol subscription.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionParams {
    /// Requested publishing interval in milliseconds.
    pub publishing_interval_ms: f64,
    /// Lifetime count.
    pub lifetime_count: u32,
    /// Maximum keep-alive count.
    pub max_keep_alive_count: u32,
    /// Maximum notifications per publish.
    pub max_notifications_per_publish: u32,
    /// Whether publishing starts enabled.
    pub publishing_enabled: bool,
    /// Relative priority.
    pub priority: u8,
}

impl Default for SubscriptionParams {
    fn default() -> Self {
        Self {
            publishing_interval_ms: DEFAULT_PUBLISH_INTERVAL_MS,
            lifetime_count: DEFAULT_LIFETIME_COUNT,
            max_keep_alive_count: DEFAULT_MAX_KEEP_ALIVE_COUNT,
            max_notifications_per_publish: DEFAULT_MAX_NOTIFICATIONS_PER_PUBLISH,
            publishing_enabled: true,
            priority: DEFAULT_PUBLISH_PRIORITY,
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name, accepting `warning` for `warn`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON lines.
    Json,
    /// Compact single-line text.
    Compact,
}

// =============================================================================
// Secret Value
// =============================================================================

/// A credential that never prints.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretValue(String);

impl SecretValue {
    /// Creates a new secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the plain value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> GatewayConfig {
        GatewayConfig {
            servers: vec![ServerConfig::new(1, "opc.tcp://localhost:48050")
                .with_subscription(SubscriptionConfig::nodes(2, ["temp"]))],
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert!(!config.quit_on_error);
        assert_eq!(config.poll_interval_ms, 1);
        assert!(config.reconcile_on_start);
        assert_eq!(config.registry.events_path, "/events");
        assert!(config.servers.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_poll_interval_bounds() {
        let mut config = valid_config();
        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        config.poll_interval_ms = 60_001;
        assert!(config.validate().is_err());

        config.poll_interval_ms = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_server_ids_rejected() {
        let mut config = valid_config();
        config.servers.push(ServerConfig::new(1, "opc.tcp://other:4840"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateServerId { server_id: 1 })
        ));
    }

    #[test]
    fn test_server_validation() {
        let mut config = valid_config();
        config.servers[0].endpoint = " ".into();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.servers[0].sub_publish_interval = 0.0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.servers[0]
            .subscriptions
            .push(SubscriptionConfig::nodes(2, Vec::<String>::new()));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("subscriptions[1]"));
    }

    #[test]
    fn test_registry_validation() {
        let mut config = valid_config();
        config.registry.url = "ftp://registry".into();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.registry.events_path = "events".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials() {
        let anonymous = ServerConfig::new(1, "opc.tcp://a");
        assert_eq!(anonymous.credentials(), None);

        let user = ServerConfig::new(1, "opc.tcp://a").with_credentials("op", "pw");
        assert_eq!(user.credentials(), Some(("op", "pw")));
    }

    #[test]
    fn test_identifiers_merge_single_and_list() {
        let sub = SubscriptionConfig {
            is_folder: false,
            ns_index: 2,
            identifier: Some("a".into()),
            identifiers: vec!["b".into(), "c".into()],
        };
        assert_eq!(sub.identifiers().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_subscription_params() {
        let mut server = ServerConfig::new(1, "opc.tcp://a");
        server.sub_publish_interval = 250.0;
        server.sub_publish_priority = 3;

        let params = server.subscription_params();
        assert_eq!(params.publishing_interval_ms, 250.0);
        assert_eq!(params.priority, 3);
        assert_eq!(params.lifetime_count, 10_000);
        assert_eq!(params.max_keep_alive_count, 1);
        assert_eq!(params.max_notifications_per_publish, 10);
        assert!(params.publishing_enabled);
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = SecretValue::new("hunter2");
        assert_eq!(secret.to_string(), "***");
        assert_eq!(format!("{:?}", secret), "SecretValue(***)");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("loud"), None);
    }
}
