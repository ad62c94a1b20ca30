//! Configuration types for Lockguard.

use lockguard_registry::ServerConfig;
use lockguard_scanner::Severity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

/// Default per-server connection timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Settings for the Lockguard facade.
///
/// Everything the engine needs is passed in here; nothing is read from the
/// process environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GuardConfig {
    /// Upper bound for each connector call.
    pub timeout_ms: u64,

    /// Findings below this severity are dropped from scan reports.
    pub min_severity: Severity,

    /// Optional JSON file of custom rules, loaded on every scan.
    pub custom_rules_path: Option<PathBuf>,

    /// Skip connecting; scans run config rules only.
    pub offline: bool,

    /// Host name recorded in generated lockfiles.
    pub host: String,

    /// Home directory collapsed to `~` in generated lockfiles.
    pub home_dir: Option<PathBuf>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            min_severity: Severity::Low,
            custom_rules_path: None,
            offline: false,
            host: "unknown".to_string(),
            home_dir: None,
        }
    }
}

impl GuardConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    pub fn with_custom_rules(mut self, path: impl Into<PathBuf>) -> Self {
        self.custom_rules_path = Some(path.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_home_dir(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home.into());
        self
    }
}

/// A normalized client configuration.
///
/// Produced by whatever reads the client's own config format; this crate
/// only consumes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Client identifier, e.g. `claude-desktop`.
    pub client: String,

    /// Path the configuration was read from.
    pub config_path: String,

    /// Servers keyed by name.
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
}

impl ClientConfig {
    pub fn new(client: impl Into<String>, config_path: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            config_path: config_path.into(),
            servers: BTreeMap::new(),
        }
    }

    /// Adds a server, builder style.
    pub fn with_server(mut self, name: impl Into<String>, config: ServerConfig) -> Self {
        self.servers.insert(name.into(), config);
        self
    }

    pub fn server_names(&self) -> BTreeSet<String> {
        self.servers.keys().cloned().collect()
    }
}
