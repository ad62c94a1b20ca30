//! The Lockguard facade.
//!
//! [`Lockguard`] ties the pieces together: it observes servers through a
//! [`Connector`], then hands the snapshots to the lockfile builder, the drift
//! differ or the scanner. Only observation is asynchronous.

use crate::{
    config::{ClientConfig, GuardConfig},
    connector::{observe_servers, Connector, ServerError},
    error::GuardError,
    Result,
};

use lockguard_registry::{
    diff_lockfile, BuildContext, DiffResult, Lockfile, LockfileBuilder, ServerConfig,
    ServerSnapshot,
};
use lockguard_scanner::{load_custom_rules, RuleRegistry, ScanReport, Scanner};

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Pins, diffs and scans the servers of one client configuration.
///
/// # Example
///
/// ```rust
/// use lockguard_core::{ClientConfig, GuardConfig, Lockguard, SnapshotConnector};
/// use lockguard_registry::{ServerConfig, ServerSnapshot, ToolDefinition};
/// use std::sync::Arc;
///
/// let snapshot = ServerSnapshot::with_tools(vec![ToolDefinition::new("read_file", "Read a file")]);
/// let connector = Arc::new(SnapshotConnector::new().with_snapshot("files", snapshot));
/// let guard = Lockguard::new(connector, GuardConfig::default()).unwrap();
///
/// let client = ClientConfig::new("cursor", "/tmp/mcp.json")
///     .with_server("files", ServerConfig::stdio("files-server", &[]));
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let (lockfile, errors) = rt.block_on(guard.build_lockfile(&client));
/// assert!(errors.is_empty());
///
/// let (diff, _) = rt.block_on(guard.diff(&lockfile, &client));
/// assert!(!diff.drifted);
/// ```
pub struct Lockguard {
    connector: Arc<dyn Connector>,
    config: GuardConfig,
}

impl Lockguard {
    /// Creates a facade over the given connector.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Config`] if the timeout is zero.
    pub fn new(connector: Arc<dyn Connector>, config: GuardConfig) -> Result<Self> {
        if config.timeout_ms == 0 {
            return Err(GuardError::Config("timeoutMs must be greater than zero".to_string()));
        }

        info!(
            timeout_ms = config.timeout_ms,
            min_severity = %config.min_severity,
            offline = config.offline,
            "Lockguard initialized"
        );

        Ok(Self { connector, config })
    }

    /// Active configuration.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Observes every server of `client`.
    pub async fn observe(
        &self,
        client: &ClientConfig,
    ) -> (BTreeMap<String, ServerSnapshot>, Vec<ServerError>) {
        self.observe_subset(&client.servers).await
    }

    async fn observe_subset(
        &self,
        servers: &BTreeMap<String, ServerConfig>,
    ) -> (BTreeMap<String, ServerSnapshot>, Vec<ServerError>) {
        if servers.is_empty() {
            return (BTreeMap::new(), Vec::new());
        }
        observe_servers(Arc::clone(&self.connector), servers, self.config.timeout()).await
    }

    /// Produces a lockfile pinning every server that could be observed.
    ///
    /// Servers that fail to connect are left out of the lockfile and reported
    /// in the returned error list.
    pub async fn build_lockfile(&self, client: &ClientConfig) -> (Lockfile, Vec<ServerError>) {
        let (snapshots, errors) = self.observe(client).await;

        let mut context =
            BuildContext::new(&client.client, &client.config_path, &self.config.host);
        if let Some(home) = &self.config.home_dir {
            context = context.with_home_dir(home.clone());
        }

        let mut builder = LockfileBuilder::new(context);
        for (name, snapshot) in &snapshots {
            if let Some(config) = client.servers.get(name) {
                builder.add_server(name, config, snapshot);
            }
        }

        let lockfile = builder.build();
        info!(
            pinned = lockfile.servers.len(),
            failed = errors.len(),
            "lockfile built"
        );
        (lockfile, errors)
    }

    /// Compares `baseline` against the live state of `client`.
    ///
    /// Only servers that are both pinned and configured are contacted; added
    /// and removed servers are detected from the configuration alone. A
    /// server that cannot be reached yields an error entry and no drift
    /// entries.
    pub async fn diff(&self, baseline: &Lockfile, client: &ClientConfig) -> (DiffResult, Vec<ServerError>) {
        let to_observe: BTreeMap<String, ServerConfig> = client
            .servers
            .iter()
            .filter(|(name, _)| baseline.servers.contains_key(*name))
            .map(|(name, config)| (name.clone(), config.clone()))
            .collect();

        let (observed, errors) = self.observe_subset(&to_observe).await;
        let result = diff_lockfile(baseline, &client.server_names(), &observed);

        if result.drifted {
            warn!(
                entries = result.entries.len(),
                critical = result.summary.critical,
                "drift detected"
            );
        } else {
            info!(servers = observed.len(), "no drift");
        }
        (result, errors)
    }

    /// Runs the rule engine over `client`.
    ///
    /// Custom rules are loaded from [`GuardConfig::custom_rules_path`] on every
    /// call, before any server is contacted. Config rules run for every
    /// configured server; tool rules run only for servers that were observed.
    /// In offline mode no server is contacted.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Scan`] if the custom rules file is unreadable or
    /// malformed.
    pub async fn scan(&self, client: &ClientConfig) -> Result<(ScanReport, Vec<ServerError>)> {
        let registry = self.rule_registry()?;

        let (observed, errors) = if self.config.offline {
            debug!("offline scan, skipping connections");
            (BTreeMap::new(), Vec::new())
        } else {
            self.observe(client).await
        };

        let mut scanner = Scanner::new(registry, self.config.min_severity);
        for (name, config) in &client.servers {
            scanner.scan_config(name, config);
            if let Some(snapshot) = observed.get(name) {
                scanner.scan_tools(name, &snapshot.tools);
            }
        }

        let report = scanner.finish();
        info!(
            findings = report.findings.len(),
            servers = report.servers_scanned,
            tools = report.tools_scanned,
            unreachable = errors.len(),
            "scan complete"
        );
        Ok((report, errors))
    }

    fn rule_registry(&self) -> Result<RuleRegistry> {
        let mut registry = RuleRegistry::builtin();
        if let Some(path) = &self.config.custom_rules_path {
            let custom = load_custom_rules(path)?;
            debug!(path = %path.display(), rules = custom.len(), "loaded custom rules");
            registry.extend(custom)?;
        }
        Ok(registry)
    }
}

impl std::fmt::Debug for Lockguard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lockguard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
