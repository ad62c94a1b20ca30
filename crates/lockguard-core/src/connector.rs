//! Server observation.
//!
//! The [`Connector`] trait is the only suspension point in Lockguard: one
//! call per server, each bounded by a timeout. Everything downstream of it is
//! synchronous.

use crate::error::ConnectError;
use async_trait::async_trait;
use lockguard_registry::{ServerConfig, ServerSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Reaches a server and lists its tools.
///
/// Implementations must give up within `timeout`. The caller also enforces
/// the bound and drops the call's future on expiry, so any transport held by
/// the future is torn down with it.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        server_name: &str,
        config: &ServerConfig,
        timeout: Duration,
    ) -> Result<ServerSnapshot, ConnectError>;
}

/// A server that could not be observed in this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    pub server: String,
    pub message: String,
}

/// Replays previously recorded snapshots keyed by server name.
///
/// # Example
///
/// ```rust
/// use lockguard_core::{Connector, SnapshotConnector};
/// use lockguard_registry::{ServerConfig, ServerSnapshot};
/// use std::time::Duration;
///
/// let connector = SnapshotConnector::new().with_snapshot("fs", ServerSnapshot::default());
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let snapshot = rt.block_on(connector.connect(
///     "fs",
///     &ServerConfig::stdio("fs-server", &[]),
///     Duration::from_secs(1),
/// ));
/// assert!(snapshot.is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SnapshotConnector {
    snapshots: BTreeMap<String, ServerSnapshot>,
}

impl SnapshotConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshots(snapshots: BTreeMap<String, ServerSnapshot>) -> Self {
        Self { snapshots }
    }

    pub fn with_snapshot(mut self, server: impl Into<String>, snapshot: ServerSnapshot) -> Self {
        self.snapshots.insert(server.into(), snapshot);
        self
    }
}

#[async_trait]
impl Connector for SnapshotConnector {
    async fn connect(
        &self,
        server_name: &str,
        _config: &ServerConfig,
        _timeout: Duration,
    ) -> Result<ServerSnapshot, ConnectError> {
        self.snapshots
            .get(server_name)
            .cloned()
            .ok_or_else(|| ConnectError::Failed(format!("no recorded snapshot for '{}'", server_name)))
    }
}

/// Connects to every server concurrently, one task per server.
///
/// Each call is wrapped in [`tokio::time::timeout`]. Failures, timeouts and
/// panicking connector tasks become [`ServerError`]s; successful snapshots
/// are returned keyed by server name. There are no retries.
pub async fn observe_servers(
    connector: Arc<dyn Connector>,
    servers: &BTreeMap<String, ServerConfig>,
    timeout: Duration,
) -> (BTreeMap<String, ServerSnapshot>, Vec<ServerError>) {
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

    let handles: Vec<_> = servers
        .iter()
        .map(|(name, config)| {
            let connector = Arc::clone(&connector);
            let task_name = name.clone();
            let config = config.clone();
            let handle = tokio::spawn(async move {
                match tokio::time::timeout(timeout, connector.connect(&task_name, &config, timeout)).await {
                    Ok(result) => result,
                    Err(_) => Err(ConnectError::Timeout { timeout_ms }),
                }
            });
            (name.clone(), handle)
        })
        .collect();

    let mut snapshots = BTreeMap::new();
    let mut errors = Vec::new();

    for (name, handle) in handles {
        let outcome = match handle.await {
            Ok(result) => result,
            Err(join) => Err(ConnectError::Failed(format!("connector task failed: {}", join))),
        };
        match outcome {
            Ok(snapshot) => {
                debug!(server = %name, tools = snapshot.tools.len(), "observed server");
                snapshots.insert(name, snapshot);
            }
            Err(e) => {
                warn!(server = %name, error = %e, "server unavailable");
                errors.push(ServerError {
                    server: name,
                    message: e.to_string(),
                });
            }
        }
    }

    (snapshots, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockguard_registry::ToolDefinition;

    struct SlowConnector;

    #[async_trait]
    impl Connector for SlowConnector {
        async fn connect(
            &self,
            server_name: &str,
            _config: &ServerConfig,
            _timeout: Duration,
        ) -> Result<ServerSnapshot, ConnectError> {
            if server_name == "slow" {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if server_name == "broken" {
                panic!("transport bug");
            }
            Ok(ServerSnapshot::with_tools(vec![ToolDefinition::new("t", "Tool")]))
        }
    }

    fn servers(names: &[&str]) -> BTreeMap<String, ServerConfig> {
        names
            .iter()
            .map(|n| (n.to_string(), ServerConfig::stdio("srv", &[])))
            .collect()
    }

    #[tokio::test]
    async fn test_timeout_isolated_per_server() {
        let (snapshots, errors) = observe_servers(
            Arc::new(SlowConnector),
            &servers(&["fast", "slow"]),
            Duration::from_millis(50),
        )
        .await;

        assert!(snapshots.contains_key("fast"));
        assert!(!snapshots.contains_key("slow"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].server, "slow");
        assert!(errors[0].message.contains("timed out after 50 ms"));
    }

    #[tokio::test]
    async fn test_panicking_connector_becomes_error() {
        let (snapshots, errors) = observe_servers(
            Arc::new(SlowConnector),
            &servers(&["broken", "fine"]),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(snapshots.len(), 1);
        assert_eq!(errors[0].server, "broken");
    }

    #[tokio::test]
    async fn test_snapshot_connector_missing_server() {
        let connector = SnapshotConnector::new().with_snapshot("known", ServerSnapshot::default());
        let (snapshots, errors) = observe_servers(
            Arc::new(connector),
            &servers(&["known", "unknown"]),
            Duration::from_secs(1),
        )
        .await;

        assert!(snapshots.contains_key("known"));
        assert_eq!(errors[0].server, "unknown");
        assert!(errors[0].message.contains("no recorded snapshot"));
    }
}
