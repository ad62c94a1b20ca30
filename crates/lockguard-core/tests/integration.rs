//! # Lockguard Integration Tests
//!
//! End-to-end runs of the facade through recorded and scripted connectors.
//!
//! ## Coverage
//!
//! | Behaviour | Test |
//! |-----------|------|
//! | Pin, persist, reload, diff clean | `test_pin_save_load_diff_clean` |
//! | Failed server left out of lockfile | `test_failed_server_omitted_from_lockfile` |
//! | Slow server times out alone | `test_timeout_does_not_block_others` |
//! | Unreachable server is not "unchanged" | `test_diff_unreachable_server_reports_error_only` |
//! | Added server is never contacted by diff | `test_diff_does_not_contact_unpinned_servers` |
//! | Offline scan | `test_offline_scan_runs_config_rules_only` |
//! | Custom rules file | `test_custom_rules_file_loaded_per_scan` |
//! | Malformed custom rules | `test_malformed_custom_rules_fail_scan` |

use async_trait::async_trait;
use lockguard_core::{
    ClientConfig, ConnectError, Connector, DriftKind, GuardConfig, GuardError, Lockguard,
    ServerConfig, ServerSnapshot, SnapshotConnector, ToolDefinition,
};
use lockguard_registry::{load_lockfile, save_lockfile};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// =============================================================================
// Helpers
// =============================================================================

fn files_tool() -> ToolDefinition {
    ToolDefinition::new("read_file", "Read a file from the workspace").with_schema(json!({
        "type": "object",
        "properties": {"path": {"type": "string", "pattern": "^[^.]"}},
        "required": ["path"],
        "additionalProperties": false
    }))
}

fn docs_tool() -> ToolDefinition {
    ToolDefinition::new("search_docs", "Search the documentation").with_schema(json!({
        "type": "object",
        "properties": {"query": {"type": "string"}},
        "additionalProperties": false
    }))
}

fn client() -> ClientConfig {
    ClientConfig::new("claude-desktop", "/home/dev/.config/claude/config.json")
        .with_server("docs", ServerConfig::stdio("npx", &["-y", "@acme/docs-mcp@2.1.0"]))
        .with_server(
            "files",
            ServerConfig::stdio("/home/dev/bin/files-server", &["--root", "/home/dev/work"])
                .with_env("FILES_TOKEN", "tok_live_abcdef"),
        )
}

fn recorded() -> SnapshotConnector {
    SnapshotConnector::new()
        .with_snapshot("docs", ServerSnapshot::with_tools(vec![docs_tool()]))
        .with_snapshot("files", ServerSnapshot::with_tools(vec![files_tool()]))
}

fn guard(connector: impl Connector + 'static, config: GuardConfig) -> Lockguard {
    Lockguard::new(Arc::new(connector), config).unwrap()
}

/// Records which servers were contacted, then answers from a recording.
struct RecordingConnector {
    inner: SnapshotConnector,
    contacted: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn connect(
        &self,
        server_name: &str,
        config: &ServerConfig,
        timeout: Duration,
    ) -> Result<ServerSnapshot, ConnectError> {
        self.contacted.lock().unwrap().push(server_name.to_string());
        self.inner.connect(server_name, config, timeout).await
    }
}

/// Never answers for servers named `slow`.
struct StallingConnector {
    inner: SnapshotConnector,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Connector for StallingConnector {
    async fn connect(
        &self,
        server_name: &str,
        config: &ServerConfig,
        timeout: Duration,
    ) -> Result<ServerSnapshot, ConnectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if server_name == "slow" {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        self.inner.connect(server_name, config, timeout).await
    }
}

// =============================================================================
// Lockfile and drift
// =============================================================================

#[tokio::test]
async fn test_pin_save_load_diff_clean() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("mcp.lock.json");
    let guard = guard(
        recorded(),
        GuardConfig::default().with_host("ci").with_home_dir("/home/dev"),
    );

    let (lockfile, errors) = guard.build_lockfile(&client()).await;
    assert!(errors.is_empty());
    assert_eq!(lockfile.servers.len(), 2);
    assert_eq!(lockfile.config_path, "~/.config/claude/config.json");
    assert_eq!(lockfile.servers["files"].env_keys, vec!["FILES_TOKEN".to_string()]);

    save_lockfile(&path, &lockfile).unwrap();
    let on_disk = std::fs::read_to_string(&path).unwrap();
    assert!(!on_disk.contains("tok_live_abcdef"));
    assert!(!on_disk.contains("/home/dev/"));

    let reloaded = load_lockfile(&path).unwrap();
    let (diff, errors) = guard.diff(&reloaded, &client()).await;
    assert!(errors.is_empty());
    assert!(!diff.drifted, "{:#?}", diff.entries);
    assert_eq!(diff.summary.total(), 0);
}

#[tokio::test]
async fn test_failed_server_omitted_from_lockfile() {
    let connector = SnapshotConnector::new()
        .with_snapshot("docs", ServerSnapshot::with_tools(vec![docs_tool()]));
    let guard = guard(connector, GuardConfig::default());

    let (lockfile, errors) = guard.build_lockfile(&client()).await;

    assert_eq!(lockfile.servers.keys().collect::<Vec<_>>(), vec!["docs"]);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].server, "files");
}

#[tokio::test]
async fn test_timeout_does_not_block_others() {
    let calls = Arc::new(AtomicUsize::new(0));
    let connector = StallingConnector {
        inner: recorded(),
        calls: Arc::clone(&calls),
    };
    let guard = guard(connector, GuardConfig::default().with_timeout_ms(100));
    let client = client().with_server("slow", ServerConfig::stdio("slow-server", &[]));

    let started = std::time::Instant::now();
    let (lockfile, errors) = guard.build_lockfile(&client).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(lockfile.servers.len(), 2);
    assert!(!lockfile.servers.contains_key("slow"));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].server, "slow");
    assert!(errors[0].message.contains("timed out"));
}

#[tokio::test]
async fn test_diff_unreachable_server_reports_error_only() {
    let (baseline, _) = guard(recorded(), GuardConfig::default())
        .build_lockfile(&client())
        .await;

    let partial = SnapshotConnector::new()
        .with_snapshot("docs", ServerSnapshot::with_tools(vec![docs_tool()]));
    let (diff, errors) = guard(partial, GuardConfig::default())
        .diff(&baseline, &client())
        .await;

    assert!(!diff.drifted);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].server, "files");
}

#[tokio::test]
async fn test_diff_does_not_contact_unpinned_servers() {
    let (baseline, _) = guard(recorded(), GuardConfig::default())
        .build_lockfile(&client())
        .await;

    let contacted = Arc::new(Mutex::new(Vec::new()));
    let connector = RecordingConnector {
        inner: recorded(),
        contacted: Arc::clone(&contacted),
    };
    let grown = client().with_server("extra", ServerConfig::stdio("extra-server", &[]));
    let (diff, errors) = guard(connector, GuardConfig::default())
        .diff(&baseline, &grown)
        .await;

    assert!(errors.is_empty());
    assert_eq!(diff.entries.len(), 1);
    assert_eq!(diff.entries[0].kind, DriftKind::ServerAdded);
    assert_eq!(diff.entries[0].server, "extra");

    let mut seen = contacted.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["docs".to_string(), "files".to_string()]);
}

// =============================================================================
// Scanning
// =============================================================================

#[tokio::test]
async fn test_offline_scan_runs_config_rules_only() {
    let contacted = Arc::new(Mutex::new(Vec::new()));
    let connector = RecordingConnector {
        inner: recorded(),
        contacted: Arc::clone(&contacted),
    };
    let client = client().with_server(
        "shell",
        ServerConfig::stdio("bash", &["-c", "node server.js"]),
    );

    let (report, errors) = guard(connector, GuardConfig::default().with_host("ci"))
        .scan(&client)
        .await
        .unwrap();
    assert!(!contacted.lock().unwrap().is_empty());
    assert!(errors.iter().any(|e| e.server == "shell"));
    assert_eq!(report.tools_scanned, 2);

    contacted.lock().unwrap().clear();
    let mut offline_config = GuardConfig::default();
    offline_config.offline = true;
    let connector = RecordingConnector {
        inner: recorded(),
        contacted: Arc::clone(&contacted),
    };

    let (report, errors) = guard(connector, offline_config).scan(&client).await.unwrap();

    assert!(contacted.lock().unwrap().is_empty());
    assert!(errors.is_empty());
    assert_eq!(report.servers_scanned, 3);
    assert_eq!(report.tools_scanned, 0);
    assert!(report.by_rule("shell-command").next().is_some());
    assert!(report.by_rule("hardcoded-secret").next().is_some());
}

#[tokio::test]
async fn test_custom_rules_file_loaded_per_scan() {
    let temp_dir = TempDir::new().unwrap();
    let rules_path = temp_dir.path().join("rules.json");
    std::fs::write(
        &rules_path,
        json!({"rules": [{
            "id": "no-doc-search",
            "scope": "tool",
            "severity": "low",
            "title": "Docs search on {server}",
            "detail": "{tool} is not allowed here",
            "match": {"name": "^search_"}
        }]})
        .to_string(),
    )
    .unwrap();

    let guard = guard(recorded(), GuardConfig::default().with_custom_rules(&rules_path));
    let (report, _) = guard.scan(&client()).await.unwrap();

    let custom: Vec<_> = report.by_rule("no-doc-search").collect();
    assert_eq!(custom.len(), 1);
    assert_eq!(custom[0].title, "Docs search on docs");
    assert_eq!(custom[0].tool.as_deref(), Some("search_docs"));

    std::fs::write(&rules_path, r#"{"rules": []}"#).unwrap();
    let (report, _) = guard.scan(&client()).await.unwrap();
    assert!(report.by_rule("no-doc-search").next().is_none());
}

#[tokio::test]
async fn test_malformed_custom_rules_fail_scan() {
    let temp_dir = TempDir::new().unwrap();

    let cases = [
        ("not-json.json", "{ rules: ".to_string()),
        (
            "reserved.json",
            json!({"rules": [{
                "id": "shell-command",
                "scope": "config",
                "severity": "low",
                "title": "t",
                "detail": "d",
                "match": {"name": "x"}
            }]})
            .to_string(),
        ),
        (
            "bad-regex.json",
            json!({"rules": [{
                "id": "broken",
                "scope": "tool",
                "severity": "low",
                "title": "t",
                "detail": "d",
                "match": {"description": "(unclosed"}
            }]})
            .to_string(),
        ),
    ];

    for (file, body) in &cases {
        let path = temp_dir.path().join(file);
        std::fs::write(&path, body).unwrap();
        let result = guard(recorded(), GuardConfig::default().with_custom_rules(&path))
            .scan(&client())
            .await;
        assert!(matches!(result, Err(GuardError::Scan(_))), "{} accepted", file);
    }

    let missing = guard(
        recorded(),
        GuardConfig::default().with_custom_rules(temp_dir.path().join("absent.json")),
    )
    .scan(&client())
    .await;
    assert!(matches!(missing, Err(GuardError::Scan(_))));
}
