//! MCP Lockguard CLI - pin, diff and scan MCP server deployments

use anyhow::Context;
use clap::Parser;
use lockguard_core::{
    ClientConfig, GuardConfig, Lockguard, ServerError, ServerSnapshot, Severity,
    SnapshotConnector, DEFAULT_TIMEOUT_MS,
};
use lockguard_registry::{load_lockfile, save_lockfile, LockfileTool};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lockguard")]
#[command(about = "MCP Lockguard - Tool integrity for Model Context Protocol servers")]
#[command(version)]
struct Cli {
    /// Normalized client configuration (JSON)
    #[arg(short, long, global = true, default_value = "mcp-client.json")]
    config: PathBuf,

    /// Recorded server snapshots (JSON object keyed by server name)
    #[arg(short, long, global = true)]
    snapshots: Option<PathBuf>,

    /// Per-server connection timeout in milliseconds
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Pin every reachable server to a lockfile
    Pin {
        /// Lockfile path
        #[arg(short, long, default_value = "mcp.lock.json")]
        lockfile: PathBuf,

        /// Host name recorded in the lockfile (defaults to this machine's)
        #[arg(long)]
        host: Option<String>,
    },
    /// Compare live servers against a lockfile
    Diff {
        /// Lockfile path
        #[arg(short, long, default_value = "mcp.lock.json")]
        lockfile: PathBuf,

        /// Exit with status 1 when any drift is found
        #[arg(long)]
        strict: bool,
    },
    /// Run the security rules
    Scan {
        /// Drop findings below this severity
        #[arg(long, default_value = "low")]
        min_severity: Severity,

        /// Custom rules file (JSON)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Check configuration only, without contacting servers
        #[arg(long)]
        offline: bool,
    },
    /// Show the fingerprint and capabilities of every observed tool
    Inspect,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Output<'a, T: Serialize> {
    #[serde(flatten)]
    body: &'a T,
    unreachable: &'a [ServerError],
}

fn print_json<T: Serialize>(body: &T, unreachable: &[ServerError]) -> anyhow::Result<()> {
    let output = Output { body, unreachable };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_client(path: &Path) -> anyhow::Result<ClientConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading client config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing client config {}", path.display()))
}

fn read_snapshots(path: Option<&Path>) -> anyhow::Result<SnapshotConnector> {
    let Some(path) = path else {
        debug!("no snapshots given, every server will be unreachable");
        return Ok(SnapshotConnector::new());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading snapshots {}", path.display()))?;
    let snapshots: BTreeMap<String, ServerSnapshot> = serde_json::from_str(&text)
        .with_context(|| format!("parsing snapshots {}", path.display()))?;
    Ok(SnapshotConnector::from_snapshots(snapshots))
}

fn base_config(timeout_ms: u64) -> GuardConfig {
    let config = GuardConfig::default().with_timeout_ms(timeout_ms);
    match std::env::var_os("HOME") {
        Some(home) => config.with_home_dir(home),
        None => config,
    }
}

/// First non-blank candidate, trimmed.
fn first_host_name(candidates: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
}

/// This machine's host name from the usual environment variables or
/// `/etc/hostname`.
fn local_host_name() -> Option<String> {
    first_host_name([
        std::env::var("HOSTNAME").ok(),
        std::env::var("COMPUTERNAME").ok(),
        std::fs::read_to_string("/etc/hostname").ok(),
    ])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let client = read_client(&cli.config)?;
    let connector = Arc::new(read_snapshots(cli.snapshots.as_deref())?);
    let mut config = base_config(cli.timeout_ms);

    match cli.command {
        Commands::Pin { lockfile, host } => {
            if let Some(host) = host.or_else(local_host_name) {
                config = config.with_host(host);
            }
            let guard = Lockguard::new(connector, config)?;
            let (pinned, errors) = guard.build_lockfile(&client).await;
            save_lockfile(&lockfile, &pinned)
                .with_context(|| format!("writing {}", lockfile.display()))?;
            info!(path = %lockfile.display(), servers = pinned.servers.len(), "lockfile written");
            print_json(&pinned, &errors)?;
        }
        Commands::Diff { lockfile, strict } => {
            let baseline = load_lockfile(&lockfile)?;
            let guard = Lockguard::new(connector, config)?;
            let (result, errors) = guard.diff(&baseline, &client).await;
            print_json(&result, &errors)?;
            if strict && result.drifted {
                std::process::exit(1);
            }
        }
        Commands::Scan {
            min_severity,
            rules,
            offline,
        } => {
            config = config.with_min_severity(min_severity);
            if let Some(rules) = rules {
                config = config.with_custom_rules(rules);
            }
            config.offline = offline;
            let guard = Lockguard::new(connector, config)?;
            let (report, errors) = guard.scan(&client).await?;
            print_json(&report, &errors)?;
        }
        Commands::Inspect => {
            let guard = Lockguard::new(connector, config)?;
            let (observed, errors) = guard.observe(&client).await;
            let tools: BTreeMap<&str, BTreeMap<&str, LockfileTool>> = observed
                .iter()
                .map(|(server, snapshot)| {
                    let fingerprints = snapshot
                        .tools
                        .iter()
                        .map(|t| (t.name.as_str(), LockfileTool::from_tool(t)))
                        .collect();
                    (server.as_str(), fingerprints)
                })
                .collect();
            print_json(&json_object("servers", &tools)?, &errors)?;
        }
    }

    Ok(())
}

fn json_object<T: Serialize>(key: &str, value: &T) -> anyhow::Result<serde_json::Value> {
    let mut map = serde_json::Map::new();
    map.insert(key.to_string(), serde_json::to_value(value)?);
    Ok(serde_json::Value::Object(map))
}
