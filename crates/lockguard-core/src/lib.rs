//! # Lockguard Core
//!
//! Integrity facade for Model Context Protocol server deployments.
//! Observes configured servers, pins them to a lockfile, detects drift
//! against that lockfile and runs the security rule engine.
//!
//! ## Threat Coverage
//!
//! | Operation | Component | Threats Surfaced |
//! |-----------|-----------|------------------|
//! | `build_lockfile` | Registry | Baseline for rug-pull detection |
//! | `diff` | Registry | Rug pulls, capability escalation, silent upgrades |
//! | `scan` | Scanner | Tool poisoning, shadowing, homoglyphs, risky configs |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       LOCKGUARD CORE                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   ClientConfig ──▶ ┌─────────────────┐ ◀── dyn Connector        │
//! │                    │    Lockguard    │     (one task/server,    │
//! │                    │     facade      │      bounded timeout)    │
//! │                    └────────┬────────┘                          │
//! │                             │ ServerSnapshots                   │
//! │         ┌───────────────────┼───────────────────┐               │
//! │         ▼                   ▼                   ▼               │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐          │
//! │  │  Lockfile   │    │   Drift     │    │    Rule     │          │
//! │  │  Builder    │    │   Differ    │    │   Scanner   │          │
//! │  └─────────────┘    └─────────────┘    └─────────────┘          │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lockguard_core::{GuardConfig, Lockguard};
//!
//! let guard = Lockguard::new(connector, GuardConfig::default())?;
//!
//! let (lockfile, _) = guard.build_lockfile(&client).await;
//! save_lockfile("mcp.lock.json", &lockfile)?;
//!
//! // Later
//! let (diff, unreachable) = guard.diff(&lockfile, &client).await;
//! if diff.has_critical() {
//!     alert(diff.entries);
//! }
//! ```
//!
//! ## Security Notes
//!
//! - A server that cannot be reached is reported, never treated as unchanged
//! - One slow or failing server never blocks or aborts the others
//! - Environment values never reach a lockfile, a finding or a log line
//! - The engine reads no process environment; all settings are explicit

mod config;
mod connector;
mod error;
mod guard;

pub use config::{ClientConfig, GuardConfig, DEFAULT_TIMEOUT_MS};
pub use connector::{observe_servers, Connector, ServerError, SnapshotConnector};
pub use error::{ConnectError, GuardError};
pub use guard::Lockguard;

// Re-export component types for convenience
pub use lockguard_registry::{
    DiffEntry, DiffResult, DriftKind, DriftSeverity, Lockfile, ServerConfig, ServerSnapshot,
    ToolDefinition, Transport,
};
pub use lockguard_scanner::{Finding, RuleFailure, ScanReport, Severity};

/// Core result type for facade operations.
pub type Result<T> = std::result::Result<T, GuardError>;
