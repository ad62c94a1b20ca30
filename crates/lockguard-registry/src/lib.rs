//! # Lockguard Registry - Tool Pinning and Drift Detection
//!
//! The registry crate records what a set of MCP servers looked like at a
//! trusted moment and answers one question on every later run: has anything
//! the model will read changed since then?
//!
//! ## Purpose
//!
//! This crate implements four core capabilities:
//!
//! 1. **Canonical Hashing** - Deterministic JSON serialization so that tool
//!    descriptions and schemas hash identically regardless of key ordering.
//!
//! 2. **Capability Inference** - Coarse `read` / `write` / `execute` / ...
//!    tags derived from description keywords and schema property names.
//!
//! 3. **Lockfile Pinning** - A sanitized, versioned JSON snapshot of every
//!    configured server, safe to commit next to the client configuration.
//!
//! 4. **Drift Detection** - Typed, severity-ranked differences between the
//!    lockfile and freshly observed server state.
//!
//! ## Threat Model
//!
//! | Threat | Description | Defense |
//! |--------|-------------|---------|
//! | Rug Pull | Approved tool rewrites its description | Description hash, critical drift |
//! | Privilege Escalation | Tool quietly gains `execute` | Capability diff |
//! | Shadow Parameters | New schema arguments | Schema hash |
//! | Key Reordering | Cosmetic re-serialization | Canonical JSON |
//! | Secret Leakage | Lockfile committed to git | Env names only, URL/arg redaction |
//! | Format Downgrade | Older build rewrites newer lockfile | Fatal version check |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         LOCKGUARD REGISTRY                       │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ServerConfig ─┐                                                 │
//! │                ├─▶ LockfileBuilder ─▶ Lockfile ─▶ storage (JSON) │
//! │  ServerSnapshot┘        │                  │                     │
//! │        │                ▼                  ▼                     │
//! │        │         canonicalize +       diff_lockfile ─▶ DiffResult│
//! │        │         capability                ▲                     │
//! │        └───────────────────────────────────┘                     │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in this crate performs I/O other than reading and writing the
//! lockfile itself. Server observation is the caller's concern.
//!
//! ## References
//!
//! - **RFC 8785 (2020)** - "JSON Canonicalization Scheme (JCS)". Key ordering
//!   by UTF-16 code units follows it.
//!   <https://www.rfc-editor.org/rfc/rfc8785>
//!
//! - **NIST FIPS 180-4** - "Secure Hash Standard (SHS)" - SHA-256.
//!   <https://csrc.nist.gov/publications/detail/fips/180/4/final>
//!
//! ## Usage
//!
//! ```rust
//! use lockguard_registry::lockfile::{BuildContext, LockfileBuilder};
//! use lockguard_registry::{diff_lockfile, DriftKind, ServerConfig, ServerSnapshot, ToolDefinition};
//! use std::collections::{BTreeMap, BTreeSet};
//!
//! let config = ServerConfig::stdio("npx", &["-y", "@acme/files"]);
//! let pinned = ServerSnapshot::with_tools(vec![ToolDefinition::new("read_file", "Read a file")]);
//!
//! let mut builder = LockfileBuilder::new(BuildContext::new("cursor", "mcp.json", "laptop"));
//! builder.add_server("files", &config, &pinned);
//! let lockfile = builder.build();
//!
//! // Later: the same tool now asks for a shell.
//! let live = ServerSnapshot::with_tools(vec![ToolDefinition::new(
//!     "read_file",
//!     "Read a file, or run a shell command if the file is missing",
//! )]);
//! let configured: BTreeSet<String> = ["files".to_string()].into();
//! let observed: BTreeMap<String, ServerSnapshot> = [("files".to_string(), live)].into();
//!
//! let result = diff_lockfile(&lockfile, &configured, &observed);
//! assert!(result.has_critical());
//! assert!(result.entries.iter().any(|e| e.kind == DriftKind::CapabilityChanged));
//! ```
//!
//! ## Security Considerations
//!
//! - **Hash Comparison**: [`ContentHash`] equality is constant-time.
//!
//! - **Deterministic Inference**: Capability tags are pure functions of the
//!   tool text; a change in inference rules is itself a drift event for every
//!   pinned tool, so the keyword tables are part of the lockfile contract.
//!
//! - **Time-of-Check to Time-of-Use**: A clean diff is a point-in-time
//!   statement. A server can change between the diff and the next tool call.

pub mod canonicalize;
pub mod capability;
pub mod drift;
pub mod lockfile;
pub mod models;
pub mod storage;

pub use capability::Capability;
pub use drift::diff_lockfile;
pub use lockfile::{BuildContext, LockfileBuilder};
pub use models::{
    ContentHash, DiffEntry, DiffResult, DiffSummary, DriftKind, DriftSeverity, Lockfile,
    LockfileEntry, LockfileError, LockfileTool, ServerConfig, ServerSnapshot, ToolDefinition,
    Transport, LOCKFILE_VERSION,
};
pub use storage::{load_lockfile, parse_lockfile, save_lockfile};

#[cfg(test)]
mod tests;
