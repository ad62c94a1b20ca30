//! # Core Data Models for Lockfile Guard
//!
//! This module defines the fundamental types used throughout the Lockfile Guard:
//! the observed server and tool shapes handed to us by a connector, the pinned
//! lockfile snapshot, and the drift records produced when the two disagree.
//!
//! ## Threat Model
//!
//! The types in this module help defend against:
//!
//! - **Type Confusion**: `ContentHash` keeps fingerprints apart from free text and
//!   compares in constant time.
//! - **Secret Leakage**: `LockfileEntry` has no field capable of holding an
//!   environment value, only the variable names.
//! - **Ambiguous Drift**: `DriftKind` is a closed taxonomy and every kind maps to
//!   exactly one `DriftSeverity`.
//!
//! ## References
//!
//! - MCP `tools/list` result shape (`name`, `description`, `inputSchema`)
//! - NIST FIPS 180-4 for the SHA-256 digest size

use crate::canonicalize::{constant_time_eq, hash_str, hash_value};
use crate::capability::{infer_capabilities, Capability};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Prefix carried by every content hash.
pub const HASH_PREFIX: &str = "sha256:";

/// Newest lockfile format this crate can read and the one it writes.
pub const LOCKFILE_VERSION: u32 = 1;

/// A `sha256:<hex>` fingerprint of canonical JSON content.
///
/// Equality is evaluated with [`constant_time_eq`] so that comparing a pinned
/// hash against a live one does not leak how many leading characters matched.
///
/// # Example
///
/// ```rust
/// use lockguard_registry::canonicalize::hash_value;
/// use serde_json::json;
///
/// let a = hash_value(&json!({"a": 1, "b": 2}));
/// let b = hash_value(&json!({"b": 2, "a": 1}));
/// assert_eq!(a, b);
/// assert!(a.as_str().starts_with("sha256:"));
/// ```
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Builds a hash from a raw SHA-256 digest.
    pub fn from_digest(digest: &[u8]) -> Self {
        ContentHash(format!("{}{}", HASH_PREFIX, hex::encode(digest)))
    }

    /// Returns the prefixed hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for ContentHash {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.0, &other.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a client reaches an MCP server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    /// Local child process speaking over stdin/stdout.
    #[default]
    Stdio,
    /// Remote server using server-sent events.
    Sse,
    /// Remote server using the streamable HTTP transport.
    StreamableHttp,
}

impl Transport {
    /// Returns true for transports that reach the server over the network.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Transport::Stdio)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stdio => write!(f, "stdio"),
            Transport::Sse => write!(f, "sse"),
            Transport::StreamableHttp => write!(f, "streamable-http"),
        }
    }
}

/// A single server entry from a normalized client configuration.
///
/// Immutable for the duration of an observation. Environment values are
/// present here because the config source provides them; they never reach the
/// lockfile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Transport used to reach the server.
    #[serde(default)]
    pub transport: Transport,

    /// Launch command for stdio servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Launch arguments for stdio servers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Endpoint for remote servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Environment passed to the server.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl ServerConfig {
    /// Creates a stdio server configuration.
    pub fn stdio(command: impl Into<String>, args: &[&str]) -> Self {
        ServerConfig {
            transport: Transport::Stdio,
            command: Some(command.into()),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Creates a remote server configuration.
    pub fn remote(transport: Transport, url: impl Into<String>) -> Self {
        ServerConfig {
            transport,
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Adds an environment variable, builder style.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// A tool as reported by a live server.
///
/// # Example
///
/// ```rust
/// use lockguard_registry::ToolDefinition;
/// use serde_json::json;
///
/// let tool = ToolDefinition::new("read_file", "Read a file from disk")
///     .with_schema(json!({"type": "object", "properties": {"path": {"type": "string"}}}));
///
/// assert!(tool.capabilities().iter().any(|c| c.as_str() == "read"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique name within the server.
    pub name: String,

    /// Natural-language description shown to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON-Schema-like description of the arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

impl ToolDefinition {
    /// Creates a tool with a description and no schema.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        ToolDefinition {
            name: name.into(),
            description: Some(description.into()),
            input_schema: None,
        }
    }

    /// Attaches an input schema, builder style.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Description text, empty when the server sent none.
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    /// Hash of the description; a missing description hashes as `""`.
    pub fn description_hash(&self) -> ContentHash {
        hash_str(self.description_text())
    }

    /// Hash of the input schema; a missing schema hashes as `{}`.
    pub fn input_schema_hash(&self) -> ContentHash {
        match &self.input_schema {
            Some(schema) => hash_value(schema),
            None => hash_value(&Value::Object(Map::new())),
        }
    }

    /// Capabilities inferred from this tool's text and schema.
    pub fn capabilities(&self) -> BTreeSet<Capability> {
        infer_capabilities(
            self.description_text(),
            &self.name,
            self.input_schema.as_ref(),
        )
    }
}

/// What a connector observed when it reached a server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSnapshot {
    /// Negotiated protocol version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,

    /// Name the server reported for itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,

    /// Version the server reported for itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,

    /// Tools returned by `tools/list`.
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
}

impl ServerSnapshot {
    /// Creates a snapshot holding only a tool list.
    pub fn with_tools(tools: Vec<ToolDefinition>) -> Self {
        ServerSnapshot {
            tools,
            ..Default::default()
        }
    }
}

/// The persisted baseline.
///
/// One lockfile pins every server of one client configuration. The `version`
/// field is checked before anything else when loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    /// Lockfile format version.
    pub version: u32,

    /// When the lockfile was generated.
    pub generated_at: DateTime<Utc>,

    /// Tool and version that generated it.
    pub generated_by: String,

    /// Host the lockfile was generated on.
    pub host: String,

    /// Client identifier of the originating configuration.
    pub client: String,

    /// Path of the originating configuration.
    pub config_path: String,

    /// Pinned servers keyed by name.
    pub servers: BTreeMap<String, LockfileEntry>,
}

/// Pinned state of one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockfileEntry {
    /// Transport at pin time.
    pub transport: Transport,

    /// Sanitized launch command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Sanitized launch arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Sanitized endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Environment variable names, sorted. Never values.
    #[serde(default)]
    pub env_keys: Vec<String>,

    /// Protocol version reported at pin time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,

    /// Server name reported at pin time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,

    /// Server version reported at pin time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,

    /// Pinned tools keyed by name.
    #[serde(default)]
    pub tools: BTreeMap<String, LockfileTool>,

    /// Number of tools at pin time.
    pub tool_count: usize,
}

/// Pinned fingerprint of one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockfileTool {
    /// Hash of the description.
    pub description_hash: ContentHash,

    /// Hash of the input schema.
    pub input_schema_hash: ContentHash,

    /// Capabilities inferred at pin time.
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
}

impl LockfileTool {
    /// Fingerprints a live tool.
    pub fn from_tool(tool: &ToolDefinition) -> Self {
        LockfileTool {
            description_hash: tool.description_hash(),
            input_schema_hash: tool.input_schema_hash(),
            capabilities: tool.capabilities(),
        }
    }
}

/// Severity of a drift record.
///
/// Distinct from the scanner's finding severity: drift is graded on a
/// three-step scale and pass/fail policy is left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftSeverity {
    /// Informational, e.g. a version bump.
    Info,
    /// Visible change that needs a re-pin.
    Warning,
    /// Likely rug pull or privilege escalation.
    Critical,
}

impl fmt::Display for DriftSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftSeverity::Info => write!(f, "info"),
            DriftSeverity::Warning => write!(f, "warning"),
            DriftSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Closed taxonomy of drift.
///
/// | Kind | Severity |
/// |------|----------|
/// | `server-added` / `server-removed` | warning |
/// | `tool-added` / `tool-removed` | warning |
/// | `tool-count-changed` | warning |
/// | `schema-changed` | warning |
/// | `version-changed` | info |
/// | `description-changed` | critical |
/// | `capability-changed` | critical |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriftKind {
    ServerAdded,
    ServerRemoved,
    ToolAdded,
    ToolRemoved,
    DescriptionChanged,
    SchemaChanged,
    CapabilityChanged,
    VersionChanged,
    ToolCountChanged,
}

impl DriftKind {
    /// The fixed severity attached to this kind.
    pub fn severity(&self) -> DriftSeverity {
        match self {
            DriftKind::DescriptionChanged | DriftKind::CapabilityChanged => {
                DriftSeverity::Critical
            }
            DriftKind::VersionChanged => DriftSeverity::Info,
            DriftKind::ServerAdded
            | DriftKind::ServerRemoved
            | DriftKind::ToolAdded
            | DriftKind::ToolRemoved
            | DriftKind::SchemaChanged
            | DriftKind::ToolCountChanged => DriftSeverity::Warning,
        }
    }
}

impl fmt::Display for DriftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriftKind::ServerAdded => "server-added",
            DriftKind::ServerRemoved => "server-removed",
            DriftKind::ToolAdded => "tool-added",
            DriftKind::ToolRemoved => "tool-removed",
            DriftKind::DescriptionChanged => "description-changed",
            DriftKind::SchemaChanged => "schema-changed",
            DriftKind::CapabilityChanged => "capability-changed",
            DriftKind::VersionChanged => "version-changed",
            DriftKind::ToolCountChanged => "tool-count-changed",
        };
        f.write_str(s)
    }
}

/// A single difference between the baseline and the live state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffEntry {
    /// Server the change belongs to.
    pub server: String,

    /// Tool the change belongs to, if tool-level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// What changed.
    #[serde(rename = "type")]
    pub kind: DriftKind,

    /// How bad it is.
    pub severity: DriftSeverity,

    /// Human-readable explanation.
    pub detail: String,

    /// Pinned value, where one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,

    /// Live value, where one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
}

/// Count of diff entries per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub info: usize,
    pub warning: usize,
    pub critical: usize,
}

impl DiffSummary {
    /// Tallies one entry.
    pub fn record(&mut self, severity: DriftSeverity) {
        match severity {
            DriftSeverity::Info => self.info += 1,
            DriftSeverity::Warning => self.warning += 1,
            DriftSeverity::Critical => self.critical += 1,
        }
    }

    /// Total number of entries tallied.
    pub fn total(&self) -> usize {
        self.info + self.warning + self.critical
    }
}

/// Outcome of comparing a lockfile against live state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// True when at least one entry was produced.
    pub drifted: bool,

    /// Entries in detection order.
    pub entries: Vec<DiffEntry>,

    /// Tally by severity.
    pub summary: DiffSummary,
}

impl DiffResult {
    /// Highest severity present, if any.
    pub fn max_severity(&self) -> Option<DriftSeverity> {
        self.entries.iter().map(|e| e.severity).max()
    }

    /// Returns true if any entry is critical.
    pub fn has_critical(&self) -> bool {
        self.summary.critical > 0
    }
}

/// Errors that can occur while reading or writing a lockfile.
///
/// `NotFound` and `Invalid` are recoverable: the caller may re-pin.
/// `UnsupportedVersion` is not; silently rewriting a newer lockfile would
/// discard whatever the newer format records.
#[derive(Debug, Error)]
pub enum LockfileError {
    /// No lockfile exists at the given path.
    #[error("Lockfile not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The lockfile could not be parsed or has the wrong shape.
    #[error("Invalid lockfile: {0}")]
    Invalid(String),

    /// The lockfile was written by a newer format version.
    #[error("Lockfile version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found in the file.
        found: u64,
        /// Newest version this build understands.
        supported: u32,
    },

    /// Reading or writing failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize the lockfile.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LockfileError {
    /// Returns true if re-pinning is an acceptable response.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LockfileError::NotFound(_) | LockfileError::Invalid(_))
    }
}

/// Result type for lockfile operations.
pub type Result<T> = std::result::Result<T, LockfileError>;
