//! # Lockfile Builder
//!
//! Turns observed server state into an immutable [`Lockfile`] snapshot. The
//! builder is the only place where live configuration is reduced to what may
//! safely be written to disk and committed to a repository.
//!
//! ## Threat Model
//!
//! The builder defends against:
//!
//! - **Secret Persistence**: Environment values never reach the lockfile, only
//!   their names. URL credentials, secret-looking query parameters and
//!   `--token`-style arguments are replaced with `REDACTED`.
//!
//! - **Host Fingerprinting**: Home-directory prefixes are rewritten to `~` so
//!   a committed lockfile does not reveal user names or directory layout.
//!
//! ## What Gets Pinned
//!
//! | Field | Source | Transformation |
//! |-------|--------|----------------|
//! | transport | config | copied |
//! | command / args / url | config | sanitized |
//! | envKeys | config | names only, sorted |
//! | versions | snapshot | copied |
//! | tools | snapshot | hashes + capabilities |
//! | toolCount | snapshot | `tools.len()` |

use crate::models::{
    Lockfile, LockfileEntry, LockfileTool, ServerConfig, ServerSnapshot, LOCKFILE_VERSION,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// Replacement text for elided secrets.
pub const REDACTED: &str = "REDACTED";

/// Identifies the generator in every lockfile.
pub const GENERATED_BY: &str = concat!("lockguard ", env!("CARGO_PKG_VERSION"));

static SECRET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(secret|token|passw(or)?d|api[_-]?key|private[_-]?key|access[_-]?key|credential|auth|signature|^key$|_key$|-key$)")
        .expect("secret-name pattern is valid")
});

/// Returns true if a variable, flag or parameter name looks like it holds a secret.
///
/// ```rust
/// use lockguard_registry::lockfile::is_secret_name;
///
/// assert!(is_secret_name("GITHUB_TOKEN"));
/// assert!(is_secret_name("--api-key"));
/// assert!(!is_secret_name("LOG_LEVEL"));
/// ```
pub fn is_secret_name(name: &str) -> bool {
    SECRET_NAME.is_match(name)
}

/// Everything about a pin run that does not come from a server.
///
/// Passed in explicitly so that the builder never consults the process
/// environment.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Client identifier of the originating configuration.
    pub client: String,

    /// Path of the originating configuration.
    pub config_path: String,

    /// Host the lockfile is generated on.
    pub host: String,

    /// Home directory to collapse to `~`.
    pub home_dir: Option<PathBuf>,

    /// Generation timestamp.
    pub generated_at: DateTime<Utc>,
}

impl BuildContext {
    /// Creates a context stamped with the current time.
    pub fn new(client: impl Into<String>, config_path: impl Into<String>, host: impl Into<String>) -> Self {
        BuildContext {
            client: client.into(),
            config_path: config_path.into(),
            host: host.into(),
            home_dir: None,
            generated_at: Utc::now(),
        }
    }

    /// Sets the home directory, builder style.
    pub fn with_home_dir(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home.into());
        self
    }
}

/// Accumulates pinned servers and produces a [`Lockfile`].
///
/// # Example
///
/// ```rust
/// use lockguard_registry::lockfile::{BuildContext, LockfileBuilder};
/// use lockguard_registry::{ServerConfig, ServerSnapshot, ToolDefinition};
///
/// let context = BuildContext::new("claude-desktop", "/home/me/config.json", "laptop")
///     .with_home_dir("/home/me");
///
/// let config = ServerConfig::stdio("npx", &["-y", "@acme/files@1.2.0"])
///     .with_env("ACME_TOKEN", "s3cr3t");
/// let snapshot = ServerSnapshot::with_tools(vec![ToolDefinition::new("read_file", "Read a file")]);
///
/// let mut builder = LockfileBuilder::new(context);
/// builder.add_server("files", &config, &snapshot);
/// let lockfile = builder.build();
///
/// let entry = &lockfile.servers["files"];
/// assert_eq!(entry.env_keys, vec!["ACME_TOKEN".to_string()]);
/// assert_eq!(lockfile.config_path, "~/config.json");
/// ```
#[derive(Debug)]
pub struct LockfileBuilder {
    context: BuildContext,
    servers: BTreeMap<String, LockfileEntry>,
}

impl LockfileBuilder {
    /// Creates an empty builder.
    pub fn new(context: BuildContext) -> Self {
        LockfileBuilder {
            context,
            servers: BTreeMap::new(),
        }
    }

    /// Pins one server from its configuration and observed snapshot.
    ///
    /// Adding the same name twice replaces the earlier entry.
    pub fn add_server(
        &mut self,
        name: &str,
        config: &ServerConfig,
        snapshot: &ServerSnapshot,
    ) -> &mut Self {
        let entry = pin_server(config, snapshot, self.context.home_dir.as_deref());
        debug!(server = name, tools = entry.tool_count, "pinned server");
        self.servers.insert(name.to_string(), entry);
        self
    }

    /// Number of servers pinned so far.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Returns true if nothing has been pinned.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Finalizes the lockfile.
    pub fn build(self) -> Lockfile {
        let home = self.context.home_dir.as_deref();
        Lockfile {
            version: LOCKFILE_VERSION,
            generated_at: self.context.generated_at,
            generated_by: GENERATED_BY.to_string(),
            host: self.context.host,
            client: self.context.client,
            config_path: sanitize_path(&self.context.config_path, home),
            servers: self.servers,
        }
    }
}

/// Builds the lockfile entry for one server.
pub fn pin_server(config: &ServerConfig, snapshot: &ServerSnapshot, home: Option<&Path>) -> LockfileEntry {
    let tools = snapshot
        .tools
        .iter()
        .map(|tool| (tool.name.clone(), LockfileTool::from_tool(tool)))
        .collect();

    LockfileEntry {
        transport: config.transport,
        command: config.command.as_deref().map(|c| sanitize_path(c, home)),
        args: sanitize_args(&config.args, home),
        url: config.url.as_deref().map(sanitize_url),
        env_keys: config.env.keys().cloned().collect(),
        protocol_version: snapshot.protocol_version.clone(),
        server_name: snapshot.server_name.clone(),
        server_version: snapshot.server_version.clone(),
        tools,
        tool_count: snapshot.tools.len(),
    }
}

/// Rewrites every occurrence of the home directory to `~`.
///
/// Only whole path components are replaced: with home `/home/me`,
/// `/home/me/x` becomes `~/x` but `/home/meg` is left alone.
pub fn sanitize_path(value: &str, home: Option<&Path>) -> String {
    let Some(home) = home.and_then(Path::to_str) else {
        return value.to_string();
    };
    let home = home.trim_end_matches(['/', '\\']);
    if home.is_empty() {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(idx) = rest.find(home) {
        let after = &rest[idx + home.len()..];
        let boundary = after.is_empty() || after.starts_with('/') || after.starts_with('\\');
        out.push_str(&rest[..idx]);
        out.push_str(if boundary { "~" } else { home });
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Redacts secret-bearing arguments and collapses home paths.
///
/// `--token=abc` becomes `--token=REDACTED`; in `--token abc` the value
/// following the flag is redacted; `Bearer` credentials are redacted wherever
/// they appear.
pub fn sanitize_args(args: &[String], home: Option<&Path>) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut redact_next = false;

    for arg in args {
        if redact_next {
            out.push(REDACTED.to_string());
            redact_next = false;
            continue;
        }
        if arg.to_lowercase().contains("bearer ") {
            out.push(REDACTED.to_string());
            continue;
        }
        if arg.starts_with('-') {
            match arg.split_once('=') {
                Some((flag, _)) if is_secret_name(flag) => {
                    out.push(format!("{}={}", flag, REDACTED));
                    continue;
                }
                None if is_secret_name(arg) => redact_next = true,
                _ => {}
            }
        }
        out.push(sanitize_path(arg, home));
    }

    out
}

/// Strips credentials from a URL.
///
/// Userinfo is removed and secret-looking query parameter values are
/// replaced. Strings that do not parse as URLs are returned unchanged.
pub fn sanitize_url(raw: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(raw) else {
        return raw.to_string();
    };

    if !parsed.username().is_empty() || parsed.password().is_some() {
        let _ = parsed.set_username("");
        let _ = parsed.set_password(None);
    }

    let has_secret = parsed.query_pairs().any(|(k, _)| is_secret_name(&k));
    if has_secret {
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| {
                let value = if is_secret_name(&k) {
                    REDACTED.to_string()
                } else {
                    v.into_owned()
                };
                (k.into_owned(), value)
            })
            .collect();
        parsed.query_pairs_mut().clear().extend_pairs(pairs);
    }

    parsed.to_string()
}
