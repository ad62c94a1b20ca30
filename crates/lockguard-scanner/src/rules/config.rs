//! # Configuration Rules
//!
//! Checks that run once per configured server without connecting to it.
//!
//! ## Threat Model
//!
//! - **Unauthenticated Remote Servers**: Anyone who can reach the endpoint
//!   can impersonate or tamper with it.
//! - **Shell Launchers**: `bash -c "..."` hides the real command line from
//!   review and runs with the user's full privileges.
//! - **Hardcoded Secrets**: Literal credentials in a config file end up in
//!   backups, dotfile repos and screenshots.
//! - **Plaintext Transport**: `http://` to a remote host exposes tool traffic.
//! - **Floating Packages**: `npx some-server` runs whatever was published last.

use crate::models::{Finding, RuleContext, Severity};
use lockguard_registry::lockfile::is_secret_name;
use lockguard_registry::ServerConfig;
use regex::Regex;
use std::sync::LazyLock;
use url::{Host, Url};

pub const REMOTE_NO_AUTH: &str = "remote-no-auth";
pub const SHELL_COMMAND: &str = "shell-command";
pub const HARDCODED_SECRET: &str = "hardcoded-secret";
pub const INSECURE_TRANSPORT: &str = "insecure-transport";
pub const UNPINNED_PACKAGE: &str = "unpinned-package";

const SHELLS: [&str; 11] = [
    "sh", "bash", "zsh", "dash", "ksh", "fish", "csh", "tcsh", "cmd", "powershell", "pwsh",
];

const PACKAGE_LAUNCHERS: [&str; 4] = ["npx", "bunx", "pnpx", "uvx"];

/// `${VAR}`, `${env:VAR}`, `$VAR` and `%VAR%`.
static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\$\{[^}]+\}|\$[A-Za-z_][A-Za-z0-9_]*|%[A-Za-z_][A-Za-z0-9_]*%)$")
        .expect("env reference pattern is valid")
});

fn config_of<'a>(ctx: &RuleContext<'a>) -> Option<(&'a str, &'a ServerConfig)> {
    match *ctx {
        RuleContext::Config { server, config } => Some((server, config)),
        RuleContext::Tool { .. } => None,
    }
}

/// Lowercased executable name without directory or `.exe`.
fn executable_name(command: &str) -> String {
    let base = command.rsplit(['/', '\\']).next().unwrap_or(command);
    let lower = base.to_ascii_lowercase();
    lower.strip_suffix(".exe").map(str::to_string).unwrap_or(lower)
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            domain.eq_ignore_ascii_case("localhost") || domain.to_ascii_lowercase().ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Credentials embedded in the URL itself count as authentication.
fn url_carries_credentials(url: &Url) -> bool {
    !url.username().is_empty()
        || url.password().is_some()
        || url.query_pairs().any(|(k, _)| is_secret_name(&k))
}

/// Remote transport, non-loopback endpoint and nothing that looks like auth.
pub fn remote_no_auth(ctx: &RuleContext<'_>) -> Vec<Finding> {
    let Some((server, config)) = config_of(ctx) else {
        return Vec::new();
    };
    if !config.transport.is_remote() {
        return Vec::new();
    }

    let parsed = config.url.as_deref().and_then(|u| Url::parse(u).ok());
    if let Some(url) = &parsed {
        if is_loopback(url) || url_carries_credentials(url) {
            return Vec::new();
        }
    }
    if config.env.keys().any(|k| is_secret_name(k)) {
        return Vec::new();
    }

    let endpoint = config.url.as_deref().unwrap_or("(no url)");
    vec![Finding::new(
        REMOTE_NO_AUTH,
        Severity::High,
        server,
        "Remote server without authentication",
        format!(
            "Server uses {} transport to {} but defines no token, key or credential",
            config.transport,
            parsed.as_ref().and_then(Url::host_str).unwrap_or(endpoint)
        ),
    )
    .with_remediation("Configure an API token or other credential for this server")]
}

/// A shell interpreter used directly as the launch command.
pub fn shell_command(ctx: &RuleContext<'_>) -> Vec<Finding> {
    let Some((server, config)) = config_of(ctx) else {
        return Vec::new();
    };
    let Some(command) = config.command.as_deref() else {
        return Vec::new();
    };

    let exe = executable_name(command);
    if !SHELLS.contains(&exe.as_str()) {
        return Vec::new();
    }

    vec![Finding::new(
        SHELL_COMMAND,
        Severity::Critical,
        server,
        "Server launched through a shell",
        format!(
            "Launch command '{}' is a shell interpreter; its script runs with full user privileges",
            exe
        ),
    )
    .with_remediation("Launch the server executable directly with explicit arguments")]
}

/// Literal values under secret-looking environment variable names.
///
/// One finding per variable. The value itself is never echoed.
pub fn hardcoded_secret(ctx: &RuleContext<'_>) -> Vec<Finding> {
    let Some((server, config)) = config_of(ctx) else {
        return Vec::new();
    };

    config
        .env
        .iter()
        .filter(|(key, value)| {
            is_secret_name(key) && !value.trim().is_empty() && !ENV_REFERENCE.is_match(value.trim())
        })
        .map(|(key, _)| {
            Finding::new(
                HARDCODED_SECRET,
                Severity::Critical,
                server,
                "Hardcoded secret in configuration",
                format!("Environment variable '{}' holds a literal value", key),
            )
            .with_remediation(format!(
                "Reference the secret instead, e.g. \"${{{}}}\", and rotate the exposed value",
                key
            ))
        })
        .collect()
}

/// Plaintext HTTP or WebSocket to a non-loopback host.
pub fn insecure_transport(ctx: &RuleContext<'_>) -> Vec<Finding> {
    let Some((server, config)) = config_of(ctx) else {
        return Vec::new();
    };
    if !config.transport.is_remote() {
        return Vec::new();
    }
    let Some(url) = config.url.as_deref().and_then(|u| Url::parse(u).ok()) else {
        return Vec::new();
    };
    if !matches!(url.scheme(), "http" | "ws") || is_loopback(&url) {
        return Vec::new();
    }

    vec![Finding::new(
        INSECURE_TRANSPORT,
        Severity::Medium,
        server,
        "Unencrypted remote transport",
        format!(
            "Server at {} is reached over plain {}",
            url.host_str().unwrap_or("(unknown host)"),
            url.scheme()
        ),
    )
    .with_remediation("Use https:// for remote servers")]
}

/// Package launchers running a package without an exact version.
pub fn unpinned_package(ctx: &RuleContext<'_>) -> Vec<Finding> {
    let Some((server, config)) = config_of(ctx) else {
        return Vec::new();
    };
    let Some(command) = config.command.as_deref() else {
        return Vec::new();
    };
    let launcher = executable_name(command);
    if !PACKAGE_LAUNCHERS.contains(&launcher.as_str()) {
        return Vec::new();
    }
    let Some(package) = package_argument(&config.args) else {
        return Vec::new();
    };
    if is_pinned(package) {
        return Vec::new();
    }

    vec![Finding::new(
        UNPINNED_PACKAGE,
        Severity::Low,
        server,
        "Unpinned server package",
        format!("'{} {}' runs whatever version is published next", launcher, package),
    )
    .with_remediation("Pin an exact version, e.g. package@1.2.3 or package==1.2.3")]
}

/// First positional argument, or the value of `-p` / `--package` / `--from`.
fn package_argument(args: &[String]) -> Option<&str> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-p" | "--package" | "--from" => return iter.next().map(String::as_str),
            a if a.starts_with("--package=") || a.starts_with("--from=") => {
                return a.split_once('=').map(|(_, v)| v)
            }
            a if a.starts_with('-') => continue,
            a if a.starts_with(['.', '/', '~']) || a.contains("://") => return None,
            a => return Some(a),
        }
    }
    None
}

/// `name@1.2.3`, `@scope/name@1.2.3` or `name==1.2.3`.
fn is_pinned(package: &str) -> bool {
    let version = if let Some((_, v)) = package.split_once("==") {
        v
    } else {
        let unscoped = package.strip_prefix('@').unwrap_or(package);
        match unscoped.split_once('@') {
            Some((_, v)) => v,
            None => return false,
        }
    };
    version.starts_with(|c: char| c.is_ascii_digit())
}
