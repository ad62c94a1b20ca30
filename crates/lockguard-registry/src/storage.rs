//! # Lockfile Persistence
//!
//! Reads and writes the versioned JSON lockfile. Parsing is strict about the
//! things that matter and lenient about nothing: a lockfile is an untrusted
//! input the moment it is checked out of a repository.
//!
//! ## Threat Model
//!
//! The storage layer defends against:
//!
//! - **Silent Downgrade**: A lockfile written by a newer format version is a
//!   hard error. Re-pinning over it would discard data this build cannot see.
//!
//! - **Key Injection**: The keys `__proto__`, `constructor` and `prototype` are
//!   stripped at every depth before the document is interpreted, so a lockfile
//!   shared with JavaScript tooling cannot smuggle prototype-pollution payloads
//!   through a round trip.
//!
//! - **Shape Confusion**: A `servers` field that is not a map is rejected
//!   rather than coerced.
//!
//! ## Error Classes
//!
//! | Condition | Error | Caller response |
//! |-----------|-------|-----------------|
//! | file missing | `NotFound` | re-pin |
//! | malformed / wrong shape | `Invalid` | re-pin |
//! | newer version | `UnsupportedVersion` | stop |

use crate::models::{Lockfile, LockfileError, Result, LOCKFILE_VERSION};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// Keys removed from every object before interpretation.
pub const FORBIDDEN_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Parses a lockfile from JSON text.
///
/// # Errors
///
/// - `UnsupportedVersion` if `version` is newer than [`LOCKFILE_VERSION`]
/// - `Invalid` for malformed JSON, a missing or non-numeric version, a
///   non-map `servers` field, or any other shape mismatch
///
/// # Example
///
/// ```rust
/// use lockguard_registry::storage::parse_lockfile;
/// use lockguard_registry::LockfileError;
///
/// let err = parse_lockfile(r#"{"version": 99, "servers": {}}"#).unwrap_err();
/// assert!(matches!(err, LockfileError::UnsupportedVersion { found: 99, .. }));
/// ```
pub fn parse_lockfile(text: &str) -> Result<Lockfile> {
    let mut value: Value =
        serde_json::from_str(text).map_err(|e| LockfileError::Invalid(e.to_string()))?;
    strip_forbidden_keys(&mut value);

    let root = value
        .as_object()
        .ok_or_else(|| LockfileError::Invalid("root is not an object".to_string()))?;

    let version = root
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| LockfileError::Invalid("missing or non-numeric version".to_string()))?;
    if version > u64::from(LOCKFILE_VERSION) {
        return Err(LockfileError::UnsupportedVersion {
            found: version,
            supported: LOCKFILE_VERSION,
        });
    }

    match root.get("servers") {
        Some(Value::Object(_)) => {}
        Some(_) => {
            return Err(LockfileError::Invalid(
                "servers field is not a map".to_string(),
            ))
        }
        None => return Err(LockfileError::Invalid("missing servers field".to_string())),
    }

    serde_json::from_value(value).map_err(|e| LockfileError::Invalid(e.to_string()))
}

/// Loads a lockfile from disk.
///
/// # Errors
///
/// `NotFound` if no file exists at `path`, `Io` for other read failures,
/// otherwise as [`parse_lockfile`].
pub fn load_lockfile<P: AsRef<Path>>(path: P) -> Result<Lockfile> {
    let path = path.as_ref();
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(LockfileError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(LockfileError::Io(e)),
    };

    let lockfile = parse_lockfile(&text).inspect_err(|e| {
        warn!(path = %path.display(), error = %e, "lockfile rejected");
    })?;
    debug!(
        path = %path.display(),
        servers = lockfile.servers.len(),
        "loaded lockfile"
    );
    Ok(lockfile)
}

/// Serializes a lockfile as pretty JSON with a trailing newline.
pub fn to_json(lockfile: &Lockfile) -> Result<String> {
    let mut text = serde_json::to_string_pretty(lockfile)?;
    text.push('\n');
    Ok(text)
}

/// Writes a lockfile to disk, replacing any existing file.
pub fn save_lockfile<P: AsRef<Path>>(path: P, lockfile: &Lockfile) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, to_json(lockfile)?)?;
    debug!(path = %path.display(), "saved lockfile");
    Ok(())
}

/// Recursively removes [`FORBIDDEN_KEYS`] from every object in `value`.
pub fn strip_forbidden_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|k, _| !FORBIDDEN_KEYS.contains(&k.as_str()));
            for child in map.values_mut() {
                strip_forbidden_keys(child);
            }
        }
        Value::Array(items) => {
            for child in items {
                strip_forbidden_keys(child);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockfile::{BuildContext, LockfileBuilder};
    use crate::models::{ServerConfig, ServerSnapshot, ToolDefinition};
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_lockfile() -> Lockfile {
        let mut builder = LockfileBuilder::new(BuildContext::new("vscode", "mcp.json", "ci"));
        builder.add_server(
            "files",
            &ServerConfig::stdio("files-server", &[]),
            &ServerSnapshot::with_tools(vec![ToolDefinition::new("read_file", "Read a file")]),
        );
        builder.build()
    }

    #[test]
    fn test_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mcp.lock.json");
        let lockfile = sample_lockfile();

        save_lockfile(&path, &lockfile).unwrap();
        let loaded = load_lockfile(&path).unwrap();

        assert_eq!(loaded, lockfile);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load_lockfile(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, LockfileError::NotFound(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_malformed_json_is_invalid() {
        let err = parse_lockfile("{not json").unwrap_err();
        assert!(matches!(err, LockfileError::Invalid(_)));
    }

    #[test]
    fn test_non_map_servers_is_invalid() {
        let err = parse_lockfile(r#"{"version": 1, "servers": []}"#).unwrap_err();
        assert!(matches!(err, LockfileError::Invalid(msg) if msg.contains("not a map")));
    }

    #[test]
    fn test_missing_version_is_invalid() {
        let err = parse_lockfile(r#"{"servers": {}}"#).unwrap_err();
        assert!(matches!(err, LockfileError::Invalid(_)));
    }

    #[test]
    fn test_newer_version_is_fatal() {
        let err = parse_lockfile(r#"{"version": 2, "servers": "garbage"}"#).unwrap_err();
        assert!(matches!(
            err,
            LockfileError::UnsupportedVersion { found: 2, supported: 1 }
        ));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_forbidden_keys_stripped() {
        let mut doc = serde_json::to_value(sample_lockfile()).unwrap();
        doc["__proto__"] = json!({"polluted": true});
        doc["servers"]["constructor"] = json!({"bogus": 1});
        doc["servers"]["files"]["tools"]["prototype"] = json!("x");

        let parsed = parse_lockfile(&doc.to_string()).unwrap();
        assert_eq!(parsed.servers.len(), 1);
        assert!(parsed.servers.contains_key("files"));
        assert_eq!(parsed.servers["files"].tools.len(), 1);
    }

    #[test]
    fn test_strip_forbidden_keys_nested_arrays() {
        let mut value = json!([{"a": {"__proto__": 1, "b": 2}}, {"prototype": 3}]);
        strip_forbidden_keys(&mut value);
        assert_eq!(value, json!([{"a": {"b": 2}}, {}]));
    }

    #[test]
    fn test_to_json_ends_with_newline() {
        let text = to_json(&sample_lockfile()).unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\"generatedAt\""));
    }
}
