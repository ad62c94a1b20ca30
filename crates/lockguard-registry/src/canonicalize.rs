//! # Canonical JSON Hashing
//!
//! This module turns arbitrary JSON values into a deterministic string and
//! fingerprints that string with SHA-256. Two values that differ only in object
//! key order produce the same fingerprint; anything else produces a different
//! one.
//!
//! ## Threat Model
//!
//! Canonicalization defends against:
//!
//! - **Key Reordering**: A server re-serializing the same schema with a different
//!   key order must not look like drift.
//!
//! - **Whitespace Manipulation**: Insignificant whitespace never reaches the hash.
//!
//! - **Timing Side Channels**: Hash comparisons go through [`constant_time_eq`],
//!   which touches every byte regardless of where the first mismatch is.
//!
//! ## Canonical Form
//!
//! | Value | Output |
//! |-------|--------|
//! | null / absent | `null` |
//! | bool, number | literal |
//! | string | JSON-escaped, quoted |
//! | array | elements in original order, `[a,b]` |
//! | object | keys sorted by UTF-16 code units, `{"k":v}` |
//!
//! Array order is significant and is never normalized.
//!
//! ## Example
//!
//! ```rust
//! use lockguard_registry::canonicalize::{canonicalize, hash_value};
//! use serde_json::json;
//!
//! let obj1 = json!({"b": 1, "a": 2});
//! let obj2 = json!({"a": 2, "b": 1});
//!
//! assert_eq!(canonicalize(&obj1), r#"{"a":2,"b":1}"#);
//! assert_eq!(hash_value(&obj1), hash_value(&obj2));
//! assert_ne!(hash_value(&json!([1, 2])), hash_value(&json!([2, 1])));
//! ```

use crate::models::ContentHash;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Canonicalizes a JSON value.
///
/// The output is deterministic: values that are equal up to object key
/// order always produce bytewise identical output.
///
/// ```rust
/// use lockguard_registry::canonicalize::canonicalize;
/// use serde_json::json;
///
/// let value = json!({
///     "zulu": true,
///     "alpha": [3, 2, 1],
///     "bravo": "test"
/// });
///
/// assert_eq!(canonicalize(&value), r#"{"alpha":[3,2,1],"bravo":"test","zulu":true}"#);
/// ```
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Hashes a JSON value's canonical form as `sha256:<hex>`.
pub fn hash_value(value: &Value) -> ContentHash {
    digest(&canonicalize(value))
}

/// Hashes a value that may be absent. Absent hashes exactly like `null`.
pub fn hash_optional(value: Option<&Value>) -> ContentHash {
    match value {
        Some(v) => hash_value(v),
        None => hash_value(&Value::Null),
    }
}

/// Hashes a string as a JSON string value.
///
/// Equivalent to `hash_value(&Value::String(s.into()))` without the
/// intermediate allocation of a `Value`.
pub fn hash_str(s: &str) -> ContentHash {
    let mut out = String::with_capacity(s.len() + 2);
    write_string(s, &mut out);
    digest(&out)
}

/// Compares two strings without short-circuiting on the first difference.
///
/// Strings of unequal length are rejected immediately; length is not
/// considered secret. Otherwise every byte pair is XOR-accumulated.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let diff = a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

fn digest(canonical: &str) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    ContentHash::from_digest(&hasher.finalize())
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&canonicalize_number(n)),
        Value::String(s) => write_string(s, out),
        Value::Array(arr) => {
            out.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(obj) => {
            let mut entries: Vec<(&String, &Value)> = obj.iter().collect();
            entries.sort_by(|(a, _), (b, _)| compare_utf16(a, b));

            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(val, out);
            }
            out.push('}');
        }
    }
}

/// Numbers are written the way a JSON serializer would: integers verbatim,
/// whole floats without a fractional part, other floats in shortest form.
fn canonicalize_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if !f.is_finite() => "null".to_string(),
        Some(f) if f.fract() == 0.0 && f.abs() < (i64::MAX as f64) => (f as i64).to_string(),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Escapes `"`, `\` and control characters; everything else is literal.
fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x08' => out.push_str("\\b"),
            '\x0C' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c < '\x20' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn compare_utf16(a: &str, b: &str) -> std::cmp::Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonicalize_scalars() {
        assert_eq!(canonicalize(&json!(null)), "null");
        assert_eq!(canonicalize(&json!(true)), "true");
        assert_eq!(canonicalize(&json!(false)), "false");
        assert_eq!(canonicalize(&json!(0)), "0");
        assert_eq!(canonicalize(&json!(-1)), "-1");
        assert_eq!(canonicalize(&json!(1.5)), "1.5");
        assert_eq!(canonicalize(&json!(2.0)), "2");
    }

    #[test]
    fn test_canonicalize_strings() {
        assert_eq!(canonicalize(&json!("")), r#""""#);
        assert_eq!(canonicalize(&json!("he\"llo")), r#""he\"llo""#);
        assert_eq!(canonicalize(&json!("he\\llo")), r#""he\\llo""#);
        assert_eq!(canonicalize(&json!("line\nbreak")), r#""line\nbreak""#);
        assert_eq!(canonicalize(&json!("\u{0001}")), r#""\u0001""#);
        assert_eq!(canonicalize(&json!("héllo/")), "\"héllo/\"");
    }

    #[test]
    fn test_canonicalize_nested() {
        let obj = json!({
            "outer": {"z": 1, "a": 2},
            "array": [3, {"y": null, "b": false}]
        });
        assert_eq!(
            canonicalize(&obj),
            r#"{"array":[3,{"b":false,"y":null}],"outer":{"a":2,"z":1}}"#
        );
    }

    #[test]
    fn test_hash_is_prefixed_hex() {
        let hash = hash_value(&json!({"a": 1}));
        let hex_part = hash.as_str().strip_prefix("sha256:").unwrap();
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_key_order_irrelevant() {
        assert_eq!(hash_value(&json!({"a": 1, "b": 2})), hash_value(&json!({"b": 2, "a": 1})));
    }

    #[test]
    fn test_hash_array_order_significant() {
        assert_ne!(hash_value(&json!([1, 2])), hash_value(&json!([2, 1])));
    }

    #[test]
    fn test_absent_hashes_as_null() {
        assert_eq!(hash_optional(None), hash_value(&json!(null)));
        assert_eq!(hash_optional(Some(&json!(null))), hash_optional(None));
    }

    #[test]
    fn test_hash_str_matches_string_value() {
        let text = "Read a \"file\"\n";
        assert_eq!(hash_str(text), hash_value(&json!(text)));
    }

    #[test]
    fn test_hash_known_vector() {
        // sha256 of the four bytes `null`
        assert_eq!(
            hash_value(&json!(null)).as_str(),
            "sha256:74234e98afe7498fb5daf1f36ac2d78acc339464f950703b8c019892f982b90b"
        );
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("sha256:abc", "sha256:abc"));
        assert!(!constant_time_eq("sha256:abc", "sha256:abd"));
        assert!(!constant_time_eq("short", "longer"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn test_utf16_sorting() {
        assert_eq!(compare_utf16("a", "b"), std::cmp::Ordering::Less);
        assert_eq!(compare_utf16("b", "a"), std::cmp::Ordering::Greater);
        assert_eq!(compare_utf16("a", "a"), std::cmp::Ordering::Equal);
        // surrogate pair 0xD83D.. sorts below 0xFF5E, unlike in code-point order
        assert_eq!(compare_utf16("\u{1F600}", "\u{FF5E}"), std::cmp::Ordering::Less);
    }
}
