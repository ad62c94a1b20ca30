//! # Capability Inference
//!
//! Classifies what a tool can plausibly do from the words it uses and the
//! argument names it accepts. The result is a set of coarse tags that drift
//! detection pins and the scanner reasons about.
//!
//! ## Threat Model
//!
//! Capability tags exist to catch **silent privilege escalation**: a tool
//! pinned as `read` that later describes itself as running shell commands has
//! gained `execute`, even if its name never changed.
//!
//! ## Signal Sources
//!
//! Two independent, pure functions are unioned at the boundary:
//!
//! | Source | Input | Function |
//! |--------|-------|----------|
//! | Keywords | lowercased description + name | [`keyword_capabilities`] |
//! | Schema | `properties` keys split into words | [`schema_capabilities`] |
//!
//! Both are deterministic. Inference runs at pin time, diff time and scan time,
//! and a pinned tool must produce the same tags on every run for drift
//! detection to be meaningful.
//!
//! ## Example
//!
//! ```rust
//! use lockguard_registry::capability::{infer_capabilities, Capability};
//! use serde_json::json;
//!
//! let caps = infer_capabilities(
//!     "Execute a command",
//!     "x",
//!     Some(&json!({"properties": {"command": {}}})),
//! );
//! assert!(caps.contains(&Capability::Execute));
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// A coarse, risk-relevant capability tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Read,
    Write,
    Delete,
    Execute,
    Network,
    Database,
    Secrets,
}

impl Capability {
    /// Every tag, in display order.
    pub const ALL: [Capability; 7] = [
        Capability::Read,
        Capability::Write,
        Capability::Delete,
        Capability::Execute,
        Capability::Network,
        Capability::Database,
        Capability::Secrets,
    ];

    /// Lowercase tag name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::Delete => "delete",
            Capability::Execute => "execute",
            Capability::Network => "network",
            Capability::Database => "database",
            Capability::Secrets => "secrets",
        }
    }

    /// Tags that are dangerous in combination on a single tool.
    pub fn is_dangerous(&self) -> bool {
        matches!(
            self,
            Capability::Execute | Capability::Delete | Capability::Secrets
        )
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown capability '{}'", s))
    }
}

/// Joins tags as `read, write`.
pub fn format_capabilities(caps: &BTreeSet<Capability>) -> String {
    caps.iter()
        .map(Capability::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Keyword families over description and name.
static KEYWORD_FAMILIES: LazyLock<Vec<(Capability, Regex)>> = LazyLock::new(|| {
    let families: [(Capability, &str); 7] = [
        (
            Capability::Read,
            r"\b(?:read|get|fetch|load|open|view|list|search|find|glob)(?:s|es|ed|ing|er)?\b|\bcat\b",
        ),
        (
            Capability::Write,
            r"\b(?:writ(?:e|es|ing|ten)|creat(?:e|es|ed|ing)|sav(?:e|es|ed|ing)|puts?|upload(?:s|ed|ing)?|append(?:s|ed|ing)?|edit(?:s|ed|ing)?|modif(?:y|ies|ied|ying)|updat(?:e|es|ed|ing)|patch(?:es|ed|ing)?)\b",
        ),
        (
            Capability::Delete,
            r"\b(?:delet(?:e|es|ed|ing)|remov(?:e|es|ed|ing)|unlink(?:s|ed|ing)?|rm|drop(?:s|ped|ping)?|destroy(?:s|ed|ing)?|purg(?:e|es|ed|ing))\b",
        ),
        (
            Capability::Execute,
            r"\b(?:exec\w*|run(?:s|ning)?|spawn(?:s|ed|ing)?|shell|bash|commands?|eval|invok(?:e|es|ed|ing))\b|run python|code execution|subprocess|shell script",
        ),
        (
            Capability::Network,
            r"\b(?:https?|fetch(?:es|ed|ing)?|requests?|apis?|urls?|download(?:s|ed|ing)?|upload(?:s|ed|ing)?|post(?:s|ed|ing)?|webhooks?|send(?:s|ing)?)\b|http request|api call",
        ),
        (
            Capability::Database,
            r"\b(?:quer(?:y|ies)|sql|databases?|db|insert(?:s|ed|ing)?|select(?:s|ed|ing)?|tables?|schemas?)\b|database connection|prepare statement",
        ),
        (
            Capability::Secrets,
            r"\b(?:secrets?|credentials?|passwords?|tokens?|keys?|auth\w*|certificates?|private)\b",
        ),
    ];

    families
        .into_iter()
        .map(|(cap, pattern)| (cap, Regex::new(pattern).expect("capability pattern is valid")))
        .collect()
});

/// Property-name families, matched against whole identifier segments.
static SCHEMA_FAMILIES: LazyLock<Vec<(Capability, Regex)>> = LazyLock::new(|| {
    let families: [(Capability, &str); 5] = [
        (Capability::Execute, r"^(?:commands?|cmd|shell|scripts?|code)$"),
        (Capability::Network, r"^(?:urls?|endpoints?|uris?|webhooks?)$"),
        (Capability::Database, r"^(?:query|queries|sql|statements?|tables?)$"),
        (Capability::Read, r"^(?:paths?|files?|directory|directories|filename|filepath)$"),
        (Capability::Secrets, r"^(?:password|passwd|tokens?|secrets?|keys?|apikey|credentials?)$"),
    ];

    families
        .into_iter()
        .map(|(cap, pattern)| (cap, Regex::new(pattern).expect("schema pattern is valid")))
        .collect()
});

/// Normalizes text for keyword matching.
///
/// Identifier separators are turned into spaces so that `execute_command`
/// matches the same words as `execute command`.
fn keyword_text(description: &str, name: &str) -> String {
    format!("{} {}", description, name)
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, '_' | '-' | '.' | '/') { ' ' } else { c })
        .collect()
}

/// Splits a property name into lowercase words.
///
/// Handles `snake_case`, `kebab-case`, `camelCase` and acronym runs, so
/// `webhookUrl` gives `webhook`, `url` and `APIKey` gives `api`, `key`.
fn identifier_segments(key: &str) -> Vec<String> {
    let chars: Vec<char> = key.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                segments.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Tags implied by the words in a description and name.
pub fn keyword_capabilities(description: &str, name: &str) -> BTreeSet<Capability> {
    let text = keyword_text(description, name);
    KEYWORD_FAMILIES
        .iter()
        .filter(|(_, re)| re.is_match(&text))
        .map(|(cap, _)| *cap)
        .collect()
}

/// Tags implied by the argument names a schema accepts.
///
/// Path-like arguments imply `read`, and additionally `write` when the
/// description uses a write verb.
pub fn schema_capabilities(input_schema: Option<&Value>, description: &str) -> BTreeSet<Capability> {
    let mut caps = BTreeSet::new();
    let Some(properties) = input_schema
        .and_then(|s| s.get("properties"))
        .and_then(Value::as_object)
    else {
        return caps;
    };

    let writes = KEYWORD_FAMILIES
        .iter()
        .find(|(cap, _)| *cap == Capability::Write)
        .map(|(_, re)| re.is_match(&description.to_lowercase()))
        .unwrap_or(false);

    for segment in properties.keys().flat_map(|k| identifier_segments(k)) {
        for (cap, re) in SCHEMA_FAMILIES.iter() {
            if re.is_match(&segment) {
                caps.insert(*cap);
                if *cap == Capability::Read && writes {
                    caps.insert(Capability::Write);
                }
            }
        }
    }

    caps
}

/// Full capability inference: keyword tags unioned with schema tags.
///
/// An empty set is a valid answer.
pub fn infer_capabilities(
    description: &str,
    name: &str,
    input_schema: Option<&Value>,
) -> BTreeSet<Capability> {
    let mut caps = keyword_capabilities(description, name);
    caps.extend(schema_capabilities(input_schema, description));
    caps
}
