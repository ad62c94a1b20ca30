//! # Custom Rules
//!
//! Loads declarative rules from a JSON file and converts them into the same
//! [`Rule`] contract the built-ins use.
//!
//! ## Format
//!
//! ```json
//! {
//!   "rules": [
//!     {
//!       "id": "no-payments",
//!       "scope": "tool",
//!       "severity": "high",
//!       "title": "Payment tool on {server}",
//!       "detail": "Tool {tool} can move money",
//!       "remediation": "Require approval for payment tools",
//!       "match": { "name": "(?i)pay|transfer", "schema": "amount" }
//!     }
//!   ]
//! }
//! ```
//!
//! | Matcher | Tool scope | Config scope |
//! |---------|------------|--------------|
//! | `name` | tool name | server name |
//! | `description` | description text | rejected |
//! | `schema` | canonical input schema | serialized server config |
//!
//! Every present matcher must match for the rule to fire. `{server}` and
//! `{tool}` expand in `title` and `detail`.
//!
//! ## Failure Policy
//!
//! Any problem with the file is fatal for the scan that requested it:
//! malformed JSON, unknown fields, invalid regex, a rule without matchers,
//! duplicate ids, or an id owned by a built-in rule.

use crate::models::{Finding, RuleContext, RuleScope, ScanError, Severity};
use crate::rule::Rule;
use crate::rules::is_reserved;
use lockguard_registry::canonicalize::canonicalize;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Compiled-size ceiling for a single matcher.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    rules: Vec<RuleRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleRecord {
    id: String,
    scope: RuleScope,
    severity: Severity,
    title: String,
    detail: String,
    #[serde(default)]
    remediation: Option<String>,
    #[serde(rename = "match")]
    matcher: MatchRecord,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MatchRecord {
    name: Option<String>,
    description: Option<String>,
    schema: Option<String>,
}

/// A rule loaded from a custom rule file.
#[derive(Debug, Clone)]
pub struct DeclaredRule {
    pub severity: Severity,
    pub title: String,
    pub detail: String,
    pub remediation: Option<String>,
    name: Option<Regex>,
    description: Option<Regex>,
    schema: Option<Regex>,
}

impl DeclaredRule {
    /// Evaluates the matchers against a context.
    pub fn evaluate(&self, id: &str, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let matched = match *ctx {
            RuleContext::Tool { tool, .. } => {
                let schema = tool
                    .input_schema
                    .as_ref()
                    .map(canonicalize)
                    .unwrap_or_else(|| "{}".to_string());
                matches(&self.name, &tool.name)
                    && matches(&self.description, tool.description_text())
                    && matches(&self.schema, &schema)
            }
            RuleContext::Config { server, config } => {
                let serialized = serde_json::to_value(config)
                    .map(|v| canonicalize(&v))
                    .unwrap_or_default();
                self.description.is_none()
                    && matches(&self.name, server)
                    && matches(&self.schema, &serialized)
            }
        };
        if !matched {
            return Vec::new();
        }

        let server = ctx.server();
        let tool = ctx.tool_name().unwrap_or("");
        let mut finding = Finding::new(
            id,
            self.severity,
            server,
            expand(&self.title, server, tool),
            expand(&self.detail, server, tool),
        );
        if let Some(name) = ctx.tool_name() {
            finding = finding.with_tool(name);
        }
        if let Some(remediation) = &self.remediation {
            finding = finding.with_remediation(remediation.clone());
        }
        vec![finding]
    }
}

/// An absent matcher always matches.
fn matches(re: &Option<Regex>, text: &str) -> bool {
    re.as_ref().map_or(true, |re| re.is_match(text))
}

fn expand(template: &str, server: &str, tool: &str) -> String {
    template.replace("{server}", server).replace("{tool}", tool)
}

fn compile(id: &str, field: &str, pattern: Option<String>) -> Result<Option<Regex>, ScanError> {
    pattern
        .map(|p| {
            RegexBuilder::new(&p)
                .size_limit(REGEX_SIZE_LIMIT)
                .build()
                .map_err(|e| {
                    ScanError::CustomRules(format!("rule '{}': invalid {} pattern: {}", id, field, e))
                })
        })
        .transpose()
}

/// Parses custom rules from JSON text.
///
/// # Errors
///
/// `ScanError::CustomRules` describing the first problem found.
///
/// # Example
///
/// ```rust
/// use lockguard_scanner::custom::parse_custom_rules;
///
/// let rules = parse_custom_rules(r#"{"rules": [{
///     "id": "no-pay", "scope": "tool", "severity": "high",
///     "title": "Payment tool", "detail": "{tool} moves money",
///     "match": {"name": "pay"}
/// }]}"#).unwrap();
/// assert_eq!(rules.len(), 1);
///
/// assert!(parse_custom_rules(r#"{"rules": [{
///     "id": "shell-command", "scope": "tool", "severity": "low",
///     "title": "t", "detail": "d", "match": {"name": "x"}
/// }]}"#).is_err());
/// ```
pub fn parse_custom_rules(text: &str) -> Result<Vec<Rule>, ScanError> {
    let file: RuleFile = serde_json::from_str(text)
        .map_err(|e| ScanError::CustomRules(format!("malformed rule file: {}", e)))?;

    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(file.rules.len());

    for record in file.rules {
        let id = record.id.trim().to_string();
        if id.is_empty() {
            return Err(ScanError::CustomRules("rule id must not be empty".to_string()));
        }
        if is_reserved(&id) {
            return Err(ScanError::CustomRules(format!(
                "rule id '{}' collides with a built-in rule",
                id
            )));
        }
        if !seen.insert(id.clone()) {
            return Err(ScanError::CustomRules(format!("duplicate rule id '{}'", id)));
        }

        let m = record.matcher;
        if m.name.is_none() && m.description.is_none() && m.schema.is_none() {
            return Err(ScanError::CustomRules(format!(
                "rule '{}' declares no matchers",
                id
            )));
        }
        if record.scope == RuleScope::Config && m.description.is_some() {
            return Err(ScanError::CustomRules(format!(
                "rule '{}': description matcher is not valid for config scope",
                id
            )));
        }

        let declared = DeclaredRule {
            severity: record.severity,
            title: record.title,
            detail: record.detail,
            remediation: record.remediation,
            name: compile(&id, "name", m.name)?,
            description: compile(&id, "description", m.description)?,
            schema: compile(&id, "schema", m.schema)?,
        };
        rules.push(Rule::declared(id, record.scope, declared));
    }

    debug!(count = rules.len(), "parsed custom rules");
    Ok(rules)
}

/// Reads and parses a custom rule file.
pub fn load_custom_rules<P: AsRef<Path>>(path: P) -> Result<Vec<Rule>, ScanError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        warn!(path = %path.display(), error = %e, "cannot read custom rules");
        ScanError::Io(e)
    })?;
    parse_custom_rules(&text).inspect_err(|e| {
        warn!(path = %path.display(), error = %e, "custom rules rejected");
    })
}
