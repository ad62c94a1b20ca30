//! # Core Types for the Scanner
//!
//! This module defines the data types shared by every rule and by the
//! orchestrator: finding severity, the finding record itself, the context a
//! rule is evaluated against, and the aggregated scan report.
//!
//! ## Threat Model
//!
//! The type system encodes the finding taxonomy:
//!
//! - **OWASP LLM Top 10 (2025)** - LLM01 Prompt Injection and LLM06 Excessive
//!   Agency cover most tool-poisoning findings.
//! - **MCP Tool Poisoning** - Invariant Labs' disclosure of hidden directives
//!   in tool descriptions motivates the description and Unicode rules.
//!
//! ## Design Principles
//!
//! 1. **Ordered Severity** - [`Severity`] is totally ordered so filtering is a
//!    single comparison.
//! 2. **Read-Only Context** - [`RuleContext`] only hands out shared references;
//!    a rule cannot mutate what it inspects.
//! 3. **Serializable** - Findings and reports derive Serde traits for JSON
//!    output and audit trails.

use lockguard_registry::{ServerConfig, ToolDefinition};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How serious a finding is.
///
/// | Variant | Meaning |
/// |---------|---------|
/// | `Low` | Hygiene issue |
/// | `Medium` | Widens the attack surface |
/// | `High` | Plausible attack path |
/// | `Critical` | Active poisoning or exposed secret |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// What a rule runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    /// Once per configured server, no connection needed.
    Config,
    /// Once per (server, tool) after live metadata is available.
    Tool,
}

impl fmt::Display for RuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleScope::Config => write!(f, "config"),
            RuleScope::Tool => write!(f, "tool"),
        }
    }
}

/// The read-only input to a rule check.
#[derive(Debug, Clone, Copy)]
pub enum RuleContext<'a> {
    /// A server's configuration.
    Config {
        server: &'a str,
        config: &'a ServerConfig,
    },
    /// One tool of a live server.
    Tool {
        server: &'a str,
        tool: &'a ToolDefinition,
    },
}

impl<'a> RuleContext<'a> {
    /// Scope this context belongs to.
    pub fn scope(&self) -> RuleScope {
        match self {
            RuleContext::Config { .. } => RuleScope::Config,
            RuleContext::Tool { .. } => RuleScope::Tool,
        }
    }

    /// Server name.
    pub fn server(&self) -> &'a str {
        match self {
            RuleContext::Config { server, .. } | RuleContext::Tool { server, .. } => server,
        }
    }

    /// Tool name, for tool contexts.
    pub fn tool_name(&self) -> Option<&'a str> {
        match self {
            RuleContext::Config { .. } => None,
            RuleContext::Tool { tool, .. } => Some(tool.name.as_str()),
        }
    }
}

/// A single issue reported by a rule.
///
/// # Example
///
/// ```rust
/// use lockguard_scanner::{Finding, Severity};
///
/// let finding = Finding::new("shell-command", Severity::Critical, "build", "Shell launcher", "bash -c ...")
///     .with_remediation("Launch the server binary directly");
/// assert!(finding.tool.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Identifier of the rule that produced the finding.
    pub rule_id: String,

    pub severity: Severity,

    /// Server the finding belongs to.
    pub server: String,

    /// Tool the finding belongs to, for tool-scope rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Short headline.
    pub title: String,

    /// Explanation with the evidence that triggered the rule.
    pub detail: String,

    /// Suggested fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl Finding {
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        server: impl Into<String>,
        title: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Finding {
            rule_id: rule_id.into(),
            severity,
            server: server.into(),
            tool: None,
            title: title.into(),
            detail: detail.into(),
            remediation: None,
        }
    }

    /// Attaches a tool name, builder style.
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Attaches a remediation hint, builder style.
    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }
}

/// A rule that panicked during evaluation and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFailure {
    pub rule_id: String,
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Panic payload, when it was a string.
    pub message: String,
}

/// Count of findings per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl ScanSummary {
    /// Tallies a slice of findings.
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = ScanSummary::default();
        for f in findings {
            match f.severity {
                Severity::Low => summary.low += 1,
                Severity::Medium => summary.medium += 1,
                Severity::High => summary.high += 1,
                Severity::Critical => summary.critical += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high + self.critical
    }
}

/// Outcome of one scan run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// Findings at or above `min_severity`, in detection order.
    pub findings: Vec<Finding>,

    /// Tally of `findings`.
    pub summary: ScanSummary,

    /// Threshold that was applied.
    pub min_severity: Severity,

    /// Number of servers whose configuration was scanned.
    pub servers_scanned: usize,

    /// Number of tools scanned across all servers.
    pub tools_scanned: usize,

    /// Rules that panicked and were skipped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_failures: Vec<RuleFailure>,
}

impl ScanReport {
    /// Highest severity present, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    /// Findings produced by a given rule.
    pub fn by_rule<'a>(&'a self, rule_id: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |f| f.rule_id == rule_id)
    }

    /// Returns true if any finding is at or above `severity`.
    pub fn has_at_least(&self, severity: Severity) -> bool {
        self.findings.iter().any(|f| f.severity >= severity)
    }
}

/// Errors raised while assembling a scan.
///
/// Rule checks themselves do not return errors; these cover the inputs that
/// configure a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A custom rule source is malformed or conflicts with existing rules.
    #[error("Invalid custom rules: {0}")]
    CustomRules(String),

    /// Reading a custom rule source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
