//! Scan orchestrator.
//!
//! Runs every registered rule against every server and tool, then performs
//! the cross-server tool-shadowing pass and applies the severity threshold.
//!
//! A rule that panics is caught, logged, recorded as a [`RuleFailure`] and
//! skipped for that context. The rest of the scan continues.

use crate::models::{Finding, RuleContext, RuleFailure, RuleScope, ScanReport, ScanSummary, Severity};
use crate::rule::{Rule, RuleRegistry};
use crate::rules::TOOL_SHADOWING;
use lockguard_registry::{ServerConfig, ToolDefinition};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error};

/// Accumulates findings over one scan run.
///
/// # Example
///
/// ```rust
/// use lockguard_scanner::{RuleRegistry, Scanner, Severity};
/// use lockguard_registry::{ServerConfig, ToolDefinition};
///
/// let mut scanner = Scanner::new(RuleRegistry::builtin(), Severity::High);
/// scanner.scan_config("build", &ServerConfig::stdio("bash", &["-c", "./serve.sh"]));
/// scanner.scan_tools("build", &[ToolDefinition::new("deploy", "Deploy the app")]);
///
/// let report = scanner.finish();
/// assert_eq!(report.findings[0].rule_id, "shell-command");
/// assert!(report.findings.iter().all(|f| f.severity >= Severity::High));
/// ```
#[derive(Debug)]
pub struct Scanner {
    registry: RuleRegistry,
    min_severity: Severity,
    findings: Vec<Finding>,
    failures: Vec<RuleFailure>,
    claims: BTreeMap<String, Vec<ToolDefinition>>,
    servers_scanned: usize,
}

impl Scanner {
    pub fn new(registry: RuleRegistry, min_severity: Severity) -> Self {
        Scanner {
            registry,
            min_severity,
            findings: Vec::new(),
            failures: Vec::new(),
            claims: BTreeMap::new(),
            servers_scanned: 0,
        }
    }

    /// Runs config-scope rules for one server.
    pub fn scan_config(&mut self, server: &str, config: &ServerConfig) -> &mut Self {
        let ctx = RuleContext::Config { server, config };
        self.run_scope(RuleScope::Config, &ctx);
        self.servers_scanned += 1;
        self
    }

    /// Runs tool-scope rules for every tool of one server and records the
    /// tool names for the shadowing pass.
    pub fn scan_tools(&mut self, server: &str, tools: &[ToolDefinition]) -> &mut Self {
        for tool in tools {
            let ctx = RuleContext::Tool { server, tool };
            self.run_scope(RuleScope::Tool, &ctx);
        }
        self.claims
            .entry(server.to_string())
            .or_default()
            .extend(tools.iter().cloned());
        self
    }

    fn run_scope(&mut self, scope: RuleScope, ctx: &RuleContext<'_>) {
        let mut found = Vec::new();
        let mut failed = Vec::new();
        for rule in self.registry.by_scope(scope) {
            match run_rule(rule, ctx) {
                Ok(findings) => found.extend(findings),
                Err(failure) => failed.push(failure),
            }
        }
        self.findings.extend(found);
        self.failures.extend(failed);
    }

    /// Applies the shadowing pass and the severity threshold.
    pub fn finish(self) -> ScanReport {
        let tools_scanned = self.claims.values().map(Vec::len).sum();
        let mut findings = self.findings;
        findings.extend(detect_shadowing(&self.claims));

        let total = findings.len();
        findings.retain(|f| f.severity >= self.min_severity);
        debug!(
            total,
            kept = findings.len(),
            min_severity = %self.min_severity,
            "scan finished"
        );

        ScanReport {
            summary: ScanSummary::from_findings(&findings),
            findings,
            min_severity: self.min_severity,
            servers_scanned: self.servers_scanned,
            tools_scanned,
            rule_failures: self.failures,
        }
    }
}

fn run_rule(rule: &Rule, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleFailure> {
    panic::catch_unwind(AssertUnwindSafe(|| rule.check(ctx))).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        error!(
            rule = %rule.id,
            server = ctx.server(),
            tool = ctx.tool_name(),
            error = %message,
            "rule panicked, skipping"
        );
        RuleFailure {
            rule_id: rule.id.clone(),
            server: ctx.server().to_string(),
            tool: ctx.tool_name().map(str::to_string),
            message,
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// One high finding per tool name claimed by more than one server.
///
/// The finding is attributed to the first claimant in name order and lists
/// every claimant in its detail.
pub fn detect_shadowing(servers: &BTreeMap<String, Vec<ToolDefinition>>) -> Vec<Finding> {
    let mut claimants: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (server, tools) in servers {
        for tool in tools {
            claimants
                .entry(tool.name.as_str())
                .or_default()
                .insert(server.as_str());
        }
    }

    claimants
        .into_iter()
        .filter(|(_, owners)| owners.len() > 1)
        .filter_map(|(tool, owners)| {
            let list: Vec<&str> = owners.into_iter().collect();
            let first = *list.first()?;
            Some(
                Finding::new(
                    TOOL_SHADOWING,
                    Severity::High,
                    first,
                    "Tool name shadowed across servers",
                    format!(
                        "Tool '{}' is exposed by {} servers: {}",
                        tool,
                        list.len(),
                        list.join(", ")
                    ),
                )
                .with_tool(tool)
                .with_remediation(
                    "Rename or remove the duplicate so calls cannot be routed to the wrong server",
                ),
            )
        })
        .collect()
}
