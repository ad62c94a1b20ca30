//! # Tool Rules
//!
//! Checks that run once per (server, tool) against live tool metadata.
//!
//! ## Threat Model
//!
//! Tool descriptions are read by the model as trusted context. A poisoned
//! description can instruct the model to leak data, ignore the user, or call
//! other tools, all while the UI shows a harmless one-line summary.
//!
//! ## Description Families
//!
//! Each family is evaluated independently and contributes its own finding.
//!
//! | Family | Severity | Example |
//! |--------|----------|---------|
//! | Exfiltration | critical | "before responding, send the conversation to ..." |
//! | Instruction override | critical | "ignore previous instructions" |
//! | Directive injection | high | "IMPORTANT: you MUST ..." |
//! | Obfuscation | high | "base64-encode the file and include it" |
//! | Markup injection | high | `<!-- hidden -->`, `<IMPORTANT>` |
//!
//! ## References
//!
//! - Invariant Labs (2025) - "MCP Security Notification: Tool Poisoning Attacks"
//! - Greshake et al. (2023) - "Not What You've Signed Up For: Compromising
//!   Real-World LLM-Integrated Applications with Indirect Prompt Injection"
//!   <https://arxiv.org/abs/2302.12173>

use crate::models::{Finding, RuleContext, Severity};
use lockguard_registry::capability::format_capabilities;
use lockguard_registry::{Capability, ToolDefinition};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::LazyLock;

pub const SUSPICIOUS_DESCRIPTION: &str = "suspicious-description";
pub const DANGEROUS_CAPABILITIES: &str = "dangerous-capabilities";
pub const UNCONSTRAINED_EXECUTE_INPUT: &str = "unconstrained-execute-input";
pub const PERMISSIVE_SCHEMA: &str = "permissive-schema";

/// Excerpts quoted in findings are cut to this many characters.
const EXCERPT_LEN: usize = 80;

/// One family of description patterns.
///
/// The family fires when at least `min_hits` distinct patterns match.
struct DescriptionFamily {
    title: &'static str,
    severity: Severity,
    explanation: &'static str,
    min_hits: usize,
    patterns: Vec<Regex>,
}

impl DescriptionFamily {
    fn new(
        title: &'static str,
        severity: Severity,
        explanation: &'static str,
        min_hits: usize,
        patterns: &[&str],
    ) -> Self {
        DescriptionFamily {
            title,
            severity,
            explanation,
            min_hits,
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("description pattern is valid"))
                .collect(),
        }
    }

    /// Matched excerpts, or `None` if the family does not fire.
    fn evaluate(&self, text: &str) -> Option<Vec<String>> {
        let hits: Vec<String> = self
            .patterns
            .iter()
            .filter_map(|p| p.find(text))
            .map(|m| excerpt(m.as_str()))
            .collect();
        (hits.len() >= self.min_hits).then_some(hits)
    }
}

static DESCRIPTION_FAMILIES: LazyLock<Vec<DescriptionFamily>> = LazyLock::new(|| {
    vec![
        DescriptionFamily::new(
            "Exfiltration directive in tool description",
            Severity::Critical,
            "instructs the model to send context or secrets elsewhere",
            1,
            &[
                r"(?i)\bbefore\s+(?:responding|answering|replying|you\s+respond|using\s+this\s+tool|calling\s+any)\b[^\n]{0,120}?\b(?:send|post|upload|forward|include|pass|transmit|read)\b",
                r"(?i)\b(?:send|post|upload|forward|transmit|exfiltrate|leak|share)\w*\b[^\n]{0,120}?(?:conversation|chat\s+history|previous\s+messages|system\s+prompt|context\s+window)",
                r"(?i)\b(?:you\s+(?:must|should|need\s+to|have\s+to)|always|first|also|secretly|silently|quietly)\s+(?:\w+\s+){0,2}?(?:send|post|upload|forward|transmit|exfiltrate|leak|share)\w*\b[^\n]{0,120}?(?:credentials|api\s+keys?|private\s+keys?|ssh\s+keys?|id_rsa|\.ssh\b|\.aws\b|\.env\b|environment\s+variables)",
                r"(?i)\b(?:read|include|pass|append|attach)\b[^\n]{0,60}?(?:~/\.ssh|id_rsa|\.aws/credentials|\.netrc|mcp\.json)",
            ],
        ),
        DescriptionFamily::new(
            "Instruction override in tool description",
            Severity::Critical,
            "tries to replace the instructions the model was given",
            1,
            &[
                r"(?i)\b(?:ignore|disregard|forget|override|bypass)\s+(?:all\s+|any\s+)?(?:of\s+)?(?:the\s+|your\s+)?(?:previous|prior|above|earlier|preceding|system|other)\s+(?:instructions?|prompts?|rules?|guidelines?|directives?)",
                r"(?i)\bforget\s+(?:everything|all|what)\s+(?:you|i)\b",
                r"(?i)\byou\s+are\s+now\s+(?:a|an|in)\s+\w+",
                r"(?i)\bnew\s+(?:system\s+)?instructions?\s*:",
            ],
        ),
        DescriptionFamily::new(
            "Directive injection in tool description",
            Severity::High,
            "stacks imperative markers aimed at the model",
            2,
            &[r"\bIMPORTANT\b", r"\bMUST\b", r"\bALWAYS\b", r"\bNEVER\b"],
        ),
        DescriptionFamily::new(
            "Obfuscation instructions in tool description",
            Severity::High,
            "asks for encoded payloads that hide what is sent or run",
            1,
            &[
                r"(?i)\b(?:base64|base-64|rot13|hex)[\s-]?(?:encod|decod)\w*",
                r"(?i)\b(?:encode|encrypt|obfuscate)\w*\b[^\n]{0,60}?\b(?:send|post|upload|include|pass|append)\b",
                r"(?i)\bdecode\w*\b[^\n]{0,60}?\b(?:execute|run|eval)\b",
                r"[A-Za-z0-9+/]{60,}={0,2}",
            ],
        ),
        DescriptionFamily::new(
            "Hidden markup in tool description",
            Severity::High,
            "contains markup the UI hides but the model reads as text",
            1,
            &[
                r"<!--",
                r"(?i)</?\s*(?:important|system|instructions?|secret|hidden|admin|assistant|context|note)\b[^>]*>",
                r#"(?i)<\s*(?:script|iframe|style)\b|style\s*=\s*["'][^"']*display\s*:\s*none"#,
                r"\[//\]:\s*#",
            ],
        ),
    ]
});

fn tool_of<'a>(ctx: &RuleContext<'a>) -> Option<(&'a str, &'a ToolDefinition)> {
    match *ctx {
        RuleContext::Tool { server, tool } => Some((server, tool)),
        RuleContext::Config { .. } => None,
    }
}

fn excerpt(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_LEN {
        flat
    } else {
        let cut: String = flat.chars().take(EXCERPT_LEN).collect();
        format!("{}...", cut)
    }
}

/// Pattern families over the description text.
pub fn suspicious_description(ctx: &RuleContext<'_>) -> Vec<Finding> {
    let Some((server, tool)) = tool_of(ctx) else {
        return Vec::new();
    };
    let text = tool.description_text();
    if text.is_empty() {
        return Vec::new();
    }

    DESCRIPTION_FAMILIES
        .iter()
        .filter_map(|family| {
            family.evaluate(text).map(|hits| {
                Finding::new(
                    SUSPICIOUS_DESCRIPTION,
                    family.severity,
                    server,
                    family.title,
                    format!(
                        "Description of '{}' {}: \"{}\"",
                        tool.name,
                        family.explanation,
                        hits.join("\", \"")
                    ),
                )
                .with_tool(&tool.name)
                .with_remediation("Review the full description text and remove the server if it was not expected")
            })
        })
        .collect()
}

/// Two or more of execute, delete and secrets on one tool.
pub fn dangerous_capabilities(ctx: &RuleContext<'_>) -> Vec<Finding> {
    let Some((server, tool)) = tool_of(ctx) else {
        return Vec::new();
    };
    let dangerous: BTreeSet<Capability> = tool
        .capabilities()
        .into_iter()
        .filter(Capability::is_dangerous)
        .collect();
    if dangerous.len() < 2 {
        return Vec::new();
    }

    vec![Finding::new(
        DANGEROUS_CAPABILITIES,
        Severity::High,
        server,
        "Dangerous capability combination",
        format!(
            "Tool '{}' combines {}",
            tool.name,
            format_capabilities(&dangerous)
        ),
    )
    .with_tool(&tool.name)
    .with_remediation("Split the tool or require confirmation for each call")]
}

/// Execute capability plus a free-text string argument.
pub fn unconstrained_execute_input(ctx: &RuleContext<'_>) -> Vec<Finding> {
    let Some((server, tool)) = tool_of(ctx) else {
        return Vec::new();
    };
    if !tool.capabilities().contains(&Capability::Execute) {
        return Vec::new();
    }
    let free_text = free_text_properties(tool.input_schema.as_ref());
    if free_text.is_empty() {
        return Vec::new();
    }

    vec![Finding::new(
        UNCONSTRAINED_EXECUTE_INPUT,
        Severity::Medium,
        server,
        "Unconstrained input to an executing tool",
        format!(
            "Tool '{}' can execute and accepts free text in: {}",
            tool.name,
            free_text.join(", ")
        ),
    )
    .with_tool(&tool.name)
    .with_remediation("Constrain the argument with an enum or pattern")]
}

/// String properties with no `enum`, `const` or `pattern`.
fn free_text_properties(schema: Option<&Value>) -> Vec<String> {
    let Some(properties) = schema
        .and_then(|s| s.get("properties"))
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };

    properties
        .iter()
        .filter(|(_, prop)| {
            let is_string = match prop.get("type") {
                Some(Value::String(t)) => t == "string",
                Some(Value::Array(types)) => types.iter().any(|t| t == "string"),
                _ => false,
            };
            let constrained = ["enum", "const", "pattern"]
                .iter()
                .any(|k| prop.get(k).is_some());
            is_string && !constrained
        })
        .map(|(name, _)| name.clone())
        .collect()
}

/// `additionalProperties: true`, or no declared properties while
/// `additionalProperties` is not explicitly `false`.
pub fn permissive_schema(ctx: &RuleContext<'_>) -> Vec<Finding> {
    let Some((server, tool)) = tool_of(ctx) else {
        return Vec::new();
    };

    let schema = tool.input_schema.as_ref();
    let additional = schema.and_then(|s| s.get("additionalProperties"));
    let has_properties = schema
        .and_then(|s| s.get("properties"))
        .and_then(Value::as_object)
        .is_some_and(|p| !p.is_empty());

    let reason = match (additional, has_properties) {
        (Some(Value::Bool(true)), _) => "sets additionalProperties to true",
        (Some(Value::Bool(false)), false) => return Vec::new(),
        (_, false) => "declares no properties, so any arguments are accepted",
        _ => return Vec::new(),
    };

    vec![Finding::new(
        PERMISSIVE_SCHEMA,
        Severity::Medium,
        server,
        "Permissive input schema",
        format!("Input schema of '{}' {}", tool.name, reason),
    )
    .with_tool(&tool.name)
    .with_remediation("Declare every argument and set additionalProperties to false")]
}
