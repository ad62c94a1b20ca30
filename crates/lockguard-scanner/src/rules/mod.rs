//! Built-in rules.
//!
//! | Id | Scope | Severity |
//! |----|-------|----------|
//! | `remote-no-auth` | config | high |
//! | `shell-command` | config | critical |
//! | `hardcoded-secret` | config | critical |
//! | `insecure-transport` | config | medium |
//! | `unpinned-package` | config | low |
//! | `suspicious-description` | tool | per family |
//! | `dangerous-capabilities` | tool | high |
//! | `unconstrained-execute-input` | tool | medium |
//! | `permissive-schema` | tool | medium |
//! | `unicode-obfuscation` | tool | critical |
//!
//! `tool-shadowing` is produced by the orchestrator's cross-server pass and
//! is reserved here so custom rules cannot claim it.

pub mod config;
pub mod tool;
pub mod unicode;

use crate::models::RuleScope;
use crate::rule::Rule;

/// Id of the cross-server shadowing finding.
pub const TOOL_SHADOWING: &str = "tool-shadowing";

/// Every id owned by this crate.
pub const RESERVED_IDS: [&str; 11] = [
    config::REMOTE_NO_AUTH,
    config::SHELL_COMMAND,
    config::HARDCODED_SECRET,
    config::INSECURE_TRANSPORT,
    config::UNPINNED_PACKAGE,
    tool::SUSPICIOUS_DESCRIPTION,
    tool::DANGEROUS_CAPABILITIES,
    tool::UNCONSTRAINED_EXECUTE_INPUT,
    tool::PERMISSIVE_SCHEMA,
    unicode::UNICODE_OBFUSCATION,
    TOOL_SHADOWING,
];

/// Returns true if `id` belongs to a built-in rule or pass.
pub fn is_reserved(id: &str) -> bool {
    RESERVED_IDS.contains(&id)
}

pub(crate) fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule::builtin(config::REMOTE_NO_AUTH, RuleScope::Config, config::remote_no_auth),
        Rule::builtin(config::SHELL_COMMAND, RuleScope::Config, config::shell_command),
        Rule::builtin(config::HARDCODED_SECRET, RuleScope::Config, config::hardcoded_secret),
        Rule::builtin(config::INSECURE_TRANSPORT, RuleScope::Config, config::insecure_transport),
        Rule::builtin(config::UNPINNED_PACKAGE, RuleScope::Config, config::unpinned_package),
        Rule::builtin(tool::SUSPICIOUS_DESCRIPTION, RuleScope::Tool, tool::suspicious_description),
        Rule::builtin(tool::DANGEROUS_CAPABILITIES, RuleScope::Tool, tool::dangerous_capabilities),
        Rule::builtin(
            tool::UNCONSTRAINED_EXECUTE_INPUT,
            RuleScope::Tool,
            tool::unconstrained_execute_input,
        ),
        Rule::builtin(tool::PERMISSIVE_SCHEMA, RuleScope::Tool, tool::permissive_schema),
        Rule::builtin(unicode::UNICODE_OBFUSCATION, RuleScope::Tool, unicode::unicode_obfuscation),
    ]
}
