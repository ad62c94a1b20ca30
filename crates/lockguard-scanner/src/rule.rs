//! Rule contract and registry.
//!
//! A rule is plain data: an id, a scope and a check. Built-in checks are
//! function pointers; declared rules carry compiled matchers loaded from a
//! rule file. Both are evaluated through [`Rule::check`].

use crate::custom::DeclaredRule;
use crate::models::{Finding, RuleContext, RuleScope, ScanError};
use crate::rules;
use std::collections::HashSet;

/// Signature of a built-in check.
///
/// A check returns every finding it has for the context; an empty vector
/// means the rule did not fire.
pub type CheckFn = fn(&RuleContext<'_>) -> Vec<Finding>;

/// How a rule evaluates.
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// Compiled into this crate.
    Builtin(CheckFn),
    /// Loaded from a custom rule file.
    Declared(DeclaredRule),
}

/// A registered rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub scope: RuleScope,
    pub kind: RuleKind,
}

impl Rule {
    pub fn builtin(id: &str, scope: RuleScope, check: CheckFn) -> Self {
        Rule {
            id: id.to_string(),
            scope,
            kind: RuleKind::Builtin(check),
        }
    }

    pub fn declared(id: impl Into<String>, scope: RuleScope, rule: DeclaredRule) -> Self {
        Rule {
            id: id.into(),
            scope,
            kind: RuleKind::Declared(rule),
        }
    }

    /// Evaluates the rule. Contexts of the wrong scope yield nothing.
    pub fn check(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        if ctx.scope() != self.scope {
            return Vec::new();
        }
        match &self.kind {
            RuleKind::Builtin(check) => check(ctx),
            RuleKind::Declared(rule) => rule.evaluate(&self.id, ctx),
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.kind, RuleKind::Builtin(_))
    }
}

/// Ordered collection of rules with unique ids.
///
/// # Example
///
/// ```rust
/// use lockguard_scanner::{RuleRegistry, RuleScope};
///
/// let registry = RuleRegistry::builtin();
/// assert!(registry.contains("shell-command"));
/// assert!(registry.by_scope(RuleScope::Tool).count() >= 5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
}

impl RuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        RuleRegistry::default()
    }

    /// Registry holding every built-in rule.
    pub fn builtin() -> Self {
        RuleRegistry {
            rules: rules::builtin_rules(),
        }
    }

    /// Adds a rule.
    ///
    /// # Errors
    ///
    /// `ScanError::CustomRules` if the id is already registered.
    pub fn register(&mut self, rule: Rule) -> Result<(), ScanError> {
        if self.contains(&rule.id) {
            return Err(ScanError::CustomRules(format!(
                "rule id '{}' is already registered",
                rule.id
            )));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Adds several rules. Nothing is added if any id collides.
    pub fn extend(&mut self, rules: impl IntoIterator<Item = Rule>) -> Result<(), ScanError> {
        let rules: Vec<Rule> = rules.into_iter().collect();
        let mut seen: HashSet<&str> = self.rules.iter().map(|r| r.id.as_str()).collect();
        for rule in &rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(ScanError::CustomRules(format!(
                    "rule id '{}' is already registered",
                    rule.id
                )));
            }
        }
        self.rules.extend(rules);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rules.iter().any(|r| r.id == id)
    }

    /// Rules of one scope, in registration order.
    pub fn by_scope(&self, scope: RuleScope) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |r| r.scope == scope)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
