//! Unicode obfuscation in tool names and descriptions.
//!
//! Two independent checks per field:
//!
//! - **Homoglyphs**: a field mixing Latin letters with Cyrillic characters is
//!   reported with every Cyrillic lookalike of `a e o p c x y` it contains.
//!   `rеad_file` with a Cyrillic `е` is a different tool name that renders
//!   identically.
//! - **Zero-width characters**: U+200B, U+200C, U+200D and U+FEFF split
//!   words so pattern matching misses them while the model still reads them.
//!
//! Each (check, field) pair produces at most one finding that lists every
//! offending code point in order of first appearance.

use crate::models::{Finding, RuleContext, Severity};

pub const UNICODE_OBFUSCATION: &str = "unicode-obfuscation";

/// Cyrillic lookalikes of Latin a, e, o, p, c, x, y in both cases.
const HOMOGLYPHS: [char; 14] = [
    '\u{0430}', '\u{0435}', '\u{043E}', '\u{0440}', '\u{0441}', '\u{0445}', '\u{0443}',
    '\u{0410}', '\u{0415}', '\u{041E}', '\u{0420}', '\u{0421}', '\u{0425}', '\u{0423}',
];

const ZERO_WIDTH: [char; 4] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

fn is_cyrillic(c: char) -> bool {
    ('\u{0400}'..='\u{04FF}').contains(&c)
}

/// `U+0430`
pub fn code_point(c: char) -> String {
    format!("U+{:04X}", c as u32)
}

/// Distinct characters of `text` accepted by `pick`, in first-seen order.
fn distinct(text: &str, pick: impl Fn(char) -> bool) -> Vec<char> {
    let mut seen = Vec::new();
    for c in text.chars().filter(|c| pick(*c)) {
        if !seen.contains(&c) {
            seen.push(c);
        }
    }
    seen
}

/// Homoglyphs present in a mixed-script field.
pub fn homoglyphs(text: &str) -> Vec<char> {
    let has_latin = text.chars().any(|c| c.is_ascii_alphabetic());
    if !has_latin || !text.chars().any(is_cyrillic) {
        return Vec::new();
    }
    distinct(text, |c| HOMOGLYPHS.contains(&c))
}

/// Zero-width characters present in a field.
pub fn zero_width(text: &str) -> Vec<char> {
    distinct(text, |c| ZERO_WIDTH.contains(&c))
}

fn list(chars: &[char]) -> String {
    chars.iter().map(|c| code_point(*c)).collect::<Vec<_>>().join(", ")
}

pub fn unicode_obfuscation(ctx: &RuleContext<'_>) -> Vec<Finding> {
    let RuleContext::Tool { server, tool } = *ctx else {
        return Vec::new();
    };

    let mut findings = Vec::new();
    for (field, text) in [("name", tool.name.as_str()), ("description", tool.description_text())] {
        let glyphs = homoglyphs(text);
        if !glyphs.is_empty() {
            findings.push(
                Finding::new(
                    UNICODE_OBFUSCATION,
                    Severity::Critical,
                    server,
                    "Homoglyph characters in tool metadata",
                    format!(
                        "Tool {} mixes Latin and Cyrillic lookalikes: {}",
                        field,
                        list(&glyphs)
                    ),
                )
                .with_tool(&tool.name)
                .with_remediation("Treat the tool as an impersonation attempt and remove the server"),
            );
        }

        let hidden = zero_width(text);
        if !hidden.is_empty() {
            findings.push(
                Finding::new(
                    UNICODE_OBFUSCATION,
                    Severity::Critical,
                    server,
                    "Zero-width characters in tool metadata",
                    format!("Tool {} contains invisible characters: {}", field, list(&hidden)),
                )
                .with_tool(&tool.name)
                .with_remediation("Inspect the raw text; invisible characters have no legitimate use here"),
            );
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockguard_registry::ToolDefinition;

    fn run(tool: &ToolDefinition) -> Vec<Finding> {
        unicode_obfuscation(&RuleContext::Tool { server: "srv", tool })
    }

    #[test]
    fn test_cyrillic_a_in_name() {
        let tool = ToolDefinition::new("re\u{0430}d_file", "Read a file");
        let findings = run(&tool);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert!(findings[0].detail.contains("U+0430"));
        assert!(findings[0].detail.contains("name"));
    }

    #[test]
    fn test_clean_ascii_passes() {
        assert!(run(&ToolDefinition::new("read_file", "Read a file from disk")).is_empty());
    }

    #[test]
    fn test_all_cyrillic_field_not_mixed() {
        assert!(homoglyphs("\u{0441}\u{043E}\u{0440}").is_empty());
    }

    #[test]
    fn test_zero_width_in_description() {
        let tool = ToolDefinition::new("search", "Search\u{200B} the web\u{FEFF}\u{200B}");
        let findings = run(&tool);

        assert_eq!(findings.len(), 1);
        assert!(findings[0].detail.contains("U+200B, U+FEFF"));
    }

    #[test]
    fn test_checks_fire_independently_per_field() {
        let tool = ToolDefinition::new(
            "\u{0440}ing\u{200D}",
            "\u{0421}opy a file\u{200C}",
        );
        let findings = run(&tool);
        assert_eq!(findings.len(), 4);
    }

    #[test]
    fn test_code_point_format() {
        assert_eq!(code_point('\u{0430}'), "U+0430");
        assert_eq!(code_point('\u{FEFF}'), "U+FEFF");
    }
}
