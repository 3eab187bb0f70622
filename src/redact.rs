//! Masking of credential-like tokens before input leaves the machine.

use regex::Regex;
use std::sync::OnceLock;

struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (
                r"(?i)(api[_-]?key|token|secret)\s*[:=]\s*[A-Za-z0-9_\-]{12,}",
                "${1}=[REDACTED]",
            ),
            (r"(?i)password\s*[:=]\s*\S+", "password=[REDACTED]"),
            (r"AKIA[0-9A-Z]{16}", "AKIA****************"),
        ]
        .into_iter()
        .map(|(pattern, replacement)| Rule {
            pattern: Regex::new(pattern).expect("valid redaction regex"),
            replacement,
        })
        .collect()
    })
}

/// Mask API keys, tokens, secrets, passwords and AWS access key IDs.
///
/// Applying it to already redacted text changes nothing.
pub fn basic(text: &str) -> String {
    rules().iter().fold(text.to_string(), |text, rule| {
        rule.pattern
            .replace_all(&text, rule.replacement)
            .into_owned()
    })
}
