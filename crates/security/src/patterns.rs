//! Pattern filter — the first inbound stage.
//!
//! Detects prompt-injection, jailbreak, role-hijack, and delimiter
//! hijack patterns and replaces each hit with a `[BLOCKED]` token.
//! Sanitization is idempotent and this stage never errors.

use regex::Regex;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Verdict
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct PatternVerdict {
    pub safe: bool,
    /// Name of the first matched pattern class, when unsafe.
    pub reason: Option<String>,
    /// Input with every matched span replaced by `[BLOCKED]`.
    pub sanitized: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PatternFilter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const BLOCKED_TOKEN: &str = "[BLOCKED]";

struct NamedPattern {
    class: &'static str,
    regex: Regex,
}

pub struct PatternFilter {
    patterns: Vec<NamedPattern>,
}

impl PatternFilter {
    pub fn new() -> Self {
        // Pattern sources must never expand to something that matches
        // another pattern, or sanitization would not be idempotent.
        let specs: &[(&str, &str)] = &[
            (
                "injection",
                r"(?i)\b(ignore|disregard|forget)\s+(all\s+)?(previous|prior|above|earlier)\s+(instructions?|prompts?|rules?|context)",
            ),
            (
                "injection",
                r"(?i)\breveal\s+(your\s+)?(system\s+prompt|hidden\s+instructions?|initial\s+prompt)",
            ),
            (
                "injection",
                r"(?i)\b(print|show|output|repeat)\s+(your\s+)?(system\s+prompt|instructions?\s+verbatim)",
            ),
            (
                "jailbreak",
                r"(?i)\b(DAN|do\s+anything\s+now)\b.{0,40}\b(mode|jailbreak)",
            ),
            (
                "jailbreak",
                r"(?i)\b(developer|god|sudo)\s+mode\s+(enabled|activated|on)\b",
            ),
            (
                "jailbreak",
                r"(?i)\byou\s+(have\s+no|are\s+free\s+of)\s+(restrictions?|guidelines?|rules?)",
            ),
            (
                "role_hijack",
                r"(?i)\byou\s+are\s+now\s+(a|an|the)\s+\w+",
            ),
            (
                "role_hijack",
                r"(?i)\b(pretend|act\s+as\s+if)\s+you\s+(are|were)\s+(not\s+)?an?\s+(ai|assistant|unrestricted)",
            ),
            (
                "role_hijack",
                r"(?i)\bnew\s+persona\s*:",
            ),
            (
                "delimiter_hijack",
                r"(?i)<\|?(im_start|im_end|system|endoftext)\|?>",
            ),
            (
                "delimiter_hijack",
                r"(?i)\[/?(INST|SYS|SYSTEM)\]",
            ),
            (
                "delimiter_hijack",
                r"(?i)<<\s*/?SYS\s*>>",
            ),
            (
                "delimiter_hijack",
                r"(?m)^###\s+(system|instruction)s?\b",
            ),
        ];

        let patterns = specs
            .iter()
            .map(|(class, src)| NamedPattern {
                class,
                regex: Regex::new(src).unwrap_or_else(|e| {
                    // Static patterns are compile-time constants in spirit.
                    panic!("invalid builtin pattern '{src}': {e}")
                }),
            })
            .collect();

        Self { patterns }
    }

    /// Scan and sanitize. Never errors; a text that matches nothing is
    /// returned unchanged with `safe = true`.
    pub fn check(&self, text: &str) -> PatternVerdict {
        let mut sanitized = text.to_string();
        let mut reason: Option<String> = None;

        for pattern in &self.patterns {
            if pattern.regex.is_match(&sanitized) {
                if reason.is_none() {
                    reason = Some(pattern.class.to_string());
                }
                sanitized = pattern
                    .regex
                    .replace_all(&sanitized, BLOCKED_TOKEN)
                    .into_owned();
            }
        }

        PatternVerdict {
            safe: reason.is_none(),
            reason,
            sanitized,
        }
    }

    /// Convenience used by memory fusion: `true` when the text contains
    /// any filtered pattern or an injected `[BLOCKED]` marker.
    pub fn is_tainted(&self, text: &str) -> bool {
        text.contains(BLOCKED_TOKEN) || !self.check(text).safe
    }
}

impl Default for PatternFilter {
    fn default() -> Self {
        Self::new()
    }
}
