//! Redis-style glob patterns.

use regex::Regex;
use strata_core::{StrataError, StrataResult};

/// A compiled Redis `KEYS`-style glob.
///
/// Supports `*`, `?`, `[...]` classes (with `^` or `!` negation) and
/// backslash escapes.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    regex: Regex,
}

impl GlobPattern {
    /// Compiles a glob pattern.
    pub fn new(pattern: &str) -> StrataResult<Self> {
        let mut out = String::with_capacity(pattern.len() * 2 + 2);
        out.push('^');

        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            match c {
                '*' => out.push_str(".*"),
                '?' => out.push('.'),
                '\\' => match chars.next() {
                    Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                    None => out.push_str(r"\\"),
                },
                '[' => {
                    out.push('[');
                    let mut first = true;
                    let mut closed = false;
                    for class_char in chars.by_ref() {
                        match class_char {
                            ']' => {
                                closed = true;
                                break;
                            }
                            '!' | '^' if first => out.push('^'),
                            '\\' | '[' => {
                                out.push('\\');
                                out.push(class_char);
                            }
                            other => out.push(other),
                        }
                        first = false;
                    }
                    if !closed {
                        return Err(StrataError::Cache(format!(
                            "Unterminated character class in pattern '{}'",
                            pattern
                        )));
                    }
                    out.push(']');
                }
                other => out.push_str(&regex::escape(&other.to_string())),
            }
        }
        out.push('$');

        let regex = Regex::new(&out)
            .map_err(|e| StrataError::Cache(format!("Invalid pattern '{}': {}", pattern, e)))?;

        Ok(Self { regex })
    }

    /// Returns true if the key matches.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }
}
