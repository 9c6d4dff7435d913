// ── Replacement dictionary ──
//
// Normalizes recurring OCR artifacts line by line before any filter or
// parser looks at the text.

use regex::Regex;

use crate::error::CoreError;

#[derive(Debug, Clone)]
enum Rule {
    Literal { from: String, to: String },
    Pattern { regex: Regex, to: String },
}

/// Ordered substitution table applied to every OCR line.
///
/// Rules run in insertion order; each rule sees the output of the
/// previous one. In regex mode keys are patterns and values may refer
/// to capture groups (`$1`, `${name}`).
#[derive(Debug, Clone, Default)]
pub struct ReplaceDictionary {
    rules: Vec<Rule>,
}

impl ReplaceDictionary {
    /// Build a dictionary from `(old, new)` pairs. Empty keys are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if regex mode is on and a key does
    /// not compile.
    pub fn new<I, K, V>(pairs: I, interpret_as_regex: bool) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut rules = Vec::new();
        for (from, to) in pairs {
            let from = from.into();
            if from.is_empty() {
                continue;
            }
            let to = to.into();
            let rule = if interpret_as_regex {
                let regex = Regex::new(&from).map_err(|e| CoreError::Config {
                    message: format!("invalid replace pattern '{from}': {e}"),
                })?;
                Rule::Pattern { regex, to }
            } else {
                Rule::Literal { from, to }
            };
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule to one line.
    pub fn apply(&self, line: &str) -> String {
        if line.trim().is_empty() {
            return line.to_owned();
        }
        let mut out = line.to_owned();
        for rule in &self.rules {
            out = match rule {
                Rule::Literal { from, to } => out.replace(from.as_str(), to),
                Rule::Pattern { regex, to } => regex.replace_all(&out, to.as_str()).into_owned(),
            };
        }
        out
    }

    /// Apply every rule to every line, keeping line order.
    pub fn apply_all(&self, lines: &[String]) -> Vec<String> {
        lines.iter().map(|line| self.apply(line)).collect()
    }
}
