//! Ignore rules.
//!
//! An ignored line is shown as raw text and takes no part in column layout. Rules
//! select lines by 0-based index, by inclusive index range, or by regex on the
//! line text. The textual syntax accepted from users counts lines from 1.

use crate::error::{ColvError, Result};
use crate::pattern::{compile_regex, strip_slashes};
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone)]
pub enum IgnoreRule {
    Line(u64),
    /// Inclusive range of line indices
    Range(u64, u64),
    Pattern(Regex),
}

impl IgnoreRule {
    /// Parse user syntax: `N`, `A-B` or `A..B` (1-based, inclusive), otherwise a
    /// regex, optionally wrapped in slashes.
    pub fn parse(input: &str) -> Result<Self> {
        let text = input.trim();
        if text.is_empty() {
            return Err(ColvError::invalid_argument("empty ignore rule"));
        }

        if text.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(IgnoreRule::Line(to_index(text)?));
        }

        let bounds = text.split_once("..").or_else(|| text.split_once('-'));
        if let Some((start, end)) = bounds {
            let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
            if numeric(start) && numeric(end) {
                let (start, end) = (to_index(start)?, to_index(end)?);
                if start > end {
                    return Err(ColvError::invalid_argument(format!(
                        "ignore range '{text}' is reversed"
                    )));
                }
                return Ok(IgnoreRule::Range(start, end));
            }
        }

        Ok(IgnoreRule::Pattern(compile_regex(strip_slashes(text))?))
    }

    pub fn matches(&self, text: &str, index: u64) -> bool {
        match self {
            IgnoreRule::Line(line) => *line == index,
            IgnoreRule::Range(start, end) => (*start..=*end).contains(&index),
            IgnoreRule::Pattern(regex) => regex.is_match(text),
        }
    }
}

fn to_index(number: &str) -> Result<u64> {
    let line: u64 = number
        .parse()
        .map_err(|_| ColvError::invalid_argument(format!("invalid line number '{number}'")))?;
    line.checked_sub(1)
        .ok_or_else(|| ColvError::invalid_argument("line numbers start at 1"))
}

impl PartialEq for IgnoreRule {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (IgnoreRule::Line(a), IgnoreRule::Line(b)) => a == b,
            (IgnoreRule::Range(a, b), IgnoreRule::Range(c, d)) => a == c && b == d,
            (IgnoreRule::Pattern(a), IgnoreRule::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for IgnoreRule {
    /// Shown with 1-based line numbers, the way users type them.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreRule::Line(line) => write!(f, "{}", line + 1),
            IgnoreRule::Range(start, end) => write!(f, "{}-{}", start + 1, end + 1),
            IgnoreRule::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

/// Ordered set of ignore rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `rule`; returns false when an equal rule is already present.
    pub fn add(&mut self, rule: IgnoreRule) -> bool {
        if self.rules.contains(&rule) {
            return false;
        }
        self.rules.push(rule);
        true
    }

    /// Remove the rule equal to `rule`; returns whether one was removed.
    pub fn remove(&mut self, rule: &IgnoreRule) -> bool {
        let before = self.rules.len();
        self.rules.retain(|existing| existing != rule);
        self.rules.len() != before
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn as_slice(&self) -> &[IgnoreRule] {
        &self.rules
    }

    pub fn is_ignored(&self, text: &str, index: u64) -> bool {
        self.rules.iter().any(|rule| rule.matches(text, index))
    }
}
