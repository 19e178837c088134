//! Pre-compiled search patterns.
//!
//! A [`SearchPattern`] is compiled once, when the user submits it, and carries two
//! engines for the same expression: a `regex::Regex` used on decoded field text and a
//! `grep_regex::RegexMatcher` used to scan raw bytes of the input. The matcher is built
//! with `\n` as line terminator so that no match ever spans two lines.

use crate::error::{ColvError, Result};
use grep_matcher::Matcher;
use grep_regex::{RegexMatcher, RegexMatcherBuilder};
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::ops::Range;

/// A compiled pattern usable both on field strings and on raw input bytes.
#[derive(Clone)]
pub struct SearchPattern {
    source: String,
    case_insensitive: bool,
    regex: Regex,
    matcher: RegexMatcher,
}

impl SearchPattern {
    /// Compile `pattern`. Fails with [`ColvError::PatternError`] when either engine
    /// rejects it, before any navigation state is touched.
    pub fn new(pattern: &str, case_insensitive: bool) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|err| ColvError::pattern(pattern, err.to_string()))?;

        let matcher = RegexMatcherBuilder::new()
            .case_insensitive(case_insensitive)
            .multi_line(true)
            .line_terminator(Some(b'\n'))
            .build(pattern)
            .map_err(|err| ColvError::pattern(pattern, err.to_string()))?;

        Ok(Self {
            source: pattern.to_string(),
            case_insensitive,
            regex,
            matcher,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Byte range of the first match inside a decoded field.
    pub fn find_in(&self, text: &str) -> Option<Range<usize>> {
        self.regex.find(text).map(|m| m.range())
    }

    /// First match in `haystack` starting at or after `at`.
    ///
    /// `haystack` should end on a line boundary; bytes before `at` only serve as
    /// look-behind context.
    pub fn find_at(&self, haystack: &[u8], at: usize) -> Result<Option<Range<usize>>> {
        let found = self
            .matcher
            .find_at(haystack, at)
            .map_err(|err| ColvError::pattern(&self.source, err.to_string()))?;
        Ok(found.map(|m| m.start()..m.end()))
    }

    /// Start of the last match that begins in `[at, haystack.len())`.
    pub fn rfind_from(&self, haystack: &[u8], at: usize) -> Result<Option<usize>> {
        let end = haystack.len();
        let mut last = None;
        self.matcher
            .find_iter_at(haystack, at, |m| {
                if m.start() < end {
                    last = Some(m.start());
                }
                true
            })
            .map_err(|err| ColvError::pattern(&self.source, err.to_string()))?;
        Ok(last)
    }
}

impl fmt::Debug for SearchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchPattern")
            .field("source", &self.source)
            .field("case_insensitive", &self.case_insensitive)
            .finish()
    }
}

impl PartialEq for SearchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.case_insensitive == other.case_insensitive
    }
}

/// Compile a plain regex used for split, ignore and highlight rules.
pub fn compile_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| ColvError::pattern(pattern, err.to_string()))
}

/// Strip one pair of surrounding slashes, as typed in `/expr/` prompts.
pub fn strip_slashes(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed
        .strip_prefix('/')
        .and_then(|rest| rest.strip_suffix('/'))
        .unwrap_or(trimmed)
}
