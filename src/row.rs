//! Cached row model.
//!
//! Every line pulled into the cache becomes a [`Row`]: either a field row (split
//! into columns, possibly reformatted) or an ignored row kept as raw text. Rows
//! carry their search match state and remember the byte offset of their line.

use crate::pattern::SearchPattern;
use regex::Regex;
use std::ops::Range;

pub mod format;

pub use format::{Coercion, FormatRule, FORMAT_ERROR};

/// Where the active pattern matched inside one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMatch {
    /// Byte range inside the displayed field text
    Span(Range<usize>),
    /// Matched only the pre-format text; the whole displayed field is marked
    Whole,
}

/// A line split into display fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRow {
    fields: Vec<String>,
    /// Field texts before formatting, present when any format rule applied
    originals: Option<Vec<String>>,
    matches: Vec<Option<FieldMatch>>,
    has_match: bool,
    highlighted: bool,
    offset: u64,
}

impl FieldRow {
    pub fn new(fields: Vec<String>, originals: Option<Vec<String>>, offset: u64) -> Self {
        Self {
            fields,
            originals,
            matches: Vec::new(),
            has_match: false,
            highlighted: false,
            offset,
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn originals(&self) -> Option<&[String]> {
        self.originals.as_deref()
    }

    pub fn field_match(&self, index: usize) -> Option<&FieldMatch> {
        self.matches.get(index).and_then(Option::as_ref)
    }

    pub fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
    }

    fn apply_pattern(&mut self, pattern: &SearchPattern) -> bool {
        let originals = self.originals.as_deref();
        self.matches = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, field)| {
                if let Some(span) = pattern.find_in(field) {
                    return Some(FieldMatch::Span(span));
                }
                originals
                    .and_then(|orig| orig.get(i))
                    .filter(|orig| pattern.find_in(orig).is_some())
                    .map(|_| FieldMatch::Whole)
            })
            .collect();
        self.has_match = self.matches.iter().any(Option::is_some);
        self.has_match
    }

    fn clear_match(&mut self) {
        self.matches.clear();
        self.has_match = false;
    }
}

/// A line excluded from column layout by an ignore rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredRow {
    text: String,
    /// First match of the active pattern in the raw line
    span: Option<Range<usize>>,
    offset: u64,
}

impl IgnoredRow {
    pub fn new(text: String, offset: u64) -> Self {
        Self {
            text,
            span: None,
            offset,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn match_span(&self) -> Option<&Range<usize>> {
        self.span.as_ref()
    }
}

/// One cached line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Fields(FieldRow),
    Ignored(IgnoredRow),
}

impl Row {
    /// Byte offset of the start of this row's line.
    pub fn offset(&self) -> u64 {
        match self {
            Row::Fields(row) => row.offset,
            Row::Ignored(row) => row.offset,
        }
    }

    pub fn has_match(&self) -> bool {
        match self {
            Row::Fields(row) => row.has_match,
            Row::Ignored(row) => row.span.is_some(),
        }
    }

    /// Ignored rows are never highlighted.
    pub fn is_highlighted(&self) -> bool {
        match self {
            Row::Fields(row) => row.highlighted,
            Row::Ignored(_) => false,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Row::Ignored(_))
    }

    /// Recompute match state against `pattern`; returns whether the row matches.
    pub fn apply_pattern(&mut self, pattern: &SearchPattern) -> bool {
        match self {
            Row::Fields(row) => row.apply_pattern(pattern),
            Row::Ignored(row) => {
                row.span = pattern.find_in(&row.text);
                row.span.is_some()
            }
        }
    }

    pub fn clear_match(&mut self) {
        match self {
            Row::Fields(row) => row.clear_match(),
            Row::Ignored(row) => row.span = None,
        }
    }
}

/// How a line is cut into fields.
#[derive(Debug, Clone, Default)]
pub enum Splitter {
    /// Runs of whitespace; leading whitespace produces no empty field
    #[default]
    Whitespace,
    /// Regex separator; a leading empty field is kept, trailing empty ones dropped
    Pattern(Regex),
}

impl Splitter {
    pub fn split(&self, line: &str) -> Vec<String> {
        match self {
            Splitter::Whitespace => line.split_whitespace().map(str::to_string).collect(),
            Splitter::Pattern(regex) => {
                let mut fields: Vec<String> = regex.split(line).map(str::to_string).collect();
                while fields.last().is_some_and(String::is_empty) {
                    fields.pop();
                }
                fields
            }
        }
    }

    pub fn pattern(&self) -> Option<&Regex> {
        match self {
            Splitter::Whitespace => None,
            Splitter::Pattern(regex) => Some(regex),
        }
    }
}

impl PartialEq for Splitter {
    fn eq(&self, other: &Self) -> bool {
        self.pattern().map(Regex::as_str) == other.pattern().map(Regex::as_str)
    }
}
