//! What the renderer shows besides the cached rows.

use crate::error::{ColvError, Result};
use crate::input::PromptKind;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// How a field sits inside its column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    /// Numbers to the right, anything else to the left
    #[default]
    Auto,
    Left,
    Right,
    Center,
}

impl Align {
    pub fn parse(input: &str) -> Result<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "a" | "auto" => Ok(Align::Auto),
            "l" | "left" => Ok(Align::Left),
            "r" | "right" => Ok(Align::Right),
            "c" | "center" | "centre" => Ok(Align::Center),
            other => Err(ColvError::invalid_argument(format!("Invalid alignment: {other}"))),
        }
    }

    /// Blanks to put before and after `text` in a column `width` wide.
    pub fn padding(self, text: &str, width: usize) -> (usize, usize) {
        let fill = width.saturating_sub(text.chars().count());
        match self {
            Align::Auto if looks_numeric(text) => (fill, 0),
            Align::Auto | Align::Left => (0, fill),
            Align::Right => (fill, 0),
            Align::Center => (fill / 2, fill - fill / 2),
        }
    }
}

/// Plain decimal or scientific notation, sign allowed.
pub fn looks_numeric(text: &str) -> bool {
    static NUMERIC: OnceLock<Option<Regex>> = OnceLock::new();
    NUMERIC
        .get_or_init(|| Regex::new(r"^[+-]?\d*\.?\d*(?:[eE][+-]?\d+)?$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

/// What the gutter left of the rows shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineNumbers {
    #[default]
    Off,
    /// 1-based line number
    Number,
    /// Byte offset of the line start
    Offset,
}

/// Text being typed on the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptLine {
    pub kind: PromptKind,
    pub buffer: String,
}

impl PromptLine {
    pub fn render(&self) -> String {
        format!("{}{}", self.kind.label(), self.buffer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

#[derive(Debug, Clone)]
pub struct ViewState {
    /// File name, or `(stdin)`
    pub title: String,
    pub width: u16,
    pub height: u16,
    pub prompt: Option<PromptLine>,
    pub message: Option<StatusMessage>,
    /// Index of the first displayed column
    pub column_offset: usize,
    pub hide_ignored: bool,
    /// Total line count once something computed it
    pub total_lines: Option<u64>,
    /// Shown by the spinner while a slow operation runs
    pub busy: Option<String>,
    /// Column names taken from a line of the input
    pub headers: Option<Vec<String>>,
    pub show_headers: bool,
    /// 0-based columns left out of the display
    pub hidden_columns: BTreeSet<usize>,
    /// Columns not listed are `Align::Auto`
    pub alignments: BTreeMap<usize, Align>,
    pub line_numbers: LineNumbers,
}

impl ViewState {
    pub fn new(title: impl Into<String>, width: u16, height: u16) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            prompt: None,
            message: None,
            column_offset: 0,
            hide_ignored: false,
            total_lines: None,
            busy: None,
            headers: None,
            show_headers: false,
            hidden_columns: BTreeSet::new(),
            alignments: BTreeMap::new(),
            line_numbers: LineNumbers::Off,
        }
    }

    /// Rows available for content; the last terminal row is the status line and
    /// the column names take one more when shown.
    pub fn content_height(&self) -> usize {
        let header = u16::from(self.visible_headers().is_some());
        usize::from(self.height.saturating_sub(1 + header)).max(1)
    }

    /// Column names when they are set and switched on.
    pub fn visible_headers(&self) -> Option<&[String]> {
        self.headers.as_deref().filter(|_| self.show_headers)
    }

    pub fn set_headers(&mut self, names: Vec<String>) {
        self.headers = Some(names);
        self.show_headers = true;
    }

    /// Flip the column names on or off; false when there are none to show.
    pub fn toggle_headers(&mut self) -> bool {
        if self.headers.is_none() {
            return false;
        }
        self.show_headers = !self.show_headers;
        true
    }

    pub fn alignment(&self, column: usize) -> Align {
        self.alignments.get(&column).copied().unwrap_or_default()
    }

    pub fn set_alignment(&mut self, column: usize, align: Align) {
        if align == Align::Auto {
            self.alignments.remove(&column);
        } else {
            self.alignments.insert(column, align);
        }
    }

    /// Switch the gutter to `mode`, or off when it already shows `mode`.
    pub fn toggle_line_numbers(&mut self, mode: LineNumbers) {
        self.line_numbers = if self.line_numbers == mode {
            LineNumbers::Off
        } else {
            mode
        };
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    pub fn set_message(&mut self, text: impl Into<String>) {
        self.message = Some(StatusMessage {
            text: text.into(),
            is_error: false,
        });
    }

    pub fn set_error(&mut self, text: impl Into<String>) {
        self.message = Some(StatusMessage {
            text: text.into(),
            is_error: true,
        });
    }

    pub fn clear_message(&mut self) {
        self.message = None;
    }

    /// Clamp the column offset to the columns that exist.
    pub fn shift_columns(&mut self, delta: i64, columns: usize) {
        let max = columns.saturating_sub(1) as i64;
        let next = (self.column_offset as i64 + delta).clamp(0, max.max(0));
        self.column_offset = next as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_height_reserves_status_line() {
        let mut view = ViewState::new("x", 80, 24);
        assert_eq!(view.content_height(), 23);
        view.resize(80, 1);
        assert_eq!(view.content_height(), 1);
    }

    #[test]
    fn column_names_take_a_row_only_when_shown() {
        let mut view = ViewState::new("x", 80, 24);
        assert!(!view.toggle_headers());
        view.set_headers(vec!["id".into(), "level".into()]);
        assert_eq!(view.content_height(), 22);
        assert_eq!(view.visible_headers().map(<[String]>::len), Some(2));

        assert!(view.toggle_headers());
        assert_eq!(view.content_height(), 23);
        assert!(view.visible_headers().is_none());
    }

    #[test]
    fn alignment_padding() {
        assert_eq!(Align::Auto.padding("12.5", 6), (2, 0));
        assert_eq!(Align::Auto.padding("-3e4", 6), (2, 0));
        assert_eq!(Align::Auto.padding("GET", 6), (0, 3));
        assert_eq!(Align::Left.padding("7", 3), (0, 2));
        assert_eq!(Align::Center.padding("ab", 5), (1, 2));
        assert_eq!(Align::Right.padding("toolong", 3), (0, 0));
        assert_eq!(Align::parse(" R ").unwrap(), Align::Right);
        assert!(Align::parse("middle").is_err());
    }

    #[test]
    fn auto_alignment_is_not_stored() {
        let mut view = ViewState::new("x", 80, 24);
        view.set_alignment(2, Align::Center);
        assert_eq!(view.alignment(2), Align::Center);
        view.set_alignment(2, Align::Auto);
        assert!(view.alignments.is_empty());
        assert_eq!(view.alignment(7), Align::Auto);
    }

    #[test]
    fn line_number_gutter_toggles() {
        let mut view = ViewState::new("x", 80, 24);
        view.toggle_line_numbers(LineNumbers::Number);
        assert_eq!(view.line_numbers, LineNumbers::Number);
        view.toggle_line_numbers(LineNumbers::Offset);
        assert_eq!(view.line_numbers, LineNumbers::Offset);
        view.toggle_line_numbers(LineNumbers::Offset);
        assert_eq!(view.line_numbers, LineNumbers::Off);
    }

    #[test]
    fn column_shift_is_clamped() {
        let mut view = ViewState::new("x", 80, 24);
        view.shift_columns(-3, 5);
        assert_eq!(view.column_offset, 0);
        view.shift_columns(10, 5);
        assert_eq!(view.column_offset, 4);
        view.shift_columns(1, 0);
        assert_eq!(view.column_offset, 0);
    }

    #[test]
    fn prompt_line_prefixes_label() {
        let prompt = PromptLine {
            kind: PromptKind::Goto,
            buffer: "50%".into(),
        };
        assert_eq!(prompt.render(), "Goto: 50%");
    }
}
