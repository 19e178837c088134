//! The line cache: a scrolling window of parsed rows over a byte source.
//!
//! [`LineCache`] keeps a contiguous run of [`Row`]s for the lines currently on
//! screen together with two cursors into the source:
//!
//! ```text
//!   off/line    byte offset and 0-based index of the first cached line
//!   off2/line2  byte offset and index just past the last cached line
//! ```
//!
//! At every public boundary `off <= off2`, `line <= line2` and
//! `line2 - line == rows.len()` hold.
//!
//! Navigation (`scroll`, the `goto_*` family, searches) moves the cursors and
//! shifts rows in and out at the edges instead of rebuilding the window. Rule
//! changes (ignore, split, format, highlight) rebuild the window in place.
//!
//! Operations that may have to read or scan the whole input (`goto_end`,
//! `goto_percent`, `goto_offset`, searches that fall back to a byte scan) poll a
//! [`CancelToken`]. When interrupted they return [`ColvError::Cancelled`] and leave
//! the cursors and rows as they were.
//!
//! [`ColvError::Cancelled`]: crate::error::ColvError::Cancelled

use crate::cancel::CancelToken;
use crate::error::{ColvError, Result};
use crate::pattern::SearchPattern;
use crate::row::{FieldRow, FormatRule, IgnoredRow, Row, Splitter};
use crate::rules::{IgnoreRule, IgnoreRules};
use crate::source::{count_newlines, ByteSource, CountLimit};
use regex::Regex;
use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Search direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// The two cursor pairs of the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub off: u64,
    pub off2: u64,
    pub line: u64,
    pub line2: u64,
}

/// Widest field seen so far per column. Only ever grows until reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnWidths {
    widths: Vec<usize>,
}

impl ColumnWidths {
    pub fn update(&mut self, fields: &[String]) {
        if self.widths.len() < fields.len() {
            self.widths.resize(fields.len(), 0);
        }
        for (width, field) in self.widths.iter_mut().zip(fields) {
            *width = (*width).max(field.chars().count());
        }
    }

    pub fn reset(&mut self) {
        self.widths.clear();
    }

    pub fn get(&self, column: usize) -> usize {
        self.widths.get(column).copied().unwrap_or(0)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.widths
    }

    pub fn len(&self) -> usize {
        self.widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }
}

/// Scroll controller and row cache over a [`ByteSource`].
pub struct LineCache {
    source: Box<dyn ByteSource>,
    pos: Position,
    rows: VecDeque<Row>,
    widths: ColumnWidths,
    pattern: Option<SearchPattern>,
    ignores: IgnoreRules,
    splitter: Splitter,
    formats: BTreeMap<usize, FormatRule>,
    highlight: Option<Regex>,
    need_more: bool,
    cancel: CancelToken,
}

impl LineCache {
    pub fn new<S: ByteSource + 'static>(source: S) -> Self {
        Self::from_boxed(Box::new(source))
    }

    pub fn from_boxed(source: Box<dyn ByteSource>) -> Self {
        Self {
            source,
            pos: Position::default(),
            rows: VecDeque::new(),
            widths: ColumnWidths::default(),
            pattern: None,
            ignores: IgnoreRules::new(),
            splitter: Splitter::default(),
            formats: BTreeMap::new(),
            highlight: None,
            need_more: false,
            cancel: CancelToken::new(),
        }
    }

    // ---- accessors -------------------------------------------------------

    pub fn position(&self) -> Position {
        self.pos
    }

    /// 0-based index of the top cached line.
    pub fn current_line(&self) -> u64 {
        self.pos.line
    }

    pub fn rows(&self) -> &VecDeque<Row> {
        &self.rows
    }

    /// The first `n` cached rows, top to bottom.
    pub fn visible_rows(&self, n: usize) -> impl Iterator<Item = &Row> {
        self.rows.iter().take(n)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_widths(&self) -> &ColumnWidths {
        &self.widths
    }

    pub fn search_pattern(&self) -> Option<&SearchPattern> {
        self.pattern.as_ref()
    }

    pub fn ignore_rules(&self) -> &[IgnoreRule] {
        self.ignores.as_slice()
    }

    pub fn splitter(&self) -> &Splitter {
        &self.splitter
    }

    pub fn format_rules(&self) -> &BTreeMap<usize, FormatRule> {
        &self.formats
    }

    /// Columns that currently carry a format rule, ascending.
    pub fn formatted_columns(&self) -> Vec<usize> {
        self.formats.keys().copied().collect()
    }

    pub fn highlight_pattern(&self) -> Option<&Regex> {
        self.highlight.as_ref()
    }

    /// True when the last fill came up short and the source may still grow.
    pub fn needs_more_data(&self) -> bool {
        self.need_more && self.source.more_data_possible()
    }

    /// Token that interrupts the running scan when cancelled from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn source(&self) -> &dyn ByteSource {
        self.source.as_ref()
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.source.file_path()
    }

    /// Offset of the last cached row's line, the widest the offset gutter shows.
    pub fn max_seen_offset(&self) -> Option<u64> {
        self.rows.back().map(Row::offset)
    }

    /// Total number of lines, reading the rest of a stream if needed.
    pub fn current_line_count(&mut self) -> Result<u64> {
        self.cancel.reset();
        self.source
            .total_line_count(CountLimit::unbounded(), &self.cancel)
    }

    // ---- navigation ------------------------------------------------------

    /// Move the window by `delta` lines, positive towards the end.
    ///
    /// Rows that stay visible are kept; only the edges are recomputed. Movement
    /// clamps at the start of input and at the last existing line.
    pub fn scroll(&mut self, delta: i64) -> Result<()> {
        let cached = self.rows.len();
        if delta > 0 {
            let moved = self.skip_forward(delta.unsigned_abs())?;
            let dropped = usize::try_from(moved).unwrap_or(usize::MAX).min(cached);
            self.rows.drain(..dropped);
            self.cache_forward(moved.min(cached as u64))?;
            log::debug!("scrolled forward {} of {} lines", moved, delta);
        } else if delta < 0 {
            let wanted = delta.unsigned_abs().min(self.pos.line);
            let moved = self.skip_backward(wanted);
            let dropped = usize::try_from(moved).unwrap_or(usize::MAX).min(cached);
            self.rows.truncate(cached - dropped);
            self.cache_backward(moved.min(cached as u64));
            log::debug!("scrolled backward {} of {} lines", moved, delta.unsigned_abs());
        }
        self.check_invariants();
        Ok(())
    }

    pub fn goto_start(&mut self) {
        self.rows.clear();
        self.pos = Position::default();
        self.check_invariants();
    }

    /// Show the last lines of the input. Reads a stream to its end.
    pub fn goto_end(&mut self) -> Result<()> {
        self.cancel.reset();
        let total = self
            .source
            .total_line_count(CountLimit::unbounded(), &self.cancel)?;
        let size = self.source.size();
        let span = self.rows.len().max(1) as i64;

        self.rows.clear();
        self.pos = Position {
            off: size,
            off2: size,
            line: total,
            line2: total,
        };
        log::info!("goto end: {} lines, {} bytes", total, size);
        self.scroll(-span)
    }

    /// Put 1-based display line `n` at the top, clamped to the input.
    pub fn goto_line(&mut self, n: u64) -> Result<()> {
        let target = n.saturating_sub(1);
        if target > self.pos.line && self.source.more_data_possible() {
            self.cancel.reset();
            self.source
                .total_line_count(CountLimit::lines(target.saturating_add(1)), &self.cancel)?;
        }
        let delta = i64::try_from(target).unwrap_or(i64::MAX) - self.pos.line as i64;
        self.scroll(delta)
    }

    /// Jump to `percent` of the total line count (clamped to `0..=100`).
    pub fn goto_percent(&mut self, percent: f64) -> Result<()> {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        self.cancel.reset();
        let total = self
            .source
            .total_line_count(CountLimit::unbounded(), &self.cancel)?;
        let line = (total as f64 * percent / 100.0).round() as u64;
        self.goto_line(line)
    }

    /// Put the line containing byte `offset` at the top. An offset on a newline
    /// belongs to the line that newline ends; offsets past the end select the last
    /// line.
    pub fn goto_offset(&mut self, offset: u64) -> Result<()> {
        self.cancel.reset();
        self.source
            .ensure_materialized(offset.saturating_add(1), &self.cancel)?;

        let size = self.source.size();
        let target = offset.min(size.saturating_sub(1));
        let start = self
            .source
            .rindex_of(b"\n", target)
            .map_or(0, |nl| nl + 1);
        let line = self.source.count_lines_upto(start, &self.cancel)?;

        self.rows.clear();
        self.pos = Position {
            off: start,
            off2: start,
            line,
            line2: line,
        };
        log::info!("goto offset {}: line {}", offset, line);
        self.check_invariants();
        Ok(())
    }

    // ---- search ----------------------------------------------------------

    /// Make `pattern` the active search and move to its next match.
    ///
    /// Cached rows are checked first (and all of them are tagged); if one matches,
    /// the window scrolls so the first hit sits at the leading edge (top for a
    /// forward search, bottom for a backward one). Otherwise the source is scanned
    /// past the window. Returns whether a match was found.
    pub fn search(&mut self, pattern: SearchPattern, direction: Direction) -> Result<bool> {
        self.cancel.reset();
        let len = self.rows.len();
        let mut first = None;
        for rank in 0..len {
            let index = match direction {
                Direction::Forward => rank,
                Direction::Backward => len - 1 - rank,
            };
            if self.rows[index].apply_pattern(&pattern) && first.is_none() {
                first = Some(rank as i64);
            }
        }
        log::info!("search /{}/ {:?}", pattern.as_str(), direction);
        self.pattern = Some(pattern.clone());

        match first {
            Some(rank) => {
                self.scroll(match direction {
                    Direction::Forward => rank,
                    Direction::Backward => -rank,
                })?;
                Ok(true)
            }
            None => self.search_next(&pattern, direction),
        }
    }

    /// Move to the next match of the active pattern, skipping the row at the
    /// leading edge. Returns false when there is no active pattern or no match.
    pub fn repeat_search(&mut self, direction: Direction) -> Result<bool> {
        let Some(pattern) = self.pattern.clone() else {
            return Ok(false);
        };
        self.cancel.reset();
        let len = self.rows.len();
        let hit = (1..len).find(|&rank| {
            let index = match direction {
                Direction::Forward => rank,
                Direction::Backward => len - 1 - rank,
            };
            self.rows[index].has_match()
        });

        match hit {
            Some(rank) => {
                let rank = rank as i64;
                self.scroll(match direction {
                    Direction::Forward => rank,
                    Direction::Backward => -rank,
                })?;
                Ok(true)
            }
            None => self.search_next(&pattern, direction),
        }
    }

    /// Drop the active pattern and every row's match state.
    pub fn clear_search(&mut self) {
        self.pattern = None;
        for row in self.rows.iter_mut() {
            row.clear_match();
        }
    }

    /// Byte-scan the source beyond the window.
    fn search_next(&mut self, pattern: &SearchPattern, direction: Direction) -> Result<bool> {
        match direction {
            Direction::Forward => {
                let Some(hit) = self
                    .source
                    .find_pattern(pattern, self.pos.off2, &self.cancel)?
                else {
                    return Ok(false);
                };
                let start = self.source.rindex_of(b"\n", hit).map_or(0, |nl| nl + 1);
                let skipped =
                    count_newlines(self.source.slice(self.pos.off2..start), &self.cancel)?;
                let line = self.pos.line2 + skipped;

                self.rows.clear();
                self.pos = Position {
                    off: start,
                    off2: start,
                    line,
                    line2: line,
                };
                log::debug!("forward match at byte {} (line {})", hit, line);
            }
            Direction::Backward => {
                let Some(hit) = self
                    .source
                    .rfind_pattern(pattern, self.pos.off, &self.cancel)?
                else {
                    return Ok(false);
                };
                let start = self.source.rindex_of(b"\n", hit).map_or(0, |nl| nl + 1);
                let skipped = count_newlines(self.source.slice(start..self.pos.off), &self.cancel)?;
                let line = self.pos.line - skipped;
                let span = self.rows.len();

                self.rows.clear();
                self.pos = Position {
                    off: start,
                    off2: start,
                    line,
                    line2: line,
                };
                log::debug!("backward match at byte {} (line {})", hit, line);
                if span > 1 {
                    self.scroll(-((span - 1) as i64))?;
                }
            }
        }
        self.check_invariants();
        Ok(true)
    }

    // ---- column names ----------------------------------------------------

    /// Field texts of 1-based display line `n`, as they read before any format
    /// rule. The window and the width table are left as they were.
    ///
    /// Ignored lines are refused; they carry no fields.
    pub fn header_fields(&mut self, n: u64) -> Result<Vec<String>> {
        if n == 0 {
            return Err(ColvError::invalid_argument(format!("Bad line number {n}")));
        }
        let pos = self.pos;
        let rows = std::mem::take(&mut self.rows);
        let widths = self.widths.clone();
        let need_more = self.need_more;
        self.pos.off2 = self.pos.off;
        self.pos.line2 = self.pos.line;

        let fetched = self.goto_line(n).and_then(|()| self.cache_fill(1));
        let row = if self.pos.line + 1 == n {
            self.rows.pop_front()
        } else {
            None
        };

        self.pos = pos;
        self.rows = rows;
        self.widths = widths;
        self.need_more = need_more;
        self.check_invariants();
        fetched?;

        match row {
            None => Err(ColvError::invalid_argument("No such line")),
            Some(Row::Ignored(_)) => Err(ColvError::invalid_argument("Ignored line: can't use")),
            Some(Row::Fields(row)) => {
                log::info!("column names from line {}", n);
                Ok(row.originals().unwrap_or(row.fields()).to_vec())
            }
        }
    }

    // ---- rules -----------------------------------------------------------

    /// Add an ignore rule; the window is rebuilt when the rule is new.
    pub fn add_ignore_rule(&mut self, rule: IgnoreRule) -> Result<bool> {
        log::info!("ignore rule added: {}", rule);
        let added = self.ignores.add(rule);
        if added {
            self.refresh()?;
        }
        Ok(added)
    }

    pub fn remove_ignore_rule(&mut self, rule: &IgnoreRule) -> Result<bool> {
        let removed = self.ignores.remove(rule);
        if removed {
            log::info!("ignore rule removed: {}", rule);
            self.refresh()?;
        }
        Ok(removed)
    }

    pub fn clear_ignore_rules(&mut self) -> Result<()> {
        self.ignores.clear();
        self.refresh()
    }

    /// Split on `pattern`, or on whitespace when `None`.
    pub fn set_split_pattern(&mut self, pattern: Option<Regex>) -> Result<()> {
        self.splitter = match pattern {
            Some(regex) => Splitter::Pattern(regex),
            None => Splitter::Whitespace,
        };
        self.refresh()
    }

    /// Format 0-based `column` with `rule`.
    pub fn set_format_rule(&mut self, column: usize, rule: FormatRule) -> Result<()> {
        log::info!("format column {} with '{}'", column, rule);
        self.formats.insert(column, rule);
        self.refresh()
    }

    pub fn unset_format_rule(&mut self, column: usize) -> Result<Option<FormatRule>> {
        let removed = self.formats.remove(&column);
        if removed.is_some() {
            self.refresh()?;
        }
        Ok(removed)
    }

    /// Highlight field rows whose raw text matches `pattern`.
    pub fn set_highlight_pattern(&mut self, pattern: Option<Regex>) -> Result<()> {
        self.highlight = pattern;
        self.refresh()
    }

    // ---- cache maintenance ----------------------------------------------

    /// Make sure at least `n` rows are cached, reading ahead as far as the source
    /// allows without blocking.
    pub fn cache_fill(&mut self, n: usize) -> Result<()> {
        let cached = self.rows.len();
        if cached < n {
            self.cache_forward((n - cached) as u64)?;
        }
        self.need_more = self.rows.len() < n;
        self.check_invariants();
        Ok(())
    }

    /// Rebuild the window at the same position.
    pub fn refresh(&mut self) -> Result<()> {
        let cached = self.rows.len();
        self.clear_cache();
        self.cache_fill(cached)
    }

    /// Empty the window and forget the column widths.
    pub fn clear_cache(&mut self) {
        self.rows.clear();
        self.pos.off2 = self.pos.off;
        self.pos.line2 = self.pos.line;
        self.widths.reset();
    }

    pub fn reset_sizes(&mut self) {
        self.widths.reset();
    }

    // ---- saving ----------------------------------------------------------

    /// Write the whole input to `sink`, reading a stream to its end.
    pub fn copy_all_to(&mut self, sink: &mut dyn std::io::Write) -> Result<u64> {
        self.cancel.reset();
        self.source.copy_all_to(sink, &self.cancel)
    }

    /// Save the input to `dest`: a hard link when the bytes live in a plain file on
    /// the same file system, a full copy otherwise. An existing `dest` is never
    /// overwritten.
    pub fn save_to(&mut self, dest: &Path) -> Result<u64> {
        if let Some(path) = self.source.file_path() {
            match std::fs::hard_link(path, dest) {
                Ok(()) => {
                    log::info!("linked {} to {}", path.display(), dest.display());
                    return Ok(self.source.size());
                }
                Err(e) => log::debug!("hard link failed ({}), copying instead", e),
            }
        }
        let file = File::options().write(true).create_new(true).open(dest)?;
        let mut writer = BufWriter::new(file);
        let written = self.copy_all_to(&mut writer)?;
        std::io::Write::flush(&mut writer)?;
        log::info!("saved {} bytes to {}", written, dest.display());
        Ok(written)
    }

    // ---- internals -------------------------------------------------------

    /// Start of the line preceding the line that starts at `pos`.
    fn line_start_before(&self, pos: u64) -> u64 {
        if pos < 2 {
            return 0;
        }
        self.source.rindex_of(b"\n", pos - 1).map_or(0, |nl| nl + 1)
    }

    /// Advance the top cursor by up to `n` lines without passing the last line.
    fn skip_forward(&mut self, n: u64) -> Result<u64> {
        let mut moved = 0;
        while moved < n {
            let Some(nl) = self.source.index_of(b"\n", self.pos.off)? else {
                break;
            };
            if nl + 1 >= self.source.size() {
                // the next line may still be on its way
                if !self.source.more_data_possible() || self.source.read_block(false)? == 0 {
                    break;
                }
                continue;
            }
            self.pos.off = nl + 1;
            moved += 1;
        }
        self.pos.line += moved;
        if self.pos.off2 < self.pos.off {
            self.pos.off2 = self.pos.off;
            self.pos.line2 = self.pos.line;
        }
        Ok(moved)
    }

    /// Move the bottom cursor back by up to `n` lines, dragging the top cursor
    /// along when they cross.
    fn skip_backward(&mut self, n: u64) -> u64 {
        let mut moved = 0;
        while moved < n && self.pos.off2 > 0 {
            self.pos.off2 = self.line_start_before(self.pos.off2);
            moved += 1;
        }
        self.pos.line2 -= moved;
        if self.pos.off > self.pos.off2 {
            self.pos.off = self.pos.off2;
            self.pos.line = self.pos.line2;
        }
        moved
    }

    /// Append up to `n` rows after the window. A final line without newline is
    /// only taken once the source has ended.
    fn cache_forward(&mut self, n: u64) -> Result<()> {
        for _ in 0..n {
            let start = self.pos.off2;
            let (end, next) = match self.source.index_of(b"\n", start)? {
                Some(nl) => (nl, nl + 1),
                None => {
                    let size = self.source.size();
                    if self.source.more_data_possible() || start >= size {
                        break;
                    }
                    (size, size)
                }
            };
            let row = self.build_row(start, end, self.pos.line2);
            self.rows.push_back(row);
            self.pos.off2 = next;
            self.pos.line2 += 1;
        }
        Ok(())
    }

    /// Prepend up to `n` rows before the window.
    fn cache_backward(&mut self, n: u64) {
        for _ in 0..n {
            if self.pos.off == 0 {
                break;
            }
            let line_end = self.pos.off;
            let start = self.line_start_before(line_end);
            let end = if self.source.byte_at(line_end - 1) == Some(b'\n') {
                line_end - 1
            } else {
                line_end
            };
            let row = self.build_row(start, end, self.pos.line - 1);
            self.rows.push_front(row);
            self.pos.off = start;
            self.pos.line -= 1;
        }
    }

    /// Turn the bytes `start..end` of line `index` into a row under the current
    /// rules, updating the column widths.
    fn build_row(&mut self, start: u64, end: u64, index: u64) -> Row {
        let text = String::from_utf8_lossy(self.source.slice(start..end)).into_owned();

        let mut row = if self.ignores.is_ignored(&text, index) {
            Row::Ignored(IgnoredRow::new(text, start))
        } else {
            let mut fields = self.splitter.split(&text);
            let originals = if self.formats.is_empty() {
                None
            } else {
                let originals = fields.clone();
                for (column, rule) in &self.formats {
                    if let Some(field) = fields.get_mut(*column) {
                        *field = rule.apply(field);
                    }
                }
                Some(originals)
            };
            self.widths.update(&fields);

            let mut row = FieldRow::new(fields, originals, start);
            row.set_highlighted(self.highlight.as_ref().is_some_and(|re| re.is_match(&text)));
            Row::Fields(row)
        };

        if let Some(pattern) = &self.pattern {
            row.apply_pattern(pattern);
        }
        row
    }

    fn check_invariants(&self) {
        debug_assert!(self.pos.off <= self.pos.off2, "off past off2: {:?}", self.pos);
        debug_assert!(self.pos.line <= self.pos.line2, "line past line2: {:?}", self.pos);
        debug_assert_eq!(
            self.pos.line2 - self.pos.line,
            self.rows.len() as u64,
            "cursor span does not match cached rows"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MappedSource;

    fn numbered(lines: usize) -> LineCache {
        let text: String = (0..lines).map(|i| format!("{i} row{i}\n")).collect();
        LineCache::new(MappedSource::from_bytes(text.into_bytes()))
    }

    fn top_field(cache: &LineCache) -> String {
        match cache.rows().front() {
            Some(Row::Fields(row)) => row.fields()[0].clone(),
            other => panic!("unexpected top row {other:?}"),
        }
    }

    #[test]
    fn widths_only_grow_until_reset() {
        let mut widths = ColumnWidths::default();
        widths.update(&["abc".into(), "d".into()]);
        widths.update(&["a".into(), "defg".into(), "hi".into()]);
        assert_eq!(widths.as_slice(), &[3, 4, 2]);
        widths.reset();
        assert!(widths.is_empty());
        assert_eq!(widths.get(5), 0);
    }

    #[test]
    fn reset_sizes_forgets_scrolled_out_widths() {
        let mut cache = LineCache::new(MappedSource::from_bytes(b"wide_field 1\na 2\nb 3\n".to_vec()));
        cache.cache_fill(1).unwrap();
        assert_eq!(cache.max_seen_offset(), Some(0));
        cache.scroll(1).unwrap();
        assert_eq!(cache.column_widths().get(0), 10);

        cache.reset_sizes();
        cache.refresh().unwrap();
        assert_eq!(cache.column_widths().get(0), 1);
        assert_eq!(cache.max_seen_offset(), Some(13));
        assert_eq!(cache.current_line_count().unwrap(), 3);
    }

    #[test]
    fn fill_and_scroll_keep_cursor_span() {
        let mut cache = numbered(50);
        cache.cache_fill(10).unwrap();
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.position().line2, 10);

        cache.scroll(3).unwrap();
        assert_eq!(cache.current_line(), 3);
        assert_eq!(top_field(&cache), "3");
        assert_eq!(cache.len(), 10);

        cache.scroll(-2).unwrap();
        assert_eq!(cache.current_line(), 1);
        assert_eq!(top_field(&cache), "1");
    }

    #[test]
    fn scroll_up_at_top_is_a_no_op() {
        let mut cache = numbered(5);
        cache.cache_fill(3).unwrap();
        let before = cache.position();
        cache.scroll(-4).unwrap();
        assert_eq!(cache.position(), before);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn final_line_without_newline_is_shown() {
        let mut cache = LineCache::new(MappedSource::from_bytes(b"a 1\nb 2".to_vec()));
        cache.cache_fill(5).unwrap();
        assert_eq!(cache.len(), 2);
        assert!(!cache.needs_more_data());
        assert_eq!(cache.position().off2, 7);
    }

    #[test]
    fn backward_scroll_restores_last_line_without_newline() {
        let mut cache = LineCache::new(MappedSource::from_bytes(b"a\nb\nlast".to_vec()));
        cache.goto_end().unwrap();
        cache.cache_fill(1).unwrap();
        assert_eq!(top_field(&cache), "last");

        cache.scroll(-1).unwrap();
        cache.scroll(1).unwrap();
        assert_eq!(top_field(&cache), "last");
    }

    #[test]
    fn empty_source_is_stable() {
        let mut cache = LineCache::new(MappedSource::from_bytes(Vec::new()));
        cache.cache_fill(10).unwrap();
        assert!(cache.is_empty());
        cache.scroll(5).unwrap();
        cache.goto_end().unwrap();
        cache.goto_percent(50.0).unwrap();
        cache.goto_offset(10).unwrap();
        assert_eq!(cache.position(), Position::default());
    }

    #[test]
    fn format_rules_keep_originals_for_matching() {
        let mut cache = LineCache::new(MappedSource::from_bytes(b"1234567 x\n".to_vec()));
        cache.set_format_rule(0, FormatRule::parse("%I").unwrap()).unwrap();
        cache.cache_fill(1).unwrap();
        assert_eq!(top_field(&cache), "1,234,567");
        assert_eq!(cache.column_widths().get(0), 9);
        assert_eq!(cache.formatted_columns(), vec![0]);

        assert!(cache
            .search(SearchPattern::new("4567", false).unwrap(), Direction::Forward)
            .unwrap());
        match cache.rows().front() {
            Some(Row::Fields(row)) => {
                assert_eq!(row.field_match(0), Some(&crate::row::FieldMatch::Whole))
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(cache.unset_format_rule(0).unwrap().is_some());
        assert_eq!(top_field(&cache), "1234567");
    }

    #[test]
    fn header_fields_leave_the_window_alone() {
        let mut cache = LineCache::new(MappedSource::from_bytes("# comment\nid name\n1 a\n2 b\n"));
        cache.add_ignore_rule(IgnoreRule::parse("/^#/").unwrap()).unwrap();
        cache.set_format_rule(0, FormatRule::parse("%03d").unwrap()).unwrap();
        cache.goto_line(3).unwrap();
        cache.cache_fill(2).unwrap();
        let before = (cache.position(), cache.rows().clone(), cache.column_widths().clone());

        assert_eq!(cache.header_fields(2).unwrap(), vec!["id", "name"]);
        assert_eq!(before, (cache.position(), cache.rows().clone(), cache.column_widths().clone()));

        let ignored = cache.header_fields(1).unwrap_err();
        assert!(ignored.to_string().contains("Ignored line"));
        assert!(cache.header_fields(9).unwrap_err().to_string().contains("No such line"));
        assert!(cache.header_fields(0).unwrap_err().to_string().contains("Bad line number"));
        assert_eq!(before.0, cache.position());
    }

    #[test]
    fn save_copies_stream_like_sources() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("saved.log");
        let mut cache = numbered(3);
        assert_eq!(cache.save_to(&dest).unwrap(), 21);
        assert_eq!(std::fs::read(&dest).unwrap(), b"0 row0\n1 row1\n2 row2\n");
        assert!(cache.save_to(&dest).is_err());
    }
}
