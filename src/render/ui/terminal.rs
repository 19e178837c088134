//! ratatui terminal renderer.
//!
//! Field rows are drawn as aligned columns using the cache's width table,
//! separated by one blank; numbers sit right and text left unless a column says
//! otherwise. Ignored rows are drawn raw and dimmed. An optional gutter carries
//! line numbers or byte offsets, and column names can sit above the rows. The last
//! row of the screen is the status line: the active prompt, a message, or the
//! position.

use crate::cache::LineCache;
use crate::error::{ColvError, Result};
use crate::render::ui::renderer::UIRenderer;
use crate::render::ui::state::{LineNumbers, ViewState};
use crate::render::ui::theme::ColorTheme;
use crate::row::{FieldMatch, FieldRow, Row};
use ratatui::crossterm::{
    cursor::Show,
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Terminal,
};
use std::io::{self, Stdout};

type CrosstermTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Whether the terminal is currently in raw mode; read by the panic hook.
static RAW_MODE: parking_lot::Mutex<bool> = parking_lot::const_mutex(false);

fn restore_terminal() -> io::Result<()> {
    let mut raw = RAW_MODE.lock();
    if *raw {
        *raw = false;
        disable_raw_mode()?;
        execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture, Show)?;
    }
    Ok(())
}

/// Chain a panic hook that puts the terminal back before the message prints.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        previous(info);
    }));
}

pub struct TerminalUI {
    terminal: Option<CrosstermTerminal>,
    theme: ColorTheme,
}

impl TerminalUI {
    pub fn new() -> Self {
        Self::with_theme(ColorTheme::default())
    }

    pub fn with_theme(theme: ColorTheme) -> Self {
        Self {
            terminal: None,
            theme,
        }
    }

    pub fn theme(&self) -> &ColorTheme {
        &self.theme
    }
}

impl Default for TerminalUI {
    fn default() -> Self {
        Self::new()
    }
}

/// Column geometry shared by every line of one frame.
pub struct ColumnLayout<'a> {
    view: &'a ViewState,
    /// Width per column, widened to fit the column names when they are shown
    widths: Vec<usize>,
    /// Digits in the gutter; 0 without one
    gutter: usize,
}

impl<'a> ColumnLayout<'a> {
    pub fn new(view: &'a ViewState, cache: &LineCache) -> Self {
        let mut widths = cache.column_widths().as_slice().to_vec();
        if let Some(names) = view.visible_headers() {
            if widths.len() < names.len() {
                widths.resize(names.len(), 0);
            }
            for (width, name) in widths.iter_mut().zip(names) {
                *width = (*width).max(name.chars().count());
            }
        }
        let gutter = match view.line_numbers {
            LineNumbers::Off => 0,
            LineNumbers::Number => digits(cache.current_line() + view.content_height() as u64),
            LineNumbers::Offset => digits(cache.max_seen_offset().unwrap_or(0)),
        };
        Self {
            view,
            widths,
            gutter,
        }
    }

    fn width(&self, column: usize) -> usize {
        self.widths.get(column).copied().unwrap_or(0)
    }

    /// Columns drawn for a line of `count` fields, left to right.
    fn shown(&self, count: usize) -> impl Iterator<Item = usize> + '_ {
        let hidden = &self.view.hidden_columns;
        (self.view.column_offset..count).filter(move |c| !hidden.contains(c))
    }

    /// Gutter text for the row of display line `line`.
    fn gutter_text(&self, row: &Row, line: u64) -> Option<String> {
        let width = self.gutter;
        match self.view.line_numbers {
            LineNumbers::Off => None,
            LineNumbers::Number => Some(format!("{:>width$} ", line + 1)),
            LineNumbers::Offset => Some(format!("{:>width$} ", row.offset())),
        }
    }
}

fn digits(n: u64) -> usize {
    n.checked_ilog10().map_or(1, |d| d as usize + 1)
}

/// Styled text of the cached row shown as 0-based display line `line`.
pub fn row_line(
    row: &Row,
    line: u64,
    layout: &ColumnLayout<'_>,
    theme: &ColorTheme,
) -> Line<'static> {
    let mut spans = Vec::new();
    if let Some(gutter) = layout.gutter_text(row, line) {
        let style = if row.has_match() {
            theme.search_match
        } else {
            theme.line_number
        };
        spans.push(Span::styled(gutter, style));
    }

    match row {
        Row::Fields(fields) => {
            let base = if row.is_highlighted() {
                theme.highlight_row
            } else {
                theme.text_style()
            };
            push_cells(&mut spans, fields.fields(), Some(fields), layout, base, theme);
            Line::from(spans)
        }
        Row::Ignored(ignored) => {
            let text = ignored.text();
            match ignored.match_span().filter(|span| text.get((*span).clone()).is_some()) {
                Some(span) => {
                    spans.push(Span::styled(text[..span.start].to_string(), theme.ignored_row));
                    spans.push(Span::styled(text[span.clone()].to_string(), theme.search_match));
                    spans.push(Span::styled(text[span.end..].to_string(), theme.ignored_row));
                }
                None => spans.push(Span::styled(text.to_string(), theme.ignored_row)),
            }
            Line::from(spans).style(theme.ignored_row)
        }
    }
}

/// The column names, laid out like the rows beneath them.
pub fn header_line(
    names: &[String],
    layout: &ColumnLayout<'_>,
    theme: &ColorTheme,
) -> Line<'static> {
    let mut spans = Vec::new();
    if layout.view.line_numbers != LineNumbers::Off {
        spans.push(Span::raw(" ".repeat(layout.gutter + 1)));
    }
    push_cells(&mut spans, names, None, layout, theme.header, theme);
    Line::from(spans)
}

fn push_cells(
    spans: &mut Vec<Span<'static>>,
    cells: &[String],
    row: Option<&FieldRow>,
    layout: &ColumnLayout<'_>,
    base: Style,
    theme: &ColorTheme,
) {
    let shown: Vec<usize> = layout.shown(cells.len()).collect();
    for (i, &column) in shown.iter().enumerate() {
        let cell = &cells[column];
        if i > 0 {
            spans.push(Span::styled(" ", base));
        }
        let (before, after) = layout.view.alignment(column).padding(cell, layout.width(column));
        if before > 0 {
            spans.push(Span::styled(" ".repeat(before), base));
        }
        match row.and_then(|row| row.field_match(column)) {
            Some(FieldMatch::Whole) => {
                spans.push(Span::styled(cell.clone(), theme.search_match));
            }
            Some(FieldMatch::Span(range)) if cell.get(range.clone()).is_some() => {
                spans.push(Span::styled(cell[..range.start].to_string(), base));
                spans.push(Span::styled(cell[range.clone()].to_string(), theme.search_match));
                spans.push(Span::styled(cell[range.end..].to_string(), base));
            }
            _ => spans.push(Span::styled(cell.clone(), base)),
        }
        if after > 0 && i + 1 < shown.len() {
            spans.push(Span::styled(" ".repeat(after), base));
        }
    }
}

/// Lines shown for `view`: the column names when switched on, then the rows,
/// honouring the hide-ignored toggle.
pub fn content_lines(view: &ViewState, cache: &LineCache, theme: &ColorTheme) -> Vec<Line<'static>> {
    let layout = ColumnLayout::new(view, cache);
    let mut lines = Vec::new();
    if let Some(names) = view.visible_headers() {
        lines.push(header_line(names, &layout, theme));
    }
    let top = cache.current_line();
    lines.extend(
        cache
            .visible_rows(view.content_height())
            .enumerate()
            .filter(|(_, row)| !(view.hide_ignored && row.is_ignored()))
            .map(|(i, row)| row_line(row, top + i as u64, &layout, theme)),
    );
    lines
}

/// Status line text and style.
pub fn status_line(view: &ViewState, cache: &LineCache, theme: &ColorTheme) -> (String, Style) {
    if let Some(prompt) = &view.prompt {
        return (prompt.render(), theme.status_style());
    }
    if let Some(busy) = &view.busy {
        return (format!("  {busy}"), theme.status_style());
    }
    if let Some(message) = &view.message {
        let style = if message.is_error {
            theme.error_style()
        } else {
            theme.status_style()
        };
        return (message.text.clone(), style);
    }

    let first = cache.current_line() + 1;
    let last = cache.current_line() + cache.len().min(view.content_height()) as u64;
    let total = view
        .total_lines
        .map_or_else(|| "?".to_string(), |total| total.to_string());
    let mut text = format!("{} | lines {first}-{last}/{total}", view.title);
    if view.column_offset > 0 {
        text.push_str(&format!(" | from col {}", view.column_offset + 1));
    }
    if let Some(pattern) = cache.search_pattern() {
        text.push_str(&format!(" | /{}", pattern.as_str()));
    }
    if view.hide_ignored {
        text.push_str(" | ignored hidden");
    }
    if !view.hidden_columns.is_empty() {
        text.push_str(&format!(" | {} cols hidden", view.hidden_columns.len()));
    }
    if cache.needs_more_data() {
        text.push_str(" | waiting");
    }
    (text, theme.status_style())
}

impl UIRenderer for TerminalUI {
    fn render(&mut self, view: &ViewState, cache: &LineCache) -> Result<()> {
        let theme = &self.theme;
        if let Some(terminal) = self.terminal.as_mut() {
            terminal.draw(|frame| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(0), Constraint::Length(1)])
                    .split(frame.size());

                let content = Paragraph::new(content_lines(view, cache, theme));
                frame.render_widget(content, chunks[0]);

                let (text, style) = status_line(view, cache, theme);
                frame.render_widget(Paragraph::new(text).style(style), chunks[1]);
            })?;
        }
        Ok(())
    }

    fn initialize(&mut self) -> Result<()> {
        enable_raw_mode().map_err(|e| ColvError::ui(format!("cannot enter raw mode: {e}")))?;
        *RAW_MODE.lock() = true;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))
            .map_err(|e| ColvError::ui(format!("cannot set up terminal: {e}")))?;
        self.terminal = Some(terminal);
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        if self.terminal.take().is_some() {
            restore_terminal()?;
        }
        Ok(())
    }

    fn invalidate(&mut self) -> Result<()> {
        if let Some(terminal) = self.terminal.as_mut() {
            terminal.clear()?;
        }
        Ok(())
    }

    fn get_terminal_size(&self) -> Result<(u16, u16)> {
        Ok(ratatui::crossterm::terminal::size()?)
    }
}

impl Drop for TerminalUI {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
