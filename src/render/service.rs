//! Applies input actions to the line cache and the view.
//!
//! Prompt answers are parsed here, so malformed user input is rejected before
//! the cache is touched. Failures of a single action end up on the status line;
//! the viewer keeps running.

use crate::cache::{Direction, LineCache};
use crate::error::{ColvError, Result};
use crate::input::{InputAction, PromptKind, ScrollDirection};
use crate::pattern::{compile_regex, strip_slashes, SearchPattern};
use crate::render::ui::{Align, LineNumbers, PromptLine, ViewState};
use crate::row::FormatRule;
use crate::rules::IgnoreRule;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

/// Destination typed at the goto prompt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GotoTarget {
    /// 1-based line number
    Line(u64),
    Percent(f64),
    /// Byte offset
    Offset(u64),
}

/// `N` goes to a line, `N%` or `Np` to a percentage, `No` to a byte offset.
pub fn parse_goto(input: &str) -> Result<GotoTarget> {
    let text = input.trim();
    let (number, suffix) = match text.char_indices().last() {
        Some((i, c @ ('%' | 'p' | 'o'))) => (text[..i].trim(), Some(c)),
        Some(_) => (text, None),
        None => return Err(ColvError::invalid_argument("Invalid line number")),
    };

    match suffix {
        Some('%' | 'p') => match number.parse::<f64>() {
            Ok(p) if (0.0..=100.0).contains(&p) => Ok(GotoTarget::Percent(p)),
            _ => Err(ColvError::invalid_argument("Invalid percentage")),
        },
        Some(_) => number
            .parse()
            .map(GotoTarget::Offset)
            .map_err(|_| ColvError::invalid_argument("Invalid offset")),
        None => match number.parse::<u64>() {
            Ok(n) if n > 0 => Ok(GotoTarget::Line(n)),
            _ => Err(ColvError::invalid_argument("Invalid line number")),
        },
    }
}

/// 1-based column list: numbers and `A-B` / `A..B` ranges separated by commas or
/// blanks. Returned 0-based, sorted, without duplicates.
pub fn parse_columns(input: &str) -> Result<Vec<usize>> {
    let number = |s: &str| -> Result<usize> {
        match s.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n - 1),
            _ => Err(ColvError::invalid_argument(format!("Invalid column: {s}"))),
        }
    };

    let mut columns = Vec::new();
    for token in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let range = token
            .split_once("...")
            .or_else(|| token.split_once(".."))
            .or_else(|| token.split_once('-'));
        match range {
            Some((start, end)) => {
                let (start, end) = (number(start)?, number(end)?);
                if start > end {
                    return Err(ColvError::invalid_argument(format!("Invalid range: {token}")));
                }
                columns.extend(start..=end);
            }
            None => columns.push(number(token)?),
        }
    }
    if columns.is_empty() {
        return Err(ColvError::invalid_argument("No columns given"));
    }
    columns.sort_unstable();
    columns.dedup();
    Ok(columns)
}

/// `COLS:FORMAT`; an empty format removes the columns' rules.
pub fn parse_format(input: &str) -> Result<(Vec<usize>, Option<FormatRule>)> {
    let (columns, template) = input
        .split_once(':')
        .ok_or_else(|| ColvError::invalid_argument("Expected COLUMNS:FORMAT"))?;
    let columns = parse_columns(columns)?;
    let template = template.trim();
    let rule = if template.is_empty() {
        None
    } else {
        Some(FormatRule::parse(template)?)
    };
    Ok((columns, rule))
}

/// `COLS:ALIGN` with ALIGN one of `l`, `r`, `c` or `a` (auto).
pub fn parse_alignment(input: &str) -> Result<(Vec<usize>, Align)> {
    let (columns, align) = input
        .rsplit_once(':')
        .ok_or_else(|| ColvError::invalid_argument("Expected COLUMNS:ALIGN"))?;
    Ok((parse_columns(columns)?, Align::parse(align)?))
}

fn column_list(columns: impl IntoIterator<Item = usize>) -> String {
    let names: Vec<String> = columns.into_iter().map(|c| (c + 1).to_string()).collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(" ")
    }
}

/// Optional regex answer; empty resets to the default.
fn optional_regex(input: &str) -> Result<Option<regex::Regex>> {
    let text = input.trim();
    if text.is_empty() {
        Ok(None)
    } else {
        compile_regex(strip_slashes(text)).map(Some)
    }
}

pub struct Dispatcher {
    ignore_case: bool,
    last_direction: Direction,
    /// Step remembered from a counted `f`/`b`
    page_lines: Option<u64>,
    /// Step remembered from a counted `d`/`u`
    half_page_lines: Option<u64>,
}

impl Dispatcher {
    pub fn new(ignore_case: bool) -> Self {
        Self {
            ignore_case,
            last_direction: Direction::Forward,
            page_lines: None,
            half_page_lines: None,
        }
    }

    /// Label for the busy indicator when `action` may have to read a lot.
    pub fn busy_label(action: &InputAction) -> Option<String> {
        match action {
            InputAction::GoToEnd => Some("Going to end".into()),
            InputAction::GoToLine(n) => Some(format!("Goto line {n}")),
            InputAction::GoToPercent(p) => Some(format!("Goto {}%", p.round())),
            InputAction::NextMatch | InputAction::PreviousMatch => Some("Searching".into()),
            InputAction::SubmitPrompt { kind, input } => match kind {
                PromptKind::Search(_) if !input.trim().is_empty() => {
                    Some(format!("Searching '{input}'"))
                }
                PromptKind::Goto => Some(format!("Goto {input}")),
                PromptKind::Save => Some(format!("Saving to {input}")),
                PromptKind::HeaderLine => Some(format!("Reading line {input}")),
                _ => None,
            },
            _ => None,
        }
    }

    /// Apply `action`. Errors a user can cause are reported on the status line.
    pub fn handle(
        &mut self,
        action: InputAction,
        cache: &mut LineCache,
        view: &mut ViewState,
    ) -> Outcome {
        cache.cancel_token().reset();
        match self.apply(action, cache, view) {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                log::info!("operation interrupted");
                view.set_error("Interrupted");
                Outcome::Continue
            }
            Err(e) => {
                log::warn!("action failed: {e}");
                view.set_error(e.to_string());
                Outcome::Continue
            }
        }
    }

    fn apply(
        &mut self,
        action: InputAction,
        cache: &mut LineCache,
        view: &mut ViewState,
    ) -> Result<Outcome> {
        let screen = view.content_height() as u64;
        match action {
            InputAction::Quit => return Ok(Outcome::Quit),
            InputAction::Scroll { direction, lines } => scroll(cache, direction, lines)?,
            InputAction::Page { direction, lines } => {
                if lines.is_some() {
                    self.page_lines = lines;
                }
                let step = self.page_lines.unwrap_or(screen.saturating_sub(1).max(1));
                scroll(cache, direction, step)?;
            }
            InputAction::HalfPage { direction, lines } => {
                if lines.is_some() {
                    self.half_page_lines = lines;
                }
                let step = self.half_page_lines.unwrap_or((screen / 2).max(1));
                scroll(cache, direction, step)?;
            }
            InputAction::GoToStart => cache.goto_start(),
            InputAction::GoToEnd => {
                cache.goto_end()?;
                note_total(cache, view)?;
            }
            InputAction::GoToLine(n) => cache.goto_line(n)?,
            InputAction::GoToPercent(p) => {
                cache.goto_percent(p)?;
                note_total(cache, view)?;
            }
            InputAction::ShiftColumns(delta) => {
                view.shift_columns(delta, cache.column_widths().len());
            }
            InputAction::StartPrompt(kind) => {
                view.clear_message();
                view.prompt = Some(PromptLine {
                    kind,
                    buffer: String::new(),
                });
            }
            InputAction::UpdatePrompt { kind, buffer } => {
                view.prompt = Some(PromptLine { kind, buffer });
            }
            InputAction::CancelPrompt => view.prompt = None,
            InputAction::SubmitPrompt { kind, input } => {
                view.prompt = None;
                self.submit(kind, &input, cache, view)?;
            }
            InputAction::NextMatch => self.repeat(self.last_direction, cache, view)?,
            InputAction::PreviousMatch => {
                self.repeat(self.last_direction.reverse(), cache, view)?;
            }
            InputAction::ClearSearch => cache.clear_search(),
            InputAction::ToggleIgnored => view.hide_ignored = !view.hide_ignored,
            InputAction::ToggleHeaders => {
                if !view.toggle_headers() {
                    view.set_error("No names defined");
                }
            }
            InputAction::ToggleLineNumbers => view.toggle_line_numbers(LineNumbers::Number),
            InputAction::ToggleOffsets => view.toggle_line_numbers(LineNumbers::Offset),
            InputAction::Refresh => {
                cache.refresh()?;
                view.clear_message();
            }
            InputAction::Interrupt => view.clear_message(),
            InputAction::Resize { width, height } => view.resize(width, height),
            InputAction::NoAction | InputAction::InvalidInput => {}
        }
        Ok(Outcome::Continue)
    }

    fn repeat(&self, direction: Direction, cache: &mut LineCache, view: &mut ViewState) -> Result<()> {
        if cache.search_pattern().is_none() {
            view.set_error("No active search");
        } else if !cache.repeat_search(direction)? {
            view.set_error("Pattern not found");
        }
        Ok(())
    }

    fn submit(
        &mut self,
        kind: PromptKind,
        input: &str,
        cache: &mut LineCache,
        view: &mut ViewState,
    ) -> Result<()> {
        match kind {
            PromptKind::Search(direction) => {
                if input.trim().is_empty() {
                    cache.clear_search();
                    return Ok(());
                }
                let pattern = SearchPattern::new(input, self.ignore_case)?;
                self.last_direction = direction;
                if !cache.search(pattern, direction)? {
                    view.set_error("Pattern not found");
                }
            }
            PromptKind::Goto => match parse_goto(input)? {
                GotoTarget::Line(n) => cache.goto_line(n)?,
                GotoTarget::Percent(p) => {
                    cache.goto_percent(p)?;
                    note_total(cache, view)?;
                }
                GotoTarget::Offset(offset) => cache.goto_offset(offset)?,
            },
            PromptKind::Ignore => {
                let rule = IgnoreRule::parse(input)?;
                if cache.add_ignore_rule(rule)? {
                    view.set_message(format!("Ignored: {}", rule_list(cache)));
                } else {
                    view.set_message("Rule already present");
                }
            }
            PromptKind::Unignore => {
                if input.trim().is_empty() {
                    cache.clear_ignore_rules()?;
                    view.set_message("All ignore rules removed");
                } else if cache.remove_ignore_rule(&IgnoreRule::parse(input)?)? {
                    view.set_message(format!("Ignored: {}", rule_list(cache)));
                } else {
                    view.set_error("No such ignore rule");
                }
            }
            PromptKind::Format => {
                let (columns, rule) = parse_format(input)?;
                for column in columns {
                    match &rule {
                        Some(rule) => cache.set_format_rule(column, rule.clone())?,
                        None => {
                            cache.unset_format_rule(column)?;
                        }
                    }
                }
                view.set_message(format!(
                    "Formatted: {}",
                    column_list(cache.formatted_columns())
                ));
            }
            PromptKind::Split => {
                cache.set_split_pattern(optional_regex(input)?)?;
                view.column_offset = 0;
            }
            PromptKind::Highlight => cache.set_highlight_pattern(optional_regex(input)?)?,
            PromptKind::HeaderLine => {
                let n = match input.trim().parse::<u64>() {
                    Ok(n) if n > 0 => n,
                    _ => {
                        return Err(ColvError::invalid_argument(format!(
                            "Bad line number {}",
                            input.trim()
                        )))
                    }
                };
                let names = cache.header_fields(n)?;
                view.set_headers(names);
                view.set_message(format!("Column names from line {n}"));
            }
            PromptKind::HideColumns => {
                if input.trim().is_empty() {
                    view.hidden_columns.clear();
                } else {
                    view.hidden_columns.extend(parse_columns(input)?);
                }
                view.set_message(format!(
                    "Hidden: {}",
                    column_list(view.hidden_columns.iter().copied())
                ));
            }
            PromptKind::ShowColumns => {
                for column in parse_columns(input)? {
                    view.hidden_columns.remove(&column);
                }
                view.set_message(format!(
                    "Hidden: {}",
                    column_list(view.hidden_columns.iter().copied())
                ));
            }
            PromptKind::Align => {
                let (columns, align) = parse_alignment(input)?;
                for column in columns {
                    view.set_alignment(column, align);
                }
            }
            PromptKind::Save => {
                let dest = input.trim();
                let bytes = cache.save_to(Path::new(dest))?;
                view.set_message(format!("Saved {bytes} bytes to {dest}"));
            }
        }
        Ok(())
    }
}

fn scroll(cache: &mut LineCache, direction: ScrollDirection, lines: u64) -> Result<()> {
    let lines = i64::try_from(lines).unwrap_or(i64::MAX);
    cache.scroll(match direction {
        ScrollDirection::Down => lines,
        ScrollDirection::Up => -lines,
    })
}

/// Record the total line count once the source is complete; it is cached by then.
fn note_total(cache: &mut LineCache, view: &mut ViewState) -> Result<()> {
    if !cache.source().more_data_possible() {
        view.total_lines = Some(cache.current_line_count()?);
    }
    Ok(())
}

fn rule_list(cache: &LineCache) -> String {
    let rules: Vec<String> = cache.ignore_rules().iter().map(ToString::to_string).collect();
    if rules.is_empty() {
        "none".to_string()
    } else {
        rules.join(" ")
    }
}
