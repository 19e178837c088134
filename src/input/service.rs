//! Key bindings and prompt editing.
//!
//! Raw events go through a `less`-style state machine that turns them into
//! [`InputAction`]s for the dispatcher. Digits typed in navigation mode build a
//! count prefix applied to the next command (`10j`, `3f`, `250g`, `40%`).

use crate::cache::Direction;
use crate::error::Result;
use crate::input::raw::{RawInputCollector, RawInputEvent, ScrollDirection};
use ratatui::crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

/// Which value a status line prompt collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Search(Direction),
    Goto,
    Ignore,
    Unignore,
    Format,
    Split,
    Highlight,
    Save,
    /// Line whose fields become the column names
    HeaderLine,
    HideColumns,
    ShowColumns,
    Align,
}

impl PromptKind {
    pub fn label(self) -> &'static str {
        match self {
            PromptKind::Search(Direction::Forward) => "/",
            PromptKind::Search(Direction::Backward) => "?",
            PromptKind::Goto => "Goto: ",
            PromptKind::Ignore => "Ignore: ",
            PromptKind::Unignore => "Unignore (empty for all): ",
            PromptKind::Format => "Format (cols:fmt): ",
            PromptKind::Split => "Split regex (empty for blanks): ",
            PromptKind::Highlight => "Highlight regex (empty for none): ",
            PromptKind::Save => "Save to: ",
            PromptKind::HeaderLine => "Column names from line: ",
            PromptKind::HideColumns => "Hide columns (empty shows all): ",
            PromptKind::ShowColumns => "Show columns: ",
            PromptKind::Align => "Align (cols:l|r|c|a): ",
        }
    }

    /// An empty answer resets something instead of being a no-op.
    fn accepts_empty(self) -> bool {
        matches!(
            self,
            PromptKind::Search(_)
                | PromptKind::Unignore
                | PromptKind::Split
                | PromptKind::Highlight
                | PromptKind::HideColumns
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputState {
    Navigation,
    Prompt(PromptKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    Scroll {
        direction: ScrollDirection,
        lines: u64,
    },
    /// Full screen; a count sets and remembers the step in lines
    Page {
        direction: ScrollDirection,
        lines: Option<u64>,
    },
    HalfPage {
        direction: ScrollDirection,
        lines: Option<u64>,
    },
    GoToStart,
    GoToEnd,
    /// 1-based line number
    GoToLine(u64),
    GoToPercent(f64),
    /// Move the first displayed column (negative is left)
    ShiftColumns(i64),
    StartPrompt(PromptKind),
    UpdatePrompt {
        kind: PromptKind,
        buffer: String,
    },
    CancelPrompt,
    SubmitPrompt {
        kind: PromptKind,
        input: String,
    },
    NextMatch,
    PreviousMatch,
    ClearSearch,
    ToggleIgnored,
    /// Show or hide the column names
    ToggleHeaders,
    ToggleLineNumbers,
    /// Byte offsets in the gutter instead of line numbers
    ToggleOffsets,
    Refresh,
    /// Abort the running operation, dismiss any message
    Interrupt,
    Resize {
        width: u16,
        height: u16,
    },
    Quit,
    NoAction,
    InvalidInput,
}

impl InputAction {
    /// Actions that must reach a busy dispatcher through the cancel token.
    pub fn interrupts(&self) -> bool {
        matches!(self, InputAction::Interrupt | InputAction::Quit)
    }
}

pub struct InputStateMachine {
    state: InputState,
    count: Option<u64>,
    buffer: String,
}

impl Default for InputStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl InputStateMachine {
    pub fn new() -> Self {
        Self {
            state: InputState::Navigation,
            count: None,
            buffer: String::new(),
        }
    }

    pub fn state(&self) -> InputState {
        self.state
    }

    pub fn pending_count(&self) -> Option<u64> {
        self.count
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> InputAction {
        if key.kind == KeyEventKind::Release {
            return InputAction::NoAction;
        }
        match self.state {
            InputState::Navigation => self.navigation_key(key),
            InputState::Prompt(kind) => self.prompt_key(kind, key),
        }
    }

    fn navigation_key(&mut self, key: KeyEvent) -> InputAction {
        use ScrollDirection::{Down, Up};

        if key.modifiers.contains(KeyModifiers::ALT) {
            self.count = None;
            return InputAction::InvalidInput;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if let (KeyCode::Char(c @ '0'..='9'), false) = (key.code, ctrl) {
            let digit = u64::from(c as u8 - b'0');
            self.count = Some(
                self.count
                    .unwrap_or(0)
                    .saturating_mul(10)
                    .saturating_add(digit),
            );
            return InputAction::NoAction;
        }

        let count = self.count.take();
        let n = count.unwrap_or(1).max(1);

        match (key.code, ctrl) {
            (KeyCode::Char('c'), true) => InputAction::Quit,
            (KeyCode::Char('q') | KeyCode::Char('Q'), false) => InputAction::Quit,
            (KeyCode::Esc, _) | (KeyCode::Char('g'), true) => InputAction::Interrupt,

            (KeyCode::Char('j') | KeyCode::Char('e'), false)
            | (KeyCode::Down | KeyCode::Enter, _)
            | (KeyCode::Char('n'), true) => InputAction::Scroll {
                direction: Down,
                lines: n,
            },
            (KeyCode::Char('k') | KeyCode::Char('y'), false)
            | (KeyCode::Up, _)
            | (KeyCode::Char('p'), true) => InputAction::Scroll {
                direction: Up,
                lines: n,
            },
            (KeyCode::Char('f') | KeyCode::Char(' '), false)
            | (KeyCode::PageDown, _)
            | (KeyCode::Char('f'), true) => InputAction::Page {
                direction: Down,
                lines: count,
            },
            (KeyCode::Char('b'), _) | (KeyCode::PageUp, _) => InputAction::Page {
                direction: Up,
                lines: count,
            },
            (KeyCode::Char('d'), _) => InputAction::HalfPage {
                direction: Down,
                lines: count,
            },
            (KeyCode::Char('u'), _) => InputAction::HalfPage {
                direction: Up,
                lines: count,
            },

            (KeyCode::Char('g') | KeyCode::Char('<'), false) | (KeyCode::Home, _) => {
                count.map_or(InputAction::GoToStart, InputAction::GoToLine)
            }
            (KeyCode::Char('G') | KeyCode::Char('>'), false) | (KeyCode::End, _) => {
                count.map_or(InputAction::GoToEnd, InputAction::GoToLine)
            }
            (KeyCode::Char('%'), false) => {
                InputAction::GoToPercent(count.unwrap_or(0).min(100) as f64)
            }
            (KeyCode::Left, _) => InputAction::ShiftColumns(-(n as i64)),
            (KeyCode::Right, _) => InputAction::ShiftColumns(n as i64),

            (KeyCode::Char('/'), false) => self.open_prompt(PromptKind::Search(Direction::Forward)),
            (KeyCode::Char('?'), false) => {
                self.open_prompt(PromptKind::Search(Direction::Backward))
            }
            (KeyCode::Char(':'), false) => self.open_prompt(PromptKind::Goto),
            (KeyCode::Char('i'), false) => self.open_prompt(PromptKind::Ignore),
            (KeyCode::Char('I'), false) => self.open_prompt(PromptKind::Unignore),
            (KeyCode::Char('F'), false) => self.open_prompt(PromptKind::Format),
            (KeyCode::Char('S'), false) => self.open_prompt(PromptKind::Split),
            (KeyCode::Char('h'), false) => self.open_prompt(PromptKind::Highlight),
            (KeyCode::Char('s'), false) => self.open_prompt(PromptKind::Save),
            (KeyCode::Char('^'), false) => self.open_prompt(PromptKind::HeaderLine),
            (KeyCode::Char('x'), false) => self.open_prompt(PromptKind::HideColumns),
            (KeyCode::Char('X'), false) => self.open_prompt(PromptKind::ShowColumns),
            (KeyCode::Char('a'), false) => self.open_prompt(PromptKind::Align),

            (KeyCode::Char('n'), false) => InputAction::NextMatch,
            (KeyCode::Char('N'), false) => InputAction::PreviousMatch,
            (KeyCode::Char('c'), false) => InputAction::ClearSearch,
            (KeyCode::Char('H'), false) => InputAction::ToggleIgnored,
            (KeyCode::Char('t'), false) => InputAction::ToggleHeaders,
            (KeyCode::Char('l'), false) => InputAction::ToggleLineNumbers,
            (KeyCode::Char('L'), false) => InputAction::ToggleOffsets,
            (KeyCode::Char('r'), false) | (KeyCode::Char('l'), true) => InputAction::Refresh,

            _ => InputAction::InvalidInput,
        }
    }

    fn open_prompt(&mut self, kind: PromptKind) -> InputAction {
        self.state = InputState::Prompt(kind);
        self.buffer.clear();
        InputAction::StartPrompt(kind)
    }

    fn close_prompt(&mut self) -> String {
        self.state = InputState::Navigation;
        std::mem::take(&mut self.buffer)
    }

    fn prompt_key(&mut self, kind: PromptKind, key: KeyEvent) -> InputAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                self.close_prompt();
                InputAction::CancelPrompt
            }
            KeyCode::Char('c') | KeyCode::Char('g') if ctrl => {
                self.close_prompt();
                InputAction::CancelPrompt
            }
            KeyCode::Char('u') if ctrl => {
                self.buffer.clear();
                InputAction::UpdatePrompt {
                    kind,
                    buffer: String::new(),
                }
            }
            KeyCode::Enter => {
                let input = self.close_prompt();
                if input.is_empty() && !kind.accepts_empty() {
                    InputAction::CancelPrompt
                } else {
                    InputAction::SubmitPrompt { kind, input }
                }
            }
            KeyCode::Backspace => {
                if self.buffer.pop().is_none() {
                    self.close_prompt();
                    InputAction::CancelPrompt
                } else {
                    InputAction::UpdatePrompt {
                        kind,
                        buffer: self.buffer.clone(),
                    }
                }
            }
            KeyCode::Char(c) if !ctrl => {
                self.buffer.push(c);
                InputAction::UpdatePrompt {
                    kind,
                    buffer: self.buffer.clone(),
                }
            }
            _ => InputAction::NoAction,
        }
    }
}

/// Raw collection plus the key state machine.
pub struct InputService {
    state_machine: InputStateMachine,
    raw_input: RawInputCollector,
}

impl Default for InputService {
    fn default() -> Self {
        Self::new()
    }
}

impl InputService {
    pub fn new() -> Self {
        Self {
            state_machine: InputStateMachine::new(),
            raw_input: RawInputCollector::new(),
        }
    }

    /// Wait up to `timeout` for input and return every action it produced.
    pub fn poll_actions(&mut self, timeout: Option<Duration>) -> Result<Vec<InputAction>> {
        let mut actions = Vec::new();
        if let Some(event) = self.raw_input.poll_event(timeout)? {
            actions.extend(self.translate(event));
            while let Some(event) = self.raw_input.next_ready() {
                actions.extend(self.translate(event));
            }
        }
        Ok(actions)
    }

    /// Feed one event directly, bypassing the terminal.
    pub fn process_event(&mut self, event: Event) -> Vec<InputAction> {
        self.raw_input.push_event(event);
        let mut actions = Vec::new();
        while let Some(event) = self.raw_input.next_ready() {
            actions.extend(self.translate(event));
        }
        actions
    }

    fn translate(&mut self, event: RawInputEvent) -> Option<InputAction> {
        let action = match event {
            RawInputEvent::Key(key) => self.state_machine.handle_key_event(key),
            RawInputEvent::Resize { width, height } => InputAction::Resize { width, height },
            RawInputEvent::Scroll { direction, lines } => InputAction::Scroll { direction, lines },
        };
        match action {
            InputAction::NoAction | InputAction::InvalidInput => None,
            action => Some(action),
        }
    }
}
