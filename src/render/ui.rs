//! Terminal rendering: renderer trait, ratatui implementation, view state, themes.

pub mod renderer;
pub mod state;
pub mod terminal;
pub mod theme;

pub use renderer::UIRenderer;
pub use state::{Align, LineNumbers, PromptLine, StatusMessage, ViewState};
pub use terminal::{install_panic_hook, TerminalUI};
pub use theme::ColorTheme;

#[cfg(test)]
pub use renderer::tests::MockUIRenderer;
