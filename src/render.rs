//! Everything between key actions and the screen.

pub mod service;
pub mod spinner;
pub mod ui;

pub use service::{Dispatcher, GotoTarget, Outcome};
pub use spinner::Spinner;
pub use ui::{ColorTheme, TerminalUI, UIRenderer, ViewState};
