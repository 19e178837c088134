//! Renderer abstraction.

use crate::cache::LineCache;
use crate::error::Result;
use crate::render::ui::state::ViewState;

pub trait UIRenderer {
    /// Draw the window of `cache` plus the status line.
    fn render(&mut self, view: &ViewState, cache: &LineCache) -> Result<()>;

    /// Enter raw mode and the alternate screen.
    fn initialize(&mut self) -> Result<()>;

    /// Restore the terminal. Safe to call more than once.
    fn cleanup(&mut self) -> Result<()>;

    /// Forget what is on screen so the next render redraws everything.
    fn invalidate(&mut self) -> Result<()> {
        Ok(())
    }

    /// (width, height)
    fn get_terminal_size(&self) -> Result<(u16, u16)>;
}
