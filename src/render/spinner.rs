//! Busy indicator for slow operations.
//!
//! The spinner thread writes straight to the terminal's status row, so it must be
//! stopped (and joined) before anything else draws.

use ratatui::crossterm::{
    cursor::MoveTo,
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const FRAMES: [char; 4] = ['|', '/', '-', '\\'];
const TICK: Duration = Duration::from_millis(100);
/// Operations finishing sooner than this never show the spinner.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(250);

pub struct Spinner {
    stop: Arc<AtomicBool>,
    drawn: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Spinner {
    pub fn start(row: u16, label: impl Into<String>) -> Self {
        Self::start_after(row, label, DEFAULT_DELAY)
    }

    pub fn start_after(row: u16, label: impl Into<String>, delay: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let drawn = Arc::new(AtomicBool::new(false));
        let label = label.into();

        let (thread_stop, thread_drawn) = (Arc::clone(&stop), Arc::clone(&drawn));
        let spawned = thread::Builder::new()
            .name("colv-spinner".into())
            .spawn(move || {
                let started = Instant::now();
                let mut stdout = io::stdout();
                let mut frame = 0;
                while !thread_stop.load(Ordering::Acquire) {
                    if started.elapsed() >= delay {
                        let text = format!("{} {}", FRAMES[frame % FRAMES.len()], label);
                        let written = queue!(
                            stdout,
                            MoveTo(0, row),
                            Clear(ClearType::CurrentLine),
                            Print(text)
                        )
                        .and_then(|_| stdout.flush());
                        if written.is_ok() {
                            thread_drawn.store(true, Ordering::Release);
                        }
                        frame += 1;
                    }
                    thread::park_timeout(TICK);
                }
            });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("no spinner: {e}");
                None
            }
        };
        Self {
            stop,
            drawn,
            handle,
        }
    }

    /// Stop and join; returns whether the spinner ever drew.
    pub fn stop(mut self) -> bool {
        self.finish();
        self.drawn.load(Ordering::Acquire)
    }

    fn finish(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                log::warn!("spinner thread panicked");
            }
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_operation_never_draws() {
        let spinner = Spinner::start_after(0, "Searching", Duration::from_secs(60));
        thread::sleep(Duration::from_millis(20));
        assert!(!spinner.stop());
    }

    #[test]
    fn drop_joins_thread() {
        let spinner = Spinner::start_after(0, "Counting", Duration::from_secs(60));
        let stop = Arc::clone(&spinner.stop);
        drop(spinner);
        assert!(stop.load(Ordering::Acquire));
    }
}
