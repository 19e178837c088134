//! Viewer event loop.
//!
//! One task owns the [`LineCache`]. It waits for either an input action or, when
//! the window is short of rows on a growing stream, a signal that more data
//! arrived; then it refills the window and redraws.

use crate::cache::LineCache;
use crate::error::Result;
use crate::input::InputAction;
use crate::render::{Dispatcher, Outcome, Spinner, UIRenderer, ViewState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Notify;

pub mod runtime;

const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct Application {
    cache: LineCache,
    renderer: Box<dyn UIRenderer>,
    dispatcher: Dispatcher,
    title: String,
    data_ready: Option<Arc<Notify>>,
    spinner: bool,
    startup: Vec<InputAction>,
    view: Option<ViewState>,
}

impl Application {
    pub fn new(
        cache: LineCache,
        renderer: Box<dyn UIRenderer>,
        title: impl Into<String>,
        ignore_case: bool,
    ) -> Self {
        Self {
            cache,
            renderer,
            dispatcher: Dispatcher::new(ignore_case),
            title: title.into(),
            data_ready: None,
            spinner: false,
            startup: Vec::new(),
            view: None,
        }
    }

    /// Wake the loop when a stream delivers data.
    pub fn with_data_notify(mut self, notify: Arc<Notify>) -> Self {
        self.data_ready = Some(notify);
        self
    }

    /// Show a busy indicator on the status row during slow actions.
    pub fn with_spinner(mut self, enabled: bool) -> Self {
        self.spinner = enabled;
        self
    }

    /// Actions applied once the first window is filled, e.g. an initial search.
    pub fn with_startup_actions(mut self, actions: Vec<InputAction>) -> Self {
        self.startup = actions;
        self
    }

    pub fn cache(&self) -> &LineCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut LineCache {
        &mut self.cache
    }

    /// View state of the last run, if any.
    pub fn view(&self) -> Option<&ViewState> {
        self.view.as_ref()
    }

    /// Take over the terminal until the user quits.
    pub async fn run(&mut self) -> Result<()> {
        self.renderer.initialize()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let input = runtime::spawn_input_thread(
            tx,
            Arc::clone(&shutdown),
            self.cache.cancel_token(),
            INPUT_POLL_INTERVAL,
        );

        let result = self.run_with_actions(rx).await;

        shutdown.store(true, Ordering::SeqCst);
        if input.join().is_err() {
            log::warn!("input thread panicked");
        }
        let cleanup = self.renderer.cleanup();
        result.and(cleanup)
    }

    /// Event loop over an action channel; returns when it yields `Quit` or closes.
    pub async fn run_with_actions(&mut self, mut actions: UnboundedReceiver<InputAction>) -> Result<()> {
        let (width, height) = self.renderer.get_terminal_size()?;
        let mut view = ViewState::new(self.title.clone(), width, height);

        self.cache.cache_fill(view.content_height())?;
        for action in std::mem::take(&mut self.startup) {
            self.execute(action, &mut view)?;
        }

        loop {
            self.cache.cache_fill(view.content_height())?;
            self.renderer.render(&view, &self.cache)?;

            let waiting = self.cache.needs_more_data() && self.data_ready.is_some();
            let action = tokio::select! {
                action = actions.recv() => action,
                _ = data_arrived(self.data_ready.as_deref()), if waiting => continue,
            };
            let Some(action) = action else {
                break;
            };
            if self.execute(action, &mut view)? == Outcome::Quit {
                break;
            }
        }

        self.view = Some(view);
        Ok(())
    }

    fn execute(&mut self, action: InputAction, view: &mut ViewState) -> Result<Outcome> {
        let label = if self.spinner {
            Dispatcher::busy_label(&action)
        } else {
            None
        };
        let spinner = label.map(|label| Spinner::start(view.height.saturating_sub(1), label));

        let outcome = self.dispatcher.handle(action, &mut self.cache, view);

        if let Some(spinner) = spinner {
            if spinner.stop() {
                self.renderer.invalidate()?;
            }
        }
        Ok(outcome)
    }
}

async fn data_arrived(notify: Option<&Notify>) {
    match notify {
        Some(notify) => notify.notified().await,
        None => std::future::pending().await,
    }
}
