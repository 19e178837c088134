//! Crossterm polling and mouse wheel coalescing.
//!
//! Wheel ticks arrive in bursts; consecutive ticks in one direction are merged
//! into a single scroll so the line cache moves once per burst.

use crate::error::Result;
use ratatui::crossterm::event::{self, Event, KeyEvent, KeyEventKind, MouseEventKind};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const BURST_WINDOW: Duration = Duration::from_millis(12);
const WHEEL_LINES: u64 = 3;
const DEFAULT_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawInputEvent {
    Key(KeyEvent),
    Resize { width: u16, height: u16 },
    Scroll { direction: ScrollDirection, lines: u64 },
}

/// Pending wheel burst.
#[derive(Debug, Clone)]
pub struct ScrollBurst {
    window: Duration,
    pending: Option<(ScrollDirection, u64, Instant)>,
}

impl ScrollBurst {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Add ticks; a direction change hands back the burst it interrupts.
    pub fn push(
        &mut self,
        direction: ScrollDirection,
        lines: u64,
        now: Instant,
    ) -> Option<(ScrollDirection, u64)> {
        match &mut self.pending {
            Some((dir, total, last)) if *dir == direction => {
                *total = total.saturating_add(lines);
                *last = now;
                None
            }
            _ => {
                let previous = self.take();
                self.pending = Some((direction, lines, now));
                previous
            }
        }
    }

    /// The burst, once no tick arrived for a full window.
    pub fn take_if_quiet(&mut self, now: Instant) -> Option<(ScrollDirection, u64)> {
        match self.pending {
            Some((_, _, last)) if now.duration_since(last) >= self.window => self.take(),
            _ => None,
        }
    }

    pub fn take(&mut self) -> Option<(ScrollDirection, u64)> {
        self.pending.take().map(|(dir, lines, _)| (dir, lines))
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }
}

/// Polls crossterm and queues the events the key state machine cares about.
#[derive(Debug)]
pub struct RawInputCollector {
    burst: ScrollBurst,
    queue: VecDeque<RawInputEvent>,
}

impl Default for RawInputCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl RawInputCollector {
    pub fn new() -> Self {
        Self::with_window(BURST_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            burst: ScrollBurst::new(window),
            queue: VecDeque::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.burst.is_empty()
    }

    /// Feed an already-read event.
    pub fn push_event(&mut self, event: Event) {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => {
                self.flush_burst();
                self.queue.push_back(RawInputEvent::Key(key));
            }
            Event::Resize(width, height) => {
                self.flush_burst();
                self.queue.push_back(RawInputEvent::Resize { width, height });
            }
            Event::Mouse(mouse) => {
                let direction = match mouse.kind {
                    MouseEventKind::ScrollUp => ScrollDirection::Up,
                    MouseEventKind::ScrollDown => ScrollDirection::Down,
                    _ => return,
                };
                if let Some((direction, lines)) =
                    self.burst.push(direction, WHEEL_LINES, Instant::now())
                {
                    self.queue
                        .push_back(RawInputEvent::Scroll { direction, lines });
                }
            }
            _ => {}
        }
    }

    /// Next queued event or quiet burst, without polling the terminal.
    pub fn next_ready(&mut self) -> Option<RawInputEvent> {
        if let Some(event) = self.queue.pop_front() {
            return Some(event);
        }
        self.burst
            .take_if_quiet(Instant::now())
            .map(|(direction, lines)| RawInputEvent::Scroll { direction, lines })
    }

    /// Wait up to `timeout` for the next event.
    pub fn poll_event(&mut self, timeout: Option<Duration>) -> Result<Option<RawInputEvent>> {
        if let Some(event) = self.next_ready() {
            return Ok(Some(event));
        }
        if event::poll(timeout.unwrap_or(DEFAULT_POLL))? {
            self.push_event(event::read()?);
        }
        Ok(self.next_ready())
    }

    fn flush_burst(&mut self) {
        if let Some((direction, lines)) = self.burst.take() {
            self.queue
                .push_back(RawInputEvent::Scroll { direction, lines });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers, MouseEvent};

    fn wheel(kind: MouseEventKind) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn burst_merges_one_direction() {
        let mut burst = ScrollBurst::new(Duration::from_millis(10));
        let now = Instant::now();
        assert_eq!(burst.push(ScrollDirection::Down, 3, now), None);
        assert_eq!(
            burst.push(ScrollDirection::Down, 3, now + Duration::from_millis(4)),
            None
        );
        assert_eq!(burst.take_if_quiet(now + Duration::from_millis(5)), None);
        assert_eq!(
            burst.take_if_quiet(now + Duration::from_millis(20)),
            Some((ScrollDirection::Down, 6))
        );
        assert!(burst.is_empty());
    }

    #[test]
    fn direction_change_flushes_previous_burst() {
        let mut burst = ScrollBurst::new(Duration::from_millis(10));
        let now = Instant::now();
        burst.push(ScrollDirection::Up, 3, now);
        assert_eq!(
            burst.push(ScrollDirection::Down, 3, now),
            Some((ScrollDirection::Up, 3))
        );
        assert_eq!(burst.take(), Some((ScrollDirection::Down, 3)));
    }

    #[test]
    fn key_press_flushes_pending_wheel_first() {
        let mut collector = RawInputCollector::with_window(Duration::from_secs(60));
        collector.push_event(wheel(MouseEventKind::ScrollDown));
        collector.push_event(Event::Key(KeyEvent::new(
            KeyCode::Char('q'),
            KeyModifiers::NONE,
        )));

        assert_eq!(
            collector.next_ready(),
            Some(RawInputEvent::Scroll {
                direction: ScrollDirection::Down,
                lines: WHEEL_LINES
            })
        );
        assert!(matches!(collector.next_ready(), Some(RawInputEvent::Key(_))));
        assert!(collector.is_idle());
    }

    #[test]
    fn resize_is_queued() {
        let mut collector = RawInputCollector::new();
        collector.push_event(Event::Resize(100, 30));
        assert_eq!(
            collector.next_ready(),
            Some(RawInputEvent::Resize {
                width: 100,
                height: 30
            })
        );
    }
}
