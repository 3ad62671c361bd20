//! Input and tick events for the UI loop.

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};

/// Unified event type for the UI loop.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Keyboard press.
    Key(KeyEvent),
    /// Poll timeout expired; redraw and drain loop events.
    Tick,
    /// Terminal resized; the next draw picks up the new size.
    Resize,
}

/// Polls crossterm with a tick interval.
pub struct EventHandler {
    tick_rate: Duration,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        Self { tick_rate }
    }

    /// Wait up to one tick for a terminal event.
    pub fn next(&self) -> Result<UiEvent> {
        if event::poll(self.tick_rate)? {
            match event::read()? {
                // Only key presses; release/repeat events would double-fire
                // on some terminals.
                CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => {
                    Ok(UiEvent::Key(key))
                }
                CrosstermEvent::Resize(_, _) => Ok(UiEvent::Resize),
                _ => Ok(UiEvent::Tick),
            }
        } else {
            Ok(UiEvent::Tick)
        }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}
