//! Color theme for the terminal UI.

use planloop::controller::LoopStatus;
use ratatui::style::Color;

/// Named UI colors; one place to retint the whole interface.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub text: Color,
    pub muted: Color,
    pub border: Color,
    pub accent: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            text: Color::Gray,
            muted: Color::DarkGray,
            border: Color::DarkGray,
            accent: Color::Cyan,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Blue,
        }
    }
}

impl Theme {
    /// Status icon and its color, for the header indicator.
    pub fn status_indicator(&self, status: LoopStatus) -> (&'static str, Color) {
        match status {
            LoopStatus::Running => ("●", self.success),
            LoopStatus::Paused => ("⏸", self.warning),
            LoopStatus::Complete => ("✓", self.success),
            LoopStatus::Error => ("✗", self.error),
            LoopStatus::Ready => ("○", self.info),
            LoopStatus::Starting => ("◌", self.muted),
        }
    }
}
