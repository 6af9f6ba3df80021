//! Operator-facing collaborators
//!
//! The capture loop and the naming session never touch a terminal directly.
//! They render through [`Display`], read keys through [`CommandSource`] and
//! ask for free text through [`Prompt`]. [`terminal::TerminalUi`] implements
//! all three for interactive use.

pub mod terminal;

use std::time::Duration;

use crate::config::ControlsConfig;
use crate::errors::CameraError;
use crate::preview::PreviewSurface;

pub use terminal::TerminalUi;

/// Operator command interpreted by the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartRecording,
    StopRecording,
    Quit,
}

/// Single-key command bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBindings {
    pub start: char,
    pub stop: char,
    pub quit: char,
}

impl KeyBindings {
    pub fn command_for(&self, key: char) -> Option<Command> {
        let key = key.to_ascii_lowercase();
        if key == self.start {
            Some(Command::StartRecording)
        } else if key == self.stop {
            Some(Command::StopRecording)
        } else if key == self.quit {
            Some(Command::Quit)
        } else {
            None
        }
    }

    pub fn help(&self) -> String {
        format!(
            "'{}' start | '{}' stop | '{}' quit",
            self.start, self.stop, self.quit
        )
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::from(&ControlsConfig::default())
    }
}

impl From<&ControlsConfig> for KeyBindings {
    fn from(controls: &ControlsConfig) -> Self {
        Self {
            start: controls.start_key.to_ascii_lowercase(),
            stop: controls.stop_key.to_ascii_lowercase(),
            quit: controls.quit_key.to_ascii_lowercase(),
        }
    }
}

/// Where previews are shown.
pub trait Display {
    /// Present the latest surface (if any cameras were readable) and a status line.
    fn show(&mut self, surface: Option<&PreviewSurface>, status: &str) -> Result<(), CameraError>;

    /// Whether the operator asked the display to go away.
    fn close_requested(&self) -> bool {
        false
    }

    /// Release display resources. Safe to call more than once.
    fn close(&mut self) -> Result<(), CameraError>;
}

/// Source of operator commands.
pub trait CommandSource {
    /// Wait up to `timeout` for a command.
    fn poll_command(&mut self, timeout: Duration) -> Result<Option<Command>, CameraError>;
}

/// Free-text input from the operator.
pub trait Prompt {
    /// Ask a question. `Ok(None)` means the input stream is closed.
    fn ask(&mut self, question: &str) -> Result<Option<String>, CameraError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let keys = KeyBindings::default();
        assert_eq!(keys.command_for('s'), Some(Command::StartRecording));
        assert_eq!(keys.command_for('E'), Some(Command::StopRecording));
        assert_eq!(keys.command_for('q'), Some(Command::Quit));
        assert_eq!(keys.command_for('x'), None);
    }
}
