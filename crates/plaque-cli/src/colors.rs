//! Styled terminal text for plaque commands.
//!
//! Escape codes are only written when stdout is a terminal and `NO_COLOR`
//! is unset, so piped output stays plain.

use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::sync::OnceLock;

/// A text style understood by ANSI terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Bold,
    Dim,
    Green,
    Yellow,
    Cyan,
    Red,
}

impl Style {
    fn sgr(self) -> u8 {
        match self {
            Style::Bold => 1,
            Style::Dim => 2,
            Style::Red => 31,
            Style::Green => 32,
            Style::Yellow => 33,
            Style::Cyan => 36,
        }
    }

    /// `text` displayed in this style.
    pub fn paint<T: fmt::Display>(self, text: T) -> Painted<T> {
        Painted {
            style: self,
            text,
            enabled: None,
        }
    }
}

/// Text with a style, rendered through [`fmt::Display`].
pub struct Painted<T> {
    style: Style,
    text: T,
    /// Overrides terminal detection.
    enabled: Option<bool>,
}

impl<T> Painted<T> {
    pub fn with_color(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }
}

impl<T: fmt::Display> fmt::Display for Painted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.enabled.unwrap_or_else(color_enabled) {
            write!(f, "\x1b[{}m{}\x1b[0m", self.style.sgr(), self.text)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

fn color_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal())
}

/// Flush stdout so progress printed without a trailing newline shows up.
pub fn flush_stdout() {
    io::stdout().flush().ok();
}

/// Clear the screen and home the cursor, when stdout is a terminal.
pub fn clear_terminal() {
    if io::stdout().is_terminal() {
        print!("\x1b[2J\x1b[1;1H");
        flush_stdout();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paint_wraps_in_escape_codes() {
        assert_eq!(Style::Red.paint("✗").with_color(true).to_string(), "\x1b[31m✗\x1b[0m");
        assert_eq!(Style::Dim.paint(42).with_color(true).to_string(), "\x1b[2m42\x1b[0m");
    }

    #[test]
    fn test_plain_output_has_no_escape_codes() {
        assert_eq!(Style::Cyan.paint("[0] Setup").with_color(false).to_string(), "[0] Setup");
    }
}
