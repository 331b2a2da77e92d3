//! Terminal colours. Every helper goes through `if_supports_color`, so
//! `NO_COLOR`, `FORCE_COLOR` and redirected output are honoured.

use owo_colors::{OwoColorize, Stream, Style};
use std::fmt::Display;

pub fn paint<T: Display>(stream: Stream, value: T, style: Style) -> String {
    value.if_supports_color(stream, |v| v.style(style)).to_string()
}

pub fn success<T: Display>(value: T) -> String {
    paint(Stream::Stdout, value, Style::new().green())
}

pub fn accent<T: Display>(value: T) -> String {
    paint(Stream::Stdout, value, Style::new().cyan())
}

pub fn ident<T: Display>(value: T) -> String {
    paint(Stream::Stdout, value, Style::new().yellow())
}

pub fn heading<T: Display>(value: T) -> String {
    paint(Stream::Stdout, value, Style::new().blue().bold())
}

pub fn notice<T: Display>(value: T) -> String {
    paint(Stream::Stdout, value, Style::new().magenta())
}

pub fn danger<T: Display>(value: T) -> String {
    paint(Stream::Stdout, value, Style::new().red())
}

pub fn strong<T: Display>(value: T) -> String {
    paint(Stream::Stdout, value, Style::new().bold())
}

/// Stderr labels such as "Error:" and "Warning:".
pub fn error_label(label: &str) -> String {
    paint(Stream::Stderr, label, Style::new().red().bold())
}

pub fn warning_label(label: &str) -> String {
    paint(Stream::Stderr, label, Style::new().yellow().bold())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forced_off_output_is_plain() {
        owo_colors::set_override(false);
        assert_eq!(success("✓"), "✓");
        assert_eq!(heading("Rule Information"), "Rule Information");
        assert_eq!(error_label("Error:"), "Error:");
        owo_colors::unset_override();
    }
}
