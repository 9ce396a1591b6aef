//! User-facing output for the CLI.
//!
//! Colors are used only when stdout is a terminal.

use std::io::Write;

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

// ============================================================================
// STREAMS
// ============================================================================

pub fn color_choice() -> ColorChoice {
    if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

pub fn stdout() -> StandardStream {
    StandardStream::stdout(color_choice())
}

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

/// Line diff between two texts, `-` for the first and `+` for the second.
pub fn print_diff(stdout: &mut StandardStream, before: &str, after: &str) {
    let changeset = Changeset::new(before, after, "\n");
    for diff in &changeset.diffs {
        let (marker, color, text) = match diff {
            Difference::Same(x) => (' ', None, x),
            Difference::Add(x) => ('+', Some(Color::Green), x),
            Difference::Rem(x) => ('-', Some(Color::Red), x),
        };
        let _ = stdout.set_color(ColorSpec::new().set_fg(color));
        for line in text.lines() {
            let _ = writeln!(stdout, "{}{}", marker, line);
        }
    }
    let _ = stdout.reset();
}

/// One line of `check` output.
pub fn print_check(stdout: &mut StandardStream, name: &str, title: Option<&str>, ok: bool) {
    let (mark, color) = if ok {
        ("✓", Color::Green)
    } else {
        ("✗", Color::Red)
    };
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = write!(stdout, "{}", mark);
    let _ = stdout.reset();
    match title {
        Some(title) => {
            let _ = writeln!(stdout, " {} ({})", name, title);
        }
        None => {
            let _ = writeln!(stdout, " {}", name);
        }
    }
}

pub fn print_summary(stdout: &mut StandardStream, passed: usize, failed: usize) {
    let color = if failed == 0 { Color::Green } else { Color::Red };
    let _ = writeln!(stdout);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = writeln!(stdout, "{} passed, {} failed", passed, failed);
    let _ = stdout.reset();
}
