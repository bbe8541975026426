use std::cell::RefCell;
use std::io::{self, Write};

use colored::{ColoredString, Colorize};

/// Print a trace line for the instruction just executed.
///
/// Formatting is skipped entirely unless tracing is enabled.
#[macro_export]
macro_rules! trace {
    ( $fmt:literal $($tt:tt)* ) => {{
        if $crate::output::Output::is_tracing() {
            let s = format!($fmt $($tt)*);
            $crate::output::Output::Trace.print_line(&s);
        }
    }};
}

/// Destination of operator-facing text.
///
/// Program console output is not routed through here; it goes through
/// [`crate::term::Io`]. Everything here is written to stderr.
#[derive(Clone, Copy, Debug)]
pub enum Output {
    /// Short colored lifecycle messages, eg. `Running`, `Halted`
    Status(Color),
    /// One line per executed instruction
    Trace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    Green,
    Cyan,
    Red,
}

impl Output {
    thread_local! {
        static IS_QUIET: RefCell<bool> = const { RefCell::new(false) };
        static IS_TRACING: RefCell<bool> = const { RefCell::new(false) };
        static IS_RAW: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_quiet(new_value: bool) -> bool {
        Self::IS_QUIET.with(|value| value.replace(new_value))
    }
    pub fn is_quiet() -> bool {
        Self::IS_QUIET.with(|value| *value.borrow())
    }
    pub fn set_tracing(new_value: bool) -> bool {
        Self::IS_TRACING.with(|value| value.replace(new_value))
    }
    pub fn is_tracing() -> bool {
        Self::IS_TRACING.with(|value| *value.borrow())
    }
    /// Only [`crate::term::RawModeGuard`] should change this.
    pub fn set_raw(new_value: bool) -> bool {
        Self::IS_RAW.with(|value| value.replace(new_value))
    }
    fn is_raw() -> bool {
        Self::IS_RAW.with(|value| *value.borrow())
    }

    /// Print `left` right-aligned in a 12 column gutter, then `right`.
    pub fn message(&self, left: &str, right: &str) {
        let Self::Status(color) = self else {
            self.print_line(&format!("{left} {right}"));
            return;
        };
        if Self::is_quiet() {
            return;
        }
        let left = match color {
            Color::Green => left.green(),
            Color::Cyan => left.cyan(),
            Color::Red => left.red(),
        };
        self.print_line(&format!("{left:>12} {right}"));
    }

    pub fn print_line(&self, line: &str) {
        let line = match self {
            Self::Status(_) => ColoredString::from(line),
            Self::Trace => line.dimmed(),
        };
        // Raw mode disables output processing, so the carriage return is explicit
        let end = if Self::is_raw() { "\r\n" } else { "\n" };
        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "{line}{end}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_replaced() {
        assert!(!Output::set_quiet(true));
        assert!(Output::is_quiet());
        assert!(Output::set_quiet(false));

        assert!(!Output::set_tracing(true));
        assert!(Output::is_tracing());
        assert!(Output::set_tracing(false));
        assert!(!Output::is_tracing());
    }
}
