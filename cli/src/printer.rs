use std::env::{self, VarError};
use std::fmt::Display;
use std::io::{stdout, Stdout, Write};

use crossterm::queue;
use crossterm::style::{Color, ContentStyle, Print, PrintStyledContent, StyledContent, Stylize};
use crossterm::tty::IsTty;

use hostcts::suite::{Outcome, TestOutcome};

pub(crate) fn no_color_set() -> bool {
    match env::var("NO_COLOR") {
        Err(VarError::NotPresent) => false,
        _ => true,
    }
}

/// Prints to stdout, styling only when stdout is a terminal and `NO_COLOR`
/// isn't set
pub struct Printer {
    is_tty: bool,
    style_enabled: bool,
}

impl Printer {
    pub fn new() -> Self {
        let is_tty = stdout().is_tty();
        let style_enabled = !no_color_set();
        Self {
            is_tty,
            style_enabled,
        }
    }

    pub fn println(&self, content: impl Display) {
        self.println_styled(content, ContentStyle::default())
    }

    pub fn print(&self, content: impl Display) {
        self.print_styled(content, ContentStyle::default())
    }

    pub fn println_colored(&self, content: impl Display, color: Color) {
        let style = ContentStyle::default().with(color);
        self.println_styled(content, style)
    }

    pub fn print_colored(&self, content: impl Display, color: Color) {
        let style = ContentStyle::default().with(color);
        self.print_styled(content, style)
    }

    pub fn println_styled(&self, content: impl Display, style: ContentStyle) {
        self.do_styled_print(content, style, true)
    }

    pub fn print_styled(&self, content: impl Display, style: ContentStyle) {
        self.do_styled_print(content, style, false)
    }

    /// `[ PASS ] suite#test` and friends
    pub fn print_outcome(&self, outcome: &TestOutcome) {
        let (label, color) = match &outcome.outcome {
            Outcome::Passed => ("PASS", Color::Green),
            Outcome::Skipped { .. } => ("SKIP", Color::Yellow),
            Outcome::Failed { .. } => ("FAIL", Color::Red),
            Outcome::Error { .. } => ("ERR ", Color::Magenta),
        };
        self.print("[ ");
        self.print_colored(label, color);
        self.print(format!(" ] {}#{}", outcome.suite, outcome.test));
        match &outcome.outcome {
            Outcome::Passed => self.println(format!(" ({} ms)", outcome.duration_ms)),
            Outcome::Skipped { reason } => self.println(format!(": {}", reason)),
            Outcome::Failed { message } | Outcome::Error { message } => {
                self.println("");
                for line in message.lines() {
                    self.println(format!("    {}", line));
                }
            }
        }
        self.flush();
    }

    pub fn print_summary(&self, outcomes: &[TestOutcome]) {
        let count = |f: fn(&Outcome) -> bool| outcomes.iter().filter(|it| f(&it.outcome)).count();
        let passed = count(|it| matches!(it, Outcome::Passed));
        let skipped = count(|it| matches!(it, Outcome::Skipped { .. }));
        let failed = count(|it| matches!(it, Outcome::Failed { .. }));
        let errors = count(|it| matches!(it, Outcome::Error { .. }));

        let color = if failed + errors > 0 {
            Color::Red
        } else {
            Color::Green
        };
        self.println_colored(
            format!(
                "{} passed, {} skipped, {} failed, {} errors",
                passed, skipped, failed, errors
            ),
            color,
        );
    }

    fn should_style(&self) -> bool {
        self.is_tty && self.style_enabled
    }

    fn do_styled_print(&self, content: impl Display, style: ContentStyle, with_nl: bool) {
        let should_style = self.should_style();
        with_stdout(|s| {
            if should_style {
                _ = queue!(s, PrintStyledContent(StyledContent::new(style, content)));
            } else {
                _ = queue!(s, Print(content));
            }
            if with_nl {
                _ = queue!(s, Print("\n"));
            }
        });
    }

    pub fn flush(&self) {
        with_stdout(|s| {
            _ = s.flush();
        })
    }
}

#[inline]
fn with_stdout<F: FnOnce(&mut Stdout)>(func: F) {
    let mut stdout = stdout();
    func(&mut stdout);
}
