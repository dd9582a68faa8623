use std::io::IsTerminal;

use anstyle::{AnsiColor, Effects, Style};
use cfgladder_core::Logger;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style() -> OutputStyle {
    if std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!(
            "{} {}",
            colorize(status_style(status), &status_badge(status)),
            message
        ),
    }
}

pub(crate) fn render_section_header(style: OutputStyle, title: &str) -> Option<String> {
    match style {
        OutputStyle::Plain => None,
        OutputStyle::Rich => Some(colorize(section_style(), &format!("== {title} =="))),
    }
}

fn status_badge(status: &str) -> String {
    format!("[{}]", status.to_ascii_uppercase())
}

fn status_style(status: &str) -> Style {
    match status {
        "ok" => Style::new()
            .fg_color(Some(AnsiColor::BrightGreen.into()))
            .effects(Effects::BOLD),
        "warn" | "pending" => Style::new()
            .fg_color(Some(AnsiColor::BrightYellow.into()))
            .effects(Effects::BOLD),
        "error" => Style::new()
            .fg_color(Some(AnsiColor::BrightRed.into()))
            .effects(Effects::BOLD),
        _ => Style::new().fg_color(Some(AnsiColor::BrightCyan.into())),
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

/// Console-only logger for the read-only commands; nothing goes to the run
/// log directory.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ConsoleLogger {
    style: OutputStyle,
}

impl ConsoleLogger {
    pub(crate) fn new(style: OutputStyle) -> Self {
        Self { style }
    }
}

impl Logger for ConsoleLogger {
    fn info(&self, message: &str) {
        println!("{}", render_status_line(self.style, "info", message));
    }

    fn error(&self, message: &str) {
        eprintln!("{}", render_status_line(self.style, "error", message));
    }
}
