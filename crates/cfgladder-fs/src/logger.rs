use std::cell::Cell;
use std::fs::{self, OpenOptions};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

use anstyle::{AnsiColor, Effects, Style};
use anyhow::{Context, Result};
use cfgladder_core::Logger;
use chrono::{DateTime, Local};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Level {
    Info,
    Error,
}

impl Level {
    fn prefix(self) -> &'static str {
        match self {
            Level::Info => " INFO",
            Level::Error => "ERROR",
        }
    }

    fn style(self) -> Style {
        match self {
            Level::Info => Style::new().fg_color(Some(AnsiColor::BrightCyan.into())),
            Level::Error => Style::new()
                .fg_color(Some(AnsiColor::BrightRed.into()))
                .effects(Effects::BOLD),
        }
    }
}

/// Appends every line of a run to one timestamped file and echoes it to the
/// console: info to stdout, errors to stderr.
#[derive(Debug)]
pub struct RunLogger {
    log_file: PathBuf,
    echo: bool,
    file_failed: Cell<bool>,
}

impl RunLogger {
    pub fn create(log_dir: &Path) -> Result<Self> {
        Self::create_at(log_dir, Local::now())
    }

    pub fn create_at(log_dir: &Path, started_at: DateTime<Local>) -> Result<Self> {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("failed creating log directory {}", log_dir.display()))?;
        Ok(Self {
            log_file: log_dir.join(log_file_name(started_at)),
            echo: true,
            file_failed: Cell::new(false),
        })
    }

    /// Keeps lines out of the console; the log file is still written.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    fn write(&self, level: Level, message: &str) {
        let line = format!("{}: {}", level.prefix(), message);
        if let Err(err) = self.append(&line) {
            if !self.file_failed.replace(true) {
                eprintln!("{err:#}");
            }
        }

        if !self.echo {
            return;
        }
        match level {
            Level::Info => println!("{}", render_console_line(level, message, stdout_is_rich())),
            Level::Error => {
                eprintln!("{}", render_console_line(level, message, stderr_is_rich()))
            }
        }
    }

    fn append(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .with_context(|| format!("failed opening log file {}", self.log_file.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed appending to log file {}", self.log_file.display()))
    }
}

impl Logger for RunLogger {
    fn info(&self, message: &str) {
        self.write(Level::Info, message);
    }

    fn error(&self, message: &str) {
        self.write(Level::Error, message);
    }
}

pub fn log_file_name(started_at: DateTime<Local>) -> String {
    format!("upgrade_{}.txt", started_at.format("%Y_%m_%d__%H_%M"))
}

pub(crate) fn render_console_line(level: Level, message: &str, rich: bool) -> String {
    if !rich {
        return format!("{}: {}", level.prefix(), message);
    }
    let style = level.style();
    format!(
        "{}{}{}: {}",
        style.render(),
        level.prefix(),
        style.render_reset(),
        message
    )
}

fn stdout_is_rich() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

fn stderr_is_rich() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}
