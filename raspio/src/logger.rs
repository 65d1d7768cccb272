/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! A small stderr backend for the `log` facade.
//!
//! Lines carry the process uptime, `[  sss.uuuuuu] message`, with the first column marking
//! anything that is not plain information (`[W ...]` for warnings). Applications that already
//! install a logger do not need this one.

use {
    crate::time,
    colored::Colorize,
    core::{fmt, time::Duration},
    log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError},
    once_cell::sync::OnceCell,
    std::io::{self, IsTerminal, Write},
};

struct UptimeLogger {
    level: LevelFilter,
    colour: bool,
}

static LOGGER: OnceCell<UptimeLogger> = OnceCell::new();

/// Install the uptime logger for messages at `level` and above.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    time::start();
    let logger = LOGGER.get_or_init(|| UptimeLogger {
        level,
        colour: io::stderr().is_terminal(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

fn format_line(level: Level, uptime: Duration, args: &fmt::Arguments) -> String {
    let tag = match level {
        Level::Error => 'E',
        Level::Warn => 'W',
        Level::Info => ' ',
        Level::Debug => 'D',
        Level::Trace => 'T',
    };
    format!(
        "[{tag} {:>3}.{:06}] {args}",
        uptime.as_secs(),
        uptime.subsec_micros()
    )
}

impl Log for UptimeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), time::uptime(), record.args());
        let line = match (self.colour, record.level()) {
            (false, _) => line.normal(),
            (true, Level::Error) => line.red().bold(),
            (true, Level::Warn) => line.yellow(),
            (true, Level::Info) => line.normal(),
            (true, Level::Debug | Level::Trace) => line.dimmed(),
        };
        let _ = writeln!(io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_lines_have_blank_tag() {
        let line = format_line(
            Level::Info,
            Duration::from_micros(12_000_345),
            &format_args!("mapped {} registers", "BCM2711"),
        );
        assert_eq!(line, "[   12.000345] mapped BCM2711 registers");
    }

    #[test]
    fn warnings_are_marked() {
        let line = format_line(
            Level::Warn,
            Duration::from_millis(1_500),
            &format_args!("falling back"),
        );
        assert_eq!(line, "[W   1.500000] falling back");
    }
}
