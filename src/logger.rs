// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! `[LEVEL][target] message` lines on stderr for the command-line tools.

use std::{
    io::Write,
    sync::atomic::{AtomicUsize, Ordering},
};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Current filter, stored as a `LevelFilter` discriminant
static LOG_LEVEL: AtomicUsize = AtomicUsize::new(LevelFilter::Info as usize);

static LOGGER: StderrLogger = StderrLogger;

pub struct StderrLogger;

fn filter_from(n: usize) -> LevelFilter {
    match n {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Changes the filter of an installed logger.
pub fn set_level(level: LevelFilter) {
    LOG_LEVEL.store(level as usize, Ordering::Relaxed);
    log::set_max_level(level);
}

/// Installs [`StderrLogger`] as the global logger.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    set_level(level);
    Ok(())
}

/// Maps `-v`/`-q` counts to a filter, starting from `Info`.
pub fn verbosity(verbose: u8, quiet: u8) -> LevelFilter {
    let level = LevelFilter::Info as i16 + i16::from(verbose) - i16::from(quiet);
    filter_from(level.max(0) as usize)
}

fn format_record(record: &Record<'_>) -> String {
    let level = match record.level() {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    };

    format!("[{}][{}] {}", level, record.target(), record.args())
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= filter_from(LOG_LEVEL.load(Ordering::Relaxed))
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let _ = writeln!(std::io::stderr().lock(), "{}", format_record(record));
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_format() {
        assert_eq!(
            format_record(
                &Record::builder()
                    .level(Level::Warn)
                    .target("bupkit::bup")
                    .args(format_args!("blob may be corrupt"))
                    .build()
            ),
            "[WARN][bupkit::bup] blob may be corrupt"
        );
    }

    #[test]
    fn verbosity_counts() {
        assert_eq!(verbosity(0, 0), LevelFilter::Info);
        assert_eq!(verbosity(1, 0), LevelFilter::Debug);
        assert_eq!(verbosity(5, 0), LevelFilter::Trace);
        assert_eq!(verbosity(0, 1), LevelFilter::Warn);
        assert_eq!(verbosity(0, 2), LevelFilter::Error);
        assert_eq!(verbosity(0, 9), LevelFilter::Off);
    }
}
