//! Stdout logger for the `log` facade.

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

pub struct StdoutLogger;

static LOGGER: StdoutLogger = StdoutLogger;

impl StdoutLogger {
    /// Installs the logger process wide.
    pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(&LOGGER)?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for StdoutLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("[{} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}
