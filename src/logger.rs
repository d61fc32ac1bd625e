use log::{LevelFilter, Metadata, Record, SetLoggerError};
use chrono::Utc;

pub struct Logger {
    level: LevelFilter,
}

impl Logger {
    pub fn new(level: LevelFilter) -> Self {
        Logger { level }
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("{} [{}] {} - {}", Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.target(), record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Installs the console logger. Warnings and errors also go to Sentry when
/// a client is bound.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    let logger = sentry_log::SentryLogger::with_dest(Logger::new(level));

    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(level);

    Ok(())
}
