use std::{fmt, time::Instant};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::style::{Color, Palette};

/// Writes log records to stderr, prefixed with the time since startup.
struct Logger {
    start: Instant,
    palette: Palette,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let elapsed = self.start.elapsed();
        eprintln!(
            "{:>4}.{:06} {} {}: {}",
            elapsed.as_secs(),
            elapsed.subsec_micros(),
            LevelFormat(record.level(), self.palette),
            self.palette.paint(Color::DarkGray, record.target()),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Installs the logger and caps records at `level`.
pub fn init(level: LevelFilter, palette: Palette) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(Logger {
        start: Instant::now(),
        palette,
    }))?;
    log::set_max_level(level);
    Ok(())
}

struct LevelFormat(Level, Palette);

impl fmt::Display for LevelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let color = match self.0 {
            Level::Trace => Color::Magenta,
            Level::Debug => Color::Blue,
            Level::Info => Color::Green,
            Level::Warn => Color::Yellow,
            Level::Error => Color::Red,
        };
        let msg = match self.0 {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => " INFO",
            Level::Warn => " WARN",
            Level::Error => "ERROR",
        };
        write!(f, "{}", self.1.paint(color, msg))
    }
}
