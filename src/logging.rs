//! Log severity control.
//!
//! The engine logs through the `log` facade. The first call into the library
//! installs a small stderr logger (unless the host already installed one)
//! filtered at `MAPNIK_ERROR`; `mapnik_logging_set_severity` adjusts the
//! global maximum level.

use std::os::raw::c_int;
use std::sync::Once;
use std::sync::atomic::{AtomicI32, Ordering};

/// Log nothing.
pub const MAPNIK_NONE: c_int = 0;
/// Log debug messages and above.
pub const MAPNIK_DEBUG: c_int = 1;
/// Log warnings and errors.
pub const MAPNIK_WARN: c_int = 2;
/// Log errors only.
pub const MAPNIK_ERROR: c_int = 3;

static SEVERITY: AtomicI32 = AtomicI32::new(MAPNIK_ERROR);

static LOGGER: SimpleLogger = SimpleLogger;

static INIT: Once = Once::new();

struct SimpleLogger;

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let target = if record.target().is_empty() {
            record.module_path().unwrap_or_default()
        } else {
            record.target()
        };
        let line = record.line().unwrap_or(0);
        let args = record.args();

        match record.level() {
            log::Level::Error => eprintln!("Mapnik LOG> Error (in {target}:{line}): {args}"),
            log::Level::Warn => eprintln!("Mapnik LOG> Warning (in {target}:{line}): {args}"),
            log::Level::Info => eprintln!("Mapnik LOG> Info (in {target}:{line}): {args}"),
            log::Level::Debug => eprintln!("Mapnik LOG> Debug (in {target}:{line}): {args}"),
            log::Level::Trace => eprintln!("Mapnik LOG> Trace (in {target}:{line}): {args}"),
        }
    }

    fn flush(&self) {}
}

fn level_filter(severity: c_int) -> Option<log::LevelFilter> {
    match severity {
        MAPNIK_NONE => Some(log::LevelFilter::Off),
        MAPNIK_DEBUG => Some(log::LevelFilter::Debug),
        MAPNIK_WARN => Some(log::LevelFilter::Warn),
        MAPNIK_ERROR => Some(log::LevelFilter::Error),
        _ => None,
    }
}

/// Install the stderr logger at the current severity. Runs once per process.
///
/// A logger installed by the host is left alone, along with its level.
pub(crate) fn init() {
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            let severity = SEVERITY.load(Ordering::Relaxed);
            log::set_max_level(level_filter(severity).unwrap_or(log::LevelFilter::Error));
        }
    });
}

/// Set the global log severity.
///
/// # Parameters
///
/// - `level`: one of `MAPNIK_NONE` (0), `MAPNIK_DEBUG` (1), `MAPNIK_WARN` (2),
///   `MAPNIK_ERROR` (3). Any other value is ignored.
#[unsafe(no_mangle)]
pub extern "C" fn mapnik_logging_set_severity(level: c_int) {
    init();
    let Some(filter) = level_filter(level) else {
        log::warn!("ignoring unknown log severity {level}");
        return;
    };
    log::set_max_level(filter);
    SEVERITY.store(level, Ordering::Relaxed);
}

/// Current log severity, `MAPNIK_ERROR` until changed.
#[unsafe(no_mangle)]
pub extern "C" fn mapnik_logging_get_severity() -> c_int {
    SEVERITY.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(level_filter(MAPNIK_NONE), Some(log::LevelFilter::Off));
        assert_eq!(level_filter(MAPNIK_DEBUG), Some(log::LevelFilter::Debug));
        assert_eq!(level_filter(MAPNIK_WARN), Some(log::LevelFilter::Warn));
        assert_eq!(level_filter(MAPNIK_ERROR), Some(log::LevelFilter::Error));
        assert_eq!(level_filter(4), None);
        assert_eq!(level_filter(-1), None);
    }
}
