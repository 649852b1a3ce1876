//! Kernel-style logger bridging onto the `log` facade.

use core::sync::atomic::{AtomicUsize, Ordering};

use log::{Level, LevelFilter, Log, Metadata, Record};

/// Verbosity levels, ordered the way the rest of this core expects (higher
/// is more verbose).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(usize)]
pub enum LogLevel {
	Disabled = 0,
	Error = 1,
	Warning = 2,
	Info = 3,
	Debug = 4,
}

impl LogLevel {
	fn to_filter(self) -> LevelFilter {
		match self {
			LogLevel::Disabled => LevelFilter::Off,
			LogLevel::Error => LevelFilter::Error,
			LogLevel::Warning => LevelFilter::Warn,
			LogLevel::Info => LevelFilter::Info,
			LogLevel::Debug => LevelFilter::Debug,
		}
	}
}

static CURRENT_LEVEL: AtomicUsize = AtomicUsize::new(LogLevel::Info as usize);

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl Log for KernelLogger {
	fn enabled(&self, metadata: &Metadata<'_>) -> bool {
		metadata.level() <= level_filter()
	}

	fn log(&self, record: &Record<'_>) {
		if !self.enabled(record.metadata()) {
			return;
		}
		let tag = match record.level() {
			Level::Error => "ERROR",
			Level::Warn => "WARNING",
			Level::Info => "INFO",
			Level::Debug => "DEBUG",
			Level::Trace => "TRACE",
		};
		print(tag, record.args());
	}

	fn flush(&self) {}
}

#[cfg(not(test))]
fn print(tag: &str, args: &core::fmt::Arguments<'_>) {
	if let Some(sink) = crate::platform::log_sink() {
		sink.write_log(tag, *args);
	}
}

#[cfg(test)]
fn print(tag: &str, args: &core::fmt::Arguments<'_>) {
	std::eprintln!("[{tag}] {args}");
}

fn level_filter() -> LevelFilter {
	match CURRENT_LEVEL.load(Ordering::Relaxed) {
		0 => LevelFilter::Off,
		1 => LevelFilter::Error,
		2 => LevelFilter::Warn,
		3 => LevelFilter::Info,
		_ => LevelFilter::Debug,
	}
}

/// Installs the kernel logger as the global `log` backend. Idempotent;
/// the embedding kernel calls this once during early boot. Lines are
/// rendered but go nowhere until a sink is registered with
/// [`crate::platform::set_log_sink`] — call that first (or any time
/// before a line needs to actually reach somewhere).
pub fn init(level: LogLevel) {
	CURRENT_LEVEL.store(level as usize, Ordering::Relaxed);
	log::set_max_level(level.to_filter());
	let _ = log::set_logger(&LOGGER);
}

/// Changes the runtime log level after `init`.
pub fn set_level(level: LogLevel) {
	CURRENT_LEVEL.store(level as usize, Ordering::Relaxed);
	log::set_max_level(level.to_filter());
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn level_filter_gates_by_severity() {
		set_level(LogLevel::Warning);
		assert_eq!(level_filter(), LevelFilter::Warn);
		assert!(Level::Error <= level_filter());
		assert!(Level::Warn <= level_filter());
		assert!(!(Level::Info <= level_filter()));

		set_level(LogLevel::Disabled);
		assert_eq!(level_filter(), LevelFilter::Off);
		assert!(!(Level::Error <= level_filter()));
	}
}
