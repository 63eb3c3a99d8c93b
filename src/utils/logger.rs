use log::{Level, LevelFilter, Metadata, Record};

/// Serial-backed logger behind the log facade.
struct SerialLogger;

impl log::Log for SerialLogger {
    /// Checks if the given log level is enabled.
    ///
    /// # Arguments
    ///
    /// * `metadata` - Metadata of the record being considered.
    ///
    /// # Returns
    ///
    /// True for records at Info severity and above.
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    /// Logs the record by printing it to the serial console.
    ///
    /// # Arguments
    ///
    /// * `record` - The record to log.
    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            crate::serial_println!("[{}] {}", record.level(), record.args());
        }
    }

    /// Flushes the logger (no-op in this case).
    fn flush(&self) {}
}

/// The logger instance used for kernel logging.
static LOGGER: SerialLogger = SerialLogger;

/// Installs the logging facade. Called once during early bring-up, before
/// any subsystem that logs; a second call reports the condition on the
/// serial console and leaves the first logger in place.
///
/// # Example
///
/// ```rust
/// ember_kernel_rust::utils::logger::init();
///
/// log::info!("logging is live");
/// ```
pub fn init() {
    let result = log::set_logger(&LOGGER).map(|()| log::set_max_level(LevelFilter::Info));
    match result {
        Ok(_) => crate::serial_println!("Logger initialized correctly"),
        Err(_) => crate::serial_println!("Logger was already installed"),
    }
}
