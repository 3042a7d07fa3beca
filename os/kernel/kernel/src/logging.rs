//! COM1 logging.

use kernel_serial::{SerialLogger, SerialPort, X86Ports};
use log::{LevelFilter, SetLoggerError};

static LOGGER: SerialLogger<X86Ports> =
    SerialLogger::new(SerialPort::com1(X86Ports), LevelFilter::Debug);

/// Program COM1 and route the `log` macros to it. Call once during early init.
///
/// # Errors
/// Fails if a logger is already installed.
pub fn init_logging() -> Result<(), SetLoggerError> {
    LOGGER.init()
}
