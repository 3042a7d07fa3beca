use crate::{PortIo, SerialPort};
use core::fmt::Write;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` backend writing to a [`SerialPort`].
///
/// Lives in a `static` so it can be handed to [`log::set_logger`]:
/// [`SerialPort::new`] and [`SerialLogger::new`] are `const`.
pub struct SerialLogger<P> {
    port: SerialPort<P>,
    max_level: LevelFilter,
}

impl<P: PortIo> SerialLogger<P> {
    #[must_use]
    pub const fn new(port: SerialPort<P>, max_level: LevelFilter) -> Self {
        Self { port, max_level }
    }

    #[must_use]
    pub const fn port(&self) -> &SerialPort<P> {
        &self.port
    }

    /// Install this logger and program the UART. Call once during early init.
    ///
    /// The port is only touched once the logger is installed; records stay
    /// filtered until the line is set up.
    ///
    /// # Errors
    /// Fails if another logger was installed before. The UART is left alone.
    pub fn init(&'static self) -> Result<(), SetLoggerError>
    where
        P: Send + Sync + 'static,
    {
        log::set_logger(self)?;
        self.port.init();
        log::set_max_level(self.max_level);
        Ok(())
    }
}

impl<P: PortIo + Send + Sync> Log for SerialLogger<P> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Best effort; the writer itself never fails.
        let _ = writeln!(
            self.port.writer(),
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        // no-op; bytes leave the UART as they are written
    }
}
