use crate::PortIo;
use core::fmt;
use kernel_info::memory::COM1_PORT;

/// Register offsets relative to the UART base port.
mod reg {
    /// Transmit holding register (write), or divisor low byte when DLAB is set.
    pub const DATA: u16 = 0;
    /// Interrupt enable register, or divisor high byte when DLAB is set.
    pub const INTERRUPT_ENABLE: u16 = 1;
    /// FIFO control register (write).
    pub const FIFO_CONTROL: u16 = 2;
    pub const LINE_CONTROL: u16 = 3;
    pub const MODEM_CONTROL: u16 = 4;
    pub const LINE_STATUS: u16 = 5;
}

/// Divisor latch access bit in the line control register.
const LCR_DLAB: u8 = 0x80;
/// 8 data bits, no parity, one stop bit.
const LCR_8N1: u8 = 0x03;
/// FIFOs off; every byte goes straight through the holding register.
const FCR_DISABLED: u8 = 0x00;
/// OUT1.
const MCR_OUT1: u8 = 0x04;
/// Transmit holding register empty.
const LSR_THR_EMPTY: u8 = 0x20;
/// 115200 baud.
const BAUD_DIVISOR: u16 = 1;

/// A 16550-compatible UART reached through [`PortIo`].
#[derive(Debug)]
pub struct SerialPort<P> {
    base: u16,
    io: P,
}

impl<P: PortIo> SerialPort<P> {
    #[must_use]
    pub const fn new(base: u16, io: P) -> Self {
        Self { base, io }
    }

    /// The first serial port at I/O base `0x3F8`.
    #[must_use]
    pub const fn com1(io: P) -> Self {
        Self::new(COM1_PORT, io)
    }

    #[must_use]
    pub const fn base(&self) -> u16 {
        self.base
    }

    #[must_use]
    pub const fn io(&self) -> &P {
        &self.io
    }

    /// Program the line: interrupts off, 115200 baud, 8N1, FIFOs off, OUT1.
    pub fn init(&self) {
        let [divisor_lo, divisor_hi] = BAUD_DIVISOR.to_le_bytes();
        self.write_reg(reg::INTERRUPT_ENABLE, 0x00);
        self.write_reg(reg::LINE_CONTROL, LCR_DLAB);
        self.write_reg(reg::DATA, divisor_lo);
        self.write_reg(reg::INTERRUPT_ENABLE, divisor_hi);
        self.write_reg(reg::LINE_CONTROL, LCR_8N1);
        self.write_reg(reg::FIFO_CONTROL, FCR_DISABLED);
        self.write_reg(reg::MODEM_CONTROL, MCR_OUT1);
    }

    /// `true` once the transmitter can take another byte.
    #[must_use]
    pub fn is_transmit_empty(&self) -> bool {
        self.io.read_port(self.base + reg::LINE_STATUS) & LSR_THR_EMPTY != 0
    }

    /// Send one byte, spinning until the transmit holding register is empty.
    pub fn write_byte(&self, byte: u8) {
        while !self.is_transmit_empty() {
            core::hint::spin_loop();
        }
        self.write_reg(reg::DATA, byte);
    }

    pub fn write_bytes(&self, bytes: &[u8]) {
        for &b in bytes {
            self.write_byte(b);
        }
    }

    /// A [`fmt::Write`] sink over this port.
    #[must_use]
    pub const fn writer(&self) -> SerialWriter<'_, P> {
        SerialWriter { port: self }
    }

    #[inline]
    fn write_reg(&self, offset: u16, value: u8) {
        self.io.write_port(self.base + offset, value);
    }
}

/// Formats into a [`SerialPort`] byte by byte, following every `\n` with
/// `\r`. Never fails.
pub struct SerialWriter<'a, P> {
    port: &'a SerialPort<P>,
}

impl<P: PortIo> fmt::Write for SerialWriter<'_, P> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for (i, line) in s.split('\n').enumerate() {
            if i > 0 {
                self.port.write_bytes(b"\n\r");
            }
            self.port.write_bytes(line.as_bytes());
        }
        Ok(())
    }
}
