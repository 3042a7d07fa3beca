//! # Serial Console
//!
//! Early-boot diagnostics over the first PC serial port (COM1). The crate has
//! three layers:
//!
//! * [`PortIo`]: byte-wide access to the x86 I/O port space. [`X86Ports`]
//!   issues real `in`/`out` instructions; tests substitute a recorder.
//! * [`SerialPort`]: a 16550 UART driver (115200 baud, 8N1, FIFOs off) that
//!   polls the line status register before each byte.
//! * [`SerialLogger`]: a `log::Log` backend that formats
//!   `"[LEVEL] target: message\n"` straight into the UART without allocating.
//!
//! ## Usage
//! ```rust,ignore
//! use kernel_serial::{SerialLogger, SerialPort, X86Ports};
//! use log::LevelFilter;
//!
//! static LOGGER: SerialLogger<X86Ports> =
//!     SerialLogger::new(SerialPort::com1(X86Ports), LevelFilter::Debug);
//!
//! // Early in kernel initialization
//! LOGGER.init().ok();
//! log::info!("paging enabled");
//! ```
//!
//! With QEMU, `-serial stdio` shows the output on the host terminal.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;
mod port;
mod uart;

pub use logger::SerialLogger;
#[cfg(all(feature = "asm", any(target_arch = "x86", target_arch = "x86_64")))]
pub use port::X86Ports;
pub use port::PortIo;
pub use uart::{SerialPort, SerialWriter};
