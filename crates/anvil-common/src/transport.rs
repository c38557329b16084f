//! Byte-channel transport abstraction.
//!
//! A [`Transport`] is a point-to-point link to a device: a serial port on real
//! hardware, or the device simulator. The protocol engine owns one and polls it;
//! nothing here blocks.

use thiserror::Error;

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport is not open.
    #[error("transport is not open")]
    NotOpen,

    /// The requested port does not exist on this transport.
    #[error("unknown port: {0}")]
    UnknownPort(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A byte-stream link to a single device.
///
/// # Contract
///
/// - `open` is idempotent: opening while already open closes the previous link first.
/// - `close` is always safe to call and is a no-op when not open.
/// - `write` accepts the whole buffer or fails; it never silently drops bytes.
/// - `read` never blocks; no data yields an empty vector.
/// - `list_ports` is best-effort; no discovery support yields an empty list.
pub trait Transport {
    /// Open a link to `port` at `baud_rate`.
    fn open(&mut self, port: &str, baud_rate: u32) -> TransportResult<()>;

    /// Close the link.
    fn close(&mut self);

    /// Whether the link is open.
    fn is_open(&self) -> bool;

    /// Write bytes, returning the number accepted.
    fn write(&mut self, data: &[u8]) -> TransportResult<usize>;

    /// Read up to `max_len` bytes that are available right now.
    fn read(&mut self, max_len: usize) -> Vec<u8>;

    /// Discoverable port identifiers.
    fn list_ports(&self) -> Vec<String>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, port: &str, baud_rate: u32) -> TransportResult<()> {
        (**self).open(port, baud_rate)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn write(&mut self, data: &[u8]) -> TransportResult<usize> {
        (**self).write(data)
    }

    fn read(&mut self, max_len: usize) -> Vec<u8> {
        (**self).read(max_len)
    }

    fn list_ports(&self) -> Vec<String> {
        (**self).list_ports()
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn open(&mut self, port: &str, baud_rate: u32) -> TransportResult<()> {
        (**self).open(port, baud_rate)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn write(&mut self, data: &[u8]) -> TransportResult<usize> {
        (**self).write(data)
    }

    fn read(&mut self, max_len: usize) -> Vec<u8> {
        (**self).read(max_len)
    }

    fn list_ports(&self) -> Vec<String> {
        (**self).list_ports()
    }
}
