//! Transport layer for WebScreen communication.
//!
//! A transport owns the physical link and exposes it as a byte stream: the
//! read half is handed to the client's read loop, the write half stays inside
//! the transport and is used by [`Transport::send`] for the lifetime of the
//! connection.

pub mod memory;
pub mod serial;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::types::PortInfo;

/// Read half of an open link.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Trait for transport implementations.
pub trait Transport: Send + Sync {
    /// Opens the link.
    fn connect(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Releases the write half and closes the link. Safe to call when closed.
    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Writes raw bytes to the device.
    fn send(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>>;

    /// Takes the read half for the read loop.
    ///
    /// Returns `None` if not connected or already taken.
    fn take_reader(&mut self) -> Option<BoxedReader>;

    /// Returns true if connected.
    fn is_connected(&self) -> bool;

    /// Returns the identity of the opened port, if known.
    fn port_info(&self) -> Option<PortInfo> {
        None
    }
}

pub use memory::{MemoryDevice, MemoryTransport};
pub use serial::{LinkParams, SerialConfig, SerialTransport};
