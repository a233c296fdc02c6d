//! In-process transport backed by a tokio duplex pipe.
//!
//! [`MemoryTransport`] behaves like an opened serial port; the paired
//! [`MemoryDevice`] plays the firmware side. Used for tests and for driving
//! the protocol against simulated devices.

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf,
};

use crate::error::{Error, Result};
use crate::transport::serial::READ_BUFFER_BYTES;
use crate::transport::{BoxedReader, Transport};
use crate::types::PortInfo;

/// Port name reported by memory transports.
pub const MEMORY_PORT_NAME: &str = "memory";

/// Host side of an in-memory link.
pub struct MemoryTransport {
    stream: Option<DuplexStream>,
    writer: Option<WriteHalf<DuplexStream>>,
    reader: Option<ReadHalf<DuplexStream>>,
}

impl MemoryTransport {
    /// Creates a linked transport/device pair.
    #[must_use]
    pub fn pair() -> (Self, MemoryDevice) {
        let (host, device) = tokio::io::duplex(READ_BUFFER_BYTES * 4);
        let transport = Self {
            stream: Some(host),
            writer: None,
            reader: None,
        };
        let device = MemoryDevice {
            stream: BufReader::new(device),
        };
        (transport, device)
    }

    /// Creates a transport with no device behind it; `connect` fails.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            stream: None,
            writer: None,
            reader: None,
        }
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.writer.is_some() {
                return Ok(());
            }
            // A pipe can only be opened once, like a device that was unplugged
            // after the first session.
            let stream = self.stream.take().ok_or_else(|| Error::DeviceApiUnavailable {
                reason: "no memory device attached".into(),
            })?;
            let (reader, writer) = tokio::io::split(stream);
            self.reader = Some(reader);
            self.writer = Some(writer);
            tracing::debug!("memory link opened");
            Ok(())
        })
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if let Some(mut writer) = self.writer.take() {
                // Best effort: the device side may already be gone.
                let _ = writer.shutdown().await;
                tracing::debug!("memory link closed");
            }
            self.reader = None;
            Ok(())
        })
    }

    fn send(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let writer = self.writer.as_mut().ok_or(Error::NotConnected)?;
            writer.write_all(&data).await?;
            writer.flush().await?;
            Ok(())
        })
    }

    fn take_reader(&mut self) -> Option<BoxedReader> {
        self.reader
            .take()
            .map(|reader| Box::new(reader) as BoxedReader)
    }

    fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    fn port_info(&self) -> Option<PortInfo> {
        self.is_connected()
            .then(|| PortInfo::named(MEMORY_PORT_NAME))
    }
}

/// Device side of an in-memory link.
pub struct MemoryDevice {
    stream: BufReader<DuplexStream>,
}

impl MemoryDevice {
    /// Writes raw console output to the host.
    pub async fn write(&mut self, text: &str) -> std::io::Result<()> {
        self.stream.write_all(text.as_bytes()).await?;
        self.stream.flush().await
    }

    /// Writes raw bytes to the host.
    pub async fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    /// Writes each line followed by `"\r\n"`.
    pub async fn write_lines(&mut self, lines: &[&str]) -> std::io::Result<()> {
        let mut out = String::new();
        for line in lines {
            out.push_str(line);
            out.push_str("\r\n");
        }
        self.write(&out).await
    }

    /// Reads the next command line sent by the host, without its terminator.
    ///
    /// Returns `None` once the host has closed the link.
    pub async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        if self.stream.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Reads command lines until `sentinel` (inclusive) or end of stream.
    pub async fn read_until(&mut self, sentinel: &str) -> std::io::Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(line) = self.read_line().await? {
            let done = line == sentinel;
            lines.push(line);
            if done {
                break;
            }
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let (mut transport, mut device) = MemoryTransport::pair();
        transport.connect().await.unwrap();
        assert!(transport.is_connected());
        assert_eq!(
            transport.port_info().map(|p| p.port_name).as_deref(),
            Some(MEMORY_PORT_NAME)
        );

        transport
            .send(Bytes::from_static(b"/info\n"))
            .await
            .unwrap();
        assert_eq!(device.read_line().await.unwrap().as_deref(), Some("/info"));

        let mut reader = transport.take_reader().unwrap();
        assert!(transport.take_reader().is_none());
        device.write("WebScreen> ").await.unwrap();
        let mut buf = [0u8; 32];
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"WebScreen> ");
    }

    #[tokio::test]
    async fn test_connect_only_once() {
        let (mut transport, _device) = MemoryTransport::pair();
        transport.connect().await.unwrap();
        // Already open: no-op.
        transport.connect().await.unwrap();
        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.connect().await,
            Err(Error::DeviceApiUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_unavailable() {
        let mut transport = MemoryTransport::unavailable();
        assert!(matches!(
            transport.connect().await,
            Err(Error::DeviceApiUnavailable { .. })
        ));
        assert!(matches!(
            transport.send(Bytes::from_static(b"x\n")).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_device_sees_close() {
        let (mut transport, mut device) = MemoryTransport::pair();
        transport.connect().await.unwrap();
        transport
            .send(Bytes::from_static(b"/stats\nEND\n"))
            .await
            .unwrap();
        let reader = transport.take_reader();
        transport.disconnect().await.unwrap();
        drop(reader);
        let lines = device.read_until("never").await.unwrap();
        assert_eq!(lines, vec!["/stats", "END"]);
    }
}
