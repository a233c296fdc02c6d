//! Serial/USB transport implementation.
//!
//! WebScreen devices enumerate as a USB CDC serial port and always run the
//! same fixed link settings (115200 8N1, no flow control).

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_serial::{
    DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialPortInfo, SerialPortType,
    SerialStream, StopBits,
};

use crate::error::{Error, Result};
use crate::transport::{BoxedReader, Transport};
use crate::types::PortInfo;

/// Baud rate of WebScreen devices.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Size of the inbound read buffer.
///
/// Small buffers stall reception on some USB stacks after roughly 1 KiB.
pub const READ_BUFFER_BYTES: usize = 16 * 1024;

/// Fixed link parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkParams {
    /// Baud rate.
    pub baud_rate: u32,
    /// Data bits per character.
    pub data_bits: DataBits,
    /// Stop bits per character.
    pub stop_bits: StopBits,
    /// Parity checking.
    pub parity: Parity,
    /// Flow control.
    pub flow_control: FlowControl,
    /// Inbound buffer size hint in bytes.
    pub read_buffer_bytes: usize,
}

impl LinkParams {
    /// The settings every WebScreen device uses.
    pub const WEBSCREEN: Self = Self {
        baud_rate: DEFAULT_BAUD_RATE,
        data_bits: DataBits::Eight,
        stop_bits: StopBits::One,
        parity: Parity::None,
        flow_control: FlowControl::None,
        read_buffer_bytes: READ_BUFFER_BYTES,
    };
}

impl Default for LinkParams {
    fn default() -> Self {
        Self::WEBSCREEN
    }
}

/// Configuration for serial transport.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyACM0" or "COM3"). `None` selects a
    /// port automatically.
    pub port: Option<String>,
    /// Link parameters.
    pub link: LinkParams,
    /// Delay after opening the port before the link is reported open.
    pub connection_delay: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            link: LinkParams::WEBSCREEN,
            connection_delay: Duration::ZERO,
        }
    }
}

impl SerialConfig {
    /// Creates a configuration for the given port.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: Some(port.into()),
            ..Self::default()
        }
    }

    /// Creates a configuration that picks the first available device.
    #[must_use]
    pub fn auto() -> Self {
        Self::default()
    }

    /// Sets the connection delay.
    #[must_use]
    pub const fn connection_delay(mut self, delay: Duration) -> Self {
        self.connection_delay = delay;
        self
    }
}

/// Serial transport for WebScreen communication.
pub struct SerialTransport {
    config: SerialConfig,
    writer: Option<WriteHalf<SerialStream>>,
    reader: Option<ReadHalf<SerialStream>>,
    port: Option<PortInfo>,
}

impl SerialTransport {
    /// Creates a new serial transport with the given configuration.
    #[must_use]
    pub const fn new(config: SerialConfig) -> Self {
        Self {
            config,
            writer: None,
            reader: None,
            port: None,
        }
    }

    /// Creates a new serial transport for the given port.
    #[must_use]
    pub fn with_port(port: impl Into<String>) -> Self {
        Self::new(SerialConfig::new(port))
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SerialConfig {
        &self.config
    }

    fn resolve_port(&self) -> Result<PortInfo> {
        let ports = tokio_serial::available_ports().map_err(|e| Error::DeviceApiUnavailable {
            reason: e.to_string(),
        })?;

        if let Some(name) = &self.config.port {
            // Explicit paths are opened even if enumeration does not list them.
            return Ok(ports
                .iter()
                .find(|p| &p.port_name == name)
                .map_or_else(|| PortInfo::named(name), port_info));
        }

        select_port(&ports).map(port_info).ok_or_else(|| Error::DeviceApiUnavailable {
            reason: "no serial devices found".into(),
        })
    }
}

fn port_info(port: &SerialPortInfo) -> PortInfo {
    match &port.port_type {
        SerialPortType::UsbPort(usb) => PortInfo {
            port_name: port.port_name.clone(),
            vendor_id: Some(usb.vid),
            product_id: Some(usb.pid),
        },
        _ => PortInfo::named(&port.port_name),
    }
}

/// Picks the first USB port, falling back to the first port of any kind.
fn select_port(ports: &[SerialPortInfo]) -> Option<&SerialPortInfo> {
    ports
        .iter()
        .find(|p| matches!(p.port_type, SerialPortType::UsbPort(_)))
        .or_else(|| ports.first())
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.writer.is_some() {
                return Ok(());
            }

            let port = self.resolve_port()?;
            let link = self.config.link;
            tracing::info!(
                "opening serial port {} at {} baud",
                port.port_name,
                link.baud_rate
            );

            let stream = tokio_serial::new(&port.port_name, link.baud_rate)
                .data_bits(link.data_bits)
                .stop_bits(link.stop_bits)
                .parity(link.parity)
                .flow_control(link.flow_control)
                .open_native_async()
                .map_err(Error::Serial)?;

            if !self.config.connection_delay.is_zero() {
                tokio::time::sleep(self.config.connection_delay).await;
            }

            let (reader, writer) = tokio::io::split(stream);
            self.reader = Some(reader);
            self.writer = Some(writer);
            self.port = Some(port);

            tracing::info!("connected to serial port");
            Ok(())
        })
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if let Some(mut writer) = self.writer.take() {
                tracing::info!("disconnecting from serial port");
                if let Err(e) = writer.shutdown().await {
                    tracing::debug!("serial shutdown failed: {}", e);
                }
            }
            self.reader = None;
            Ok(())
        })
    }

    fn send(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let writer = self.writer.as_mut().ok_or(Error::NotConnected)?;
            tracing::trace!("writing {} bytes", data.len());
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
        self.port.clone()
    }
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = tokio_serial::available_ports().map_err(|e| Error::DeviceApiUnavailable {
        reason: e.to_string(),
    })?;
    Ok(ports.iter().map(port_info).collect())
}

#[cfg(test)]
mod tests {
    use tokio_serial::UsbPortInfo;

    use super::*;

    fn usb(name: &str) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.into(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x303a,
                pid: 0x1001,
                serial_number: None,
                manufacturer: None,
                product: None,
            }),
        }
    }

    fn plain(name: &str) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.into(),
            port_type: SerialPortType::Unknown,
        }
    }

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::new("/dev/ttyACM0");
        assert_eq!(config.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.link, LinkParams::WEBSCREEN);
        assert_eq!(config.link.baud_rate, 115_200);
        assert_eq!(config.link.data_bits, DataBits::Eight);
        assert_eq!(config.link.stop_bits, StopBits::One);
        assert_eq!(config.link.parity, Parity::None);
        assert_eq!(config.link.flow_control, FlowControl::None);
        assert_eq!(config.link.read_buffer_bytes, 16384);
        assert!(SerialConfig::auto().port.is_none());
    }

    #[test]
    fn test_serial_config_builder() {
        let config = SerialConfig::new("COM3").connection_delay(Duration::from_millis(250));
        assert_eq!(config.connection_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_select_prefers_usb() {
        let ports = [plain("/dev/ttyS0"), usb("/dev/ttyACM0")];
        assert_eq!(select_port(&ports).unwrap().port_name, "/dev/ttyACM0");

        let ports = [plain("/dev/ttyS0")];
        assert_eq!(select_port(&ports).unwrap().port_name, "/dev/ttyS0");

        assert!(select_port(&[]).is_none());
    }

    #[test]
    fn test_port_info_carries_usb_ids() {
        let info = port_info(&usb("/dev/ttyACM0"));
        assert_eq!(info.vendor_id, Some(0x303a));
        assert_eq!(info.product_id, Some(0x1001));

        let info = port_info(&plain("/dev/ttyS0"));
        assert_eq!(info.vendor_id, None);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let mut transport = SerialTransport::with_port("/dev/null-webscreen");
        assert!(!transport.is_connected());
        let err = transport.send(Bytes::from_static(b"/info\n")).await;
        assert!(matches!(err, Err(Error::NotConnected)));
        assert!(transport.take_reader().is_none());
        transport.disconnect().await.unwrap();
    }

    #[test]
    #[ignore = "Requires /sys/class/tty - not available in sandboxed builds"]
    fn test_list_ports() {
        // Just verify it doesn't panic
        let _ = list_ports();
    }
}
