//! Connection and device information types.

/// Lifecycle of a device connection.
///
/// The only valid transitions are
/// `Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected`,
/// plus `Connecting -> Disconnected` when opening fails and
/// `Connected -> Disconnected` when the link drops on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No link is open.
    #[default]
    Disconnected,
    /// The port is being opened.
    Connecting,
    /// The link is open and the read loop is running.
    Connected,
    /// The link is being torn down.
    Disconnecting,
}

impl ConnectionState {
    /// Returns true if commands may be sent.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Identity of the selected serial port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortInfo {
    /// Port path (e.g. "/dev/ttyACM0" or "COM3").
    pub port_name: String,
    /// USB vendor id, when the port is a USB device.
    pub vendor_id: Option<u16>,
    /// USB product id, when the port is a USB device.
    pub product_id: Option<u16>,
}

impl PortInfo {
    /// Creates port info for a port with no USB identity.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            port_name: name.into(),
            vendor_id: None,
            product_id: None,
        }
    }
}

/// Snapshot of the connected device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Selected port, if any.
    pub port: Option<PortInfo>,
    /// Whether the link is currently open.
    pub connected: bool,
    /// Link baud rate.
    pub baud_rate: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(!ConnectionState::Connecting.is_open());
        assert!(ConnectionState::Connected.is_open());
        assert!(!ConnectionState::Disconnecting.is_open());
    }
}
