//! Command channel for WebScreen devices.
//!
//! This module serializes console commands onto the transport and keeps the
//! navigable command history. Higher-level helpers map one-to-one onto the
//! device's verbs.

pub mod history;

use std::sync::{Arc, PoisonError};

use bytes::Bytes;
use tokio::sync::{Mutex, watch};

use crate::error::{Error, Result};
use crate::protocol::command::{DEFAULT_MONITOR, DeviceCommand};
use crate::transport::Transport;
use crate::types::ConnectionState;

pub use history::{CommandHistory, HISTORY_CAPACITY};

/// Line terminator appended to every command.
pub const LINE_TERMINATOR: &str = "\n";

/// Sends console commands and records them in the history.
pub struct CommandChannel<T> {
    transport: Arc<Mutex<T>>,
    history: std::sync::Mutex<CommandHistory>,
    state: watch::Receiver<ConnectionState>,
}

impl<T: Transport> CommandChannel<T> {
    /// Creates a new command channel.
    #[must_use]
    pub fn new(transport: Arc<Mutex<T>>, state: watch::Receiver<ConnectionState>) -> Self {
        Self {
            transport,
            history: std::sync::Mutex::new(CommandHistory::new()),
            state,
        }
    }

    fn history(&self) -> std::sync::MutexGuard<'_, CommandHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends one command line.
    ///
    /// Fails with [`Error::NotConnected`] unless the link is open. The
    /// history is only touched after the write succeeded.
    pub async fn send_command(&self, text: &str) -> Result<()> {
        if !self.state.borrow().is_open() {
            return Err(Error::NotConnected);
        }

        let mut line = String::with_capacity(text.len() + LINE_TERMINATOR.len());
        line.push_str(text);
        line.push_str(LINE_TERMINATOR);

        tracing::debug!("sending command: {}", text);
        {
            let mut transport = self.transport.lock().await;
            transport.send(Bytes::from(line)).await?;
        }

        self.history().record(text);
        Ok(())
    }

    /// Sends a typed device command.
    pub async fn send(&self, command: &DeviceCommand<'_>) -> Result<()> {
        self.send_command(&command.to_line()).await
    }

    /// Steps back through the history.
    ///
    /// Returns `None` at the oldest entry.
    pub fn previous_command(&self) -> Option<String> {
        self.history().back()
    }

    /// Steps forward through the history.
    ///
    /// Returns `None` when moving past the newest entry onto a fresh line.
    pub fn next_command(&self) -> Option<String> {
        self.history().forward()
    }

    /// Returns a snapshot of the history, oldest first.
    #[must_use]
    pub fn history_entries(&self) -> Vec<String> {
        self.history().entries().map(str::to_owned).collect()
    }

    // ==================== Device Commands ====================

    /// Requests runtime statistics (`/stats`).
    pub async fn stats(&self) -> Result<()> {
        self.send(&DeviceCommand::Stats).await
    }

    /// Requests device information (`/info`).
    pub async fn info(&self) -> Result<()> {
        self.send(&DeviceCommand::Info).await
    }

    /// Requests the command help (`/help`).
    pub async fn help(&self) -> Result<()> {
        self.send(&DeviceCommand::Help).await
    }

    /// Lists a directory (`/ls`).
    pub async fn list(&self, path: &str) -> Result<()> {
        self.send(&DeviceCommand::List { path }).await
    }

    /// Prints a file (`/cat`).
    pub async fn cat(&self, path: &str) -> Result<()> {
        self.send(&DeviceCommand::Cat { path }).await
    }

    /// Removes a file (`/rm`).
    pub async fn remove(&self, path: &str) -> Result<()> {
        self.send(&DeviceCommand::Remove { path }).await
    }

    /// Reads a config key (`/config get`).
    pub async fn config_get(&self, key: &str) -> Result<()> {
        self.send(&DeviceCommand::ConfigGet { key }).await
    }

    /// Writes a config key (`/config set`). The value is quoted on the wire.
    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        self.send(&DeviceCommand::ConfigSet { key, value }).await
    }

    /// Downloads a URL onto the device (`/wget`).
    pub async fn wget(&self, url: &str, name: Option<&str>) -> Result<()> {
        self.send(&DeviceCommand::Wget { url, name }).await
    }

    /// Pings a host from the device (`/ping`).
    pub async fn ping(&self, host: &str) -> Result<()> {
        self.send(&DeviceCommand::Ping { host }).await
    }

    /// Runs a backup action (`/backup`).
    pub async fn backup(&self, action: &str, name: Option<&str>) -> Result<()> {
        self.send(&DeviceCommand::Backup { action, name }).await
    }

    /// Starts a monitor (`/monitor`). `None` selects the memory monitor.
    pub async fn monitor(&self, kind: Option<&str>) -> Result<()> {
        let kind = kind.unwrap_or(DEFAULT_MONITOR);
        self.send(&DeviceCommand::Monitor { kind }).await
    }

    /// Loads and runs a script (`/load`).
    pub async fn load(&self, name: &str) -> Result<()> {
        self.send(&DeviceCommand::Load { name }).await
    }

    /// Reboots the device (`/reboot`).
    pub async fn reboot(&self) -> Result<()> {
        self.send(&DeviceCommand::Reboot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryDevice, MemoryTransport};

    async fn open_channel() -> (
        CommandChannel<MemoryTransport>,
        MemoryDevice,
        watch::Sender<ConnectionState>,
    ) {
        let (mut transport, device) = MemoryTransport::pair();
        transport.connect().await.unwrap();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);
        let channel = CommandChannel::new(Arc::new(Mutex::new(transport)), state_rx);
        (channel, device, state_tx)
    }

    #[tokio::test]
    async fn test_send_command_writes_line_and_records() {
        let (channel, mut device, _state) = open_channel().await;
        channel.send_command("/stats").await.unwrap();
        assert_eq!(device.read_line().await.unwrap().as_deref(), Some("/stats"));
        assert_eq!(channel.history_entries(), vec!["/stats"]);
    }

    #[tokio::test]
    async fn test_blank_and_repeated_commands_not_recorded() {
        let (channel, mut device, _state) = open_channel().await;
        channel.send_command("").await.unwrap();
        channel.send_command("/info").await.unwrap();
        channel.send_command("/info").await.unwrap();
        channel.send_command("   ").await.unwrap();

        let lines: Vec<_> = [
            device.read_line().await.unwrap(),
            device.read_line().await.unwrap(),
            device.read_line().await.unwrap(),
            device.read_line().await.unwrap(),
        ]
        .into_iter()
        .flatten()
        .collect();
        assert_eq!(lines, vec!["", "/info", "/info", "   "]);
        assert_eq!(channel.history_entries(), vec!["/info"]);
    }

    #[tokio::test]
    async fn test_not_connected() {
        let (channel, _device, state) = open_channel().await;
        state.send_replace(ConnectionState::Disconnecting);
        assert!(matches!(
            channel.send_command("/info").await,
            Err(Error::NotConnected)
        ));
        assert!(channel.history_entries().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_history() {
        let (channel, _device, _state) = open_channel().await;
        channel.transport.lock().await.disconnect().await.unwrap();
        assert!(channel.send_command("/reboot").await.is_err());
        assert!(channel.history_entries().is_empty());
    }

    #[tokio::test]
    async fn test_navigation() {
        let (channel, _device, _state) = open_channel().await;
        channel.send_command("/ls /").await.unwrap();
        channel.send_command("/stats").await.unwrap();

        assert_eq!(channel.previous_command().as_deref(), Some("/stats"));
        assert_eq!(channel.previous_command().as_deref(), Some("/ls /"));
        assert_eq!(channel.previous_command(), None);
        assert_eq!(channel.next_command().as_deref(), Some("/stats"));
        assert_eq!(channel.next_command(), None);
        assert_eq!(channel.next_command(), None);
    }

    #[tokio::test]
    async fn test_helpers() {
        let (channel, mut device, _state) = open_channel().await;
        channel.config_set("wifi.ssid", "my \"net\"").await.unwrap();
        channel.monitor(None).await.unwrap();
        channel.wget("http://x/y.js", Some("y.js")).await.unwrap();
        channel.backup("list", None).await.unwrap();

        assert_eq!(
            device.read_line().await.unwrap().as_deref(),
            Some(r#"/config set wifi.ssid "my \"net\"""#)
        );
        assert_eq!(device.read_line().await.unwrap().as_deref(), Some("/monitor mem"));
        assert_eq!(
            device.read_line().await.unwrap().as_deref(),
            Some("/wget http://x/y.js y.js")
        );
        assert_eq!(device.read_line().await.unwrap().as_deref(), Some("/backup list"));
    }
}
