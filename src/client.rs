//! Main [`WebScreen`] client implementation.
//!
//! This module provides the high-level [`WebScreen`] client that combines
//! transport, line framing, event handling, commands, transfers, and
//! structured captures into a unified interface.

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::collector::{CaptureRule, Collector, CollectorConfig, collect};
use crate::commands::CommandChannel;
use crate::error::{Error, Result};
use crate::event::{EventDispatcher, Subscription};
use crate::protocol::command::ROOT_PATH;
use crate::protocol::framer::LineFramer;
use crate::protocol::listing::ListingParser;
use crate::transfer::{FileTransfer, FixedDelayPacing, PacingPolicy, Progress, Transfer};
use crate::transport::serial::{DEFAULT_BAUD_RATE, READ_BUFFER_BYTES};
use crate::transport::{BoxedReader, SerialConfig, SerialTransport, Transport};
use crate::types::{ConnectionState, DeviceInfo, FileEntry};

/// Why the read loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadLoopExit {
    /// The device closed the link.
    EndOfStream,
    /// [`WebScreen::disconnect`] cancelled the loop.
    Stopped,
    /// A read failed.
    Failed,
}

/// Client for communicating with a WebScreen device.
pub struct WebScreen<T> {
    transport: Arc<Mutex<T>>,
    dispatcher: EventDispatcher,
    commands: CommandChannel<T>,
    state: Arc<watch::Sender<ConnectionState>>,
    pacing: Arc<dyn PacingPolicy>,
    collector: CollectorConfig,
    listing: ListingParser,
    baud_rate: u32,

    // Background task
    read_task: Option<JoinHandle<ReadLoopExit>>,
    cancel: Option<CancellationToken>,
}

impl WebScreen<SerialTransport> {
    /// Creates a new client for a serial port.
    ///
    /// # Arguments
    ///
    /// * `port` - Serial port path (e.g., "/dev/ttyACM0")
    ///
    /// # Returns
    ///
    /// A new client (not yet connected).
    #[must_use]
    pub fn serial(port: impl Into<String>) -> Self {
        Self::with_serial_config(SerialConfig::new(port))
    }

    /// Creates a client that connects to the first available device.
    #[must_use]
    pub fn auto() -> Self {
        Self::with_serial_config(SerialConfig::auto())
    }

    /// Creates a new client with custom serial configuration.
    #[must_use]
    pub fn with_serial_config(config: SerialConfig) -> Self {
        let baud_rate = config.link.baud_rate;
        let mut client = Self::new(SerialTransport::new(config));
        client.baud_rate = baud_rate;
        client
    }
}

impl<T: Transport + 'static> WebScreen<T> {
    /// Creates a new client with the given transport.
    #[must_use]
    pub fn new(transport: T) -> Self {
        let dispatcher = EventDispatcher::default();
        let transport = Arc::new(Mutex::new(transport));
        let (state, state_rx) = watch::channel(ConnectionState::Disconnected);

        let commands = CommandChannel::new(Arc::clone(&transport), state_rx);

        Self {
            transport,
            dispatcher,
            commands,
            state: Arc::new(state),
            pacing: Arc::new(FixedDelayPacing::default()),
            collector: CollectorConfig::default(),
            listing: ListingParser::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_task: None,
            cancel: None,
        }
    }

    /// Replaces the transfer pacing policy.
    #[must_use]
    pub fn with_pacing(mut self, pacing: impl PacingPolicy + 'static) -> Self {
        self.pacing = Arc::new(pacing);
        self
    }

    /// Replaces the capture settings for structured queries.
    #[must_use]
    pub fn with_collector_config(mut self, config: CollectorConfig) -> Self {
        self.collector = config;
        self
    }

    /// Replaces the listing parser used by [`Self::list_files`].
    #[must_use]
    pub fn with_listing_parser(mut self, parser: ListingParser) -> Self {
        self.listing = parser;
        self
    }

    /// Installs the callback receiving every console line.
    pub fn on_data_received(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.dispatcher.set_data_callback(Some(Arc::new(callback)));
    }

    /// Installs the callback receiving every open/close transition.
    pub fn on_connection_change(&self, callback: impl Fn(bool) + Send + Sync + 'static) {
        self.dispatcher
            .set_connection_callback(Some(Arc::new(callback)));
    }

    /// Opens the link and starts the read loop.
    ///
    /// This will:
    /// 1. Open the transport connection
    /// 2. Start the background read loop
    /// 3. Notify the connection callback
    /// 4. Send an empty command to elicit the prompt
    ///
    /// Connecting while already connected is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceApiUnavailable`] if no device can be found, or a
    /// transport error if opening or the first write fails.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        // The previous link may have dropped on its own and still hold handles.
        self.release().await;

        self.state.send_replace(ConnectionState::Connecting);
        let reader = match self.open().await {
            Ok(reader) => reader,
            Err(e) => {
                tracing::warn!("connect failed: {}", e);
                self.state.send_replace(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        self.state.send_replace(ConnectionState::Connected);
        self.start_read_loop(reader);
        tracing::info!("connected to WebScreen device");
        self.dispatcher.dispatch_connection(true);

        self.commands.send_command("").await
    }

    async fn open(&self) -> Result<BoxedReader> {
        let mut transport = self.transport.lock().await;
        transport.connect().await?;
        if let Some(reader) = transport.take_reader() {
            return Ok(reader);
        }
        transport.disconnect().await?;
        Err(Error::DeviceApiUnavailable {
            reason: "transport opened without a readable stream".into(),
        })
    }

    /// Starts the background read loop.
    fn start_read_loop(&mut self, reader: BoxedReader) {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_read_loop(
            reader,
            self.dispatcher.clone(),
            Arc::clone(&self.state),
            cancel.clone(),
        ));
        self.read_task = Some(task);
        self.cancel = Some(cancel);
    }

    /// Cancels the read loop and waits for it to release the reader.
    async fn stop_read_loop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.read_task.take() {
            match task.await {
                Ok(exit) => tracing::debug!("read loop finished: {:?}", exit),
                Err(e) => tracing::warn!("read loop task failed: {}", e),
            }
        }
    }

    /// Releases handles left behind by a link that dropped on its own.
    async fn release(&mut self) {
        self.stop_read_loop().await;
        let mut transport = self.transport.lock().await;
        if transport.is_connected() {
            if let Err(e) = transport.disconnect().await {
                tracing::debug!("transport close failed: {}", e);
            }
        }
    }

    /// Disconnects from the device.
    ///
    /// Safe to call in any state. The connection callback hears `false` at
    /// most once per session: a repeated call, or a call after the device
    /// already closed the link, only releases handles and stays silent.
    pub async fn disconnect(&mut self) -> Result<()> {
        let mut previous = ConnectionState::Disconnected;
        self.state.send_if_modified(|state| {
            previous = *state;
            if *state == ConnectionState::Disconnected {
                false
            } else {
                *state = ConnectionState::Disconnecting;
                true
            }
        });

        self.stop_read_loop().await;

        let result = {
            let mut transport = self.transport.lock().await;
            transport.disconnect().await
        };

        self.state.send_replace(ConnectionState::Disconnected);
        if previous != ConnectionState::Disconnected {
            tracing::info!("disconnected from WebScreen device");
            self.dispatcher.dispatch_connection(false);
        }
        result
    }

    /// Returns true if connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_open()
    }

    /// Returns the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watches connection state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Subscribes to console lines and connection changes.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe()
    }

    /// Returns the command channel for direct command access.
    #[must_use]
    pub const fn commands(&self) -> &CommandChannel<T> {
        &self.commands
    }

    /// Returns a snapshot of the link.
    pub async fn device_info(&self) -> DeviceInfo {
        let port = self.transport.lock().await.port_info();
        DeviceInfo {
            port,
            connected: self.is_connected(),
            baud_rate: self.baud_rate,
        }
    }

    // ==================== Commands ====================

    /// Sends one console command.
    pub async fn send_command(&self, text: &str) -> Result<()> {
        self.commands.send_command(text).await
    }

    /// Steps back through the command history.
    pub fn previous_command(&self) -> Option<String> {
        self.commands.previous_command()
    }

    /// Steps forward through the command history.
    pub fn next_command(&self) -> Option<String> {
        self.commands.next_command()
    }

    /// Returns the command history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.commands.history_entries()
    }

    // ==================== File Transfer ====================

    /// Writes a script with the legacy `/write` command.
    pub async fn send_file(&self, name: &str, content: &str) -> Result<()> {
        FileTransfer::new(&self.commands, self.pacing.as_ref())
            .write(name, content)
            .await
    }

    /// Uploads a file, as text or base64 depending on its extension.
    pub async fn upload_file(
        &self,
        name: &str,
        content: &[u8],
        progress: impl FnMut(Progress),
    ) -> Result<Transfer> {
        FileTransfer::new(&self.commands, self.pacing.as_ref())
            .upload(name, content, progress)
            .await
    }

    // ==================== Structured Queries ====================

    /// Lists a directory and parses the reply. `None` lists the root.
    ///
    /// Lines still reach the data callback. Returns whatever was captured
    /// when the listing window elapses without an end marker.
    pub async fn list_files(&self, path: Option<&str>) -> Result<Vec<FileEntry>> {
        let path = path.unwrap_or(ROOT_PATH);
        // Tap before sending so no reply line is missed.
        let tap = self.dispatcher.tap_lines();
        self.commands.list(path).await?;

        let lines = collect(
            tap,
            Collector::new(CaptureRule::listing(self.collector.prompt.clone())),
            self.collector.listing_timeout,
            self.collector.stop_at_end_marker,
        )
        .await;
        let entries = self.listing.parse(&lines);
        tracing::debug!("listed {}: {} entries", path, entries.len());
        Ok(entries)
    }

    /// Reads a file's text.
    ///
    /// Body lines are joined with `"\n"`.
    pub async fn cat_file(&self, path: &str) -> Result<String> {
        let tap = self.dispatcher.tap_lines();
        self.commands.cat(path).await?;

        let lines = collect(
            tap,
            Collector::new(CaptureRule::file(self.collector.prompt.clone())),
            self.collector.file_timeout,
            self.collector.stop_at_end_marker,
        )
        .await;
        Ok(lines.join("\n"))
    }

    // ==================== Device Helpers ====================

    /// Removes a file.
    pub async fn delete_file(&self, path: &str) -> Result<()> {
        self.commands.remove(path).await
    }

    /// Requests runtime statistics.
    pub async fn stats(&self) -> Result<()> {
        self.commands.stats().await
    }

    /// Requests device information.
    pub async fn info(&self) -> Result<()> {
        self.commands.info().await
    }

    /// Requests the command help.
    pub async fn help(&self) -> Result<()> {
        self.commands.help().await
    }

    /// Reads a config key.
    pub async fn get_config(&self, key: &str) -> Result<()> {
        self.commands.config_get(key).await
    }

    /// Writes a config key.
    pub async fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.commands.config_set(key, value).await
    }

    /// Downloads a URL onto the device.
    pub async fn download_url(&self, url: &str, name: Option<&str>) -> Result<()> {
        self.commands.wget(url, name).await
    }

    /// Pings a host from the device.
    pub async fn ping(&self, host: &str) -> Result<()> {
        self.commands.ping(host).await
    }

    /// Runs a backup action.
    pub async fn backup(&self, action: &str, name: Option<&str>) -> Result<()> {
        self.commands.backup(action, name).await
    }

    /// Starts a monitor.
    pub async fn monitor(&self, kind: Option<&str>) -> Result<()> {
        self.commands.monitor(kind).await
    }

    /// Loads and runs a script.
    pub async fn load_script(&self, name: &str) -> Result<()> {
        self.commands.load(name).await
    }

    /// Reboots the device.
    pub async fn reboot(&self) -> Result<()> {
        self.commands.reboot().await
    }
}

impl<T> Drop for WebScreen<T> {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

/// Pumps bytes from the reader through the framer until cancelled or the
/// link closes.
async fn run_read_loop(
    mut reader: BoxedReader,
    dispatcher: EventDispatcher,
    state: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
) -> ReadLoopExit {
    let mut framer = LineFramer::new();
    let mut buf = vec![0u8; READ_BUFFER_BYTES];

    let exit = loop {
        let n = tokio::select! {
            () = cancel.cancelled() => break ReadLoopExit::Stopped,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break ReadLoopExit::EndOfStream,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!("read loop error: {}", e);
                    break ReadLoopExit::Failed;
                }
            },
        };
        tracing::trace!("received {} bytes", n);
        for line in framer.feed(&buf[..n]) {
            dispatcher.dispatch_line(line);
        }
    };
    drop(reader);

    if exit != ReadLoopExit::Stopped {
        // The link went away without disconnect(); report it unless a
        // disconnect is already under way.
        let dropped = state.send_if_modified(|s| {
            if *s == ConnectionState::Connected {
                *s = ConnectionState::Disconnected;
                true
            } else {
                false
            }
        });
        if dropped {
            tracing::info!("device link closed: {:?}", exit);
            dispatcher.dispatch_connection(false);
        }
    }
    exit
}
