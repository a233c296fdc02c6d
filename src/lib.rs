//! # webscreen
//!
//! A Rust client library for WebScreen devices (ESP32 displays running
//! JavaScript apps) over USB/Serial.
//!
//! The device speaks a plain line-based console: commands go out as single
//! lines, output comes back as unframed text. This library frames that text
//! into lines, drives the paced upload protocol, and captures structured
//! replies such as directory listings.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Line and connection callbacks plus broadcast subscriptions
//! - Text and base64 uploads with progress reporting
//! - Directory listings parsed into typed entries
//!
//! ## Quick Start
//!
//! ```no_run
//! use webscreen::WebScreen;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), webscreen::Error> {
//!     let mut client = WebScreen::serial("/dev/ttyACM0");
//!     client.on_data_received(|line| println!("{line}"));
//!     client.connect().await?;
//!
//!     client
//!         .upload_file("app.js", b"print('hi');", |p| {
//!             println!("{}/{}", p.sent, p.total);
//!         })
//!         .await?;
//!
//!     for entry in client.list_files(None).await? {
//!         println!("{} {} ({} bytes)", entry.kind, entry.name, entry.size_bytes);
//!     }
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`transport`] - Serial and in-memory transports
//! - [`protocol`] - Line framing, command lines, listing grammars
//! - [`commands`] - Command channel and history
//! - [`transfer`] - Upload strategies and pacing
//! - [`collector`] - Capture of structured replies
//! - [`event`] - Callbacks and subscriptions
//! - [`client`] - High-level [`WebScreen`] client

pub mod client;
pub mod collector;
pub mod commands;
pub mod error;
pub mod event;
pub mod protocol;
pub mod transfer;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{ReadLoopExit, WebScreen};
pub use collector::{CaptureRule, Collector, CollectorConfig, LineKind};
pub use commands::{CommandChannel, CommandHistory};
pub use error::{Error, Result};
pub use event::{Event, EventDispatcher, LineTap, Subscription};
pub use protocol::{DeviceCommand, LineFramer, ListingGrammar, ListingParser, parse_listing};
pub use transfer::{
    FixedDelayPacing, Pace, PacingPolicy, Progress, Transfer, TransferMode,
};
pub use transport::{
    MemoryDevice, MemoryTransport, SerialConfig, SerialTransport, Transport, serial::list_ports,
};
pub use types::{ConnectionState, DeviceInfo, EntryKind, FileEntry, PortInfo};
