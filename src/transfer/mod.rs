//! File transfer over the console.
//!
//! Uploads are plain command lines: an `/upload` header, the body one line
//! (or one base64 chunk) at a time, then [`END_SENTINEL`]. The device sends
//! no acknowledgment, so pacing between steps is all that keeps its input
//! buffer from overflowing.

pub mod pacing;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::commands::CommandChannel;
use crate::error::Result;
use crate::protocol::command::{DeviceCommand, END_SENTINEL};
use crate::transport::Transport;

pub use pacing::{FixedDelayPacing, Pace, PacingPolicy};

/// Extensions uploaded line by line as text.
pub const TEXT_EXTENSIONS: &[&str] = &[
    ".js", ".json", ".txt", ".html", ".css", ".xml", ".csv", ".md",
];

/// Characters per base64 line, as in MIME.
pub const BASE64_CHUNK_LEN: usize = 76;

/// How a file body travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferMode {
    /// Body lines sent verbatim.
    Text,
    /// Body base64-encoded in fixed-size chunks.
    Base64,
}

impl TransferMode {
    /// Picks the mode from the file name's last extension.
    #[must_use]
    pub fn for_name(name: &str) -> Self {
        let Some(dot) = name.rfind('.') else {
            return Self::Base64;
        };
        let ext = name[dot..].to_ascii_lowercase();
        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Self::Text
        } else {
            Self::Base64
        }
    }
}

/// A progress report: bytes of the source file accounted for so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub sent: u64,
    pub total: u64,
}

impl Progress {
    /// Completed fraction in `[0, 1]`. An empty file counts as complete.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.sent as f64 / self.total as f64
        }
    }
}

/// State of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub target_path: String,
    pub mode: TransferMode,
    pub total_bytes: u64,
    pub sent_bytes: u64,
}

impl Transfer {
    /// Starts tracking an upload.
    #[must_use]
    pub fn new(target_path: impl Into<String>, mode: TransferMode, total_bytes: u64) -> Self {
        Self {
            target_path: target_path.into(),
            mode,
            total_bytes,
            sent_bytes: 0,
        }
    }

    /// Moves the counter forward. Never goes backwards or past the total.
    pub fn advance_to(&mut self, sent: u64) {
        self.sent_bytes = self.sent_bytes.max(sent.min(self.total_bytes));
    }

    /// Marks the transfer complete.
    pub const fn finish(&mut self) {
        self.sent_bytes = self.total_bytes;
    }

    /// Returns true once every byte is accounted for.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.sent_bytes == self.total_bytes
    }

    /// Current progress.
    #[must_use]
    pub const fn progress(&self) -> Progress {
        Progress {
            sent: self.sent_bytes,
            total: self.total_bytes,
        }
    }
}

/// Splits a base64 body into wire chunks, returning each with its offset.
pub fn base64_chunks(encoded: &str) -> impl Iterator<Item = (usize, &str)> {
    // Base64 output is ASCII, so any byte offset is a char boundary.
    (0..encoded.len())
        .step_by(BASE64_CHUNK_LEN)
        .map(|start| (start, &encoded[start..(start + BASE64_CHUNK_LEN).min(encoded.len())]))
}

/// Estimated source bytes covered once the chunk at `start` is sent.
#[must_use]
pub fn base64_progress(start: usize, total: u64) -> u64 {
    (((start + BASE64_CHUNK_LEN) * 3 / 4) as u64).min(total)
}

/// Drives uploads through a [`CommandChannel`].
pub struct FileTransfer<'a, T> {
    channel: &'a CommandChannel<T>,
    pacing: &'a dyn PacingPolicy,
}

impl<'a, T: Transport> FileTransfer<'a, T> {
    /// Creates a transfer driver.
    #[must_use]
    pub fn new(channel: &'a CommandChannel<T>, pacing: &'a dyn PacingPolicy) -> Self {
        Self { channel, pacing }
    }

    /// Uploads a file, choosing text or base64 mode from its name.
    ///
    /// `progress` is called after every body line or chunk and once more
    /// with `sent == total` after the closing sentinel.
    pub async fn upload(
        &self,
        name: &str,
        content: &[u8],
        mut progress: impl FnMut(Progress),
    ) -> Result<Transfer> {
        let mode = TransferMode::for_name(name);
        let result = match mode {
            TransferMode::Text => {
                let text = String::from_utf8_lossy(content);
                self.upload_text(name, &text, &mut progress).await
            }
            TransferMode::Base64 => self.upload_base64(name, content, &mut progress).await,
        };
        if let Err(e) = &result {
            tracing::warn!("upload of {} aborted, device state unknown: {}", name, e);
        }
        result
    }

    async fn upload_text(
        &self,
        name: &str,
        text: &str,
        progress: &mut impl FnMut(Progress),
    ) -> Result<Transfer> {
        let mut transfer = Transfer::new(name, TransferMode::Text, text.len() as u64);
        tracing::debug!("uploading {} as text, {} bytes", name, transfer.total_bytes);

        self.channel
            .send(&DeviceCommand::Upload {
                name,
                base64: false,
            })
            .await?;
        self.pacing.pace(Pace::UploadSettle).await;

        for line in text.split('\n') {
            self.channel.send_command(line).await?;
            transfer.advance_to(transfer.sent_bytes + line.len() as u64 + 1);
            progress(transfer.progress());
            self.pacing.pace(Pace::TextLine).await;
        }

        self.finish(transfer, progress).await
    }

    async fn upload_base64(
        &self,
        name: &str,
        content: &[u8],
        progress: &mut impl FnMut(Progress),
    ) -> Result<Transfer> {
        let mut transfer = Transfer::new(name, TransferMode::Base64, content.len() as u64);
        let encoded = STANDARD.encode(content);
        tracing::debug!(
            "uploading {} as base64, {} bytes in {} chars",
            name,
            transfer.total_bytes,
            encoded.len()
        );

        self.channel
            .send(&DeviceCommand::Upload { name, base64: true })
            .await?;
        self.pacing.pace(Pace::UploadSettle).await;

        for (start, chunk) in base64_chunks(&encoded) {
            self.channel.send_command(chunk).await?;
            transfer.advance_to(base64_progress(start, transfer.total_bytes));
            progress(transfer.progress());
            self.pacing.pace(Pace::Base64Chunk).await;
        }

        self.finish(transfer, progress).await
    }

    async fn finish(
        &self,
        mut transfer: Transfer,
        progress: &mut impl FnMut(Progress),
    ) -> Result<Transfer> {
        self.channel.send_command(END_SENTINEL).await?;
        transfer.finish();
        progress(transfer.progress());
        self.pacing.pace(Pace::UploadTrailer).await;
        tracing::debug!("upload of {} complete", transfer.target_path);
        Ok(transfer)
    }

    /// Writes a script with the legacy `/write` command.
    ///
    /// One trailing `.js` is stripped since the device appends it.
    pub async fn write(&self, name: &str, content: &str) -> Result<()> {
        let name = name.strip_suffix(".js").unwrap_or(name);
        tracing::debug!("writing script {}", name);

        let result = async {
            self.channel.send(&DeviceCommand::Write { name }).await?;
            self.pacing.pace(Pace::WriteSettle).await;
            for line in content.split('\n') {
                self.channel.send_command(line).await?;
                self.pacing.pace(Pace::WriteLine).await;
            }
            self.channel.send(&DeviceCommand::End).await
        }
        .await;

        if let Err(e) = &result {
            tracing::warn!("write of {} aborted, device state unknown: {}", name, e);
        }
        result
    }
}
