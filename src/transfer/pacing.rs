//! Inter-step delays for the transfer protocol.
//!
//! The device never acknowledges upload lines, so the host waits a fixed
//! amount of time between steps and hopes the firmware keeps up. Every such
//! wait goes through a [`PacingPolicy`].

use std::time::Duration;

use futures::future::BoxFuture;

/// A point in a transfer where the host waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pace {
    /// After `/upload`, before the body.
    UploadSettle,
    /// After each text upload line.
    TextLine,
    /// After each base64 chunk.
    Base64Chunk,
    /// After the closing `END` of an upload.
    UploadTrailer,
    /// After `/write`, before the body.
    WriteSettle,
    /// After each `/write` body line.
    WriteLine,
}

/// Decides how long to wait at each [`Pace`] point.
pub trait PacingPolicy: Send + Sync {
    /// Waits before the next step.
    fn pace(&self, step: Pace) -> BoxFuture<'_, ()>;
}

/// Fixed sleeps, tuned for the stock firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelayPacing {
    pub upload_settle: Duration,
    pub text_line: Duration,
    pub base64_chunk: Duration,
    pub upload_trailer: Duration,
    pub write_settle: Duration,
    pub write_line: Duration,
}

impl FixedDelayPacing {
    /// Delays used by the stock firmware.
    pub const DEFAULT: Self = Self {
        upload_settle: Duration::from_millis(200),
        text_line: Duration::from_millis(30),
        base64_chunk: Duration::from_millis(20),
        upload_trailer: Duration::from_millis(200),
        write_settle: Duration::from_millis(500),
        write_line: Duration::from_millis(50),
    };

    /// No waiting at all. Useful against simulated devices.
    pub const NONE: Self = Self {
        upload_settle: Duration::ZERO,
        text_line: Duration::ZERO,
        base64_chunk: Duration::ZERO,
        upload_trailer: Duration::ZERO,
        write_settle: Duration::ZERO,
        write_line: Duration::ZERO,
    };

    /// Sets the delay after `/upload`.
    #[must_use]
    pub const fn upload_settle(mut self, delay: Duration) -> Self {
        self.upload_settle = delay;
        self
    }

    /// Sets the per-line delay for text uploads.
    #[must_use]
    pub const fn text_line(mut self, delay: Duration) -> Self {
        self.text_line = delay;
        self
    }

    /// Sets the per-chunk delay for base64 uploads.
    #[must_use]
    pub const fn base64_chunk(mut self, delay: Duration) -> Self {
        self.base64_chunk = delay;
        self
    }

    /// Sets the delay after the closing `END` of an upload.
    #[must_use]
    pub const fn upload_trailer(mut self, delay: Duration) -> Self {
        self.upload_trailer = delay;
        self
    }

    /// Sets the delay after `/write`.
    #[must_use]
    pub const fn write_settle(mut self, delay: Duration) -> Self {
        self.write_settle = delay;
        self
    }

    /// Sets the per-line delay for `/write` bodies.
    #[must_use]
    pub const fn write_line(mut self, delay: Duration) -> Self {
        self.write_line = delay;
        self
    }

    /// Returns the delay for a step.
    #[must_use]
    pub const fn delay(&self, step: Pace) -> Duration {
        match step {
            Pace::UploadSettle => self.upload_settle,
            Pace::TextLine => self.text_line,
            Pace::Base64Chunk => self.base64_chunk,
            Pace::UploadTrailer => self.upload_trailer,
            Pace::WriteSettle => self.write_settle,
            Pace::WriteLine => self.write_line,
        }
    }
}

impl Default for FixedDelayPacing {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl PacingPolicy for FixedDelayPacing {
    fn pace(&self, step: Pace) -> BoxFuture<'_, ()> {
        let delay = self.delay(step);
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        })
    }
}
