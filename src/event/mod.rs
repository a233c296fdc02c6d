//! Event system for console lines and connection changes.
//!
//! Every emitted line goes to the registered data callback (normally a
//! terminal sink), to every open [`LineTap`], and to every live
//! [`Subscription`]. Structured requests capture their response through a
//! tap, so the callback never has to be swapped out.
//!
//! Subscriptions ride a bounded broadcast channel and may skip events when a
//! subscriber falls behind. Taps are fed inline by the dispatching task and
//! never drop a line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::{broadcast, mpsc};

/// Callback invoked once per emitted line.
pub type DataCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback invoked on every open/close transition.
pub type ConnectionCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Default broadcast capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Event types that can be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A framed console line.
    Line(String),
    /// The link was opened (`true`) or closed (`false`).
    ConnectionChanged(bool),
}

impl Event {
    /// Returns the line text, if this is a line event.
    #[must_use]
    pub fn as_line(&self) -> Option<&str> {
        match self {
            Self::Line(line) => Some(line),
            Self::ConnectionChanged(_) => None,
        }
    }
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event.
    ///
    /// Returns `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("subscriber lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receives the next line, skipping connection events.
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            match self.recv().await? {
                Event::Line(line) => return Some(line),
                Event::ConnectionChanged(_) => {}
            }
        }
    }
}

/// Lossless stream of lines for one structured request.
///
/// Detaches from the dispatcher when dropped.
pub struct LineTap {
    id: u64,
    receiver: mpsc::UnboundedReceiver<String>,
    inner: Arc<EventDispatcherInner>,
}

impl LineTap {
    /// Receives the next line, waiting until one is dispatched.
    pub async fn next_line(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}

impl Drop for LineTap {
    fn drop(&mut self) {
        self.inner
            .taps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != self.id);
    }
}

struct EventDispatcherInner {
    sender: broadcast::Sender<Event>,
    on_data: RwLock<Option<DataCallback>>,
    on_connection: RwLock<Option<ConnectionCallback>>,
    taps: Mutex<Vec<(u64, mpsc::UnboundedSender<String>)>>,
    next_tap: AtomicU64,
}

/// Dispatches events to the callbacks and to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        let inner = Arc::new(EventDispatcherInner {
            sender,
            on_data: RwLock::new(None),
            on_connection: RwLock::new(None),
            taps: Mutex::new(Vec::new()),
            next_tap: AtomicU64::new(0),
        });
        Self { inner }
    }

    /// Installs the data callback, returning the previous one.
    pub fn set_data_callback(&self, callback: Option<DataCallback>) -> Option<DataCallback> {
        let mut slot = self
            .inner
            .on_data
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, callback)
    }

    /// Installs the connection callback, returning the previous one.
    pub fn set_connection_callback(
        &self,
        callback: Option<ConnectionCallback>,
    ) -> Option<ConnectionCallback> {
        let mut slot = self
            .inner
            .on_connection
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, callback)
    }

    /// Dispatches a framed line.
    pub fn dispatch_line(&self, line: String) {
        // Clone the callback out so it runs without the lock held.
        let callback = self
            .inner
            .on_data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(&line);
        }
        self.inner
            .taps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(_, tap)| tap.send(line.clone()).is_ok());
        self.dispatch(Event::Line(line));
    }

    /// Dispatches a connection change.
    pub fn dispatch_connection(&self, open: bool) {
        let callback = self
            .inner
            .on_connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(open);
        }
        self.dispatch(Event::ConnectionChanged(open));
    }

    fn dispatch(&self, event: Event) {
        // No subscribers is fine
        let _ = self.inner.sender.send(event);
    }

    /// Opens a lossless tap on lines dispatched from now on.
    #[must_use]
    pub fn tap_lines(&self) -> LineTap {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.inner.next_tap.fetch_add(1, Ordering::Relaxed);
        self.inner
            .taps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, sender));
        LineTap {
            id,
            receiver,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Subscribes to events dispatched from now on.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
        }
    }
}
