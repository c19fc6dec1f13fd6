//! Transient user-facing notifications
//!
//! Store actions and the publisher report failures here instead of
//! mutating state. Front-ends subscribe and show the messages as toasts.
//!
//! The bus uses `tokio::sync::broadcast`: if nobody is subscribed the
//! notification is dropped, and lagging subscribers lose the oldest
//! messages rather than blocking the sender.
//!
//! # Example
//!
//! ```
//! use libhearth::notify::{Notifier, Notification};
//!
//! # async fn example() {
//! let notifier = Notifier::new(100);
//! let mut receiver = notifier.subscribe();
//!
//! notifier.error("Could not load the stream");
//!
//! if let Ok(notification) = receiver.recv().await {
//!     println!("{}", notification.message);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub type NotificationReceiver = broadcast::Receiver<Notification>;

#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
}

impl Notifier {
    /// Create a notifier buffering up to `capacity` messages per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> NotificationReceiver {
        self.sender.subscribe()
    }

    pub fn notify(&self, notification: Notification) {
        // send() only fails when nobody is listening
        let _ = self.sender.send(notification);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(Notification::new(Level::Info, message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.notify(Notification::new(Level::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(Notification::new(Level::Error, message));
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        };
        write!(f, "{}: {}", prefix, self.message)
    }
}
