//! Event messages delivered to subscribers.
//!
//! An [`EventMessage`] is an immutable value describing one occurrence. A
//! single dispatch shares one [`EventMessagePtr`] among every receiving
//! subscriber; nobody gets a private copy.

use std::fmt;
use std::sync::Arc;

/// Subject of the `HandlerStatus` message sent once the listener is bound.
pub const STATUS_STARTED: &str = "STARTED";
/// Subject of the `HandlerStatus` message sent once the listener is released.
pub const STATUS_STOPPED: &str = "STOPPED";
/// Subject of the `HandlerStatus` message sent when the listener fails.
pub const STATUS_FAILED: &str = "FAILED";

/// Category of an event, used to filter dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum EventKind {
    /// Internal event: the engine started, stopped or failed
    HandlerStatus,
    /// Device state-change notification (`upnp:propchange`)
    PropertyChange,
    /// Streamed data arriving over the notification channel
    HttpStream,
    /// Unclassified
    #[default]
    Unknown,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 4] = [
        EventKind::HandlerStatus,
        EventKind::PropertyChange,
        EventKind::HttpStream,
        EventKind::Unknown,
    ];

    /// Stable name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::HandlerStatus => "handler-status",
            EventKind::PropertyChange => "property-change",
            EventKind::HttpStream => "http-stream",
            EventKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One occurrence: an event kind plus free-form subject fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventMessage {
    kind: EventKind,
    subject: Vec<String>,
}

/// Shared, read-only handle to a dispatched message.
pub type EventMessagePtr = Arc<EventMessage>;

impl EventMessage {
    /// Create a message of the given kind.
    pub fn new<I, S>(kind: EventKind, subject: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            subject: subject.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a `HandlerStatus` message, e.g. `status([STATUS_STARTED])`.
    pub fn status<I, S>(subject: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(EventKind::HandlerStatus, subject)
    }

    /// Wrap the message into a shareable handle.
    pub fn into_ptr(self) -> EventMessagePtr {
        Arc::new(self)
    }

    /// Kind of the event
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Subject fields, in order
    pub fn subject(&self) -> &[String] {
        &self.subject
    }

    /// Subject field at `index`, if present
    pub fn subject_at(&self, index: usize) -> Option<&str> {
        self.subject.get(index).map(String::as_str)
    }
}
