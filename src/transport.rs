//! Transport seam between the connection holder and the socket.
//!
//! DESIGN
//! ======
//! `Transport::open` never blocks. It hands back a `Link` for outbound text
//! and reports progress later through an `EventSink`: `Opened`, then any
//! number of `Message`s, then exactly one of `Closed` or `Failed`.
//!
//! Every event is tagged with the connection id it belongs to so the holder
//! can drop stragglers from an earlier activation.

#[cfg(test)]
#[path = "transport_test.rs"]
mod transport_test;

use tokio::sync::mpsc;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Lifecycle and data events reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The handshake completed; the link accepts writes.
    Opened,
    /// One inbound text frame, verbatim.
    Message(String),
    /// The connection ended, locally or remotely.
    Closed { reason: Option<String> },
    /// The connection never opened.
    Failed(String),
}

/// A transport event plus the connection it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub connection_id: Uuid,
    pub event: TransportEvent,
}

/// Per-connection handle the transport uses to report events to the holder.
#[derive(Debug, Clone)]
pub struct EventSink {
    connection_id: Uuid,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EventSink {
    #[must_use]
    pub fn new(connection_id: Uuid, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { connection_id, tx }
    }

    #[must_use]
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Deliver an event to the holder. Events sent after the holder is gone
    /// are discarded.
    pub fn emit(&self, event: TransportEvent) {
        let tagged = TaggedEvent { connection_id: self.connection_id, event };
        if let Err(err) = self.tx.send(tagged) {
            debug!(connection_id = %self.connection_id, event = ?err.0.event, "transport: holder gone, event discarded");
        }
    }
}

/// Transport-level failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("no async runtime available to drive the connection")]
    NoRuntime,
    #[error("connection closed")]
    Closed,
}

/// Outbound half of one connection.
///
/// Both calls return immediately; delivery happens on the transport's own
/// task.
pub trait Link: Send + Sync {
    /// Queue one text frame for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once the connection has ended.
    fn send_text(&self, payload: &str) -> Result<(), TransportError>;

    /// Start closing the connection. Never fails.
    fn close(&self);
}

/// Factory for connections to a text-frame endpoint.
pub trait Transport {
    /// Begin opening a connection to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the attempt cannot even be started. Network
    /// failures are reported later as [`TransportEvent::Failed`].
    fn open(&self, endpoint: &Url, sink: EventSink) -> Result<Box<dyn Link>, TransportError>;
}

// =============================================================================
// TEST HELPERS
// =============================================================================
