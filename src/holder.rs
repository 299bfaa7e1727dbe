//! Connection holder: lifecycle owner of the single shared connection.
//!
//! SYSTEM CONTEXT
//! ==============
//! The holder sits at the top of the widget tree. It opens one connection on
//! `activate`, publishes a `ConnectionHandle` to descendants once the
//! transport confirms the socket is open, and closes it on `deactivate` (or
//! drop). Descendants read through a `HandleContext`, a pair of `watch`
//! receivers, and must treat an absent handle as a normal state.
//!
//! LIFECYCLE
//! =========
//! Unmounted → Connecting → Open → Closed
//!                       ↘ Failed
//!
//! `Connecting` is visible through `ConnectionStatus`; the handle itself is
//! only published at `Open`. Leaving `Closed`/`Failed` requires a fresh
//! `activate`, which opens a brand new connection. There is no reconnect.

#[cfg(test)]
#[path = "holder_test.rs"]
mod holder_test;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::handle::{Connection, ConnectionHandle};
use crate::transport::{EventSink, TaggedEvent, Transport, TransportError, TransportEvent};

/// Observable connection state, published alongside the handle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No connection; never opened, closed, or unmounted.
    #[default]
    Disconnected,
    /// Open requested, handshake not yet confirmed.
    Connecting,
    /// Handshake confirmed; the handle is published.
    Connected,
    /// The open attempt failed.
    Failed(String),
}

impl ConnectionStatus {
    /// True while a connection is being opened or is open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting..."),
            Self::Connected => f.write_str("connected"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HolderError {
    #[error("connection already active")]
    AlreadyActive,
    #[error("connection holder was dropped")]
    Unmounted,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Descendant view of the holder: current handle and status.
#[derive(Clone, Debug)]
pub struct HandleContext {
    handle: watch::Receiver<Option<ConnectionHandle>>,
    status: watch::Receiver<ConnectionStatus>,
}

impl HandleContext {
    /// The published handle, if any. A handle whose connection has already
    /// been released reads as absent.
    #[must_use]
    pub fn current(&self) -> Option<ConnectionHandle> {
        self.handle.borrow().clone().filter(ConnectionHandle::is_live)
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Wait for the next publication and return the new value.
    ///
    /// # Errors
    ///
    /// Returns [`HolderError::Unmounted`] once the holder has been dropped.
    pub async fn changed(&mut self) -> Result<Option<ConnectionHandle>, HolderError> {
        self.handle.changed().await.map_err(|_| HolderError::Unmounted)?;
        Ok(self.handle.borrow_and_update().clone())
    }
}

/// Owner of zero or one live connection.
pub struct ConnectionHolder<T: Transport> {
    transport: T,
    endpoint: Url,
    connection: Option<Arc<Connection>>,
    handle_tx: watch::Sender<Option<ConnectionHandle>>,
    status_tx: watch::Sender<ConnectionStatus>,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
}

impl<T: Transport> ConnectionHolder<T> {
    pub fn new(transport: T, endpoint: Url) -> Self {
        let (handle_tx, _) = watch::channel(None);
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self { transport, endpoint, connection: None, handle_tx, status_tx, events_tx, events_rx }
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[must_use]
    pub fn context(&self) -> HandleContext {
        HandleContext { handle: self.handle_tx.subscribe(), status: self.status_tx.subscribe() }
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status_tx.borrow().clone()
    }

    /// Id of the connection currently owned, published or not.
    #[must_use]
    pub fn connection_id(&self) -> Option<Uuid> {
        self.connection.as_ref().map(|c| c.id())
    }

    /// Open a connection to the configured endpoint.
    ///
    /// The handle stays absent until the transport reports `Opened`.
    ///
    /// # Errors
    ///
    /// [`HolderError::AlreadyActive`] if a connection is connecting or open;
    /// [`HolderError::Transport`] if the attempt could not be started, in
    /// which case the status becomes `Failed`.
    pub fn activate(&mut self) -> Result<Uuid, HolderError> {
        if self.status_tx.borrow().is_active() {
            return Err(HolderError::AlreadyActive);
        }
        // A previous connection that ended remotely is still owned; release it.
        self.release();

        let connection_id = Uuid::new_v4();
        info!(%connection_id, endpoint = %self.endpoint, "ws: connecting");
        self.status_tx.send_replace(ConnectionStatus::Connecting);

        let sink = EventSink::new(connection_id, self.events_tx.clone());
        let link = match self.transport.open(&self.endpoint, sink) {
            Ok(link) => link,
            Err(e) => {
                warn!(%connection_id, error = %e, "ws: open failed");
                self.status_tx.send_replace(ConnectionStatus::Failed(e.to_string()));
                return Err(e.into());
            }
        };
        self.connection = Some(Arc::new(Connection::new(connection_id, self.endpoint.clone(), link)));
        Ok(connection_id)
    }

    /// Close the connection and publish absence. Safe to call repeatedly.
    pub fn deactivate(&mut self) {
        let connection_id = self.connection.as_ref().map(|c| c.id());
        self.release();
        self.status_tx.send_replace(ConnectionStatus::Disconnected);
        if let Some(connection_id) = connection_id {
            info!(%connection_id, "ws: connection closed on unmount");
        }
    }

    /// Wait for the next event belonging to the current connection and apply it.
    ///
    /// Returns `None` only if the event channel has shut down.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            let tagged = self.events_rx.recv().await?;
            if let Some(event) = self.handle_event(tagged) {
                return Some(event);
            }
        }
    }

    /// Apply one event. Returns it back when it was applied, `None` when it
    /// was stale or out of sequence and therefore dropped.
    pub fn handle_event(&mut self, tagged: TaggedEvent) -> Option<TransportEvent> {
        let TaggedEvent { connection_id, event } = tagged;
        let Some(connection) = self.connection.as_ref().filter(|c| c.id() == connection_id).cloned() else {
            debug!(%connection_id, ?event, "ws: dropping event for stale connection");
            return None;
        };
        let status = self.status();

        match &event {
            TransportEvent::Opened => {
                if status != ConnectionStatus::Connecting {
                    debug!(%connection_id, %status, "ws: unexpected open");
                    return None;
                }
                self.status_tx.send_replace(ConnectionStatus::Connected);
                self.handle_tx.send_replace(Some(ConnectionHandle::new(&connection)));
                info!(%connection_id, "WebSocket client connected");
            }
            TransportEvent::Message(payload) => {
                if status != ConnectionStatus::Connected {
                    debug!(%connection_id, %status, "ws: dropping frame outside open state");
                    return None;
                }
                if !connection.dispatch(payload) {
                    debug!(%connection_id, "ws: frame arrived before a message hook was registered");
                }
            }
            TransportEvent::Closed { reason } => {
                if !status.is_active() {
                    return None;
                }
                self.handle_tx.send_replace(None);
                self.status_tx.send_replace(ConnectionStatus::Disconnected);
                info!(%connection_id, reason = reason.as_deref().unwrap_or(""), "WebSocket client disconnected");
            }
            TransportEvent::Failed(reason) => {
                if !status.is_active() {
                    return None;
                }
                self.handle_tx.send_replace(None);
                self.status_tx.send_replace(ConnectionStatus::Failed(reason.clone()));
                warn!(%connection_id, %reason, "ws: connection failed");
            }
        }
        Some(event)
    }

    /// Close and drop the owned connection, if any, and publish absence.
    fn release(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            self.handle_tx.send_replace(None);
        }
    }
}

impl<T: Transport> Drop for ConnectionHolder<T> {
    fn drop(&mut self) {
        self.deactivate();
    }
}
