//! Connection handle shared from the holder to its descendants.
//!
//! OWNERSHIP
//! =========
//! The holder keeps the only strong reference (`Arc<Connection>`). Handles
//! carry a `Weak`, so a reader can never keep a socket alive past the
//! holder's teardown; once the holder lets go, every handle reads as absent.

#[cfg(test)]
#[path = "handle_test.rs"]
mod handle_test;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use url::Url;
use uuid::Uuid;

use crate::transport::{Link, TransportError};

/// Callback invoked with each inbound text payload.
pub type MessageHook = Box<dyn FnMut(&str) + Send>;

/// Holder-owned connection state.
pub(crate) struct Connection {
    id: Uuid,
    endpoint: Url,
    link: Box<dyn Link>,
    on_message: Mutex<Option<MessageHook>>,
}

impl Connection {
    pub(crate) fn new(id: Uuid, endpoint: Url, link: Box<dyn Link>) -> Self {
        Self { id, endpoint, link, on_message: Mutex::new(None) }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn close(&self) {
        self.link.close();
    }

    /// Run the on-message hook for one payload. Returns `false` when no hook
    /// is registered.
    ///
    /// The hook is taken out of its slot while it runs, so it may register a
    /// replacement without deadlocking; a replacement wins over the original.
    pub(crate) fn dispatch(&self, payload: &str) -> bool {
        let taken = self.hook_slot().take();
        let Some(mut hook) = taken else {
            return false;
        };
        hook(payload);
        let mut slot = self.hook_slot();
        if slot.is_none() {
            *slot = Some(hook);
        }
        true
    }

    fn set_hook(&self, hook: MessageHook) {
        *self.hook_slot() = Some(hook);
    }

    fn hook_slot(&self) -> std::sync::MutexGuard<'_, Option<MessageHook>> {
        self.on_message.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read-only, possibly dead reference to the holder's connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    endpoint: Url,
    inner: Weak<Connection>,
}

impl ConnectionHandle {
    pub(crate) fn new(connection: &Arc<Connection>) -> Self {
        Self { id: connection.id, endpoint: connection.endpoint.clone(), inner: Arc::downgrade(connection) }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Whether the holder still owns the underlying connection.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Write one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] when the holder has released the
    /// connection, or whatever the link reports.
    pub fn send_text(&self, payload: &str) -> Result<(), TransportError> {
        let connection = self.inner.upgrade().ok_or(TransportError::Closed)?;
        connection.link.send_text(payload)
    }

    /// Replace the on-message hook. Returns `false` if the connection is gone.
    pub fn set_on_message(&self, hook: impl FnMut(&str) + Send + 'static) -> bool {
        match self.inner.upgrade() {
            Some(connection) => {
                connection.set_hook(Box::new(hook));
                true
            }
            None => false,
        }
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint.as_str())
            .field("live", &self.is_live())
            .finish()
    }
}
