//! Chat panel: the single-button consumer of the shared connection.

#[cfg(test)]
#[path = "panel_test.rs"]
mod panel_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::handle::ConnectionHandle;
use crate::holder::HandleContext;
use crate::transport::TransportError;

/// The only payload the panel ever sends.
pub const GREETING: &str = "Hello, server!";

/// What to do when the user clicks while no connection is published.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendPolicy {
    /// Write nothing and report `SendOutcome::Dropped`.
    #[default]
    Drop,
    /// Write nothing and fail with `PanelError::NotConnected`.
    Reject,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Dropped,
}

#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    #[error("not connected")]
    NotConnected,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Click and frame counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PanelStats {
    /// Clicks handled.
    pub attempted: u64,
    /// Greetings handed to the transport.
    pub written: u64,
    /// Clicks that found no connection.
    pub dropped: u64,
    /// Inbound frames logged.
    pub received: u64,
}

type Observer = Arc<dyn Fn(&str) + Send + Sync>;

pub struct ChatPanel {
    context: HandleContext,
    policy: SendPolicy,
    attached: Option<Uuid>,
    observer: Option<Observer>,
    stats: PanelStats,
    received: Arc<AtomicU64>,
}

impl ChatPanel {
    #[must_use]
    pub fn new(context: HandleContext, policy: SendPolicy) -> Self {
        Self {
            context,
            policy,
            attached: None,
            observer: None,
            stats: PanelStats::default(),
            received: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Forward every received payload to `observer` in addition to the log.
    ///
    /// Takes effect at the next attachment.
    pub fn set_observer(&mut self, observer: impl Fn(&str) + Send + Sync + 'static) {
        self.observer = Some(Arc::new(observer));
        self.attached = None;
    }

    #[must_use]
    pub fn policy(&self) -> SendPolicy {
        self.policy
    }

    /// Connection the receive callback is currently attached to.
    #[must_use]
    pub fn attached(&self) -> Option<Uuid> {
        self.attached
    }

    #[must_use]
    pub fn stats(&self) -> PanelStats {
        PanelStats { received: self.received.load(Ordering::Relaxed), ..self.stats }
    }

    /// Re-read the published handle and attach the receive callback when it
    /// changed. Returns `true` when a callback was attached.
    pub fn sync(&mut self) -> bool {
        let current = self.context.current();
        let current_id = current.as_ref().map(ConnectionHandle::id);
        if current_id == self.attached {
            return false;
        }
        self.attached = current_id;
        let Some(handle) = current else {
            return false;
        };

        let connection_id = handle.id();
        let received = Arc::clone(&self.received);
        let observer = self.observer.clone();
        handle.set_on_message(move |payload| {
            received.fetch_add(1, Ordering::Relaxed);
            info!(%connection_id, payload, "Received");
            if let Some(observer) = &observer {
                observer(payload);
            }
        })
    }

    /// The button: write [`GREETING`] once if connected.
    ///
    /// # Errors
    ///
    /// [`PanelError::NotConnected`] under [`SendPolicy::Reject`] when no
    /// handle is published; [`PanelError::Transport`] if the write fails.
    pub fn send_greeting(&mut self) -> Result<SendOutcome, PanelError> {
        self.stats.attempted += 1;
        let Some(handle) = self.context.current() else {
            self.stats.dropped += 1;
            return match self.policy {
                SendPolicy::Drop => {
                    debug!(status = %self.context.status(), "send dropped: not connected");
                    Ok(SendOutcome::Dropped)
                }
                SendPolicy::Reject => Err(PanelError::NotConnected),
            };
        };

        handle.send_text(GREETING)?;
        self.stats.written += 1;
        debug!(connection_id = %handle.id(), "sent greeting");
        Ok(SendOutcome::Sent)
    }
}
