//! tokio-tungstenite implementation of [`Transport`].
//!
//! DESIGN
//! ======
//! One spawned task per connection owns the socket. The `WsLink` handed to
//! the holder only pushes onto an unbounded channel, so writes and close
//! never block the caller. The task:
//!
//! 1. Races `connect_async` against an early close request.
//! 2. Reports `Opened` (or `Failed`) through the sink.
//! 3. `select!`s outbound text onto the socket and inbound text frames onto
//!    the sink until either side closes, then reports `Closed`. A close
//!    started by the server is answered before the socket is dropped.
//!
//! Binary, ping and pong frames are ignored; tungstenite answers pings itself.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use url::Url;

use crate::transport::{EventSink, Link, Transport, TransportError, TransportEvent};

/// WebSocket transport backed by tokio-tungstenite.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsTransport;

impl WsTransport {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WsTransport {
    fn open(&self, endpoint: &Url, sink: EventSink) -> Result<Box<dyn Link>, TransportError> {
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(TransportError::InvalidEndpoint(endpoint.to_string()));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(run_socket(endpoint.to_string(), rx, sink));
        Ok(Box::new(WsLink { tx }))
    }
}

enum Outbound {
    Text(String),
    Close,
}

struct WsLink {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Link for WsLink {
    fn send_text(&self, payload: &str) -> Result<(), TransportError> {
        self.tx
            .send(Outbound::Text(payload.to_owned()))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        if self.tx.send(Outbound::Close).is_err() {
            debug!("ws: close requested after socket task ended");
        }
    }
}

async fn run_socket(url: String, mut outbound: mpsc::UnboundedReceiver<Outbound>, sink: EventSink) {
    let connection_id = sink.connection_id();

    let stream = tokio::select! {
        result = connect_async(url.as_str()) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                sink.emit(TransportEvent::Failed(e.to_string()));
                return;
            }
        },
        () = wait_for_close(&mut outbound) => {
            debug!(%connection_id, "ws: closed before handshake completed");
            sink.emit(TransportEvent::Closed { reason: Some("closed before open".to_owned()) });
            return;
        }
    };

    sink.emit(TransportEvent::Opened);
    let (mut write, mut read) = stream.split();

    let reason = loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(Message::text(text)).await {
                        break Some(e.to_string());
                    }
                }
                Some(Outbound::Close) | None => {
                    if let Err(e) = write.close().await {
                        debug!(%connection_id, error = %e, "ws: close handshake failed");
                    }
                    break None;
                }
            },
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => sink.emit(TransportEvent::Message(text.to_string())),
                Some(Ok(Message::Close(frame))) => {
                    // tungstenite only queues the close reply; it goes out on the next flush.
                    if let Err(e) = write.close().await {
                        debug!(%connection_id, error = %e, "ws: close reply failed");
                    }
                    break frame.map(|f| f.reason.to_string());
                }
                Some(Ok(other)) => debug!(%connection_id, frame = ?other, "ws: ignoring non-text frame"),
                Some(Err(e)) => break Some(e.to_string()),
                None => break None,
            }
        }
    };

    debug!(%connection_id, ?reason, "ws: socket task finished");
    sink.emit(TransportEvent::Closed { reason });
}

/// Resolve once the holder asks to close (or drops the link). Writes issued
/// before the handshake are discarded; the holder never publishes a handle
/// that early.
async fn wait_for_close(outbound: &mut mpsc::UnboundedReceiver<Outbound>) {
    while let Some(message) = outbound.recv().await {
        match message {
            Outbound::Close => return,
            Outbound::Text(_) => debug!("ws: discarding write issued before open"),
        }
    }
}
