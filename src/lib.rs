//! # chat-widget
//!
//! Minimal WebSocket chat widget. A `RootShell` page owns a
//! `ConnectionHolder`, which opens one connection and publishes a weak
//! `ConnectionHandle` to the `ChatPanel` below it. The panel logs inbound
//! text frames and sends a fixed greeting when its single button is pressed.
//!
//! SYSTEM CONTEXT
//! ==============
//! `transport` is the seam to the socket (`ws` is the tokio-tungstenite
//! implementation), `holder` and `handle` own and share the connection,
//! `panel` consumes it, `shell` composes the page, and `config` reads the
//! endpoint and send policy.

pub mod config;
pub mod handle;
pub mod holder;
pub mod panel;
pub mod shell;
pub mod transport;
pub mod ws;

pub use config::{ConfigError, WidgetConfig};
pub use handle::ConnectionHandle;
pub use holder::{ConnectionHolder, ConnectionStatus, HandleContext, HolderError};
pub use panel::{ChatPanel, GREETING, PanelError, PanelStats, SendOutcome, SendPolicy};
pub use shell::{RootShell, ShellError, ShellSnapshot};
pub use transport::{EventSink, Link, TaggedEvent, Transport, TransportError, TransportEvent};
pub use ws::WsTransport;
