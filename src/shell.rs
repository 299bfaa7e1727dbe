//! Root shell: page frame composing the holder and the chat panel.
//!
//! The shell is the whole "page": a heading, one button, and a status line.
//! It owns the `ConnectionHolder` (the ancestor) and the `ChatPanel` (the
//! descendant reading the holder's context), and runs the single-threaded
//! loop that feeds both user input and transport events through them.

#[cfg(test)]
#[path = "shell_test.rs"]
mod shell_test;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;
use uuid::Uuid;

use crate::config::WidgetConfig;
use crate::holder::{ConnectionHolder, ConnectionStatus, HandleContext, HolderError};
use crate::panel::{ChatPanel, PanelError, PanelStats, SendOutcome, SendPolicy};
use crate::transport::{Transport, TransportEvent};

pub const PAGE_TITLE: &str = "Chat Application";
pub const BUTTON_LABEL: &str = "Send Message";

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Point-in-time summary of the page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShellSnapshot {
    pub endpoint: String,
    pub status: ConnectionStatus,
    pub connection_id: Option<Uuid>,
    pub send_policy: SendPolicy,
    #[serde(flatten)]
    pub stats: PanelStats,
}

/// One line of terminal input, interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Input {
    Click,
    Close,
    Unknown,
}

impl Input {
    fn parse(line: &str) -> Self {
        match line.trim() {
            "" | "send" => Self::Click,
            "close" | "quit" | "exit" => Self::Close,
            _ => Self::Unknown,
        }
    }
}

pub struct RootShell<T: Transport> {
    holder: ConnectionHolder<T>,
    panel: ChatPanel,
}

impl<T: Transport> RootShell<T> {
    pub fn new(transport: T, config: &WidgetConfig) -> Self {
        let holder = ConnectionHolder::new(transport, config.endpoint.clone());
        let panel = ChatPanel::new(holder.context(), config.send_policy);
        Self { holder, panel }
    }

    /// Forward received payloads to `observer` (the CLI prints them).
    #[must_use]
    pub fn on_received(mut self, observer: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.panel.set_observer(observer);
        self.panel.sync();
        self
    }

    #[must_use]
    pub fn context(&self) -> HandleContext {
        self.holder.context()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.holder.status()
    }

    /// Static page frame plus the current status line.
    #[must_use]
    pub fn render(&self) -> String {
        let rule = "=".repeat(PAGE_TITLE.len());
        format!(
            "{PAGE_TITLE}\n{rule}\n\n  [ {BUTTON_LABEL} ]  (press Enter)\n\n{}\n",
            self.status_line()
        )
    }

    fn status_line(&self) -> String {
        format!("status: {}", self.holder.status())
    }

    /// Mount the holder, opening the connection.
    ///
    /// # Errors
    ///
    /// See [`ConnectionHolder::activate`].
    pub fn mount(&mut self) -> Result<Uuid, HolderError> {
        let id = self.holder.activate()?;
        self.panel.sync();
        Ok(id)
    }

    /// Unmount the holder, closing the connection.
    pub fn unmount(&mut self) {
        self.holder.deactivate();
        self.panel.sync();
    }

    /// The button.
    ///
    /// # Errors
    ///
    /// See [`ChatPanel::send_greeting`].
    pub fn click(&mut self) -> Result<SendOutcome, PanelError> {
        self.panel.sync();
        self.panel.send_greeting()
    }

    /// Wait for the next transport event, apply it, and re-sync the panel so
    /// its callback is attached before any later frame is dispatched.
    pub async fn pump(&mut self) -> Option<TransportEvent> {
        let event = self.holder.next_event().await;
        self.panel.sync();
        event
    }

    #[must_use]
    pub fn snapshot(&self) -> ShellSnapshot {
        ShellSnapshot {
            endpoint: self.holder.endpoint().to_string(),
            status: self.holder.status(),
            connection_id: self.holder.connection_id(),
            send_policy: self.panel.policy(),
            stats: self.panel.stats(),
        }
    }

    /// Render the page, mount, then serve input and transport events until
    /// the user closes the page or input ends. Always unmounts on the way out.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::Io`] if reading input or writing output fails.
    pub async fn run<R, W>(mut self, input: R, mut output: W) -> Result<ShellSnapshot, ShellError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        output.write_all(self.render().as_bytes()).await?;
        if let Err(e) = self.mount() {
            warn!(error = %e, "shell: mount failed");
            write_line(&mut output, &self.status_line()).await?;
        }

        let mut lines = input.lines();
        loop {
            tokio::select! {
                biased;
                event = self.pump() => {
                    match event {
                        Some(TransportEvent::Message(_)) | None => {}
                        Some(_) => write_line(&mut output, &self.status_line()).await?,
                    }
                }
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match Input::parse(&line) {
                        Input::Click => match self.click() {
                            Ok(SendOutcome::Sent) => {}
                            Ok(SendOutcome::Dropped) => write_line(&mut output, "not connected; nothing sent").await?,
                            Err(e) => write_line(&mut output, &format!("send failed: {e}")).await?,
                        },
                        Input::Close => break,
                        Input::Unknown => {
                            write_line(&mut output, &format!("only [ {BUTTON_LABEL} ] is available: press Enter, or type 'close'")).await?;
                        }
                    }
                }
            }
        }

        self.unmount();
        write_line(&mut output, &self.status_line()).await?;
        Ok(self.snapshot())
    }
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> std::io::Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}
