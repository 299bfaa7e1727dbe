use chat_widget::config::{DEFAULT_ENDPOINT, DEFAULT_SEND_POLICY, ENDPOINT_ENV, SEND_POLICY_ENV};
use chat_widget::{ConfigError, RootShell, ShellError, WidgetConfig, WsTransport};
use clap::Parser;
use tokio::io::BufReader;


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Shell(#[from] ShellError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "chat-widget", about = "Single-button WebSocket chat widget")]
struct Cli {
    /// WebSocket endpoint to connect to.
    #[arg(long, env = ENDPOINT_ENV, default_value = DEFAULT_ENDPOINT)]
    url: String,

    /// What a click does while disconnected: `drop` or `reject`.
    #[arg(long, env = SEND_POLICY_ENV, default_value = DEFAULT_SEND_POLICY)]
    send_policy: String,

    /// Print the final page snapshot as one JSON line on exit.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = WidgetConfig::new(&cli.url, &cli.send_policy)?;
    tracing::info!(endpoint = %config.endpoint, send_policy = ?config.send_policy, "chat-widget starting");

    let shell = RootShell::new(WsTransport::new(), &config).on_received(|payload| println!("Received: {payload}"));
    let snapshot = shell
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    if cli.json {
        println!("{}", serde_json::to_string(&snapshot)?);
    }
    Ok(())
}
