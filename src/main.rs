//! Echo server.
//!
//! ```text
//! wsengine [PORT] [--host 0.0.0.0] [--marker TEXT] [--accept-binary]
//! ```
//!
//! Every text message is sent back with a comma and the server time appended.

use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wsengine::{Config, EchoDispatcher, QueueLimits, Server};

#[derive(Debug, Parser)]
#[command(name = "wsengine", version, about = "WebSocket echo server")]
struct Args {
    /// Port to listen on.
    #[arg(default_value_t = 8080)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// How long a closing connection may take to finish the close handshake.
    #[arg(long, default_value_t = 5000)]
    close_timeout_ms: u64,

    /// Maximum queued outbound frames per connection.
    #[arg(long, default_value_t = 1024)]
    queue_max_frames: usize,

    /// Maximum queued outbound payload bytes per connection.
    #[arg(long, default_value_t = 1 << 20)]
    queue_max_bytes: usize,

    /// Echo binary messages instead of closing with a protocol error.
    #[arg(long)]
    accept_binary: bool,

    /// Fixed suffix for echoed text instead of the server time.
    #[arg(long)]
    marker: Option<String>,

    /// Log stats every N seconds (0 disables).
    #[arg(long, default_value_t = 0)]
    stats_interval: u64,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = Config::new()
        .with_close_timeout(Duration::from_millis(args.close_timeout_ms))
        .with_queue_limits(QueueLimits::new(args.queue_max_bytes, args.queue_max_frames))
        .with_accept_binary(args.accept_binary);
    let dispatcher = match args.marker {
        Some(marker) => EchoDispatcher::with_marker(marker),
        None => EchoDispatcher::new(),
    };
    let server = Server::new(config, dispatcher);

    let listener = TcpListener::bind((args.host.as_str(), args.port)).await?;

    if args.stats_interval > 0 {
        let stats = std::sync::Arc::clone(server.stats());
        let period = Duration::from_secs(args.stats_interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                info!(stats = %stats.snapshot(), "server stats");
            }
        });
    }

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    server.serve(listener, shutdown).await?;
    info!(stats = %server.stats().snapshot(), "stopped");
    Ok(())
}
