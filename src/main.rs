//! Portfolio messages service binary.
//!
//! ```text
//!  Client ──▶ request id ─▶ trace ─▶ timeout ─▶ rate limit ─▶ handlers
//!                                                              │
//!                                              MessageStore ◀──┤
//!                                                              ▼
//!                                  NotificationDispatcher (breaker + retry)
//!                                                              │
//!                                                              ▼
//!                                                     HTTP mail relay
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use portfolio_messages::config::{load_config, ServiceConfig};
use portfolio_messages::lifecycle::{wait_for_signal, Shutdown};
use portfolio_messages::messages::InMemoryMessageStore;
use portfolio_messages::notification::{HttpRelayTransport, MailTransport};
use portfolio_messages::observability::{logging, metrics};
use portfolio_messages::{AppState, HttpServer};

#[derive(Parser)]
#[command(name = "portfolio-messages", version)]
#[command(about = "Contact message service with resilient mail notifications", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "portfolio-messages starting");

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let transport: Option<Arc<dyn MailTransport>> = match HttpRelayTransport::from_config(&config.mail)? {
        Some(relay) => {
            tracing::info!(relay = relay.url(), delivery = ?config.mail.delivery, "Mail notifications enabled");
            Some(Arc::new(relay) as Arc<dyn MailTransport>)
        }
        None => {
            tracing::warn!("mail.relay_url not set, notifications are disabled");
            None
        }
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        max_attempts = config.retry.max_attempts,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Arc::new(Shutdown::new());
    let state = AppState::from_config(
        config,
        transport,
        Arc::new(InMemoryMessageStore::new()),
        shutdown.clone(),
    );

    let server = HttpServer::new(state);
    let serving = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();
    serving.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
