//! XOver rendezvous server.

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xover_server::{server, RendezvousStore, ServerConfig, ServerState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    info!(
        ttl_secs = config.session_ttl.as_secs(),
        "Starting XOver rendezvous server..."
    );

    let state = Arc::new(ServerState::new(RendezvousStore::new(config.session_ttl)));
    let sweeper = server::spawn_sweeper(Arc::clone(&state), config.sweep_interval);

    let result = tokio::select! {
        result = server::run_server(config.addr, state) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    };

    sweeper.abort();
    result
}
