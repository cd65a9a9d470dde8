pub mod administration; // Administration Ledger
pub mod alerts; // Alert Generator
pub mod api; // HTTP + WebSocket surface
pub mod archive; // Archive Index
pub mod audit; // Audit Engine + Approval Gate
pub mod config;
pub mod core_state; // Transport-agnostic state
pub mod custody; // Hash-linked custody chain
pub mod db;
pub mod directory; // Resident / staff / program lookups
pub mod error;
pub mod events;
pub mod inventory; // MedicationRecord Store
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::core_state::CustodyState;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Open the ledger and serve the API until Ctrl-C.
pub async fn run(settings: ServerConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    tracing::info!(db = %settings.db_path.display(), "Opening custody ledger");

    let state = Arc::new(CustodyState::from_config(&settings)?);

    api::serve(state, settings.bind_addr, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {e}");
        }
        tracing::info!("Shutdown requested");
    })
    .await?;

    Ok(())
}
