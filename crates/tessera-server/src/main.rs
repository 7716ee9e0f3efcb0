// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tessera Server - serves one demo back office over HTTP.

use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tessera_server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tessera_server=info,tessera_admin=info,tessera_esign=info".into()
            }),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = ServerConfig::from_env()?;

    info!(
        bind_addr = %config.bind_addr,
        app = config.app.as_str(),
        base_path = %config.admin.base_path,
        "Starting Tessera Server"
    );

    let app = tessera_server::build(&config).await?;
    let router = app.router.layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Tessera Server ready");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await?;

    info!("Tessera Server shut down");

    Ok(())
}
