/**
 * GATEWAY KERNEL - Point d'entrée du processus passerelle
 *
 * RÔLE : Charge la config, construit le manager, démarre les transports et
 * attend Ctrl-C pour un arrêt propre (désabonnement puis déconnexion).
 */

use anyhow::Result;
use gateway_kernel::config::load_config;
use gateway_kernel::manager::GatewayManager;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gateway_kernel=info")),
        )
        .init();

    let config = load_config()?;
    let manager = GatewayManager::new(&config);

    let started = manager.start();
    let failed = started.iter().filter(|r| !r.ok).count();
    if failed > 0 {
        warn!(failed, total = started.len(), "some transports failed to start");
    }
    info!(transports = ?manager.transport_names(), "gateway kernel running, Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;

    for report in manager.stop() {
        if !report.ok {
            warn!(transport = %report.transport, detail = ?report.detail, "transport did not stop cleanly");
        }
    }
    info!(health = ?manager.health().get_health(), "gateway kernel stopped");
    Ok(())
}
