use rustls::crypto::ring::default_provider;
use tracing::{error, info};
use xrpl_stats::{Network, RefreshMode, ServiceConfig, SharedStore, StatsService};

#[tokio::main]
async fn main() {
    init_logging();
    let _ = default_provider().install_default();

    info!("starting xrpl-stats server");

    // Shared store location, overridable via XRPL_STATS_DB (default: xrpl-stats.db)
    let db_path = std::env::var("XRPL_STATS_DB").unwrap_or_else(|_| "xrpl-stats.db".to_string());

    // Refresh strategy via XRPL_STATS_MODE: "live" or "historical" (default)
    let mode = match std::env::var("XRPL_STATS_MODE").as_deref() {
        Ok("live") => RefreshMode::Live,
        Ok("historical") | Err(_) => RefreshMode::Historical100,
        Ok(other) => {
            error!("unknown XRPL_STATS_MODE {other:?}, expected \"live\" or \"historical\"");
            std::process::exit(1);
        }
    };

    let store = match SharedStore::open(&db_path) {
        Ok(store) => store,
        Err(err) => {
            error!(%err, path = %db_path, "failed to open shared store");
            std::process::exit(1);
        }
    };

    info!(path = %db_path, %mode, "shared store open");

    let config = ServiceConfig::default();
    for (network, url) in &config.endpoints {
        info!(%network, %url, "configured network");
    }

    let service = StatsService::new(store, config);
    service.select_network(Network::XrplMainnet);
    service.set_mode(mode).await;

    // Historical mode refreshes on its own timer; live mode waits for
    // ledger-closed events, so seed the table once up front.
    if mode == RefreshMode::Live {
        service.refresh_all().await;
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "failed to listen for shutdown signal");
    }

    info!("shutting down");
    service.shutdown().await;
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
