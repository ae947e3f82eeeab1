use tracing::warn;
use xrpl_stats::{Network, RefreshMode, SharedStore, Snapshot};

fn main() {
    init_logging();

    let db_path = std::env::var("XRPL_STATS_DB").unwrap_or_else(|_| "xrpl-stats.db".to_string());

    let store = match SharedStore::open(&db_path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("failed to open shared store at {db_path}: {err}");
            std::process::exit(1);
        }
    };

    let (network, mode) = resolve_selection(&store);

    match store.get(network, mode) {
        Some(snapshot) => print_snapshot(&snapshot, mode),
        None => println!(
            "no data published yet for {} ({}) in {db_path}",
            network.display_name(),
            mode
        ),
    }
}

/// Explicit env override wins, then the selection the server last recorded,
/// then the default view.
fn resolve_selection(store: &SharedStore) -> (Network, RefreshMode) {
    let recorded = store.active_selection();

    let network = match std::env::var("XRPL_STATS_NETWORK") {
        Ok(name) => Network::from_display_name(&name).unwrap_or_else(|| {
            warn!(%name, "unknown network name in XRPL_STATS_NETWORK");
            recorded.map(|(network, _)| network).unwrap_or(Network::XrplMainnet)
        }),
        Err(_) => recorded.map(|(network, _)| network).unwrap_or(Network::XrplMainnet),
    };

    let mode = match std::env::var("XRPL_STATS_MODE").as_deref() {
        Ok("live") => RefreshMode::Live,
        Ok("historical") => RefreshMode::Historical100,
        Ok(other) => {
            warn!(%other, "unknown mode in XRPL_STATS_MODE");
            recorded.map(|(_, mode)| mode).unwrap_or(RefreshMode::Live)
        }
        Err(_) => recorded.map(|(_, mode)| mode).unwrap_or(RefreshMode::Live),
    };

    (network, mode)
}

fn print_snapshot(snapshot: &Snapshot, mode: RefreshMode) {
    println!("{} [{}]", snapshot.network_name, mode);
    println!(
        "ledger {} (window {}), {} transactions, updated {}",
        snapshot.latest_ledger,
        snapshot.ledger_range,
        snapshot.total_transactions,
        snapshot.last_updated
    );
    println!();

    println!("result codes (avg {:.1} per code):", snapshot.average_result_codes);
    for share in &snapshot.result_codes {
        println!("  {:<24} {:>6}  {:>5.1}%", share.label, share.count, share.share);
    }
    if let Some(code) = &snapshot.most_common_result_code {
        println!("  most common: {code}");
    }
    println!();

    println!(
        "transaction types (avg {:.1} per type):",
        snapshot.average_transaction_types
    );
    for share in &snapshot.transaction_types {
        println!("  {:<24} {:>6}  {:>5.1}%", share.label, share.count, share.share);
    }
    if let Some(kind) = &snapshot.most_common_transaction_type {
        println!("  most common: {kind}");
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
}
