//! Process-wide orchestrator: refresh strategy selection, multi-network
//! fan-out, and publication of the freshest snapshot.
//!
//! The per-network snapshot table is owned exclusively by the service and
//! mutated only by its own publish step; consumers read through the
//! accessor methods.

use crate::{
    fetch,
    network::{Network, RefreshMode},
    snapshot::Snapshot,
    store::SharedStore,
    transport::{WsClient, WsConfig},
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// One entry per configured network: (network, WebSocket URL).
    pub endpoints: Vec<(Network, String)>,
    /// Transport settings used by every connection the service opens.
    pub ws: WsConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoints: Network::ALL
                .into_iter()
                .map(|network| (network, network.ws_url().to_string()))
                .collect(),
            ws: WsConfig::default(),
        }
    }
}

/// Per-network published slot.
#[derive(Debug, Default)]
struct PublishedSlot {
    snapshot: Option<Snapshot>,
    /// Sequence number of the cycle that produced `snapshot`. A completed
    /// cycle older than this is discarded rather than published, so a slow
    /// earlier cycle can never overwrite a newer result.
    cycle_seq: u64,
}

#[derive(Debug)]
struct ServiceState {
    published: HashMap<Network, PublishedSlot>,
    selected_network: Network,
    mode: RefreshMode,
    is_loading: bool,
    last_error: Option<String>,
    last_updated: Option<DateTime<Utc>>,
}

impl Default for ServiceState {
    fn default() -> Self {
        Self {
            published: HashMap::new(),
            selected_network: Network::XrplMainnet,
            mode: RefreshMode::Historical100,
            is_loading: false,
            last_error: None,
            last_updated: None,
        }
    }
}

struct Inner {
    state: RwLock<ServiceState>,
    store: Mutex<SharedStore>,
    config: ServiceConfig,
    cycle_seq: AtomicU64,
}

impl Inner {
    /// Run one fetch cycle for `network` and publish its result.
    async fn run_cycle(&self, network: Network, url: &str, mode: RefreshMode) {
        let seq = self.cycle_seq.fetch_add(1, Ordering::Relaxed) + 1;

        match fetch::fetch_snapshot(network, url, mode, self.config.ws.clone()).await {
            Ok(snapshot) => self.publish(network, mode, seq, snapshot),
            Err(err) => {
                // The previous snapshot, if any, stays published untouched.
                warn!(%network, %err, "cycle produced no snapshot");
                self.state.write().last_error = Some(err.to_string());
            }
        }
    }

    /// Replace the slot for `network` unless a newer cycle already has, and
    /// write through to the shared store.
    fn publish(&self, network: Network, mode: RefreshMode, seq: u64, snapshot: Snapshot) {
        {
            let mut state = self.state.write();
            let slot = state.published.entry(network).or_default();
            if seq < slot.cycle_seq {
                debug!(
                    %network,
                    seq,
                    published = slot.cycle_seq,
                    "discarding stale cycle result"
                );
                return;
            }
            slot.snapshot = Some(snapshot.clone());
            slot.cycle_seq = seq;
            state.last_updated = Some(Utc::now());
            state.last_error = None;
        }

        if let Err(err) = self.store.lock().put(network, mode, &snapshot) {
            error!(%network, %err, "shared store write failed");
        }
    }

    /// One concurrent cycle per configured network; a failure on one never
    /// blocks or invalidates the others.
    async fn refresh_all(&self, mode: RefreshMode) {
        self.state.write().is_loading = true;

        join_all(
            self.config
                .endpoints
                .iter()
                .map(|(network, url)| self.run_cycle(*network, url, mode)),
        )
        .await;

        self.state.write().is_loading = false;
    }
}

/// One persistent subscribed connection with its event-consuming task.
struct LiveListener {
    client: WsClient,
    task: JoinHandle<()>,
}

enum Strategy {
    Idle,
    Historical { timer: JoinHandle<()> },
    Live { listeners: Vec<LiveListener> },
}

/// Coordinates refresh cycles for all configured networks and publishes the
/// freshest snapshot per network.
pub struct StatsService {
    inner: Arc<Inner>,
    strategy: tokio::sync::Mutex<Strategy>,
}

impl StatsService {
    pub fn new(store: SharedStore, config: ServiceConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(ServiceState::default()),
                store: Mutex::new(store),
                config,
                cycle_seq: AtomicU64::new(0),
            }),
            strategy: tokio::sync::Mutex::new(Strategy::Idle),
        }
    }

    /// Currently published snapshot for the selected network.
    pub fn current_snapshot(&self) -> Option<Snapshot> {
        let state = self.inner.state.read();
        state
            .published
            .get(&state.selected_network)
            .and_then(|slot| slot.snapshot.clone())
    }

    /// Currently published snapshot for a specific network.
    pub fn snapshot_for(&self, network: Network) -> Option<Snapshot> {
        self.inner
            .state
            .read()
            .published
            .get(&network)
            .and_then(|slot| slot.snapshot.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.read().is_loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.state.read().last_error.clone()
    }

    /// Marker consumers may watch for change notification.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.state.read().last_updated
    }

    pub fn mode(&self) -> RefreshMode {
        self.inner.state.read().mode
    }

    /// Change the network whose snapshot [`Self::current_snapshot`] returns,
    /// and record the choice for the secondary consumer.
    pub fn select_network(&self, network: Network) {
        let mode = {
            let mut state = self.inner.state.write();
            state.selected_network = network;
            state.mode
        };
        self.persist_selection(network, mode);
    }

    /// Switch refresh strategy, tearing the previous one down first.
    ///
    /// Live: one persistent subscribed connection per network, each
    /// ledger-closed event triggering exactly one cycle. Historical: a
    /// recurring timer triggering one concurrent cycle per network.
    pub async fn set_mode(&self, mode: RefreshMode) {
        let mut strategy = self.strategy.lock().await;
        teardown(std::mem::replace(&mut *strategy, Strategy::Idle)).await;

        let selected = {
            let mut state = self.inner.state.write();
            state.mode = mode;
            state.selected_network
        };
        self.persist_selection(selected, mode);

        *strategy = match mode {
            RefreshMode::Live => Strategy::Live {
                listeners: self.start_live_listeners().await,
            },
            RefreshMode::Historical100 => Strategy::Historical {
                timer: self.start_timer(mode),
            },
        };

        info!(%mode, "refresh strategy active");
    }

    /// Trigger one immediate refresh of every configured network.
    pub async fn refresh_all(&self) {
        let mode = self.inner.state.read().mode;
        self.inner.refresh_all(mode).await;
    }

    /// Tear down the active refresh strategy.
    pub async fn shutdown(&self) {
        let mut strategy = self.strategy.lock().await;
        teardown(std::mem::replace(&mut *strategy, Strategy::Idle)).await;
    }

    fn persist_selection(&self, network: Network, mode: RefreshMode) {
        if let Err(err) = self.inner.store.lock().set_active_selection(network, mode) {
            error!(%err, "failed to persist active selection");
        }
    }

    async fn start_live_listeners(&self) -> Vec<LiveListener> {
        let mut listeners = Vec::new();
        for (network, url) in self.inner.config.endpoints.clone() {
            match self.start_live_listener(network, url).await {
                Ok(listener) => listeners.push(listener),
                Err(err) => warn!(%network, %err, "live subscribe failed"),
            }
        }
        listeners
    }

    async fn start_live_listener(
        &self,
        network: Network,
        url: String,
    ) -> Result<LiveListener, crate::error::Error> {
        let client = WsClient::connect(&url, self.inner.config.ws.clone()).await?;
        let mut events = client.subscribe_ledger_closed().await?;

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            // One cycle per ledger-closed event, window size 1, each on a
            // fresh connection opened and closed within the cycle.
            while let Some(index) = events.recv().await {
                debug!(%network, ledger = index, "ledger closed");
                inner.run_cycle(network, &url, RefreshMode::Live).await;
            }
        });

        info!(%network, "live listener subscribed");
        Ok(LiveListener { client, task })
    }

    fn start_timer(&self, mode: RefreshMode) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(mode.refresh_interval());
            // The first tick fires immediately and seeds the table.
            loop {
                timer.tick().await;
                inner.refresh_all(mode).await;
            }
        })
    }
}

async fn teardown(strategy: Strategy) {
    match strategy {
        Strategy::Idle => {}
        Strategy::Historical { timer } => {
            timer.abort();
            debug!("historical refresh timer cancelled");
        }
        Strategy::Live { listeners } => {
            for listener in listeners {
                listener.task.abort();
                listener.client.disconnect().await;
            }
            debug!("live listeners disconnected");
        }
    }
}
