//! End-to-end tests against a local mock ledger WebSocket server.
//!
//! The mock speaks just enough of the wire protocol to exercise the full
//! fetch cycle, push-event delivery, call cancellation, and the
//! orchestrator's refresh strategies.

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use xrpl_stats::{
    Error, Network, RefreshMode, ServiceConfig, SharedStore, StatsService, WsClient, WsConfig,
    fetch, protocol,
};

/// Script for the mock ledger server.
#[derive(Clone, Default)]
struct MockLedger {
    /// Index reported by the validated-ledger lookup.
    latest: u32,
    /// Transactions per ledger index; unknown indices serve an empty list.
    transactions: HashMap<u32, Vec<Value>>,
    /// Ledger indices that respond with a server error object.
    failing: Vec<u32>,
    /// Ledger indices whose fetch never receives a response.
    silent: Vec<u32>,
}

struct MockServer {
    url: String,
    /// Ledger indices requested via ledger-with-transactions calls, in
    /// arrival order.
    requested: Arc<Mutex<Vec<u32>>>,
    /// Number of subscribe commands received.
    subscribes: Arc<Mutex<u32>>,
    /// Push a frame to every connected client.
    event_tx: tokio::sync::broadcast::Sender<Value>,
}

impl MockServer {
    fn push_event(&self, event: Value) {
        let _ = self.event_tx.send(event);
    }
}

async fn spawn_mock(script: MockLedger) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requested = Arc::new(Mutex::new(Vec::new()));
    let subscribes = Arc::new(Mutex::new(0));
    let (event_tx, _) = tokio::sync::broadcast::channel(64);

    let server = MockServer {
        url: format!("ws://{addr}"),
        requested: Arc::clone(&requested),
        subscribes: Arc::clone(&subscribes),
        event_tx: event_tx.clone(),
    };

    tokio::spawn(async move {
        while let Ok((stream, _peer)) = listener.accept().await {
            tokio::spawn(handle_client(
                stream,
                script.clone(),
                Arc::clone(&requested),
                Arc::clone(&subscribes),
                event_tx.subscribe(),
            ));
        }
    });

    server
}

async fn handle_client(
    stream: TcpStream,
    script: MockLedger,
    requested: Arc<Mutex<Vec<u32>>>,
    subscribes: Arc<Mutex<u32>>,
    mut event_rx: tokio::sync::broadcast::Receiver<Value>,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(_) => return,
    };
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            frame = read.next() => {
                let Some(Ok(Message::Text(text))) = frame else { break };
                let request: Value = serde_json::from_str(text.as_str()).unwrap();
                if let Some(response) = respond(&request, &script, &requested, &subscribes) {
                    if write.send(Message::Text(response.to_string().into())).await.is_err() {
                        break;
                    }
                }
            }
            event = event_rx.recv() => {
                let Ok(event) = event else { break };
                if write.send(Message::Text(event.to_string().into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

fn respond(
    request: &Value,
    script: &MockLedger,
    requested: &Arc<Mutex<Vec<u32>>>,
    subscribes: &Arc<Mutex<u32>>,
) -> Option<Value> {
    let id = request["id"].clone();

    match request["command"].as_str() {
        Some("subscribe") => {
            *subscribes.lock().unwrap() += 1;
            Some(json!({"id": id, "status": "success", "result": {}}))
        }
        Some("ledger") if request["ledger_index"] == json!("validated") => Some(json!({
            "id": id,
            "status": "success",
            "result": {"ledger_index": script.latest, "validated": true},
        })),
        Some("ledger") => {
            let index = request["ledger_index"].as_u64().unwrap() as u32;
            requested.lock().unwrap().push(index);

            if script.silent.contains(&index) {
                return None;
            }
            if script.failing.contains(&index) {
                return Some(json!({
                    "id": id,
                    "status": "error",
                    "error": "ledgerNotFound",
                    "error_message": "ledger not found",
                }));
            }

            let transactions = script.transactions.get(&index).cloned().unwrap_or_default();
            Some(json!({
                "id": id,
                "status": "success",
                "result": {"ledger": {"transactions": transactions}},
            }))
        }
        _ => None,
    }
}

fn payment(code: &str) -> Value {
    json!({
        "TransactionType": "Payment",
        "meta": {"TransactionResult": code},
    })
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not met within 5s");
}

#[tokio::test]
async fn test_fetch_cycle_with_one_failing_ledger() {
    let server = spawn_mock(MockLedger {
        latest: 3,
        transactions: HashMap::from([(
            3,
            vec![
                payment("tesSUCCESS"),
                payment("tesSUCCESS"),
                payment("tesSUCCESS"),
            ],
        )]),
        failing: vec![2],
        ..Default::default()
    })
    .await;

    let snapshot = fetch::fetch_snapshot(
        Network::XrplMainnet,
        &server.url,
        RefreshMode::Historical100,
        WsConfig::default(),
    )
    .await
    .unwrap();

    // Window of 100 ending at 3 floors at ledger 1; the failing ledger 2
    // contributes zero transactions without aborting the cycle.
    assert_eq!(snapshot.latest_ledger, 3);
    assert_eq!(snapshot.ledger_range, "1 to 3");
    assert_eq!(snapshot.total_transactions, 3);
    assert_eq!(snapshot.result_codes.len(), 1);
    assert_eq!(snapshot.result_codes[0].label, "tesSUCCESS");
    assert_eq!(snapshot.result_codes[0].count, 3);
    assert!((snapshot.result_codes[0].share - 100.0).abs() < 1e-9);
    assert_eq!(snapshot.most_common_result_code.as_deref(), Some("tesSUCCESS"));
    assert_eq!(snapshot.network_name, "XRPL Mainnet");

    // Ledgers are fetched newest to oldest.
    assert_eq!(*server.requested.lock().unwrap(), vec![3, 2, 1]);
}

#[tokio::test]
async fn test_ledger_closed_events_int_and_string_index() {
    let server = spawn_mock(MockLedger {
        latest: 10,
        ..Default::default()
    })
    .await;

    let client = WsClient::connect(&server.url, WsConfig::default())
        .await
        .unwrap();
    let mut events = client.subscribe_ledger_closed().await.unwrap();

    server.push_event(json!({"type": "ledgerClosed", "ledger_index": 96500000u64}));
    server.push_event(json!({"type": "ledgerClosed", "ledger_index": "96500001"}));
    // Unrecognized frames are dropped, not delivered as events.
    server.push_event(json!({"type": "serverStatus", "load_base": 256}));
    server.push_event(json!({"type": "ledgerClosed", "ledger_index": 96500002u64}));

    let mut received = Vec::new();
    for _ in 0..3 {
        let index = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event not delivered within 5s")
            .expect("event stream ended");
        received.push(index);
    }
    assert_eq!(received, vec![96_500_000, 96_500_001, 96_500_002]);

    client.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_cancels_in_flight_call() {
    let server = spawn_mock(MockLedger {
        latest: 10,
        silent: vec![5],
        ..Default::default()
    })
    .await;

    let client = Arc::new(
        WsClient::connect(&server.url, WsConfig::default())
            .await
            .unwrap(),
    );

    let in_flight = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.call(protocol::ledger_transactions_request(5)).await })
    };

    // Let the call register and send before the disconnect.
    wait_for(|| server.requested.lock().unwrap().contains(&5)).await;
    client.disconnect().await;

    let outcome = in_flight.await.unwrap();
    assert!(matches!(outcome, Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_server_error_resolves_call() {
    let server = spawn_mock(MockLedger {
        latest: 10,
        failing: vec![7],
        ..Default::default()
    })
    .await;

    let client = WsClient::connect(&server.url, WsConfig::default())
        .await
        .unwrap();

    let outcome = client.call(protocol::ledger_transactions_request(7)).await;
    match outcome {
        Err(Error::Server(message)) => assert_eq!(message, "ledger not found"),
        other => panic!("expected server error, got {other:?}"),
    }

    client.disconnect().await;
}

#[tokio::test]
async fn test_connect_to_unreachable_address_fails() {
    // Nothing listens on port 1.
    let outcome = WsClient::connect("ws://127.0.0.1:1", WsConfig::default()).await;
    assert!(matches!(outcome, Err(Error::Connection(_))));
}

#[tokio::test]
async fn test_mode_switch_historical_to_live() {
    let server = spawn_mock(MockLedger {
        latest: 10,
        transactions: HashMap::from([(10, vec![payment("tesSUCCESS")])]),
        ..Default::default()
    })
    .await;

    let dir = TempDir::new().unwrap();
    let store = SharedStore::open(dir.path().join("stats.db")).unwrap();
    let service = StatsService::new(
        store,
        ServiceConfig {
            endpoints: vec![(Network::XrplMainnet, server.url.clone())],
            ws: WsConfig::default(),
        },
    );

    // Historical: the timer's immediate first tick seeds the table with the
    // full window.
    service.set_mode(RefreshMode::Historical100).await;
    wait_for(|| service.snapshot_for(Network::XrplMainnet).is_some()).await;
    let historical = service.snapshot_for(Network::XrplMainnet).unwrap();
    assert_eq!(historical.ledger_range, "1 to 10");

    // Switching tears the timer down and establishes one persistent
    // subscribed connection.
    service.set_mode(RefreshMode::Live).await;
    wait_for(|| *server.subscribes.lock().unwrap() >= 1).await;

    // Each ledger-closed event triggers exactly one single-ledger cycle.
    server.push_event(json!({"type": "ledgerClosed", "ledger_index": 10}));
    wait_for(|| {
        service
            .snapshot_for(Network::XrplMainnet)
            .is_some_and(|snapshot| snapshot.ledger_range == "10 to 10")
    })
    .await;

    let live = service.snapshot_for(Network::XrplMainnet).unwrap();
    assert_eq!(live.total_transactions, 1);

    // The live snapshot reached the shared store under its own key.
    let reader = SharedStore::open(dir.path().join("stats.db")).unwrap();
    assert_eq!(
        reader
            .get(Network::XrplMainnet, RefreshMode::Live)
            .map(|snapshot| snapshot.ledger_range),
        Some("10 to 10".to_string())
    );

    service.shutdown().await;
}

#[tokio::test]
async fn test_one_network_failure_does_not_block_others() {
    let server = spawn_mock(MockLedger {
        latest: 5,
        transactions: HashMap::from([(5, vec![payment("tesSUCCESS")])]),
        ..Default::default()
    })
    .await;

    let dir = TempDir::new().unwrap();
    let store = SharedStore::open(dir.path().join("stats.db")).unwrap();
    let service = StatsService::new(
        store,
        ServiceConfig {
            // The second network points at a dead endpoint.
            endpoints: vec![
                (Network::XrplMainnet, server.url.clone()),
                (Network::Xahau, "ws://127.0.0.1:1".to_string()),
            ],
            ws: WsConfig::default(),
        },
    );

    service.refresh_all().await;

    assert!(service.snapshot_for(Network::XrplMainnet).is_some());
    assert_eq!(service.snapshot_for(Network::Xahau), None);
    assert!(!service.is_loading());
}
