//! One fetch cycle: connect, resolve the validated ledger, walk the window,
//! aggregate, disconnect.

use crate::{
    aggregate,
    error::Error,
    network::{Network, RefreshMode},
    protocol::{self, LedgerTransactions, ValidatedLedger},
    snapshot::Snapshot,
    transport::{WsClient, WsConfig},
};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Inclusive ledger index window of `count` ledgers ending at `latest`.
///
/// The start is floored at 1, the first index a network can report.
pub fn ledger_window(latest: u32, count: u32) -> (u32, u32) {
    let start = latest.saturating_sub(count.saturating_sub(1)).max(1);
    (start, latest)
}

/// Human-readable window label stored in the snapshot.
pub fn range_label(start: u32, end: u32) -> String {
    format!("{start} to {end}")
}

/// Run one full fetch cycle against `network` at `url`.
///
/// A failure resolving the validated ledger aborts the cycle; a failure
/// fetching an individual ledger only costs that ledger's transactions.
/// The connection is opened and closed within the cycle.
pub async fn fetch_snapshot(
    network: Network,
    url: &str,
    mode: RefreshMode,
    config: WsConfig,
) -> Result<Snapshot, Error> {
    debug!(%network, url, "fetch cycle connecting");
    let client = WsClient::connect(url, config).await?;

    let outcome = run_cycle(&client, network, mode).await;
    client.disconnect().await;

    match &outcome {
        Ok(snapshot) => info!(
            %network,
            total = snapshot.total_transactions,
            range = %snapshot.ledger_range,
            "fetch cycle published"
        ),
        Err(err) => warn!(%network, %err, "fetch cycle failed"),
    }

    outcome
}

async fn run_cycle(
    client: &WsClient,
    network: Network,
    mode: RefreshMode,
) -> Result<Snapshot, Error> {
    let validated: ValidatedLedger =
        protocol::decode_result(client.call(protocol::ledger_validated_request()).await?)?;
    let latest = validated.ledger_index;

    let (start, end) = ledger_window(latest, mode.ledger_count());
    debug!(%network, start, end, "fetching ledger range");

    // Newest to oldest, sequentially awaited. Partial results are
    // acceptable: one bad ledger never aborts the cycle.
    let mut transactions: Vec<Value> = Vec::new();
    for index in (start..=end).rev() {
        match fetch_ledger_transactions(client, index).await {
            Ok(mut batch) => transactions.append(&mut batch),
            Err(err) => {
                warn!(%network, ledger = index, %err, "ledger fetch failed");
            }
        }
    }

    let stats = aggregate::aggregate(&transactions);
    Ok(Snapshot::new(
        stats,
        latest,
        range_label(start, end),
        network.display_name(),
    ))
}

async fn fetch_ledger_transactions(
    client: &WsClient,
    ledger_index: u32,
) -> Result<Vec<Value>, Error> {
    let response = client
        .call(protocol::ledger_transactions_request(ledger_index))
        .await?;
    let decoded: LedgerTransactions = protocol::decode_result(response)?;
    Ok(decoded.ledger.transactions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_window() {
        struct TestCase {
            latest: u32,
            count: u32,
            expected: (u32, u32),
        }

        let tests = vec![
            // TC0: window of 3 ending at 1000
            TestCase {
                latest: 1000,
                count: 3,
                expected: (998, 1000),
            },
            // TC1: live window of 1
            TestCase {
                latest: 1000,
                count: 1,
                expected: (1000, 1000),
            },
            // TC2: window larger than the chain floors at 1
            TestCase {
                latest: 3,
                count: 100,
                expected: (1, 3),
            },
            // TC3: degenerate zero-width request still yields a valid range
            TestCase {
                latest: 5,
                count: 0,
                expected: (5, 5),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(
                ledger_window(test.latest, test.count),
                test.expected,
                "TC{index} failed"
            );
        }
    }

    #[test]
    fn test_range_label() {
        let (start, end) = ledger_window(1000, 3);
        assert_eq!(range_label(start, end), "998 to 1000");
    }
}
