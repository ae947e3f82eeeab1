//! The read-only slice of the ledger wire protocol the service consumes.
//!
//! Three calls only: the validated-ledger lookup, the
//! ledger-with-transactions fetch, and the ledger stream subscription.
//! Responses are trusted as-is; nothing here validates ledger data
//! cryptographically.

use crate::{de, error::Error};
use serde::Deserialize;
use serde_json::{Value, json};

/// Request the index of the most recently validated ledger.
pub fn ledger_validated_request() -> Value {
    json!({
        "command": "ledger",
        "ledger_index": "validated",
    })
}

/// Request one ledger with its transaction list expanded.
pub fn ledger_transactions_request(ledger_index: u32) -> Value {
    json!({
        "command": "ledger",
        "ledger_index": ledger_index,
        "transactions": true,
        "expand": true,
        "binary": false,
    })
}

/// Enable ledger-closed push events on this connection.
pub fn subscribe_ledger_request() -> Value {
    json!({
        "command": "subscribe",
        "streams": ["ledger"],
    })
}

/// `result` payload of a validated-ledger lookup.
///
/// ### Raw Payload Example
/// ```json
/// { "ledger_index": 96500000, "validated": true }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValidatedLedger {
    #[serde(deserialize_with = "de::u32_int_or_str")]
    pub ledger_index: u32,
}

/// `result` payload of a ledger-with-transactions fetch.
///
/// ### Raw Payload Example
/// ```json
/// {
///     "ledger": {
///         "transactions": [
///             { "TransactionType": "Payment", "metaData": { "TransactionResult": "tesSUCCESS" } }
///         ]
///     },
///     "validated": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerTransactions {
    pub ledger: LedgerBody,
}

/// Transaction records stay opaque [`Value`]s: their shape varies by server
/// response convention, and the aggregation engine resolves the field-name
/// aliases itself.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerBody {
    #[serde(default)]
    pub transactions: Vec<Value>,
}

/// Decode the `result` object of a successful call response into `T`.
pub fn decode_result<T>(mut response: Value) -> Result<T, Error>
where
    T: serde::de::DeserializeOwned,
{
    let result = response
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| Error::Decode("response missing result object".to_string()))?;

    serde_json::from_value(result).map_err(|err| Error::Decode(err.to_string()))
}
