//! The aggregated output for one (network, mode) pair.

use crate::aggregate::{Aggregate, CategoryShare};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Statistics produced by one completed fetch cycle.
///
/// Immutable once constructed; a new cycle always produces a wholly new
/// `Snapshot`. The serialized field names are the cache record's canonical
/// shape, shared with the out-of-process consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub result_codes: Vec<CategoryShare>,
    pub transaction_types: Vec<CategoryShare>,
    pub total_transactions: u64,
    /// RFC3339 freshness timestamp, set at construction.
    pub last_updated: String,
    pub most_common_result_code: Option<String>,
    pub most_common_transaction_type: Option<String>,
    pub average_result_codes: f64,
    pub average_transaction_types: f64,
    /// Latest validated ledger index observed by the cycle.
    pub latest_ledger: u32,
    /// Inclusive window as "start to end", start <= end and start >= 1.
    pub ledger_range: String,
    pub network_name: String,
}

impl Snapshot {
    pub fn new(
        aggregate: Aggregate,
        latest_ledger: u32,
        ledger_range: String,
        network_name: &str,
    ) -> Self {
        Self {
            result_codes: aggregate.result_codes,
            transaction_types: aggregate.transaction_types,
            total_transactions: aggregate.total_transactions,
            last_updated: Utc::now().to_rfc3339(),
            most_common_result_code: aggregate.most_common_result_code,
            most_common_transaction_type: aggregate.most_common_transaction_type,
            average_result_codes: aggregate.average_result_codes,
            average_transaction_types: aggregate.average_transaction_types,
            latest_ledger,
            ledger_range,
            network_name: network_name.to_string(),
        }
    }
}
