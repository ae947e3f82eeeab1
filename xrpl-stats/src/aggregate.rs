//! Pure aggregation over raw transaction records.
//!
//! Extracts the result-code and transaction-type classification fields from
//! heterogeneous records and produces frequency, share-percentage, and
//! ranking statistics. No I/O; identical input yields identical output.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Sentinel label for records missing every known field-name alias.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// One classification label with its occurrence count and share of the
/// total, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    #[serde(rename = "type")]
    pub label: String,
    pub count: u64,
    pub share: f64,
}

/// Aggregated statistics over one sequence of raw transaction records.
///
/// Both category tables are ordered by descending count, ties broken by
/// ascending label, so ranking is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub result_codes: Vec<CategoryShare>,
    pub transaction_types: Vec<CategoryShare>,
    pub total_transactions: u64,
    pub most_common_result_code: Option<String>,
    pub most_common_transaction_type: Option<String>,
    /// Mean transaction count across distinct result-code labels, 0 when
    /// there are none.
    pub average_result_codes: f64,
    pub average_transaction_types: f64,
}

/// Search the record for its transaction result code.
///
/// The alias list covers both the expanded and the binary-shape server
/// response conventions, checked in a fixed order. Total: records missing
/// every alias yield [`UNKNOWN_LABEL`].
pub fn extract_result_code(tx: &Value) -> &str {
    const CONTAINERS: [&str; 2] = ["meta", "metaData"];
    const FIELDS: [&str; 2] = ["TransactionResult", "transaction_result"];

    for container in CONTAINERS {
        let Some(meta) = tx.get(container) else {
            continue;
        };
        for field in FIELDS {
            if let Some(code) = meta.get(field).and_then(Value::as_str) {
                return code;
            }
        }
    }

    UNKNOWN_LABEL
}

/// Search the record for its transaction type: the top-level field first,
/// then the nested `tx` alternative.
pub fn extract_transaction_type(tx: &Value) -> &str {
    if let Some(kind) = tx.get("TransactionType").and_then(Value::as_str) {
        return kind;
    }

    if let Some(kind) = tx
        .get("tx")
        .and_then(|inner| inner.get("TransactionType"))
        .and_then(Value::as_str)
    {
        return kind;
    }

    UNKNOWN_LABEL
}

/// Tally both classification fields across `transactions`.
pub fn aggregate(transactions: &[Value]) -> Aggregate {
    let mut result_counts: HashMap<&str, u64> = HashMap::new();
    let mut type_counts: HashMap<&str, u64> = HashMap::new();

    for tx in transactions {
        *result_counts.entry(extract_result_code(tx)).or_default() += 1;
        *type_counts.entry(extract_transaction_type(tx)).or_default() += 1;
    }

    let total = transactions.len() as u64;
    let result_codes = ranked_shares(result_counts, total);
    let transaction_types = ranked_shares(type_counts, total);

    Aggregate {
        most_common_result_code: result_codes.first().map(|entry| entry.label.clone()),
        most_common_transaction_type: transaction_types.first().map(|entry| entry.label.clone()),
        average_result_codes: category_average(total, result_codes.len()),
        average_transaction_types: category_average(total, transaction_types.len()),
        total_transactions: total,
        result_codes,
        transaction_types,
    }
}

/// Order by count descending then label ascending and annotate each entry
/// with its share percentage.
fn ranked_shares(counts: HashMap<&str, u64>, total: u64) -> Vec<CategoryShare> {
    let mut entries: Vec<(&str, u64)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    entries
        .into_iter()
        .map(|(label, count)| CategoryShare {
            label: label.to_string(),
            count,
            share: if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect()
}

fn category_average(total: u64, distinct_labels: usize) -> f64 {
    if distinct_labels == 0 {
        0.0
    } else {
        total as f64 / distinct_labels as f64
    }
}
