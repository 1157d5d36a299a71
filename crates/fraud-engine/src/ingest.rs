use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::{info, warn};

use crate::EngineError;

/// Canonical timestamp format for the transaction ledger.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Older ledger exports use `DDMMYYYY:hhmmss`; still accepted.
const LEGACY_TIMESTAMP_FORMAT: &str = "%d%m%Y:%H%M%S";

/// A single validated money transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub tx_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: f64,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
struct RawRow {
    transaction_id: String,
    sender_id: String,
    receiver_id: String,
    amount: String,
    timestamp: String,
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, LEGACY_TIMESTAMP_FORMAT))
        .ok()
}

/// Loads and validates a transaction ledger from a CSV file.
///
/// Expected headers: `transaction_id,sender_id,receiver_id,amount,timestamp`.
/// Rows with empty account ids, non-positive amounts, or unparseable
/// timestamps are skipped with a warning. The result is sorted by timestamp,
/// which the graph builder relies on.
pub fn load_transactions(path: &Path) -> Result<Vec<Transaction>, EngineError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let transactions = read_transactions(reader)?;
    info!(count = transactions.len(), "loaded transactions");
    Ok(transactions)
}

/// Reads a ledger from any CSV source; see [`load_transactions`].
pub fn read_transactions<R: Read>(
    mut reader: csv::Reader<R>,
) -> Result<Vec<Transaction>, EngineError> {
    let mut transactions = Vec::new();
    for (line, result) in reader.deserialize::<RawRow>().enumerate() {
        let row = result?;
        let Some(timestamp) = parse_timestamp(&row.timestamp) else {
            warn!(line, timestamp = %row.timestamp, "skipping row with invalid timestamp");
            continue;
        };
        if row.sender_id.is_empty() || row.receiver_id.is_empty() {
            warn!(line, "skipping row with empty sender or receiver id");
            continue;
        }
        let amount = match row.amount.parse::<f64>() {
            Ok(a) if a > 0.0 && a.is_finite() => a,
            _ => {
                warn!(line, amount = %row.amount, "skipping row with invalid amount");
                continue;
            }
        };
        transactions.push(Transaction {
            tx_id: row.transaction_id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            amount,
            timestamp,
        });
    }
    transactions.sort_by_key(|tx| tx.timestamp);
    Ok(transactions)
}
