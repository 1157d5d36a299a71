//! Shared helpers for unit tests.

use chrono::NaiveDateTime;

use crate::ingest::Transaction;

pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Builds a time-sorted transaction list from (tx_id, sender, receiver,
/// amount, timestamp) tuples.
pub fn transactions(specs: &[(&str, &str, &str, f64, &str)]) -> Vec<Transaction> {
    let mut txs: Vec<Transaction> = specs
        .iter()
        .map(|&(tx_id, sender, receiver, amount, stamp)| Transaction {
            tx_id: tx_id.to_owned(),
            sender_id: sender.to_owned(),
            receiver_id: receiver.to_owned(),
            amount,
            timestamp: ts(stamp),
        })
        .collect();
    txs.sort_by_key(|tx| tx.timestamp);
    txs
}
