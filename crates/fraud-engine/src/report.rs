//! JSON report assembly.
//!
//! The report carries every account with positive suspicion plus every
//! materialized network, both in deterministic id order.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::account::{AccountProfile, Accounts};
use crate::ingest::TIMESTAMP_FORMAT;
use crate::network::NetworkProfile;
use crate::EngineError;

#[derive(Debug, Serialize)]
pub struct AccountReport {
    pub account_id: String,
    pub unique_senders: Vec<String>,
    pub unique_receivers: Vec<String>,
    pub total_sent: f64,
    pub total_received: f64,
    pub transaction_count: u32,
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
    pub suspicious_score: f64,
    pub pattern_type: String,
    pub tags: Vec<String>,
    pub network_id: Option<String>,
}

impl AccountReport {
    fn from_profile(profile: &AccountProfile) -> Self {
        Self {
            account_id: profile.account_id.clone(),
            unique_senders: profile.unique_senders.iter().cloned().collect(),
            unique_receivers: profile.unique_receivers.iter().cloned().collect(),
            total_sent: profile.total_sent,
            total_received: profile.total_received,
            transaction_count: profile.tx_count,
            first_seen: profile.first_seen.map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
            last_seen: profile.last_seen.map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
            suspicious_score: round2(profile.suspicion),
            pattern_type: profile
                .classify()
                .map(|tag| tag.as_str().to_owned())
                .unwrap_or_else(|| "none".to_owned()),
            tags: profile.tags().iter().map(|tag| tag.as_str().to_owned()).collect(),
            network_id: profile.network_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NetworkReport {
    pub network_id: String,
    pub members: Vec<String>,
    pub member_count: usize,
    pub total_amount_moved: f64,
    pub patterns: Vec<String>,
    pub risk_score: f64,
    pub risk_level: String,
}

impl NetworkReport {
    fn from_network(network: &NetworkProfile) -> Self {
        Self {
            network_id: network.network_id.clone(),
            members: network.members.clone(),
            member_count: network.members.len(),
            total_amount_moved: network.total_amount_moved,
            patterns: network.pattern_types_present.clone(),
            risk_score: round2(network.risk_score),
            risk_level: network.risk_level.as_str().to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub accounts: Vec<AccountReport>,
    pub networks: Vec<NetworkReport>,
}

/// Collects flagged accounts and all networks into a serializable report.
pub fn build_report(accounts: &Accounts, networks: &[NetworkProfile]) -> Report {
    let flagged = accounts
        .iter_sorted()
        .into_iter()
        .filter(|profile| profile.suspicion > 0.0)
        .map(AccountReport::from_profile)
        .collect::<Vec<_>>();

    let mut network_reports: Vec<_> = networks.iter().map(NetworkReport::from_network).collect();
    network_reports.sort_by(|a, b| a.network_id.cmp(&b.network_id));

    info!(
        flagged_accounts = flagged.len(),
        networks = network_reports.len(),
        "report assembled"
    );
    Report {
        accounts: flagged,
        networks: network_reports,
    }
}

pub fn write_json(report: &Report, path: &Path) -> Result<(), EngineError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)?;
    Ok(())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
