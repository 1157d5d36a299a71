//! Transaction graph analysis engine for fraud typology detection.
//!
//! The engine ingests a flat list of transfers, builds a directed multigraph
//! of accounts, and runs a fixed pipeline of detectors over it: legitimate
//! pre-classification (merchant, payroll), loop enumeration, dispersal burst
//! tracing, shell account checks, cross-pattern scoring, and finally network
//! risk evaluation.

use chrono::Duration;
use tracing::info;

pub mod account;
pub mod dispersal;
pub mod graph;
pub mod heuristics;
pub mod ingest;
pub mod loops;
pub mod network;
pub mod report;
pub mod scoring;

#[cfg(test)]
mod testutil;

pub use account::{AccountProfile, Accounts, PatternTag};
pub use dispersal::DispersalDetector;
pub use graph::{TransactionGraph, TransferEdge};
pub use ingest::{load_transactions, read_transactions, Transaction};
pub use loops::LoopDetector;
pub use network::{NetworkAssembler, NetworkProfile, RingDetail, RiskLevel};
pub use report::{build_report, write_json, Report};
pub use scoring::{AccountScorer, RiskEngine};

/// Detection thresholds. The defaults match the tuned production values;
/// they are grouped here so a driver can override any of them in one place.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Distinct counterparties above which an account seeds dispersal search.
    pub fan_threshold: usize,
    /// Maximum gap between consecutive transfers counted as one burst.
    pub burst_window: Duration,
    /// Hop limit for the dispersal walk from its seed.
    pub max_chain_depth: usize,
    /// Smallest cycle length reported as a loop.
    pub min_loop_members: usize,
    /// Suspicion added to each loop member.
    pub loop_score_bonus: f64,
    /// Base suspicion for dispersal participants, decayed by hop depth.
    pub dispersal_score_bonus: f64,
    /// Suspicion added to each shell account.
    pub shell_score_bonus: f64,
    /// Per-start-node step cap for the loop search.
    pub loop_step_budget: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fan_threshold: 5,
            burst_window: Duration::hours(1),
            max_chain_depth: 3,
            min_loop_members: 3,
            loop_score_bonus: 80.0,
            dispersal_score_bonus: 40.0,
            shell_score_bonus: 60.0,
            loop_step_budget: 200_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output of a full analysis run.
#[derive(Debug)]
pub struct Analysis {
    pub accounts: Accounts,
    pub networks: Vec<NetworkProfile>,
}

/// Runs the full detection pipeline over the given transactions.
///
/// Stage order matters: merchant and payroll classification must precede
/// the ring detectors so legitimate hubs never seed a search, and scoring
/// must follow every detector so the multi-pattern bonus sees all tags.
pub fn analyze(transactions: &[Transaction], config: &EngineConfig) -> Analysis {
    let mut accounts = Accounts::default();
    let graph = TransactionGraph::build(transactions, &mut accounts);
    info!(
        accounts = graph.node_count(),
        transfers = graph.edge_count(),
        "transaction graph built"
    );

    heuristics::classify_merchants(&graph, &mut accounts);
    heuristics::classify_payroll(&graph, &mut accounts);

    let mut assembler = NetworkAssembler::new();
    LoopDetector::new(config).detect(&graph, &mut accounts, &mut assembler);

    let mut dispersal = DispersalDetector::new(config);
    dispersal.detect(&graph, &mut accounts, &mut assembler);

    heuristics::detect_shells(&mut accounts, config);
    AccountScorer.apply(&mut accounts);

    let mut networks = assembler.into_networks();
    RiskEngine.evaluate(&mut networks, &accounts);

    Analysis { accounts, networks }
}
