use std::collections::HashSet;

use serde::Serialize;
use tracing::error;

use crate::account::Accounts;

/// Descriptor for a detected ring, produced by a pattern detector.
///
/// `members` is the traversal order, not deduplicated membership: the same
/// account may legitimately recur across rings. `nodes_by_distance` is the
/// provenance partition — for loops one bucket per hop from the start node,
/// for dispersal a single flat bucket.
#[derive(Debug, Clone)]
pub struct RingDetail {
    pub ring_id: String,
    pub members: Vec<String>,
    pub nodes_by_distance: Vec<Vec<String>>,
}

/// Ordinal risk category derived from a network's risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        }
    }
}

/// A named cluster of accounts implicated together by one detected ring.
/// Member list is immutable after creation; risk fields are filled in by
/// the risk pass.
#[derive(Debug, Clone)]
pub struct NetworkProfile {
    pub network_id: String,
    pub members: Vec<String>,
    pub total_amount_moved: f64,
    pub pattern_types_present: Vec<String>,
    pub avg_suspicious_score: f64,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
}

impl NetworkProfile {
    fn from_ring(ring: RingDetail) -> Self {
        Self {
            network_id: ring.ring_id,
            members: ring.members,
            total_amount_moved: 0.0,
            pattern_types_present: Vec::new(),
            avg_suspicious_score: 0.0,
            risk_score: 0.0,
            risk_level: RiskLevel::Low,
        }
    }
}

/// Materializes ring descriptors into networks as detectors produce them.
///
/// No deduplication across rings; an account implicated by both a loop and
/// a dispersal chain appears in both networks. Each member's `network_id`
/// is set to the first ring that implicated it.
#[derive(Debug, Default)]
pub struct NetworkAssembler {
    networks: Vec<NetworkProfile>,
    seen_ids: HashSet<String>,
}

impl NetworkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn materialize(&mut self, ring: RingDetail, accounts: &mut Accounts) {
        if !self.seen_ids.insert(ring.ring_id.clone()) {
            // Deterministic naming makes this unreachable; a collision is a
            // naming-scheme bug.
            debug_assert!(false, "duplicate ring id {}", ring.ring_id);
            error!(ring_id = %ring.ring_id, "duplicate ring id, dropping ring");
            return;
        }
        for member in &ring.members {
            if let Some(profile) = accounts.get_mut(member) {
                if profile.network_id.is_none() {
                    profile.network_id = Some(ring.ring_id.clone());
                }
            }
        }
        self.networks.push(NetworkProfile::from_ring(ring));
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn networks(&self) -> &[NetworkProfile] {
        &self.networks
    }

    pub fn into_networks(self) -> Vec<NetworkProfile> {
        self.networks
    }
}
