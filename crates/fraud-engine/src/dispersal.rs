use std::collections::{HashSet, VecDeque};

use petgraph::graph::NodeIndex;
use tracing::info;

use crate::account::{Accounts, PatternTag};
use crate::graph::{TransactionGraph, TransferEdge};
use crate::network::{NetworkAssembler, RingDetail};
use crate::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    FanOut,
    FanIn,
}

impl Flow {
    fn tag(self) -> PatternTag {
        match self {
            Flow::FanOut => PatternTag::DispersalFanOut,
            Flow::FanIn => PatternTag::DispersalFanIn,
        }
    }
}

/// Detects fan-out and fan-in dispersal as chains of time-clustered
/// transfer bursts rather than a flat counterparty count.
///
/// An account seeds a walk when its distinct-counterparty count exceeds the
/// threshold and it is not payroll/merchant tagged. The walk is a bounded-
/// depth BFS that only crosses in-burst edges (consecutive timestamps
/// within the burst window), with a depth-decayed suspicion bonus so that
/// suspicion concentrates near the seed.
pub struct DispersalDetector<'a> {
    config: &'a EngineConfig,
    fan_out_counter: usize,
    fan_in_counter: usize,
}

impl<'a> DispersalDetector<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            fan_out_counter: 0,
            fan_in_counter: 0,
        }
    }

    pub fn detect(
        &mut self,
        graph: &TransactionGraph,
        accounts: &mut Accounts,
        assembler: &mut NetworkAssembler,
    ) {
        let rings_before = assembler.len();
        for &node in graph.nodes_in_order() {
            let id = graph.id_of(node);
            let (fan_out, fan_in) = match accounts.get(id) {
                Some(profile) if !profile.is_preclassified() => (
                    profile.unique_receivers.len() > self.config.fan_threshold,
                    profile.unique_senders.len() > self.config.fan_threshold,
                ),
                _ => continue,
            };
            if fan_out {
                self.walk(node, Flow::FanOut, graph, accounts, assembler);
            }
            if fan_in {
                self.walk(node, Flow::FanIn, graph, accounts, assembler);
            }
        }
        info!(
            rings = assembler.len() - rings_before,
            "dispersal detection complete"
        );
    }

    fn walk(
        &mut self,
        seed: NodeIndex,
        flow: Flow,
        graph: &TransactionGraph,
        accounts: &mut Accounts,
        assembler: &mut NetworkAssembler,
    ) {
        // Qualifying alone is already suspicious.
        if let Some(profile) = accounts.get_mut(graph.id_of(seed)) {
            profile.add_score(self.config.dispersal_score_bonus);
        }

        let mut visited: HashSet<NodeIndex> = HashSet::from([seed]);
        let mut visit_order: Vec<NodeIndex> = vec![seed];
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::from([(seed, 0)]);

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= self.config.max_chain_depth {
                continue;
            }
            let edges = match flow {
                Flow::FanOut => graph.outgoing_sorted(node),
                Flow::FanIn => graph.incoming_sorted(node),
            };
            let in_burst = self.burst_flags(&edges);
            if !in_burst.iter().any(|&b| b) {
                // Isolated transfers only; this node is not dispersal
                // evidence and is not expanded.
                continue;
            }

            if let Some(profile) = accounts.get_mut(graph.id_of(node)) {
                profile.add_score(self.config.dispersal_score_bonus / (depth + 1) as f64);
                profile.add_tag(flow.tag());
                profile.record_burst();
            }

            for ((counterparty, _), linked) in edges.iter().zip(in_burst.iter()) {
                if *linked && visited.insert(*counterparty) {
                    visit_order.push(*counterparty);
                    queue.push_back((*counterparty, depth + 1));
                }
            }
        }

        if visit_order.len() > 1 {
            let seed_id = graph.id_of(seed);
            let ring_id = match flow {
                Flow::FanOut => {
                    let id = format!("FAN_OUT_{}_{}", seed_id, self.fan_out_counter);
                    self.fan_out_counter += 1;
                    id
                }
                Flow::FanIn => {
                    let id = format!("FAN_IN_{}_{}", seed_id, self.fan_in_counter);
                    self.fan_in_counter += 1;
                    id
                }
            };
            let members: Vec<String> = visit_order
                .iter()
                .map(|&n| graph.id_of(n).to_owned())
                .collect();
            assembler.materialize(
                RingDetail {
                    ring_id,
                    nodes_by_distance: vec![members.clone()],
                    members,
                },
                accounts,
            );
        }
    }

    /// Marks which timestamp-sorted edges belong to a burst: edge i and
    /// edge i+1 are burst-linked when their timestamps are within the burst
    /// window, and an edge is in-burst if linked to either neighbor.
    fn burst_flags(&self, edges: &[(NodeIndex, &TransferEdge)]) -> Vec<bool> {
        let mut flags = vec![false; edges.len()];
        for i in 1..edges.len() {
            let gap = edges[i].1.timestamp - edges[i - 1].1.timestamp;
            if gap <= self.config.burst_window {
                flags[i - 1] = true;
                flags[i] = true;
            }
        }
        flags
    }
}
