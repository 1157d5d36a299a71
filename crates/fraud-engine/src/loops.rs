use std::collections::HashSet;

use chrono::NaiveDateTime;
use petgraph::graph::NodeIndex;
use tracing::{info, warn};

use crate::account::{Accounts, PatternTag};
use crate::graph::TransactionGraph;
use crate::network::{NetworkAssembler, RingDetail};
use crate::EngineConfig;

/// Enumerates elementary circuits of length >= 3 that are canonically
/// minimal and temporally coherent.
///
/// Canonical minimality: a cycle is only ever reported rooted at its
/// rank-smallest member, because the search never follows a neighbor ranked
/// below the start node. Temporal coherence: the first edge out of the
/// start fixes a baseline timestamp; every later path edge must be at or
/// after the baseline and the closing edge strictly after it, so the
/// transfers could causally have formed a loop.
pub struct LoopDetector<'a> {
    config: &'a EngineConfig,
    counter: usize,
}

struct Frame {
    /// Pre-filtered candidate edges: (neighbor, edge timestamp).
    candidates: Vec<(NodeIndex, NaiveDateTime)>,
    cursor: usize,
}

impl<'a> LoopDetector<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config, counter: 0 }
    }

    pub fn detect(
        &mut self,
        graph: &TransactionGraph,
        accounts: &mut Accounts,
        assembler: &mut NetworkAssembler,
    ) {
        for &start in graph.nodes_in_order() {
            let id = graph.id_of(start);
            if accounts.get(id).is_some_and(|a| a.is_preclassified()) {
                continue;
            }
            self.search_from(start, graph, accounts, assembler);
        }
        info!(loops = self.counter, "loop detection complete");
    }

    /// Depth-first search with an explicit frame stack; path membership is
    /// tracked in a set scoped to this search.
    fn search_from(
        &mut self,
        start: NodeIndex,
        graph: &TransactionGraph,
        accounts: &mut Accounts,
        assembler: &mut NetworkAssembler,
    ) {
        let start_rank = graph.rank_of(start);
        let candidates = |node: NodeIndex| -> Vec<(NodeIndex, NaiveDateTime)> {
            graph
                .outgoing_sorted(node)
                .into_iter()
                .filter(|(nbr, _)| graph.rank_of(*nbr) >= start_rank)
                .map(|(nbr, edge)| (nbr, edge.timestamp))
                .collect()
        };

        let mut path: Vec<NodeIndex> = vec![start];
        let mut on_path: HashSet<NodeIndex> = HashSet::from([start]);
        // Timestamp of the edge leading into path[i + 1]; the first entry
        // is the baseline for the whole path.
        let mut edge_times: Vec<NaiveDateTime> = Vec::new();
        let mut frames = vec![Frame {
            candidates: candidates(start),
            cursor: 0,
        }];
        let mut steps: usize = 0;

        while let Some(frame) = frames.last_mut() {
            if frame.cursor >= frame.candidates.len() {
                frames.pop();
                let node = path.pop();
                if let Some(node) = node {
                    on_path.remove(&node);
                }
                edge_times.pop();
                continue;
            }
            let (neighbor, edge_time) = frame.candidates[frame.cursor];
            frame.cursor += 1;

            steps += 1;
            if steps > self.config.loop_step_budget {
                warn!(
                    start = graph.id_of(start),
                    steps, "loop search truncated: traversal budget exhausted"
                );
                return;
            }

            let baseline = edge_times.first().copied();

            if neighbor == start {
                // Closing edge: needs >= 3 members and a strictly later
                // timestamp than the baseline edge.
                if path.len() >= self.config.min_loop_members
                    && baseline.is_some_and(|b| edge_time > b)
                {
                    self.record_loop(&path, graph, accounts, assembler);
                }
                continue;
            }
            if on_path.contains(&neighbor) {
                continue;
            }
            if baseline.is_some_and(|b| edge_time < b) {
                continue;
            }

            path.push(neighbor);
            on_path.insert(neighbor);
            edge_times.push(edge_time);
            frames.push(Frame {
                candidates: candidates(neighbor),
                cursor: 0,
            });
        }
    }

    fn record_loop(
        &mut self,
        path: &[NodeIndex],
        graph: &TransactionGraph,
        accounts: &mut Accounts,
        assembler: &mut NetworkAssembler,
    ) {
        let members: Vec<String> = path.iter().map(|&n| graph.id_of(n).to_owned()).collect();
        let nodes_by_distance: Vec<Vec<String>> =
            members.iter().map(|m| vec![m.clone()]).collect();
        let ring_id = format!("LOOP_{}", self.counter);
        self.counter += 1;

        for member in &members {
            if let Some(profile) = accounts.get_mut(member) {
                profile.add_score(self.config.loop_score_bonus);
                profile.add_tag(PatternTag::Loop);
            }
        }
        assembler.materialize(
            RingDetail {
                ring_id,
                members,
                nodes_by_distance,
            },
            accounts,
        );
    }

    pub fn loops_found(&self) -> usize {
        self.counter
    }
}
