use std::collections::HashMap;

use chrono::NaiveDateTime;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction::{Incoming, Outgoing};

use crate::account::Accounts;
use crate::ingest::Transaction;

/// A directed transfer edge. Parallel edges between the same pair are legal
/// and meaningful (repeated transfers).
#[derive(Debug, Clone)]
pub struct TransferEdge {
    pub amount: f64,
    pub timestamp: NaiveDateTime,
    pub tx_id: String,
}

/// The transaction multigraph plus the canonical account order.
///
/// Built once from the time-sorted transaction set; read-only for the rest
/// of the run. Every transaction contributes exactly one edge, visible from
/// both endpoints via the outgoing/incoming indices.
pub struct TransactionGraph {
    graph: DiGraph<String, TransferEdge>,
    node_map: HashMap<String, NodeIndex>,
    order: Vec<NodeIndex>,
    rank: Vec<u32>,
}

impl TransactionGraph {
    /// Single linear pass: updates both endpoint profiles and appends one
    /// edge per transaction. Self-transfers are a no-op. Assumes input
    /// already validated and sorted by timestamp (see `ingest`).
    pub fn build(transactions: &[Transaction], accounts: &mut Accounts) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map: HashMap<String, NodeIndex> = HashMap::new();

        for tx in transactions {
            if tx.sender_id == tx.receiver_id {
                continue;
            }
            accounts
                .get_or_create(&tx.sender_id)
                .record_outbound(tx.amount, &tx.receiver_id, tx.timestamp);
            accounts
                .get_or_create(&tx.receiver_id)
                .record_inbound(tx.amount, &tx.sender_id, tx.timestamp);

            let from = Self::get_or_add_node(&mut graph, &mut node_map, &tx.sender_id);
            let to = Self::get_or_add_node(&mut graph, &mut node_map, &tx.receiver_id);
            graph.add_edge(
                from,
                to,
                TransferEdge {
                    amount: tx.amount,
                    timestamp: tx.timestamp,
                    tx_id: tx.tx_id.clone(),
                },
            );
        }

        // Injective total order over accounts: nodes sorted by id once,
        // rank = position. Detectors use ranks instead of comparing id
        // strings directly.
        let mut order: Vec<NodeIndex> = graph.node_indices().collect();
        order.sort_by(|a, b| graph[*a].cmp(&graph[*b]));
        let mut rank = vec![0u32; graph.node_count()];
        for (pos, idx) in order.iter().enumerate() {
            rank[idx.index()] = pos as u32;
        }

        Self {
            graph,
            node_map,
            order,
            rank,
        }
    }

    fn get_or_add_node(
        graph: &mut DiGraph<String, TransferEdge>,
        node_map: &mut HashMap<String, NodeIndex>,
        id: &str,
    ) -> NodeIndex {
        *node_map
            .entry(id.to_owned())
            .or_insert_with(|| graph.add_node(id.to_owned()))
    }

    pub fn node_of(&self, id: &str) -> Option<NodeIndex> {
        self.node_map.get(id).copied()
    }

    pub fn id_of(&self, node: NodeIndex) -> &str {
        &self.graph[node]
    }

    pub fn rank_of(&self, node: NodeIndex) -> u32 {
        self.rank[node.index()]
    }

    /// All nodes in canonical (id-sorted) order.
    pub fn nodes_in_order(&self) -> &[NodeIndex] {
        &self.order
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Outgoing edges sorted by (timestamp, neighbor rank, tx id) for
    /// deterministic traversal.
    pub fn outgoing_sorted(&self, node: NodeIndex) -> Vec<(NodeIndex, &TransferEdge)> {
        let mut edges: Vec<(NodeIndex, &TransferEdge)> = self
            .graph
            .edges_directed(node, Outgoing)
            .map(|e| (e.target(), e.weight()))
            .collect();
        self.sort_edges(&mut edges);
        edges
    }

    /// Incoming edges, keyed by the sending counterparty; same ordering.
    pub fn incoming_sorted(&self, node: NodeIndex) -> Vec<(NodeIndex, &TransferEdge)> {
        let mut edges: Vec<(NodeIndex, &TransferEdge)> = self
            .graph
            .edges_directed(node, Incoming)
            .map(|e| (e.source(), e.weight()))
            .collect();
        self.sort_edges(&mut edges);
        edges
    }

    fn sort_edges(&self, edges: &mut [(NodeIndex, &TransferEdge)]) {
        edges.sort_by(|a, b| {
            a.1.timestamp
                .cmp(&b.1.timestamp)
                .then_with(|| self.rank_of(a.0).cmp(&self.rank_of(b.0)))
                .then_with(|| a.1.tx_id.cmp(&b.1.tx_id))
        });
    }

    /// Total number of edges touching the node, both directions.
    pub fn degree(&self, node: NodeIndex) -> usize {
        self.graph.edges_directed(node, Outgoing).count()
            + self.graph.edges_directed(node, Incoming).count()
    }

    /// Amounts of every edge touching the node, both directions.
    pub fn touching_amounts(&self, node: NodeIndex) -> Vec<f64> {
        self.graph
            .edges_directed(node, Outgoing)
            .chain(self.graph.edges_directed(node, Incoming))
            .map(|e| e.weight().amount)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::transactions;

    #[test]
    fn build_populates_profiles_and_edges() {
        let txs = transactions(&[
            ("T1", "A", "B", 100.0, "2024-01-01 10:00:00"),
            ("T2", "A", "C", 50.0, "2024-01-01 11:00:00"),
            ("T3", "B", "C", 25.0, "2024-01-01 12:00:00"),
        ]);
        let mut accounts = Accounts::default();
        let graph = TransactionGraph::build(&txs, &mut accounts);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(accounts.len(), 3);

        let a = accounts.get("A").unwrap();
        assert_eq!(a.total_sent, 150.0);
        assert_eq!(a.unique_receivers.len(), 2);
        let c = accounts.get("C").unwrap();
        assert_eq!(c.total_received, 75.0);
        assert_eq!(c.unique_senders.len(), 2);
    }

    #[test]
    fn forward_and_reverse_indices_are_consistent() {
        let txs = transactions(&[
            ("T1", "A", "B", 100.0, "2024-01-01 10:00:00"),
            ("T2", "A", "B", 40.0, "2024-01-01 11:00:00"),
        ]);
        let mut accounts = Accounts::default();
        let graph = TransactionGraph::build(&txs, &mut accounts);

        let a = graph.node_of("A").unwrap();
        let b = graph.node_of("B").unwrap();
        let outgoing = graph.outgoing_sorted(a);
        let incoming = graph.incoming_sorted(b);
        assert_eq!(outgoing.len(), 2);
        assert_eq!(incoming.len(), 2);
        // Parallel edges preserved, sorted by timestamp.
        assert_eq!(outgoing[0].1.tx_id, "T1");
        assert_eq!(outgoing[1].1.tx_id, "T2");
        assert_eq!(incoming[0].0, a);
    }

    #[test]
    fn canonical_order_follows_account_ids() {
        let txs = transactions(&[
            ("T1", "C", "A", 10.0, "2024-01-01 10:00:00"),
            ("T2", "B", "C", 10.0, "2024-01-01 11:00:00"),
        ]);
        let mut accounts = Accounts::default();
        let graph = TransactionGraph::build(&txs, &mut accounts);

        let ids: Vec<&str> = graph
            .nodes_in_order()
            .iter()
            .map(|&n| graph.id_of(n))
            .collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        for window in graph.nodes_in_order().windows(2) {
            assert!(graph.rank_of(window[0]) < graph.rank_of(window[1]));
        }
    }

    #[test]
    fn self_transfers_are_dropped() {
        let txs = transactions(&[("T1", "A", "A", 10.0, "2024-01-01 10:00:00")]);
        let mut accounts = Accounts::default();
        let graph = TransactionGraph::build(&txs, &mut accounts);
        assert_eq!(graph.edge_count(), 0);
        assert!(accounts.is_empty());
    }

    #[test]
    fn empty_input_builds_empty_graph() {
        let mut accounts = Accounts::default();
        let graph = TransactionGraph::build(&[], &mut accounts);
        assert_eq!(graph.node_count(), 0);
        assert!(graph.nodes_in_order().is_empty());
    }

    #[test]
    fn edge_sort_is_stable_across_ties() {
        let txs = transactions(&[
            ("T9", "A", "C", 10.0, "2024-01-01 10:00:00"),
            ("T1", "A", "B", 10.0, "2024-01-01 10:00:00"),
        ]);
        let mut accounts = Accounts::default();
        let graph = TransactionGraph::build(&txs, &mut accounts);
        let a = graph.node_of("A").unwrap();
        let out = graph.outgoing_sorted(a);
        // Equal timestamps break ties by neighbor rank: B before C.
        assert_eq!(graph.id_of(out[0].0), "B");
        assert_eq!(graph.id_of(out[1].0), "C");
    }
}
