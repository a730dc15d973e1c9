//! Deadlock detection using wait-for graph analysis.
//!
//! The graph is rebuilt from lock tables on every detection pass and keyed
//! by transaction identifier, so transactions never reference each other:
//! ```text
//! T1 waits for T2:  T1 -> T2
//! T2 waits for T1:  T2 -> T1 (cycle = deadlock!)
//! ```
//!
//! # Victim Selection
//!
//! Among every transaction that lies on a cycle, the one with the latest
//! start time is sacrificed. Ties keep the first candidate in identifier
//! order. One victim is chosen per pass.

use repcc_core::{Timestamp, TxnId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Result of deadlock detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlockInfo {
    /// Every transaction found on some cycle, in identifier order.
    pub members: Vec<TxnId>,
    /// The selected victim to abort.
    pub victim: TxnId,
}

/// Directed waiter → holder graph.
#[derive(Debug, Clone, Default)]
pub struct WaitForGraph {
    edges: BTreeMap<TxnId, BTreeSet<TxnId>>,
}

impl WaitForGraph {
    /// Creates a new empty wait-for graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a wait-for edge: waiter is waiting for holder.
    ///
    /// Self-edges are ignored.
    pub fn add_wait(&mut self, waiter: TxnId, holder: TxnId) {
        if waiter == holder {
            return;
        }
        self.edges.entry(waiter).or_default().insert(holder);
    }

    /// Adds every edge from `edges`.
    pub fn extend<I>(&mut self, edges: I)
    where
        I: IntoIterator<Item = (TxnId, TxnId)>,
    {
        for (waiter, holder) in edges {
            self.add_wait(waiter, holder);
        }
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Whether the graph has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Whether a path leads from `root` back to itself.
    pub fn has_cycle_through(&self, root: &TxnId) -> bool {
        let mut visited = BTreeSet::new();
        self.reaches(root, root, &mut visited)
    }

    fn reaches(&self, current: &TxnId, root: &TxnId, visited: &mut BTreeSet<TxnId>) -> bool {
        visited.insert(current.clone());
        let Some(next) = self.edges.get(current) else {
            return false;
        };
        for node in next {
            if node == root {
                return true;
            }
            if !visited.contains(node) && self.reaches(node, root, visited) {
                return true;
            }
        }
        false
    }

    /// Every waiter that lies on a cycle, in identifier order.
    pub fn cycle_members(&self) -> Vec<TxnId> {
        self.edges
            .keys()
            .filter(|node| self.has_cycle_through(node))
            .cloned()
            .collect()
    }

    /// Find a deadlock and pick its youngest member as victim.
    ///
    /// `start_time` maps a transaction to its start tick; members it does
    /// not know are never chosen.
    pub fn find_victim<F>(&self, start_time: F) -> Option<DeadlockInfo>
    where
        F: Fn(&TxnId) -> Option<Timestamp>,
    {
        let members = self.cycle_members();
        let mut victim: Option<(&TxnId, Timestamp)> = None;
        for member in &members {
            let Some(started) = start_time(member) else {
                continue;
            };
            match victim {
                Some((_, youngest)) if started <= youngest => {}
                _ => victim = Some((member, started)),
            }
        }

        let victim = victim.map(|(txn, _)| txn.clone())?;
        debug!(
            target: "repcc::deadlock",
            members = members.len(),
            victim = %victim,
            "Deadlock cycle found"
        );
        Some(DeadlockInfo { members, victim })
    }
}
