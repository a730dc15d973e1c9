//! Lock manager for one copy of one variable
//!
//! Holds at most one active lock and a FIFO queue of pending requests.
//!
//! ## Protocol
//!
//! ```text
//! acquire_shared / acquire_exclusive  - try to grant now, never queue
//! enqueue                             - register a wait (caller decides when)
//! release                             - drop a holder, never grants
//! resolve_pending                     - hand the lock to queued requests
//! ```
//!
//! Queue service is FIFO. When the active lock is shared, queued shared
//! requests are folded into it until the first exclusive request from a
//! transaction other than the sole holder; later shared requests never
//! jump ahead of it.

use crate::lock::{Lock, LockMode, LockRequest};
use repcc_core::{TxnId, VarId};
use std::collections::VecDeque;
use tracing::debug;

/// Per-variable lock manager
#[derive(Debug, Clone)]
pub struct LockManager {
    var: VarId,
    active: Option<Lock>,
    queue: VecDeque<LockRequest>,
}

impl LockManager {
    /// Create an unlocked manager for `var`
    pub fn new(var: VarId) -> Self {
        Self {
            var,
            active: None,
            queue: VecDeque::new(),
        }
    }

    /// Variable this manager protects
    pub fn var(&self) -> VarId {
        self.var
    }

    /// Currently granted lock, if any
    pub fn active(&self) -> Option<&Lock> {
        self.active.as_ref()
    }

    /// Pending requests in arrival order
    pub fn queue(&self) -> impl Iterator<Item = &LockRequest> {
        self.queue.iter()
    }

    /// Number of pending requests
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Try to take a shared lock for `txn`
    ///
    /// Succeeds when the variable is unlocked, when `txn` already holds the
    /// lock in either mode, or when the lock is shared and no exclusive
    /// request is waiting.
    pub fn acquire_shared(&mut self, txn: &TxnId) -> bool {
        let writer_waiting = self.has_queued_exclusive(None);
        match self.active.as_mut() {
            None => {
                self.active = Some(Lock::new(self.var, LockMode::Shared, txn.clone()));
                debug!(target: "repcc::lock", var = %self.var, txn = %txn, "Shared lock granted");
                true
            }
            Some(lock) if lock.is_held_by(txn) => true,
            Some(lock) if lock.mode() == LockMode::Shared && !writer_waiting => {
                lock.add_holder(txn.clone());
                debug!(target: "repcc::lock", var = %self.var, txn = %txn, "Shared lock joined");
                true
            }
            Some(_) => false,
        }
    }

    /// Try to take (or promote to) an exclusive lock for `txn`
    ///
    /// Promotion requires `txn` to be the sole shared holder with no other
    /// transaction's exclusive request waiting.
    pub fn acquire_exclusive(&mut self, txn: &TxnId) -> bool {
        let other_writer_waiting = self.has_queued_exclusive(Some(txn));
        match self.active.as_mut() {
            None => {
                self.active = Some(Lock::new(self.var, LockMode::Exclusive, txn.clone()));
                debug!(target: "repcc::lock", var = %self.var, txn = %txn, "Exclusive lock granted");
                true
            }
            Some(lock) if lock.is_sole_holder(txn) => match lock.mode() {
                LockMode::Exclusive => true,
                LockMode::Shared if other_writer_waiting => false,
                LockMode::Shared => {
                    lock.promote();
                    debug!(target: "repcc::lock", var = %self.var, txn = %txn, "Shared lock promoted");
                    true
                }
            },
            Some(_) => false,
        }
    }

    /// Register a wait for `txn` in `mode`
    ///
    /// Returns false without queueing if the same request is already waiting.
    pub fn enqueue(&mut self, mode: LockMode, txn: &TxnId) -> bool {
        let request = LockRequest::new(mode, txn.clone());
        if self.queue.contains(&request) {
            return false;
        }
        debug!(target: "repcc::lock", var = %self.var, request = %request, "Lock request queued");
        self.queue.push_back(request);
        true
    }

    /// Drop `txn` from the active holders
    ///
    /// Clears the lock when no holder remains. Does not grant queued requests.
    /// Returns whether `txn` was a holder.
    pub fn release(&mut self, txn: &TxnId) -> bool {
        let Some(lock) = self.active.as_mut() else {
            return false;
        };
        let released = lock.remove_holder(txn);
        if lock.holders().is_empty() {
            self.active = None;
        }
        released
    }

    /// Remove every queued request from `txn`, returning how many were removed
    pub fn remove_requests(&mut self, txn: &TxnId) -> usize {
        let before = self.queue.len();
        self.queue.retain(|request| &request.requester != txn);
        before - self.queue.len()
    }

    /// Withdraw `txn`'s queued request in `mode`, if any
    ///
    /// Used once the operation that queued it has been satisfied elsewhere.
    pub fn withdraw(&mut self, txn: &TxnId, mode: LockMode) -> bool {
        let before = self.queue.len();
        self.queue
            .retain(|request| !(request.mode == mode && &request.requester == txn));
        before != self.queue.len()
    }

    /// Whether `txn` has a request waiting in the queue
    pub fn has_pending_request(&self, txn: &TxnId) -> bool {
        self.queue.iter().any(|request| &request.requester == txn)
    }

    /// Whether an exclusive request is waiting, optionally ignoring `excluding`'s own
    pub fn has_queued_exclusive(&self, excluding: Option<&TxnId>) -> bool {
        self.queue.iter().any(|request| {
            request.mode == LockMode::Exclusive && Some(&request.requester) != excluding
        })
    }

    /// Hand the lock to waiting requests
    ///
    /// If unlocked, the queue head becomes the active lock. While the lock is
    /// shared, following shared requests are merged in and an exclusive
    /// request from the sole holder is applied as a promotion; folding stops
    /// at the first exclusive request from anyone else. Returns the granted
    /// requests in grant order.
    pub fn resolve_pending(&mut self) -> Vec<LockRequest> {
        let mut granted = Vec::new();

        if self.active.is_none() {
            if let Some(head) = self.queue.pop_front() {
                self.active = Some(Lock::new(self.var, head.mode, head.requester.clone()));
                granted.push(head);
            }
        }

        while let Some(lock) = self.active.as_mut() {
            if lock.mode() != LockMode::Shared {
                break;
            }
            let Some(next) = self.queue.front() else {
                break;
            };
            match next.mode {
                LockMode::Shared => {
                    if let Some(request) = self.queue.pop_front() {
                        lock.add_holder(request.requester.clone());
                        granted.push(request);
                    }
                }
                LockMode::Exclusive if lock.is_sole_holder(&next.requester) => {
                    if let Some(request) = self.queue.pop_front() {
                        lock.promote();
                        granted.push(request);
                    }
                    break;
                }
                LockMode::Exclusive => break,
            }
        }

        for request in &granted {
            debug!(target: "repcc::lock", var = %self.var, request = %request, "Queued request granted");
        }
        granted
    }

    /// Drop the active lock and every queued request
    pub fn clear(&mut self) {
        self.active = None;
        self.queue.clear();
    }

    /// Wait-for edges implied by this lock table entry
    ///
    /// Each queued request blocked by the active lock waits for every holder
    /// other than itself. Among queued requests, a later request waits for
    /// every earlier one it conflicts with.
    pub fn wait_edges(&self) -> Vec<(TxnId, TxnId)> {
        let mut edges = Vec::new();
        let Some(lock) = self.active.as_ref() else {
            return edges;
        };

        for request in &self.queue {
            if lock.blocks(request) {
                edges.extend(
                    lock.holders()
                        .iter()
                        .filter(|holder| **holder != request.requester)
                        .map(|holder| (request.requester.clone(), holder.clone())),
                );
            }
        }

        for (i, later) in self.queue.iter().enumerate() {
            for earlier in self.queue.iter().take(i) {
                if earlier.conflicts_with(later) {
                    edges.push((later.requester.clone(), earlier.requester.clone()));
                }
            }
        }

        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(name: &str) -> TxnId {
        TxnId::new(name)
    }

    fn manager() -> LockManager {
        LockManager::new(VarId::new(4))
    }

    #[test]
    fn test_shared_grant_on_free_variable() {
        let mut lm = manager();
        assert!(lm.acquire_shared(&t("T1")));
        let lock = lm.active().unwrap();
        assert_eq!(lock.mode(), LockMode::Shared);
        assert!(lock.is_sole_holder(&t("T1")));
    }

    #[test]
    fn test_shared_acquire_is_idempotent() {
        let mut lm = manager();
        assert!(lm.acquire_shared(&t("T1")));
        assert!(lm.acquire_shared(&t("T1")));
        assert_eq!(lm.active().unwrap().holders().len(), 1);
    }

    #[test]
    fn test_shared_holders_merge() {
        let mut lm = manager();
        assert!(lm.acquire_shared(&t("T1")));
        assert!(lm.acquire_shared(&t("T2")));
        assert_eq!(lm.active().unwrap().holders().len(), 2);
    }

    #[test]
    fn test_shared_refused_behind_queued_writer() {
        let mut lm = manager();
        assert!(lm.acquire_shared(&t("T1")));
        assert!(lm.enqueue(LockMode::Exclusive, &t("T2")));
        assert!(!lm.acquire_shared(&t("T3")));
    }

    #[test]
    fn test_exclusive_holder_may_read() {
        let mut lm = manager();
        assert!(lm.acquire_exclusive(&t("T1")));
        assert!(lm.acquire_shared(&t("T1")));
        assert!(!lm.acquire_shared(&t("T2")));
        assert_eq!(lm.active().unwrap().mode(), LockMode::Exclusive);
    }

    #[test]
    fn test_promotion_of_sole_shared_holder() {
        let mut lm = manager();
        assert!(lm.acquire_shared(&t("T1")));
        assert!(lm.acquire_exclusive(&t("T1")));
        assert_eq!(lm.active().unwrap().mode(), LockMode::Exclusive);
    }

    #[test]
    fn test_promotion_refused_with_other_holders() {
        let mut lm = manager();
        assert!(lm.acquire_shared(&t("T1")));
        assert!(lm.acquire_shared(&t("T2")));
        assert!(!lm.acquire_exclusive(&t("T1")));
        assert_eq!(lm.active().unwrap().mode(), LockMode::Shared);
    }

    #[test]
    fn test_promotion_refused_behind_foreign_writer() {
        let mut lm = manager();
        assert!(lm.acquire_shared(&t("T1")));
        assert!(lm.enqueue(LockMode::Exclusive, &t("T2")));
        assert!(!lm.acquire_exclusive(&t("T1")));
    }

    #[test]
    fn test_promotion_ignores_own_queued_writer() {
        let mut lm = manager();
        assert!(lm.acquire_shared(&t("T1")));
        assert!(lm.enqueue(LockMode::Exclusive, &t("T1")));
        assert!(lm.acquire_exclusive(&t("T1")));
    }

    #[test]
    fn test_exclusive_reacquire_by_holder() {
        let mut lm = manager();
        assert!(lm.acquire_exclusive(&t("T1")));
        assert!(lm.acquire_exclusive(&t("T1")));
        assert!(!lm.acquire_exclusive(&t("T2")));
    }

    #[test]
    fn test_enqueue_rejects_duplicates() {
        let mut lm = manager();
        assert!(lm.enqueue(LockMode::Shared, &t("T1")));
        assert!(!lm.enqueue(LockMode::Shared, &t("T1")));
        assert!(lm.enqueue(LockMode::Exclusive, &t("T1")));
        assert_eq!(lm.queue_len(), 2);
    }

    #[test]
    fn test_release_clears_lock_when_last_holder_leaves() {
        let mut lm = manager();
        lm.acquire_shared(&t("T1"));
        lm.acquire_shared(&t("T2"));
        assert!(lm.release(&t("T1")));
        assert!(lm.active().is_some());
        assert!(lm.release(&t("T2")));
        assert!(lm.active().is_none());
        assert!(!lm.release(&t("T2")));
    }

    #[test]
    fn test_release_does_not_grant() {
        let mut lm = manager();
        lm.acquire_exclusive(&t("T1"));
        lm.enqueue(LockMode::Shared, &t("T2"));
        lm.release(&t("T1"));
        assert!(lm.active().is_none());
        assert_eq!(lm.queue_len(), 1);
    }

    #[test]
    fn test_resolve_grants_head_then_folds_readers() {
        let mut lm = manager();
        lm.acquire_exclusive(&t("T1"));
        lm.enqueue(LockMode::Shared, &t("T2"));
        lm.enqueue(LockMode::Shared, &t("T3"));
        lm.enqueue(LockMode::Exclusive, &t("T4"));
        lm.enqueue(LockMode::Shared, &t("T5"));
        lm.release(&t("T1"));

        let granted = lm.resolve_pending();
        assert_eq!(granted.len(), 2);
        let lock = lm.active().unwrap();
        assert_eq!(lock.mode(), LockMode::Shared);
        assert!(lock.is_held_by(&t("T2")));
        assert!(lock.is_held_by(&t("T3")));
        assert!(!lock.is_held_by(&t("T5")));
        assert_eq!(lm.queue_len(), 2);
    }

    #[test]
    fn test_resolve_folds_promotion_of_sole_holder() {
        let mut lm = manager();
        lm.acquire_exclusive(&t("T9"));
        lm.enqueue(LockMode::Shared, &t("T1"));
        lm.enqueue(LockMode::Exclusive, &t("T1"));
        lm.enqueue(LockMode::Shared, &t("T2"));
        lm.release(&t("T9"));

        lm.resolve_pending();
        let lock = lm.active().unwrap();
        assert_eq!(lock.mode(), LockMode::Exclusive);
        assert!(lock.is_sole_holder(&t("T1")));
        assert_eq!(lm.queue_len(), 1);
    }

    #[test]
    fn test_resolve_is_noop_while_exclusive_held() {
        let mut lm = manager();
        lm.acquire_exclusive(&t("T1"));
        lm.enqueue(LockMode::Shared, &t("T2"));
        assert!(lm.resolve_pending().is_empty());
        assert_eq!(lm.queue_len(), 1);
    }

    #[test]
    fn test_remove_requests() {
        let mut lm = manager();
        lm.acquire_exclusive(&t("T1"));
        lm.enqueue(LockMode::Shared, &t("T2"));
        lm.enqueue(LockMode::Exclusive, &t("T2"));
        lm.enqueue(LockMode::Shared, &t("T3"));
        assert!(lm.has_pending_request(&t("T2")));
        assert_eq!(lm.remove_requests(&t("T2")), 2);
        assert!(!lm.has_pending_request(&t("T2")));
        assert_eq!(lm.queue_len(), 1);
    }

    #[test]
    fn test_withdraw_only_matching_mode() {
        let mut lm = manager();
        lm.acquire_exclusive(&t("T1"));
        lm.enqueue(LockMode::Shared, &t("T2"));
        lm.enqueue(LockMode::Exclusive, &t("T2"));
        assert!(lm.withdraw(&t("T2"), LockMode::Shared));
        assert!(!lm.withdraw(&t("T2"), LockMode::Shared));
        let left: Vec<_> = lm.queue().cloned().collect();
        assert_eq!(left, vec![LockRequest::new(LockMode::Exclusive, t("T2"))]);
    }

    #[test]
    fn test_clear_forgets_everything() {
        let mut lm = manager();
        lm.acquire_exclusive(&t("T1"));
        lm.enqueue(LockMode::Shared, &t("T2"));
        lm.clear();
        assert!(lm.active().is_none());
        assert_eq!(lm.queue_len(), 0);
    }

    #[test]
    fn test_wait_edges_to_holders() {
        let mut lm = manager();
        lm.acquire_shared(&t("T1"));
        lm.acquire_shared(&t("T2"));
        lm.enqueue(LockMode::Exclusive, &t("T1"));
        let edges = lm.wait_edges();
        assert_eq!(edges, vec![(t("T1"), t("T2"))]);
    }

    #[test]
    fn test_wait_edges_between_queued_requests() {
        let mut lm = manager();
        lm.acquire_exclusive(&t("T1"));
        lm.enqueue(LockMode::Exclusive, &t("T2"));
        lm.enqueue(LockMode::Shared, &t("T3"));
        let edges = lm.wait_edges();
        assert!(edges.contains(&(t("T2"), t("T1"))));
        assert!(edges.contains(&(t("T3"), t("T1"))));
        assert!(edges.contains(&(t("T3"), t("T2"))));
        assert_eq!(edges.len(), 3);
    }

    #[test]
    fn test_no_edges_without_queue() {
        let mut lm = manager();
        lm.acquire_exclusive(&t("T1"));
        assert!(lm.wait_edges().is_empty());
    }
}
