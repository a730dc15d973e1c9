//! Site: the data manager for one partition
//!
//! A site owns its variable copies and one lock manager per copy. It knows
//! nothing about other sites; the coordinator fans operations out.
//!
//! ## Failure model
//!
//! ```text
//! fail()        - forget every lock, queued request and staged write,
//!                 stay down
//! recover(t)    - come back up at t; replicated copies refuse reads
//!                 until they receive a fresh committed write
//! ```
//!
//! Staged writes are lost with the locks that guarded them. Their owners
//! accessed this site, so they are doomed and abort at `end`.

use crate::variable::Variable;
use repcc_concurrency::{LockManager, LockMode};
use repcc_core::{Error, Placement, Result, SiteId, Timestamp, TxnId, Value, VarId};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Data manager for one site
#[derive(Debug, Clone)]
pub struct Site {
    id: SiteId,
    up: bool,
    up_since: Timestamp,
    variables: BTreeMap<VarId, Variable>,
    locks: BTreeMap<VarId, LockManager>,
}

impl Site {
    /// Create site `id` with every variable `placement` assigns to it
    pub fn new(id: SiteId, placement: &Placement) -> Self {
        let mut variables = BTreeMap::new();
        let mut locks = BTreeMap::new();
        for var in placement.variables_at(id) {
            let copy = Variable::new(
                var,
                placement.initial_value(var),
                placement.is_replicated(var),
            );
            variables.insert(var, copy);
            locks.insert(var, LockManager::new(var));
        }
        Self {
            id,
            up: true,
            up_since: Timestamp::ZERO,
            variables,
            locks,
        }
    }

    /// Site identifier
    pub fn id(&self) -> SiteId {
        self.id
    }

    /// Whether the site is up
    pub fn is_up(&self) -> bool {
        self.up
    }

    /// Tick of the most recent recovery (zero if never failed)
    pub fn up_since(&self) -> Timestamp {
        self.up_since
    }

    /// Whether this site holds a copy of `var`
    pub fn has_variable(&self, var: VarId) -> bool {
        self.variables.contains_key(&var)
    }

    /// The local copy of `var`
    pub fn variable(&self, var: VarId) -> Option<&Variable> {
        self.variables.get(&var)
    }

    /// Every local copy, by variable index
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    /// The lock manager guarding the local copy of `var`
    pub fn lock_manager(&self, var: VarId) -> Option<&LockManager> {
        self.locks.get(&var)
    }

    /// Read `var` for `txn` under a shared lock
    ///
    /// Returns `None` if the copy is missing or unreadable, or if the lock
    /// is refused. A refused lock registers a shared request only on the
    /// first attempt, so retries never duplicate queue entries.
    pub fn read(&mut self, txn: &TxnId, var: VarId, first_attempt: bool) -> Option<Value> {
        if !self.up {
            return None;
        }
        let copy = self.variables.get(&var)?;
        if !copy.is_readable() {
            return None;
        }
        let lm = self.locks.get_mut(&var)?;
        if lm.acquire_shared(txn) {
            return Some(copy.value_for(txn));
        }
        if first_attempt {
            lm.enqueue(LockMode::Shared, txn);
        }
        None
    }

    /// Try to obtain (or promote to) the exclusive lock on `var` for `txn`
    ///
    /// A refusal registers an exclusive request only on the first attempt.
    pub fn get_write_lock(&mut self, txn: &TxnId, var: VarId, first_attempt: bool) -> bool {
        if !self.up {
            return false;
        }
        let Some(lm) = self.locks.get_mut(&var) else {
            return false;
        };
        if lm.acquire_exclusive(txn) {
            return true;
        }
        if first_attempt {
            lm.enqueue(LockMode::Exclusive, txn);
        }
        false
    }

    /// Stage `value` for `txn` on `var`
    ///
    /// Requires the exclusive lock obtained through `get_write_lock`. Never
    /// queues. Returns whether the value was staged.
    pub fn write(&mut self, txn: &TxnId, var: VarId, value: Value) -> bool {
        let holds_exclusive = self
            .locks
            .get(&var)
            .and_then(LockManager::active)
            .map(|lock| lock.mode() == LockMode::Exclusive && lock.is_sole_holder(txn))
            .unwrap_or(false);
        if !holds_exclusive {
            return false;
        }
        match self.variables.get_mut(&var) {
            Some(copy) => {
                copy.stage(txn, value);
                true
            }
            None => false,
        }
    }

    /// Committed values written since this site was last known good
    ///
    /// Includes every copy whose last commit is at or after `up_since`.
    pub fn snapshot(&self) -> BTreeMap<VarId, Value> {
        self.variables
            .values()
            .filter(|copy| copy.last_commit() >= self.up_since)
            .map(|copy| (copy.id(), copy.committed_value()))
            .collect()
    }

    /// Withdraw `txn`'s queued `mode` request on `var`
    pub fn withdraw_request(&mut self, txn: &TxnId, var: VarId, mode: LockMode) -> bool {
        self.locks
            .get_mut(&var)
            .map(|lm| lm.withdraw(txn, mode))
            .unwrap_or(false)
    }

    /// Whether `txn` still waits in any local queue
    pub fn has_pending_request(&self, txn: &TxnId) -> bool {
        self.locks.values().any(|lm| lm.has_pending_request(txn))
    }

    /// Commit `txn` at `at`
    ///
    /// Releases its locks, installs its staged writes, then lets waiting
    /// requests in. Returns the variables whose committed value changed.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` if `txn` still has a queued lock request: every
    /// operation must have completed before commit.
    pub fn commit(&mut self, txn: &TxnId, at: Timestamp) -> Result<Vec<VarId>> {
        if let Some(lm) = self.locks.values().find(|lm| lm.has_pending_request(txn)) {
            return Err(Error::InvariantViolation(format!(
                "{} commits at site {} with a queued request on {}",
                txn,
                self.id,
                lm.var()
            )));
        }

        for lm in self.locks.values_mut() {
            lm.release(txn);
        }

        let written: Vec<VarId> = self
            .variables
            .values_mut()
            .filter_map(|copy| copy.commit(txn, at).map(|_| copy.id()))
            .collect();
        if !written.is_empty() {
            debug!(target: "repcc::site", site = %self.id, txn = %txn, vars = written.len(), "Writes committed");
        }

        self.resolve_pending();
        Ok(written)
    }

    /// Abort `txn`: drop its locks, queued requests and staged writes
    pub fn abort(&mut self, txn: &TxnId) {
        for lm in self.locks.values_mut() {
            lm.release(txn);
            lm.remove_requests(txn);
        }
        for copy in self.variables.values_mut() {
            copy.discard(txn);
        }
        self.resolve_pending();
    }

    /// Hand every free lock to its waiting requests
    pub fn resolve_pending(&mut self) {
        for lm in self.locks.values_mut() {
            lm.resolve_pending();
        }
    }

    /// Take the site down, forgetting all lock state and staged writes
    pub fn fail(&mut self) {
        self.up = false;
        for lm in self.locks.values_mut() {
            lm.clear();
        }
        let dropped: usize = self.variables.values_mut().map(Variable::discard_all).sum();
        info!(target: "repcc::site", site = %self.id, dropped, "Site failed");
    }

    /// Bring the site back at `at`
    ///
    /// Replicated copies stay unreadable until a fresh commit; local-only
    /// copies are readable immediately.
    pub fn recover(&mut self, at: Timestamp) {
        self.up = true;
        self.up_since = at;
        for copy in self.variables.values_mut() {
            if copy.is_replicated() {
                copy.mark_unreadable();
            }
        }
        info!(target: "repcc::site", site = %self.id, at = %at, "Site recovered");
    }

    /// Wait-for edges from every local lock table entry
    pub fn wait_edges(&self) -> Vec<(TxnId, TxnId)> {
        self.locks.values().flat_map(LockManager::wait_edges).collect()
    }

    /// Committed value of every local copy, by variable index
    pub fn committed_values(&self) -> Vec<(VarId, Value)> {
        self.variables
            .values()
            .map(|copy| (copy.id(), copy.committed_value()))
            .collect()
    }
}
