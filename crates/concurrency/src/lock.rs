//! Lock values and requests
//!
//! Compatibility rule: Shared + Shared is compatible (holders merge). Any
//! pair involving Exclusive is compatible only when the requester is
//! already the sole holder, which is the promotion case.

use repcc_core::{TxnId, VarId};
use std::collections::BTreeSet;
use std::fmt;

/// Lock modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock for reading
    Shared,
    /// Exclusive lock for writing
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => f.write_str("S"),
            LockMode::Exclusive => f.write_str("X"),
        }
    }
}

/// A granted lock on one copy of a variable
///
/// Invariant: an exclusive lock has exactly one holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    var: VarId,
    mode: LockMode,
    holders: BTreeSet<TxnId>,
}

impl Lock {
    /// Grant a lock in `mode` to a single transaction
    pub fn new(var: VarId, mode: LockMode, holder: TxnId) -> Self {
        let mut holders = BTreeSet::new();
        holders.insert(holder);
        Self { var, mode, holders }
    }

    /// Variable the lock protects
    pub fn var(&self) -> VarId {
        self.var
    }

    /// Current mode
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Transactions holding the lock
    pub fn holders(&self) -> &BTreeSet<TxnId> {
        &self.holders
    }

    /// Whether `txn` holds the lock
    pub fn is_held_by(&self, txn: &TxnId) -> bool {
        self.holders.contains(txn)
    }

    /// Whether `txn` is the only holder
    pub fn is_sole_holder(&self, txn: &TxnId) -> bool {
        self.holders.len() == 1 && self.holders.contains(txn)
    }

    /// Whether this lock keeps `request` waiting
    pub fn blocks(&self, request: &LockRequest) -> bool {
        match self.mode {
            LockMode::Shared => {
                request.mode == LockMode::Exclusive && !self.is_sole_holder(&request.requester)
            }
            LockMode::Exclusive => !self.is_held_by(&request.requester),
        }
    }

    pub(crate) fn add_holder(&mut self, txn: TxnId) {
        debug_assert_eq!(self.mode, LockMode::Shared);
        self.holders.insert(txn);
    }

    pub(crate) fn remove_holder(&mut self, txn: &TxnId) -> bool {
        self.holders.remove(txn)
    }

    pub(crate) fn promote(&mut self) {
        debug_assert_eq!(self.holders.len(), 1);
        self.mode = LockMode::Exclusive;
    }
}

/// A queued request for a lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    /// Requested mode
    pub mode: LockMode,
    /// Requesting transaction
    pub requester: TxnId,
}

impl LockRequest {
    /// Create a request
    pub fn new(mode: LockMode, requester: TxnId) -> Self {
        Self { mode, requester }
    }

    /// Whether two queued requests must be served one after the other
    pub fn conflicts_with(&self, other: &LockRequest) -> bool {
        let both_shared = self.mode == LockMode::Shared && other.mode == LockMode::Shared;
        !both_shared && self.requester != other.requester
    }
}

impl fmt::Display for LockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.mode, self.requester)
    }
}
