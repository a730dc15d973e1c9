//! One copy of a variable at one site

use repcc_core::{Timestamp, TxnId, Value, VarId};
use std::collections::BTreeMap;

/// A variable copy: committed value plus per-transaction staged writes
///
/// Staged writes exist only for transactions holding the exclusive lock on
/// this copy. They become the committed value at commit and are dropped on
/// abort or when the site fails.
#[derive(Debug, Clone)]
pub struct Variable {
    id: VarId,
    committed: Value,
    pending: BTreeMap<TxnId, Value>,
    last_commit: Timestamp,
    readable: bool,
    replicated: bool,
}

impl Variable {
    /// Create a readable copy holding `value`, committed at tick zero
    pub fn new(id: VarId, value: Value, replicated: bool) -> Self {
        Self {
            id,
            committed: value,
            pending: BTreeMap::new(),
            last_commit: Timestamp::ZERO,
            readable: true,
            replicated,
        }
    }

    /// Variable identifier
    pub fn id(&self) -> VarId {
        self.id
    }

    /// Last committed value
    pub fn committed_value(&self) -> Value {
        self.committed
    }

    /// Tick of the last commit that wrote this copy
    pub fn last_commit(&self) -> Timestamp {
        self.last_commit
    }

    /// Whether reads may be served from this copy
    pub fn is_readable(&self) -> bool {
        self.readable
    }

    /// Whether every site holds a copy
    pub fn is_replicated(&self) -> bool {
        self.replicated
    }

    /// Value staged by `txn`, if any
    pub fn pending_write(&self, txn: &TxnId) -> Option<Value> {
        self.pending.get(txn).copied()
    }

    /// Whether any transaction has a staged write
    pub fn has_pending_writes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// What `txn` sees: its own staged write, else the committed value
    pub fn value_for(&self, txn: &TxnId) -> Value {
        self.pending_write(txn).unwrap_or(self.committed)
    }

    /// Stage `value` for `txn`, replacing an earlier staged value
    pub fn stage(&mut self, txn: &TxnId, value: Value) {
        self.pending.insert(txn.clone(), value);
    }

    /// Install `txn`'s staged value as committed at `at`
    ///
    /// Returns the installed value, or `None` if `txn` staged nothing here.
    pub fn commit(&mut self, txn: &TxnId, at: Timestamp) -> Option<Value> {
        let value = self.pending.remove(txn)?;
        self.committed = value;
        self.readable = true;
        self.last_commit = at;
        Some(value)
    }

    /// Drop `txn`'s staged value
    pub fn discard(&mut self, txn: &TxnId) -> bool {
        self.pending.remove(txn).is_some()
    }

    /// Drop every staged value, returning how many were held
    pub fn discard_all(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// Refuse reads until the next committed write
    pub fn mark_unreadable(&mut self) {
        self.readable = false;
    }
}
