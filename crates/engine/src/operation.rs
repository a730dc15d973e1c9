//! Deferred reads and writes

use repcc_core::{TxnId, Value, VarId};
use std::fmt;

/// What a pending operation does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Read the variable
    Read,
    /// Write `value` to the variable
    Write(Value),
}

/// A read or write waiting in the coordinator's queue
///
/// `first_attempt` is cleared after the first try, whatever its outcome,
/// so retries never register a second wait at a lock manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    /// Read or write
    pub kind: OperationKind,
    /// Owning transaction
    pub txn: TxnId,
    /// Target variable
    pub var: VarId,
    /// Whether the operation has never been attempted
    pub first_attempt: bool,
}

impl PendingOperation {
    /// A fresh read
    pub fn read(txn: TxnId, var: VarId) -> Self {
        Self {
            kind: OperationKind::Read,
            txn,
            var,
            first_attempt: true,
        }
    }

    /// A fresh write
    pub fn write(txn: TxnId, var: VarId, value: Value) -> Self {
        Self {
            kind: OperationKind::Write(value),
            txn,
            var,
            first_attempt: true,
        }
    }
}

impl fmt::Display for PendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OperationKind::Read => write!(f, "R({},{})", self.txn, self.var),
            OperationKind::Write(value) => write!(f, "W({},{},{})", self.txn, self.var, value),
        }
    }
}
