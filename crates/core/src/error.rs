//! Error types for repcc
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Lock conflicts are not errors. A refused lock is a deferral signal and is
//! reported as `false` by the lock layer; the coordinator retries later.

use crate::types::{SiteId, TxnId, VarId};
use std::io;
use thiserror::Error;

/// Result type alias for repcc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the simulator
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (reading a command file or config file)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// `begin`/`beginRO` for an identifier that is already live
    #[error("transaction {0} already exists")]
    DuplicateTransaction(TxnId),

    /// Operation names a transaction that is not live
    #[error("transaction {0} not found")]
    UnknownTransaction(TxnId),

    /// Operation names a site outside the cluster
    #[error("site {0} does not exist")]
    UnknownSite(SiteId),

    /// Operation names a variable outside the database
    #[error("variable {0} does not exist")]
    UnknownVariable(VarId),

    /// A read-only transaction attempted a write
    #[error("transaction {0} is read-only and cannot write")]
    ReadOnlyWrite(TxnId),

    /// `end` issued while a transaction that can commit still waits for a lock
    #[error("transaction {txn} cannot end with {pending} operation(s) still waiting")]
    OperationsPending {
        /// Transaction being ended
        txn: TxnId,
        /// Number of queued reads/writes
        pending: usize,
    },

    /// `fail` issued for a site that is already down
    #[error("site {0} is already down")]
    SiteAlreadyDown(SiteId),

    /// `recover` issued for a site that is already up
    #[error("site {0} is already up")]
    SiteAlreadyUp(SiteId),

    /// Malformed command line
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Internal invariant breached
    ///
    /// Not reachable through well-formed coordinator use.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl Error {
    /// Whether this error reports a rejected command rather than a broken invariant
    pub fn is_protocol_violation(&self) -> bool {
        !matches!(self, Error::InvariantViolation(_) | Error::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_duplicate_transaction() {
        let err = Error::DuplicateTransaction(TxnId::new("T1"));
        assert_eq!(err.to_string(), "transaction T1 already exists");
    }

    #[test]
    fn test_error_display_unknown_ids() {
        assert!(Error::UnknownSite(SiteId::new(11))
            .to_string()
            .contains("site 11"));
        assert!(Error::UnknownVariable(VarId::new(21))
            .to_string()
            .contains("x21"));
        assert!(Error::UnknownTransaction(TxnId::new("T9"))
            .to_string()
            .contains("T9"));
    }

    #[test]
    fn test_error_display_operations_pending() {
        let err = Error::OperationsPending {
            txn: TxnId::new("T2"),
            pending: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("T2"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_protocol_violation());
    }

    #[test]
    fn test_protocol_violation_classification() {
        assert!(Error::Parse("bad".into()).is_protocol_violation());
        assert!(Error::SiteAlreadyDown(SiteId::new(1)).is_protocol_violation());
        assert!(!Error::InvariantViolation("queued".into()).is_protocol_violation());
    }
}
