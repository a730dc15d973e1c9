//! Outcomes of processing a command
//!
//! The coordinator never prints. Every observable effect of a command is
//! returned as an `Event`; the front end decides how to render it.

use repcc_core::{SiteId, Timestamp, TxnId, Value, VarId};
use serde::Serialize;

/// Why a transaction was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// A site it accessed failed before `end`
    SiteFailure,
    /// Chosen as deadlock victim
    Deadlock,
}

/// Committed state of one site, as shown by `dump`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteDump {
    /// Site identifier
    pub site: SiteId,
    /// Whether the site is up
    pub up: bool,
    /// Committed value of every local copy, by variable index
    pub values: Vec<(VarId, Value)>,
}

/// Something that happened while processing a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A transaction started
    Began {
        /// New transaction
        txn: TxnId,
        /// Started with `beginRO`
        read_only: bool,
        /// Start tick
        at: Timestamp,
    },
    /// A read completed
    Read {
        /// Reader
        txn: TxnId,
        /// Variable read
        var: VarId,
        /// Value observed
        value: Value,
        /// Site served from; absent for snapshot reads
        site: Option<SiteId>,
    },
    /// A read-only transaction asked for a variable its snapshot lacks
    ReadFailed {
        /// Reader
        txn: TxnId,
        /// Variable requested
        var: VarId,
    },
    /// A write was staged at every available copy
    Wrote {
        /// Writer
        txn: TxnId,
        /// Variable written
        var: VarId,
        /// Staged value
        value: Value,
        /// Sites holding the staged value
        sites: Vec<SiteId>,
    },
    /// A transaction committed
    Committed {
        /// Committed transaction
        txn: TxnId,
        /// Commit tick
        at: Timestamp,
    },
    /// A transaction aborted
    Aborted {
        /// Aborted transaction
        txn: TxnId,
        /// Cause
        reason: AbortReason,
    },
    /// A wait-for cycle was found
    DeadlockDetected {
        /// Transactions on some cycle
        members: Vec<TxnId>,
        /// Transaction chosen for abort
        victim: TxnId,
    },
    /// A site went down
    SiteFailed {
        /// Failed site
        site: SiteId,
        /// Transactions that can no longer commit
        doomed: Vec<TxnId>,
    },
    /// A site came back
    SiteRecovered {
        /// Recovered site
        site: SiteId,
        /// Recovery tick
        at: Timestamp,
    },
    /// Committed values of every site
    Dump {
        /// One entry per site, by site id
        sites: Vec<SiteDump>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_read_serializes_null_site() {
        let event = Event::Read {
            txn: TxnId::new("RO"),
            var: VarId::new(2),
            value: 20,
            site: None,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "read", "txn": "RO", "var": 2, "value": 20, "site": null})
        );
    }

    #[test]
    fn test_dump_serializes_value_pairs() {
        let event = Event::Dump {
            sites: vec![SiteDump {
                site: SiteId::new(1),
                up: false,
                values: vec![(VarId::new(2), 20)],
            }],
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "dump", "sites": [{"site": 1, "up": false, "values": [[2, 20]]}]})
        );
    }

    #[test]
    fn test_abort_reason_is_snake_case() {
        let event = Event::Aborted {
            txn: TxnId::new("T1"),
            reason: AbortReason::SiteFailure,
        };
        assert_eq!(serde_json::to_value(&event).unwrap()["reason"], "site_failure");
    }
}
