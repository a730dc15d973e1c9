//! Transaction state kept by the coordinator

use repcc_core::{SiteId, Timestamp, TxnId, Value, VarId};
use std::collections::{BTreeMap, BTreeSet};

/// A live transaction
///
/// Read-only transactions carry a snapshot frozen at `begin` and never take
/// locks. Read-write transactions track the sites they touched; if one of
/// those sites fails, the transaction can no longer commit.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: TxnId,
    start: Timestamp,
    snapshot: Option<BTreeMap<VarId, Value>>,
    can_commit: bool,
    accessed_sites: BTreeSet<SiteId>,
}

impl Transaction {
    /// Start a read-write transaction at `start`
    pub fn read_write(id: TxnId, start: Timestamp) -> Self {
        Self {
            id,
            start,
            snapshot: None,
            can_commit: true,
            accessed_sites: BTreeSet::new(),
        }
    }

    /// Start a read-only transaction at `start` over `snapshot`
    pub fn read_only(id: TxnId, start: Timestamp, snapshot: BTreeMap<VarId, Value>) -> Self {
        Self {
            id,
            start,
            snapshot: Some(snapshot),
            can_commit: true,
            accessed_sites: BTreeSet::new(),
        }
    }

    /// Transaction identifier
    pub fn id(&self) -> &TxnId {
        &self.id
    }

    /// Tick at which the transaction began
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Whether the transaction was begun with `beginRO`
    pub fn is_read_only(&self) -> bool {
        self.snapshot.is_some()
    }

    /// The frozen snapshot of a read-only transaction
    pub fn snapshot(&self) -> Option<&BTreeMap<VarId, Value>> {
        self.snapshot.as_ref()
    }

    /// Snapshot value of `var`, for read-only transactions
    pub fn snapshot_value(&self, var: VarId) -> Option<Value> {
        self.snapshot.as_ref()?.get(&var).copied()
    }

    /// Whether `end` will commit rather than abort
    pub fn can_commit(&self) -> bool {
        self.can_commit
    }

    /// Sites this transaction has read from or written to
    pub fn accessed_sites(&self) -> &BTreeSet<SiteId> {
        &self.accessed_sites
    }

    /// Whether this transaction touched `site`
    pub fn has_accessed(&self, site: SiteId) -> bool {
        self.accessed_sites.contains(&site)
    }

    /// Record an access to `site`
    pub fn record_access(&mut self, site: SiteId) {
        self.accessed_sites.insert(site);
    }

    /// Condemn the transaction to abort at `end`
    pub fn doom(&mut self) {
        self.can_commit = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_defaults() {
        let txn = Transaction::read_write(TxnId::new("T1"), Timestamp::new(3));
        assert!(!txn.is_read_only());
        assert!(txn.can_commit());
        assert!(txn.accessed_sites().is_empty());
        assert_eq!(txn.start(), Timestamp::new(3));
        assert_eq!(txn.snapshot_value(VarId::new(2)), None);
    }

    #[test]
    fn test_read_only_snapshot_lookup() {
        let snapshot = BTreeMap::from([(VarId::new(2), 20)]);
        let txn = Transaction::read_only(TxnId::new("R"), Timestamp::ZERO, snapshot);
        assert!(txn.is_read_only());
        assert_eq!(txn.snapshot_value(VarId::new(2)), Some(20));
        assert_eq!(txn.snapshot_value(VarId::new(4)), None);
    }

    #[test]
    fn test_access_and_doom() {
        let mut txn = Transaction::read_write(TxnId::new("T1"), Timestamp::ZERO);
        txn.record_access(SiteId::new(2));
        txn.record_access(SiteId::new(2));
        assert_eq!(txn.accessed_sites().len(), 1);
        assert!(txn.has_accessed(SiteId::new(2)));
        txn.doom();
        assert!(!txn.can_commit());
    }
}
