//! Core types for repcc
//!
//! This module defines the identifiers used throughout the simulator:
//! - TxnId: Opaque transaction identifier (`T1`, `reader`, ...)
//! - VarId: Variable identifier, rendered as `x<index>`
//! - SiteId: One-based site identifier
//! - Timestamp: Logical clock tick shared by all sites and transactions
//! - Placement: Replication and partitioning rule for variables

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Value stored in a variable
pub type Value = i64;

/// Transaction identifier
///
/// Transactions are named by the command stream, so the identifier is the
/// name itself. Wait-for graphs and lock tables key on this value rather
/// than on transaction objects.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxnId(String);

impl TxnId {
    /// Create a transaction identifier from its name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name of the transaction
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxnId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Variable identifier
///
/// Wraps the one-based variable index. `VarId(3)` is written `x3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarId(u32);

impl VarId {
    /// Create a variable identifier from its index
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// One-based index of the variable
    pub const fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl FromStr for VarId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('x')
            .ok_or_else(|| format!("variable '{}' must be written x<index>", s))?;
        digits
            .parse::<u32>()
            .map(VarId)
            .map_err(|_| format!("variable '{}' has no numeric index", s))
    }
}

/// Site identifier (one-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(u32);

impl SiteId {
    /// Create a site identifier
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Numeric value of the identifier
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tick of the logical clock
///
/// The clock is a single monotonically increasing counter, advanced once
/// per processed command. It is never derived from wall-clock time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The first tick
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from a raw tick
    pub const fn new(tick: u64) -> Self {
        Self(tick)
    }

    /// Raw tick value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// The tick after this one
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replication and partitioning rule
///
/// Even-indexed variables are replicated on every site. An odd-indexed
/// variable `i` lives only on site `(i mod sites) + 1`. Every variable
/// starts with the value `10 × i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    sites: u32,
    variables: u32,
}

impl Placement {
    /// Create a placement for `sites` sites and `variables` variables
    pub const fn new(sites: u32, variables: u32) -> Self {
        Self { sites, variables }
    }

    /// Number of sites
    pub const fn site_count(&self) -> u32 {
        self.sites
    }

    /// Number of variables
    pub const fn variable_count(&self) -> u32 {
        self.variables
    }

    /// Whether `site` names an existing site
    pub fn contains_site(&self, site: SiteId) -> bool {
        (1..=self.sites).contains(&site.get())
    }

    /// Whether `var` names an existing variable
    pub fn contains_variable(&self, var: VarId) -> bool {
        (1..=self.variables).contains(&var.index())
    }

    /// Whether `var` is copied to every site
    pub fn is_replicated(&self, var: VarId) -> bool {
        var.index() % 2 == 0
    }

    /// The only site holding a non-replicated variable
    pub fn home_site(&self, var: VarId) -> SiteId {
        SiteId::new(var.index() % self.sites + 1)
    }

    /// Whether `site` holds a copy of `var`
    pub fn is_stored_at(&self, var: VarId, site: SiteId) -> bool {
        self.contains_variable(var)
            && self.contains_site(site)
            && (self.is_replicated(var) || self.home_site(var) == site)
    }

    /// All site identifiers, ascending
    pub fn sites(&self) -> impl Iterator<Item = SiteId> {
        (1..=self.sites).map(SiteId::new)
    }

    /// Variables stored at `site`, ascending
    pub fn variables_at(&self, site: SiteId) -> Vec<VarId> {
        (1..=self.variables)
            .map(VarId::new)
            .filter(|var| self.is_stored_at(*var, site))
            .collect()
    }

    /// Value a variable holds before any commit
    pub fn initial_value(&self, var: VarId) -> Value {
        10 * i64::from(var.index())
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::new(10, 20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_id_round_trips_through_text() {
        let var: VarId = "x14".parse().unwrap();
        assert_eq!(var, VarId::new(14));
        assert_eq!(var.to_string(), "x14");
    }

    #[test]
    fn test_var_id_rejects_malformed_names() {
        assert!("14".parse::<VarId>().is_err());
        assert!("x".parse::<VarId>().is_err());
        assert!("xy".parse::<VarId>().is_err());
    }

    #[test]
    fn test_timestamp_ordering() {
        let t = Timestamp::new(5);
        assert!(t.next() > t);
        assert_eq!(t.next().as_u64(), 6);
        assert_eq!(Timestamp::default(), Timestamp::ZERO);
    }

    #[test]
    fn test_even_variables_are_everywhere() {
        let placement = Placement::default();
        for site in placement.sites() {
            assert!(placement.is_stored_at(VarId::new(2), site));
            assert!(placement.is_stored_at(VarId::new(20), site));
        }
    }

    #[test]
    fn test_odd_variables_have_one_home() {
        let placement = Placement::default();
        assert_eq!(placement.home_site(VarId::new(1)), SiteId::new(2));
        assert_eq!(placement.home_site(VarId::new(9)), SiteId::new(10));
        assert_eq!(placement.home_site(VarId::new(11)), SiteId::new(2));
        assert_eq!(placement.home_site(VarId::new(19)), SiteId::new(10));

        let holders: Vec<_> = placement
            .sites()
            .filter(|s| placement.is_stored_at(VarId::new(3), *s))
            .collect();
        assert_eq!(holders, vec![SiteId::new(4)]);
    }

    #[test]
    fn test_site_two_layout() {
        let placement = Placement::default();
        let vars: Vec<String> = placement
            .variables_at(SiteId::new(2))
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(
            vars,
            vec![
                "x1", "x2", "x4", "x6", "x8", "x10", "x11", "x12", "x14", "x16", "x18", "x20"
            ]
        );
    }

    #[test]
    fn test_unknown_ids_are_not_contained() {
        let placement = Placement::default();
        assert!(!placement.contains_site(SiteId::new(0)));
        assert!(!placement.contains_site(SiteId::new(11)));
        assert!(!placement.contains_variable(VarId::new(21)));
        assert!(!placement.is_stored_at(VarId::new(21), SiteId::new(1)));
    }

    #[test]
    fn test_initial_values() {
        let placement = Placement::default();
        assert_eq!(placement.initial_value(VarId::new(1)), 10);
        assert_eq!(placement.initial_value(VarId::new(20)), 200);
    }

    #[test]
    fn test_txn_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&TxnId::new("T1")).unwrap();
        assert_eq!(json, "\"T1\"");
    }
}
