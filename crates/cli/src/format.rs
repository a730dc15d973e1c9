//! Event → human/json string formatting.
//!
//! Two modes:
//! - **Human** (default): one sentence per event, e.g. `T1 reads x4: 40 (site 2)`
//! - **JSON** (`--json`): one compact object per event, tagged by `"event"`

use repcc_core::{Error, SiteId, TxnId};
use repcc_engine::{AbortReason, Event, OutputFormat, SiteDump};

/// Format every event of one command, one line per event.
pub fn format_events(events: &[Event], mode: OutputFormat) -> String {
    events
        .iter()
        .map(|event| format_event(event, mode))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a single event.
pub fn format_event(event: &Event, mode: OutputFormat) -> String {
    match mode {
        OutputFormat::Json => format_json(event),
        OutputFormat::Human => format_human(event),
    }
}

/// Format an error.
pub fn format_error(err: &Error, mode: OutputFormat) -> String {
    match mode {
        OutputFormat::Json => serde_json::json!({ "error": err.to_string() }).to_string(),
        OutputFormat::Human => format!("(error) {}", err),
    }
}

fn format_json(event: &Event) -> String {
    serde_json::to_string(event)
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
}

fn format_human(event: &Event) -> String {
    match event {
        Event::Began { txn, read_only, .. } => {
            if *read_only {
                format!("{} begins (read-only)", txn)
            } else {
                format!("{} begins", txn)
            }
        }
        Event::Read {
            txn,
            var,
            value,
            site,
        } => match site {
            Some(site) => format!("{} reads {}: {} (site {})", txn, var, value, site),
            None => format!("{} reads {}: {} (snapshot)", txn, var, value),
        },
        Event::ReadFailed { txn, var } => {
            format!("{} cannot read {}: no committed copy in its snapshot", txn, var)
        }
        Event::Wrote {
            txn,
            var,
            value,
            sites,
        } => format!("{} writes {}: {} (sites {})", txn, var, value, join_sites(sites)),
        Event::Committed { txn, .. } => format!("{} commits", txn),
        Event::Aborted { txn, reason } => match reason {
            AbortReason::SiteFailure => format!("{} aborts due to site failure", txn),
            AbortReason::Deadlock => format!("{} aborts due to deadlock", txn),
        },
        Event::DeadlockDetected { members, victim } => {
            format!("deadlock among {}; victim {}", join_txns(members), victim)
        }
        Event::SiteFailed { site, doomed } => {
            if doomed.is_empty() {
                format!("site {} fails", site)
            } else {
                format!("site {} fails ({} can no longer commit)", site, join_txns(doomed))
            }
        }
        Event::SiteRecovered { site, .. } => format!("site {} recovers", site),
        Event::Dump { sites } => sites.iter().map(format_site_dump).collect::<Vec<_>>().join("\n"),
    }
}

fn format_site_dump(dump: &SiteDump) -> String {
    let values = dump
        .values
        .iter()
        .map(|(var, value)| format!("{}: {}", var, value))
        .collect::<Vec<_>>()
        .join(", ");
    if dump.up {
        format!("site {} - {}", dump.site, values)
    } else {
        format!("site {} - {} (down)", dump.site, values)
    }
}

fn join_sites(sites: &[SiteId]) -> String {
    sites
        .iter()
        .map(SiteId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_txns(txns: &[TxnId]) -> String {
    txns.iter().map(TxnId::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use repcc_core::{Timestamp, VarId};

    fn t(name: &str) -> TxnId {
        TxnId::new(name)
    }

    #[test]
    fn test_format_reads() {
        let locked = Event::Read {
            txn: t("T1"),
            var: VarId::new(4),
            value: 40,
            site: Some(SiteId::new(2)),
        };
        assert_eq!(
            format_event(&locked, OutputFormat::Human),
            "T1 reads x4: 40 (site 2)"
        );

        let snapshot = Event::Read {
            txn: t("RO"),
            var: VarId::new(4),
            value: 40,
            site: None,
        };
        assert_eq!(
            format_event(&snapshot, OutputFormat::Human),
            "RO reads x4: 40 (snapshot)"
        );
    }

    #[test]
    fn test_format_aborts() {
        let deadlock = Event::Aborted {
            txn: t("T2"),
            reason: AbortReason::Deadlock,
        };
        assert_eq!(
            format_event(&deadlock, OutputFormat::Human),
            "T2 aborts due to deadlock"
        );
        let failure = Event::Aborted {
            txn: t("T2"),
            reason: AbortReason::SiteFailure,
        };
        assert_eq!(
            format_event(&failure, OutputFormat::Human),
            "T2 aborts due to site failure"
        );
    }

    #[test]
    fn test_format_site_failure() {
        let quiet = Event::SiteFailed {
            site: SiteId::new(3),
            doomed: vec![],
        };
        assert_eq!(format_event(&quiet, OutputFormat::Human), "site 3 fails");

        let dooming = Event::SiteFailed {
            site: SiteId::new(3),
            doomed: vec![t("T1"), t("T4")],
        };
        assert_eq!(
            format_event(&dooming, OutputFormat::Human),
            "site 3 fails (T1, T4 can no longer commit)"
        );
    }

    #[test]
    fn test_format_dump_lines() {
        let dump = Event::Dump {
            sites: vec![
                SiteDump {
                    site: SiteId::new(1),
                    up: true,
                    values: vec![(VarId::new(2), 20), (VarId::new(4), 40)],
                },
                SiteDump {
                    site: SiteId::new(2),
                    up: false,
                    values: vec![(VarId::new(1), 10)],
                },
            ],
        };
        assert_eq!(
            format_event(&dump, OutputFormat::Human),
            "site 1 - x2: 20, x4: 40\nsite 2 - x1: 10 (down)"
        );
    }

    #[test]
    fn test_format_json_is_tagged() {
        let event = Event::Committed {
            txn: t("T1"),
            at: Timestamp::new(7),
        };
        let parsed: serde_json::Value =
            serde_json::from_str(&format_event(&event, OutputFormat::Json)).unwrap();
        assert_eq!(parsed["event"], "committed");
        assert_eq!(parsed["txn"], "T1");
        assert_eq!(parsed["at"], 7);
    }

    #[test]
    fn test_format_error() {
        let err = Error::UnknownTransaction(t("T9"));
        assert_eq!(
            format_error(&err, OutputFormat::Human),
            "(error) transaction T9 not found"
        );
        let parsed: serde_json::Value =
            serde_json::from_str(&format_error(&err, OutputFormat::Json)).unwrap();
        assert_eq!(parsed["error"], "transaction T9 not found");
    }

    #[test]
    fn test_format_events_joins_lines() {
        let events = vec![
            Event::Committed {
                txn: t("T1"),
                at: Timestamp::new(1),
            },
            Event::SiteRecovered {
                site: SiteId::new(2),
                at: Timestamp::new(1),
            },
        ];
        assert_eq!(
            format_events(&events, OutputFormat::Human),
            "T1 commits\nsite 2 recovers"
        );
        assert!(format_events(&[], OutputFormat::Human).is_empty());
    }
}
