//! repcc - replicated concurrency-control simulator
//!
//! A cluster of sites holds replicated and partitioned variables. A single
//! coordinator runs transactions over them with strict two-phase locking,
//! the available-copies write rule, snapshot reads for read-only
//! transactions, and wait-for-graph deadlock detection.
//!
//! # Quick Start
//!
//! ```
//! use repcc::{Coordinator, Event};
//!
//! let mut sim = Coordinator::default();
//! sim.process_line("begin(T1)")?;
//! sim.process_line("W(T1, x2, 7)")?;
//! let events = sim.process_line("end(T1)")?;
//! assert!(matches!(events[0], Event::Committed { .. }));
//! # Ok::<(), repcc::Error>(())
//! ```
//!
//! # Architecture
//!
//! Commands go through [`Coordinator::process_line`] or
//! [`Coordinator::process_command`], which return [`Event`] values instead
//! of printing. Lock tables and deadlock detection live in
//! `repcc-concurrency`; identifiers and errors live in `repcc-core`.

pub use repcc_concurrency::{DeadlockInfo, LockManager, LockMode, WaitForGraph};
pub use repcc_core::{Error, Placement, Result, SiteId, Timestamp, TxnId, Value, VarId};
pub use repcc_engine::*;
