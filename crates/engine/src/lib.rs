//! Replicated concurrency-control engine
//!
//! This crate ties the lower layers into a running simulation:
//! - Site: variable copies and their lock managers
//! - Coordinator: transaction lifecycle, the deferred-operation queue,
//!   available-copies writes and deadlock breaking
//! - Command: the line-oriented input language
//! - Event: everything a command produced, for the front end to render
//!
//! The coordinator is the single mutator of all state. One command is fully
//! processed before the next is read.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod config;
pub mod coordinator;
pub mod event;
pub mod operation;
pub mod site;
pub mod transaction;
pub mod variable;

pub use command::{parse_line, Command};
pub use config::{OutputFormat, SimConfig, CONFIG_FILE_NAME};
pub use coordinator::{Coordinator, TransactionMetrics};
pub use event::{AbortReason, Event, SiteDump};
pub use operation::{OperationKind, PendingOperation};
pub use site::Site;
pub use transaction::Transaction;
pub use variable::Variable;
