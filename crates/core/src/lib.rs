//! Core types for repcc
//!
//! This crate defines the foundational types shared by every layer:
//! - TxnId: Transaction identifier as written in the command stream
//! - VarId: Variable identifier (`x1`, `x2`, ...)
//! - SiteId: Identifier of one partition-owning site
//! - Timestamp: Tick of the single logical clock
//! - Placement: Which sites hold which variables
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Placement, SiteId, Timestamp, TxnId, Value, VarId};
