//! Concurrency layer for repcc
//!
//! This crate implements strict two-phase locking for a single copy of a
//! variable, plus the wait-for graph used for deadlock detection:
//! - Lock / LockRequest: Shared or exclusive mode and its holders
//! - LockManager: Active lock plus FIFO queue, grant/promote/release/resolve
//! - WaitForGraph: Waiter → holder edges, cycle search, victim selection
//!
//! Nothing here blocks. Every operation returns a definite answer and the
//! caller decides whether to queue a request and retry later.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lock;
pub mod manager;
pub mod wait_for;

pub use lock::{Lock, LockMode, LockRequest};
pub use manager::LockManager;
pub use wait_for::{DeadlockInfo, WaitForGraph};
