//! Execution coordinator for edas.
//!
//! The [`ExecutionCoordinator`] owns the worker pool connection, fans each
//! submitted job out to one submission unit per expected worker, and keeps a
//! registry of the handles it has seen so callers can look jobs up by id.

mod coordinator;
mod pool;

pub use coordinator::{ActiveSubmission, ExecutionCoordinator};
pub use pool::PoolKind;
