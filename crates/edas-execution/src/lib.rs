//! Job execution for edas.
//!
//! A job is run by one [`SubmissionUnit`] per expected worker. Each unit
//! resolves a [`CompletionSlot`] on the job's [`ExecutionHandle`], which
//! merges the partial results and hands the merged result to a
//! [`ResultSink`].

mod error;
mod executor;
mod handle;
mod merge;
mod sink;
mod submission;

pub use error::{ConnectionError, ErrorReport, ExecutionError, JobError, MergeError, PersistenceError};
pub use executor::WorkflowExecutor;
pub use handle::{CompletionSlot, ExecutionHandle, Status};
pub use merge::{MergeMethod, MergePolicy, merge_results};
pub use sink::{Delivery, MemorySink, ResultSink};
pub use submission::SubmissionUnit;
