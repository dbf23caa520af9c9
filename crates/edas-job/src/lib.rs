//! EDAS Job
//!
//! This crate provides the data model shared by every stage of job
//! execution:
//! - [`Job`]: the immutable description of one unit of submitted work
//! - [`JobResult`]: the (possibly partial) output of executing a job
//! - random identifiers used for request ids and cache file names
//!
//! Nothing here executes anything. The execution crates take these types,
//! run them against a workflow executor and merge the results.

mod error;
mod job;
mod result;
mod uid;

pub use error::JobError;
pub use job::{Job, JobBuilder, SEND_DATA_ARG};
pub use result::{Artifact, ID_ATTR, JobResult, MERGE_ATTR};
pub use uid::{DEFAULT_ID_LENGTH, random_id, with_suffix};
