//! Result storage for edas.
//!
//! [`CacheDir`] lays out the on-disk cache that workflows write into, and
//! [`FsResultSink`] persists merged results there as JSON.

mod cache;
mod error;
mod sink;

pub use cache::{CacheDir, DEFAULT_EXTENSION, default_cache_dir};
pub use error::StoreError;
pub use sink::{DELIVERIES_FILE, ERRORS_FILE, FsResultSink};
