//! Task execution: outcome classification, the revision loop, and the
//! per-task driver tying pipeline, sandbox and artifact storage together.

pub mod classify;
pub mod driver;
pub mod revision;

pub use classify::{classify, error_excerpt, has_error_signature};
pub use driver::TaskDriver;
pub use revision::RevisionLoop;
