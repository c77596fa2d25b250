//! Domain types and pure rules shared by every Clearwave crate.
//!
//! Nothing in here performs I/O: the job state machine rules, upload
//! validation, and the error taxonomy live here so the store, the runner,
//! and the HTTP layer all agree on them.

pub mod error;
pub mod job_status;
pub mod payload;
pub mod types;
pub mod upload;
