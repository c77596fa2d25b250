//! Background execution of enhancement jobs.
//!
//! [`TaskDispatcher`] owns a bounded queue and a fixed pool of tokio worker
//! tasks. Request handlers submit job ids and return immediately; the
//! workers hand each id to a [`JobExecutor`]. [`recovery`] reconciles jobs
//! left behind by a previous process at startup.

pub mod dispatcher;
pub mod executor;
pub mod recovery;

pub use dispatcher::{DispatchError, DispatcherConfig, Submission, TaskDispatcher};
pub use executor::JobExecutor;
