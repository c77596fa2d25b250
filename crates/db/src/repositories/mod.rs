//! Repository layer: one zero-sized struct per table with async CRUD methods.

pub mod job_repo;

pub use job_repo::{JobRepo, UpdateOutcome};
