/// Job identifiers are random UUIDs assigned at creation and never reused.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh job identifier.
pub fn new_job_id() -> JobId {
    uuid::Uuid::new_v4()
}
