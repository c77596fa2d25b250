//! Job lifecycle states and the transition rules between them.
//!
//! ```text
//! uploaded -> processing -> enhanced
//!                        \-> error
//! ```
//!
//! `enhanced` and `error` are terminal. There is no path back into
//! `processing`; a failed upload has to be resubmitted as a new job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle status of an enhancement job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Uploaded,
    Processing,
    Enhanced,
    Error,
}

impl JobStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Uploaded,
        JobStatus::Processing,
        JobStatus::Enhanced,
        JobStatus::Error,
    ];

    /// Storage and wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Uploaded => "uploaded",
            JobStatus::Processing => "processing",
            JobStatus::Enhanced => "enhanced",
            JobStatus::Error => "error",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Enhanced | JobStatus::Error)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Uploaded, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Enhanced)
                | (JobStatus::Processing, JobStatus::Error)
        )
    }

    /// The single state a job must be in before moving to `self`, if any.
    pub fn required_predecessor(self) -> Option<JobStatus> {
        JobStatus::ALL
            .into_iter()
            .find(|from| from.can_transition_to(self))
    }

    /// Human-readable progress text shown to polling clients.
    pub fn progress_message(self) -> &'static str {
        match self {
            JobStatus::Uploaded => "File uploaded, waiting to start processing...",
            JobStatus::Processing => "Enhancing audio...",
            JobStatus::Enhanced => "Enhancement completed successfully!",
            JobStatus::Error => "Enhancement failed. Please try again.",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown job status '{s}'")))
    }
}

impl TryFrom<String> for JobStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, CoreError> {
        value.parse()
    }
}
