//! Runs one enhancement job end to end.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clearwave_core::payload::PayloadKind;
use clearwave_core::types::JobId;
use clearwave_db::repositories::JobRepo;
use clearwave_db::{JobLifecycle, TransitionError};
use clearwave_enhancer::buffer::encode_wav;
use clearwave_enhancer::{EnhanceRequest, Enhancer};
use sqlx::SqlitePool;

use crate::audio::{prepare, validate_output};

/// Default upper bound on a single model call.
pub const DEFAULT_ENHANCE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default number of tries for each status write.
pub const DEFAULT_WRITE_ATTEMPTS: u32 = 4;

/// Default delay before the first retry of a status write. Doubles for each
/// further attempt.
pub const DEFAULT_WRITE_BACKOFF: Duration = Duration::from_millis(250);

const SCRATCH_PREFIX: &str = "clearwave-";

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Upper bound on the model call. The call is abandoned (and a command
    /// backend's child killed) when it elapses.
    pub timeout: Duration,
    /// Tries for each status write that fails with a store error.
    pub write_attempts: u32,
    /// Delay before the first retry.
    pub write_backoff: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_ENHANCE_TIMEOUT,
            write_attempts: DEFAULT_WRITE_ATTEMPTS,
            write_backoff: DEFAULT_WRITE_BACKOFF,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The job is now `enhanced`.
    Enhanced,
    /// The job is now `error` with this detail.
    Failed(String),
    /// The job was not run: it is gone, or not in `uploaded`.
    Skipped(String),
    /// The store kept rejecting the status write. The job is left in its
    /// previous status for startup recovery; the detail says what was lost.
    Unrecorded(String),
}

/// Orchestrates the model call for a job and records the outcome.
///
/// Every failure inside a run ends as a terminal job state; nothing is
/// returned as an `Err`.
#[derive(Clone)]
pub struct EnhancementRunner {
    pool: SqlitePool,
    enhancer: Arc<dyn Enhancer>,
    settings: RunnerSettings,
}

impl EnhancementRunner {
    pub fn new(pool: SqlitePool, enhancer: Arc<dyn Enhancer>, settings: RunnerSettings) -> Self {
        Self {
            pool,
            enhancer,
            settings,
        }
    }

    /// Drive `job_id` from `uploaded` to `enhanced` or `error`.
    pub async fn run(&self, job_id: JobId) -> RunOutcome {
        match self
            .write(|| JobLifecycle::mark_processing(&self.pool, job_id))
            .await
        {
            Ok(_) => {}
            Err(TransitionError::NotFound(_)) => {
                tracing::debug!(%job_id, "Job deleted before processing started");
                return RunOutcome::Skipped("job no longer exists".into());
            }
            Err(TransitionError::InvalidTransition { from, .. }) => {
                tracing::debug!(%job_id, status = %from, "Job already claimed");
                return RunOutcome::Skipped(format!("job is already {from}"));
            }
            Err(e) => {
                tracing::error!(%job_id, error = %e, "Failed to claim job");
                return RunOutcome::Unrecorded(format!("could not claim job: {e}"));
            }
        }

        let started = Instant::now();
        tracing::info!(%job_id, backend = self.enhancer.name(), "Enhancement started");

        let outcome = match self.enhance(job_id).await {
            Ok(result) => self.finish(job_id, result).await,
            Err(detail) => self.fail(job_id, detail).await,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            RunOutcome::Enhanced => tracing::info!(%job_id, elapsed_ms, "Enhancement completed"),
            RunOutcome::Failed(detail) => {
                tracing::warn!(%job_id, elapsed_ms, error = %detail, "Enhancement failed")
            }
            RunOutcome::Skipped(reason) => {
                tracing::info!(%job_id, elapsed_ms, reason = %reason, "Enhancement result discarded")
            }
            RunOutcome::Unrecorded(detail) => {
                tracing::error!(%job_id, elapsed_ms, error = %detail, "Enhancement outcome not recorded")
            }
        }
        outcome
    }

    /// Everything between claiming the job and recording its outcome.
    /// `Err` carries the human-readable detail stored on the job.
    async fn enhance(&self, job_id: JobId) -> Result<Vec<u8>, String> {
        let stored = JobRepo::find_payload(&self.pool, job_id, PayloadKind::Original)
            .await
            .map_err(|e| format!("Could not load uploaded audio: {e}"))?
            .and_then(|p| p.bytes)
            .ok_or_else(|| "Uploaded audio is missing".to_string())?;

        let audio = tokio::task::spawn_blocking(move || prepare(&stored))
            .await
            .map_err(|e| format!("Audio preparation aborted: {e}"))?
            .map_err(|e| format!("Invalid audio: {e}"))?;
        tracing::debug!(
            %job_id,
            samples = audio.samples.len(),
            duration_secs = audio.duration_secs(),
            "Audio prepared for model",
        );

        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()
            .map_err(|e| format!("Could not create scratch directory: {e}"))?;

        let request = EnhanceRequest {
            audio,
            scratch_dir: scratch.path(),
        };
        let result = tokio::time::timeout(self.settings.timeout, self.enhancer.enhance(request)).await;

        if let Err(e) = scratch.close() {
            tracing::warn!(%job_id, error = %e, "Failed to remove scratch directory");
        }

        let enhanced = match result {
            Err(_elapsed) => {
                return Err(format!(
                    "Enhancement timed out after {:?}",
                    self.settings.timeout
                ))
            }
            Ok(Err(e)) => return Err(format!("Model error: {e}")),
            Ok(Ok(audio)) => audio,
        };

        validate_output(&enhanced).map_err(|e| e.to_string())?;
        encode_wav(&enhanced).map_err(|e| format!("Could not encode enhanced audio: {e}"))
    }

    async fn finish(&self, job_id: JobId, result: Vec<u8>) -> RunOutcome {
        match self
            .write(|| JobLifecycle::mark_enhanced(&self.pool, job_id, result.clone()))
            .await
        {
            Ok(_) => RunOutcome::Enhanced,
            Err(TransitionError::NotFound(_)) => {
                RunOutcome::Skipped("job was deleted during processing".into())
            }
            Err(e @ TransitionError::InvalidTransition { .. }) => RunOutcome::Skipped(e.to_string()),
            Err(e) => {
                tracing::error!(%job_id, error = %e, "Failed to store enhanced audio");
                self.fail(job_id, format!("Could not store enhanced audio: {e}"))
                    .await
            }
        }
    }

    async fn fail(&self, job_id: JobId, detail: String) -> RunOutcome {
        match self
            .write(|| JobLifecycle::mark_error(&self.pool, job_id, &detail))
            .await
        {
            Ok(_) => RunOutcome::Failed(detail),
            Err(TransitionError::NotFound(_)) => {
                RunOutcome::Skipped("job was deleted during processing".into())
            }
            Err(e @ TransitionError::InvalidTransition { .. }) => RunOutcome::Skipped(e.to_string()),
            Err(e) => {
                tracing::error!(%job_id, error = %e, detail = %detail, "Failed to record job failure");
                RunOutcome::Unrecorded(format!("could not record failure '{detail}': {e}"))
            }
        }
    }

    async fn write<T, F, Fut>(&self, op: F) -> Result<T, TransitionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransitionError>>,
    {
        retry_store_write(self.settings.write_attempts, self.settings.write_backoff, op).await
    }
}

/// Run `op`, retrying store errors with exponential backoff. Rejections from
/// the state machine itself are returned at once.
async fn retry_store_write<T, F, Fut>(
    attempts: u32,
    backoff: Duration,
    mut op: F,
) -> Result<T, TransitionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransitionError>>,
{
    let attempts = attempts.max(1);
    let mut delay = backoff;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(TransitionError::Database(e)) if attempt < attempts => {
                tracing::warn!(attempt, attempts, error = %e, "Job store write failed, retrying");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            other => return other,
        }
    }
}
