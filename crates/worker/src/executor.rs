use async_trait::async_trait;
use clearwave_core::types::JobId;
use clearwave_pipeline::EnhancementRunner;

/// Work performed for one submitted job id.
///
/// Implementations record their own outcome; the dispatcher only logs
/// panics.
#[async_trait]
pub trait JobExecutor: Send + Sync + 'static {
    async fn execute(&self, job_id: JobId);
}

#[async_trait]
impl JobExecutor for EnhancementRunner {
    async fn execute(&self, job_id: JobId) {
        self.run(job_id).await;
    }
}
