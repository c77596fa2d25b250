//! Startup recovery against a real SQLite store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use clearwave_core::job_status::JobStatus;
use clearwave_core::types::JobId;
use clearwave_db::models::job::NewJob;
use clearwave_db::repositories::JobRepo;
use clearwave_db::JobLifecycle;
use clearwave_worker::recovery::{recover, RecoveryReport, INTERRUPTED_DETAIL};
use clearwave_worker::{DispatcherConfig, JobExecutor, TaskDispatcher};
use sqlx::SqlitePool;
use tokio::sync::Semaphore;

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<JobId>>,
}

#[async_trait]
impl JobExecutor for Recorder {
    async fn execute(&self, job_id: JobId) {
        self.seen.lock().unwrap().push(job_id);
    }
}

/// Records ids in execution order, but only finishes one per gate permit.
struct Gated {
    seen: Mutex<Vec<JobId>>,
    gate: Semaphore,
}

#[async_trait]
impl JobExecutor for Gated {
    async fn execute(&self, job_id: JobId) {
        self.seen.lock().unwrap().push(job_id);
        self.gate.acquire().await.unwrap().forget();
    }
}

async fn create(pool: &SqlitePool, name: &str) -> JobId {
    JobRepo::create(
        pool,
        &NewJob {
            original_filename: name.into(),
            payload: b"RIFF".to_vec(),
        },
    )
    .await
    .unwrap()
    .id
}

#[sqlx::test(migrations = "../db/migrations")]
async fn interrupted_jobs_fail_and_waiting_jobs_resume(pool: SqlitePool) {
    let waiting = create(&pool, "waiting.wav").await;
    let interrupted = create(&pool, "interrupted.wav").await;
    JobLifecycle::mark_processing(&pool, interrupted).await.unwrap();
    let finished = create(&pool, "finished.wav").await;
    JobLifecycle::mark_processing(&pool, finished).await.unwrap();
    JobLifecycle::mark_enhanced(&pool, finished, b"RIFF-out".to_vec())
        .await
        .unwrap();

    let recorder = Arc::new(Recorder::default());
    let dispatcher = TaskDispatcher::start(recorder.clone(), DispatcherConfig::default());

    let recovery = recover(&pool, &dispatcher).await.unwrap();
    assert_eq!(
        recovery.report,
        RecoveryReport {
            interrupted: 1,
            resubmitted: 1
        }
    );

    let failed = JobRepo::find_summary(&pool, interrupted).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Error);
    assert_eq!(failed.error_detail.as_deref(), Some(INTERRUPTED_DETAIL));

    let done = JobRepo::find_summary(&pool, finished).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Enhanced);

    tokio::time::timeout(Duration::from_secs(5), async {
        while recorder.seen.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert_eq!(*recorder.seen.lock().unwrap(), vec![waiting]);

    dispatcher.shutdown(Duration::from_secs(5)).await;
}

#[sqlx::test(migrations = "../db/migrations")]
async fn clean_store_recovers_nothing(pool: SqlitePool) {
    let dispatcher = TaskDispatcher::start(Arc::new(Recorder::default()), DispatcherConfig::default());
    let recovery = recover(&pool, &dispatcher).await.unwrap();
    assert_eq!(recovery.report, RecoveryReport::default());
    recovery.resubmission.await.unwrap();
}

#[sqlx::test(migrations = "../db/migrations")]
async fn backlog_larger_than_queue_does_not_block_startup(pool: SqlitePool) {
    let mut waiting = Vec::new();
    for i in 0..5 {
        waiting.push(create(&pool, &format!("waiting-{i}.wav")).await);
    }

    let executor = Arc::new(Gated {
        seen: Mutex::new(Vec::new()),
        gate: Semaphore::new(0),
    });
    let dispatcher = TaskDispatcher::start(
        executor.clone(),
        DispatcherConfig {
            workers: 1,
            queue_capacity: 2,
        },
    );

    // One running plus two queued leaves two ids waiting for space; recovery
    // must still return right away.
    let recovery = tokio::time::timeout(Duration::from_secs(1), recover(&pool, &dispatcher))
        .await
        .expect("recovery waited for the backlog")
        .unwrap();
    assert_eq!(recovery.report.resubmitted, 5);

    executor.gate.add_permits(5);
    tokio::time::timeout(Duration::from_secs(5), recovery.resubmission)
        .await
        .unwrap()
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while executor.seen.lock().unwrap().len() < 5 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert_eq!(*executor.seen.lock().unwrap(), waiting);

    dispatcher.shutdown(Duration::from_secs(5)).await;
}
