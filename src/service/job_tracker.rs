//! Job run tracker: run-state bookkeeping around one batch job.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::domain::{Document, JobRun, JobStatus, JobType};
use crate::error::EngineError;
use crate::persistence::JobRunStore;

/// Last-write-wins merge over named keys.
///
/// Every key of `patch` replaces the same key in `base`; nested values are
/// replaced wholesale. Phases should use distinct keys.
#[must_use]
pub fn merge_metadata(base: Document, patch: Document) -> Document {
    base.merged(patch)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "job panicked".to_string()
    }
}

/// Wraps job invocations with `running → succeeded | failed` transitions.
#[derive(Debug, Clone)]
pub struct JobRunTracker {
    jobs: Arc<dyn JobRunStore>,
}

impl JobRunTracker {
    /// Creates a tracker writing to `jobs`.
    #[must_use]
    pub fn new(jobs: Arc<dyn JobRunStore>) -> Self {
        Self { jobs }
    }

    /// Records a `running` row, drives `job`, then finalizes the row exactly
    /// once.
    ///
    /// On success the run's metadata is `initial` merged with the job's own
    /// result map. A job error or panic marks the run `failed` with the
    /// captured message; the returned [`JobRun`] carries that status, so a
    /// failed job is not an `Err` here.
    ///
    /// The job and its finalization run on a spawned task. Dropping the
    /// returned future (request timeout, client disconnect) detaches the
    /// task instead of cancelling it, so the row still reaches a terminal
    /// status.
    ///
    /// # Errors
    ///
    /// Returns an error only when the run row cannot be created or
    /// finalized.
    pub async fn track<Fut>(
        &self,
        job_type: JobType,
        initial: Document,
        job: Fut,
    ) -> Result<JobRun, EngineError>
    where
        Fut: Future<Output = Result<Document, EngineError>> + Send + 'static,
    {
        let run = self.jobs.start_run(job_type, &initial).await?;
        let run_id = run.id;
        tracing::info!(%run_id, job_type = job_type.as_str(), "job started");

        let jobs = Arc::clone(&self.jobs);
        let fallback_metadata = initial.clone();
        let task = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(job).catch_unwind().await;
            let (status, metadata, error_message) = match outcome {
                Ok(Ok(result)) => (JobStatus::Succeeded, merge_metadata(initial, result), None),
                Ok(Err(e)) => (JobStatus::Failed, initial, Some(e.to_string())),
                Err(payload) => (
                    JobStatus::Failed,
                    initial,
                    Some(panic_message(payload.as_ref())),
                ),
            };
            jobs.finish_run(run_id, status, &metadata, error_message.as_deref())
                .await
        });

        let finished = match task.await {
            Ok(finished) => finished,
            // The task was aborted before it could finalize (runtime shutdown).
            Err(join_error) => {
                let message = format!("job task aborted: {join_error}");
                self.jobs
                    .finish_run(
                        run_id,
                        JobStatus::Failed,
                        &fallback_metadata,
                        Some(message.as_str()),
                    )
                    .await
            }
        }
        .inspect_err(|e| {
            tracing::error!(%run_id, error = %e, "could not finalize job run");
        })?;

        match (&finished.status, &finished.error_message) {
            (JobStatus::Failed, Some(message)) => {
                tracing::error!(%run_id, job_type = job_type.as_str(), error = %message, "job failed");
            }
            _ => tracing::info!(%run_id, job_type = job_type.as_str(), "job succeeded"),
        }
        Ok(finished)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::memory::InMemoryStore;
    use std::time::Duration;

    fn tracker() -> (Arc<InMemoryStore>, JobRunTracker) {
        let store = Arc::new(InMemoryStore::new());
        let jobs = Arc::clone(&store) as Arc<dyn JobRunStore>;
        (store, JobRunTracker::new(jobs))
    }

    #[tokio::test]
    async fn success_merges_metadata_with_later_keys_winning() {
        let (store, tracker) = tracker();
        let initial = Document::new().with("target_date", "2026-04-02").with("phase", "start");
        let Ok(run) = tracker
            .track(JobType::TelemetryRollup, initial, async {
                Ok(Document::new().with("phase", "done").with("card_metrics_updated", 3))
            })
            .await
        else {
            panic!("tracking failed");
        };
        assert_eq!(run.status, JobStatus::Succeeded);
        assert_eq!(run.metadata.get_str("phase"), Some("done"));
        assert_eq!(run.metadata.get_str("target_date"), Some("2026-04-02"));
        assert_eq!(run.metadata.get_i64("card_metrics_updated"), Some(3));
        assert!(run.completed_at.is_some());

        let Ok(runs) = store.recent_runs(None, 10).await else {
            panic!("listing failed");
        };
        assert_eq!(runs.len(), 1);
    }

    #[tokio::test]
    async fn job_error_marks_run_failed() {
        let (_store, tracker) = tracker();
        let Ok(run) = tracker
            .track(JobType::TrendingRefresh, Document::new(), async {
                Err(EngineError::Persistence("connection refused".into()))
            })
            .await
        else {
            panic!("tracking failed");
        };
        assert_eq!(run.status, JobStatus::Failed);
        assert_eq!(
            run.error_message.as_deref(),
            Some("persistence error: connection refused")
        );
    }

    #[tokio::test]
    async fn panicking_job_is_still_finalized() {
        let (store, tracker) = tracker();
        let Ok(run) = tracker
            .track(JobType::TrendingRefresh, Document::new(), async {
                if Document::new().is_empty() {
                    panic!("scorer blew up");
                }
                Ok(Document::new())
            })
            .await
        else {
            panic!("tracking failed");
        };
        assert_eq!(run.status, JobStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("scorer blew up"));

        let Ok(runs) = store.recent_runs(Some(JobType::TrendingRefresh), 10).await else {
            panic!("listing failed");
        };
        assert!(runs.iter().all(|r| r.status.is_terminal()));
    }

    #[tokio::test]
    async fn dropped_caller_still_finalizes_the_run() {
        let (store, tracker) = tracker();
        let tracked = tracker.track(JobType::TelemetryRollup, Document::new(), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(Document::new().with("card_metrics_updated", 1))
        });
        assert!(
            tokio::time::timeout(Duration::from_millis(20), tracked)
                .await
                .is_err()
        );

        let mut statuses = Vec::new();
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            let Ok(runs) = store.recent_runs(None, 10).await else {
                panic!("listing failed");
            };
            statuses = runs.iter().map(|r| r.status).collect();
            if statuses.iter().all(JobStatus::is_terminal) {
                break;
            }
        }
        assert_eq!(statuses, vec![JobStatus::Succeeded]);
    }
}
