//! Background training and analysis jobs
//!
//! Toyota Way: Heijunka (Load Balancing)
//! - CPU-bound fits run on tokio's blocking pool, never on the reactor
//! - Workers report through an unbounded event channel; they never touch
//!   the registry. The owner drains events on its own thread
//!   ([`crate::workbench::Workbench::poll_updates`]) and applies them there.
//!
//! Job lifecycle, tracked on a concurrent job board:
//!
//! ```text
//! Queued ──> Running ──> Succeeded
//!                   └──> Failed
//! ```
//!
//! Jobs are not cancellable and have no timeout: a job runs to completion
//! or failure.

use super::TrainingPipeline;
use crate::config::TrainingConfig;
use crate::model::ModelRecord;
use crate::table::stats::{self, ColumnSummary, DatasetProfile};
use crate::table::TableHandle;
use crate::{Error, Result};
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Identifier of a submitted job (unique per worker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    /// Raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// What a job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Full training; the record is registered when the event is applied
    Train,
    /// Profile + descriptive statistics + quick (smaller ensemble) fit
    Analyze,
}

/// Position of a job in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Submitted, not yet picked up by the blocking pool
    Queued,
    /// Executing
    Running,
    /// Finished with a result
    Succeeded,
    /// Finished with an error
    Failed {
        /// Error message
        cause: String,
    },
}

impl JobState {
    /// Whether the job has finished, successfully or not.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }
}

/// Result of an analysis job.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Shape and completeness
    pub profile: DatasetProfile,
    /// Per numeric column statistics
    pub summaries: Vec<ColumnSummary>,
    /// Held-out R² of the quick fit; `None` when the dataset cannot be trained
    pub quick_accuracy: Option<f64>,
    /// Wall-clock seconds for the whole analysis
    pub elapsed_secs: f64,
}

/// Successful job output.
#[derive(Debug)]
pub enum JobOutcome {
    /// Trained model, not yet registered
    Trained(ModelRecord),
    /// Analysis results
    Analyzed(AnalysisReport),
}

/// Message from a worker to the owning thread.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Job picked up by the blocking pool
    Started {
        /// Job
        job: JobId,
        /// Dataset the job works on
        dataset: String,
        /// Job kind
        kind: JobKind,
    },
    /// Job finished
    Finished {
        /// Job
        job: JobId,
        /// Dataset the job worked on
        dataset: String,
        /// Output or error
        outcome: Result<JobOutcome>,
    },
}

/// Dispatches jobs onto a tokio runtime's blocking pool.
pub struct TrainingWorker {
    runtime: Handle,
    events: UnboundedSender<WorkerEvent>,
    jobs: Arc<DashMap<JobId, JobState>>,
    next_id: AtomicU64,
}

impl TrainingWorker {
    /// Create a worker and the receiving end of its event channel.
    #[must_use]
    pub fn new(runtime: Handle) -> (Self, UnboundedReceiver<WorkerEvent>) {
        let (events, receiver) = unbounded_channel();
        let worker = Self {
            runtime,
            events,
            jobs: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        };
        (worker, receiver)
    }

    /// Train `table` in the background.
    pub fn submit_training(&self, table: Arc<TableHandle>, config: TrainingConfig) -> JobId {
        self.submit(table, JobKind::Train, move |t| {
            TrainingPipeline::new(config).train(t).map(JobOutcome::Trained)
        })
    }

    /// Analyze `table` in the background.
    pub fn submit_analysis(&self, table: Arc<TableHandle>) -> JobId {
        self.submit(table, JobKind::Analyze, |t| analyze(t).map(JobOutcome::Analyzed))
    }

    /// Current state of a job (`None` for an unknown id).
    #[must_use]
    pub fn job_state(&self, job: JobId) -> Option<JobState> {
        self.jobs.get(&job).map(|s| s.value().clone())
    }

    /// Jobs not yet in a terminal state.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.jobs.iter().filter(|e| !e.value().is_terminal()).count()
    }

    /// Jobs on the board, finished ones included until forgotten.
    #[must_use]
    pub fn tracked_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Drop a finished job from the board and return its last state.
    ///
    /// Queued and running jobs are kept; `None` is returned for them and for
    /// unknown ids.
    pub fn forget(&self, job: JobId) -> Option<JobState> {
        self.jobs
            .remove_if(&job, |_, state| state.is_terminal())
            .map(|(_, state)| state)
    }

    fn submit<F>(&self, table: Arc<TableHandle>, kind: JobKind, work: F) -> JobId
    where
        F: FnOnce(&TableHandle) -> Result<JobOutcome> + Send + 'static,
    {
        let job = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.jobs.insert(job, JobState::Queued);
        debug!(%job, dataset = table.name(), ?kind, "job queued");

        let jobs = Arc::clone(&self.jobs);
        let events = self.events.clone();
        let dataset = table.name().to_string();
        let blocking = self.runtime.spawn_blocking({
            let jobs = Arc::clone(&jobs);
            let events = events.clone();
            let dataset = dataset.clone();
            move || {
                jobs.insert(job, JobState::Running);
                // Receiver gone means the owner shut down; the job still completes.
                let _ = events.send(WorkerEvent::Started { job, dataset, kind });
                work(&table)
            }
        });

        self.runtime.spawn(async move {
            let outcome = blocking
                .await
                .unwrap_or_else(|e| Err(Error::TrainingFailed(format!("worker aborted: {e}"))));
            let state = match &outcome {
                Ok(_) => JobState::Succeeded,
                Err(e) => {
                    warn!(%job, dataset = %dataset, error = %e, "job failed");
                    JobState::Failed {
                        cause: e.to_string(),
                    }
                }
            };
            jobs.insert(job, state);
            let _ = events.send(WorkerEvent::Finished {
                job,
                dataset,
                outcome,
            });
        });
        job
    }
}

impl fmt::Debug for TrainingWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingWorker")
            .field("jobs", &self.jobs.len())
            .finish_non_exhaustive()
    }
}

/// Profile, describe and quick-fit one dataset.
///
/// A dataset that cannot be trained still gets a report, with
/// `quick_accuracy = None`.
///
/// # Errors
///
/// Returns an error only if the descriptive statistics cannot be computed
pub fn analyze(table: &TableHandle) -> Result<AnalysisReport> {
    let started = Instant::now();
    let profile = stats::profile(table);
    let summaries = stats::describe(table)?;
    let quick_accuracy = match TrainingPipeline::new(TrainingConfig::quick()).train(table) {
        Ok(record) => Some(record.metrics().accuracy()),
        Err(e) if e.is_recoverable() => None,
        Err(e) => return Err(e),
    };
    Ok(AnalysisReport {
        profile,
        summaries,
        quick_accuracy,
        elapsed_secs: started.elapsed().as_secs_f64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::test_support::linear_table;
    use std::time::Duration;
    use tokio::time::timeout;

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            n_estimators: 5,
            ..TrainingConfig::default()
        }
    }

    async fn next_finished(rx: &mut UnboundedReceiver<WorkerEvent>) -> (JobId, Result<JobOutcome>) {
        loop {
            let event = timeout(Duration::from_secs(30), rx.recv())
                .await
                .expect("worker timed out")
                .expect("channel closed");
            if let WorkerEvent::Finished { job, outcome, .. } = event {
                return (job, outcome);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_training_job_succeeds() {
        let (worker, mut rx) = TrainingWorker::new(Handle::current());
        let id = worker.submit_training(Arc::new(linear_table("lin", 60)), small_config());

        let (job, outcome) = next_finished(&mut rx).await;
        assert_eq!(job, id);
        match outcome.unwrap() {
            JobOutcome::Trained(record) => assert_eq!(record.source_dataset(), "lin"),
            JobOutcome::Analyzed(_) => panic!("expected a trained model"),
        }
        assert_eq!(worker.job_state(id), Some(JobState::Succeeded));
        assert_eq!(worker.pending_jobs(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_started_precedes_finished() {
        let (worker, mut rx) = TrainingWorker::new(Handle::current());
        let id = worker.submit_analysis(Arc::new(linear_table("lin", 40)));

        let first = timeout(Duration::from_secs(30), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(first, WorkerEvent::Started { job, kind: JobKind::Analyze, .. } if job == id));
        let (_, outcome) = next_finished(&mut rx).await;
        match outcome.unwrap() {
            JobOutcome::Analyzed(report) => {
                assert_eq!(report.profile.rows, 40);
                assert_eq!(report.summaries.len(), 3);
                assert!(report.quick_accuracy.is_some());
            }
            JobOutcome::Trained(_) => panic!("expected an analysis"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_job_recorded() {
        use arrow::array::StringArray;
        use arrow::datatypes::{DataType, Field, Schema};
        use arrow::record_batch::RecordBatch;

        let schema = Arc::new(Schema::new(vec![Field::new("s", DataType::Utf8, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec!["x", "y"]))]).unwrap();
        let (worker, mut rx) = TrainingWorker::new(Handle::current());
        let id = worker.submit_training(Arc::new(TableHandle::new("text", batch)), small_config());

        let (_, outcome) = next_finished(&mut rx).await;
        assert!(matches!(outcome, Err(Error::InsufficientFeatures { found: 0 })));
        assert!(matches!(worker.job_state(id), Some(JobState::Failed { .. })));

        assert!(matches!(worker.forget(id), Some(JobState::Failed { .. })));
        assert_eq!(worker.job_state(id), None);
        assert_eq!(worker.tracked_jobs(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_forget_finished_job() {
        let (worker, mut rx) = TrainingWorker::new(Handle::current());
        let id = worker.submit_analysis(Arc::new(linear_table("lin", 40)));
        assert_eq!(worker.forget(JobId(999)), None);

        let _ = next_finished(&mut rx).await;
        assert_eq!(worker.forget(id), Some(JobState::Succeeded));
        assert_eq!(worker.tracked_jobs(), 0);
    }

    #[test]
    fn test_analyze_untrainable_dataset() {
        use arrow::array::Int64Array;
        use arrow::datatypes::{DataType, Field, Schema};
        use arrow::record_batch::RecordBatch;

        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))]).unwrap();
        let report = analyze(&TableHandle::new("one", batch)).unwrap();
        assert_eq!(report.quick_accuracy, None);
        assert_eq!(report.summaries.len(), 1);
    }

    #[test]
    fn test_job_ids_are_sequential() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (worker, _rx) = TrainingWorker::new(rt.handle().clone());
        let a = worker.submit_analysis(Arc::new(linear_table("a", 10)));
        let b = worker.submit_analysis(Arc::new(linear_table("b", 10)));
        assert!(b > a);
        assert_eq!(a.to_string(), format!("job#{}", a.get()));
    }
}
