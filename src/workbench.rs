//! Presentation-facing facade
//!
//! A [`Workbench`] bundles the registry, configuration, the background
//! training worker and its event queue. Front ends call it from their own
//! (primary) thread and receive plain data only.
//!
//! Background jobs never mutate the registry themselves. Their results are
//! applied when the owner calls [`Workbench::poll_updates`] (or awaits
//! [`Workbench::next_update`]), so registry mutation stays on the owner's
//! thread.

use crate::config::WorkbenchConfig;
use crate::model::{compare_models, ComparisonEntry, ModelRecord, Tier};
use crate::persistence::autosave::{self, AutosaveHandle};
use crate::persistence::{self, export, SaveReport};
use crate::registry::{Registry, RegistrySummary};
use crate::table::stats::{self, DatasetProfile};
use crate::table::{loader, samples, TableHandle};
use crate::training::worker::{AnalysisReport, JobId, JobKind, JobOutcome, JobState, TrainingWorker, WorkerEvent};
use crate::training::TrainingPipeline;
use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

/// Status line for the presentation layer.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    /// A background job started
    Started {
        /// Job
        job: JobId,
        /// Dataset
        dataset: String,
        /// Job kind
        kind: JobKind,
    },
    /// A trained model was registered
    ModelTrained {
        /// Job
        job: JobId,
        /// Registered model name
        model: String,
        /// Held-out R²
        accuracy: f64,
        /// Tier of `accuracy`
        tier: Tier,
    },
    /// An analysis finished
    Analyzed {
        /// Job
        job: JobId,
        /// Results
        report: Box<AnalysisReport>,
    },
    /// A job failed
    Failed {
        /// Job
        job: JobId,
        /// Dataset
        dataset: String,
        /// Error message
        message: String,
    },
}

impl StatusUpdate {
    /// Job the update refers to.
    #[must_use]
    pub const fn job(&self) -> JobId {
        match self {
            Self::Started { job, .. }
            | Self::ModelTrained { job, .. }
            | Self::Analyzed { job, .. }
            | Self::Failed { job, .. } => *job,
        }
    }

    /// Whether this update ends its job.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        !matches!(self, Self::Started { .. })
    }
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { dataset, kind, .. } => match kind {
                JobKind::Train => write!(f, "Training on '{dataset}'..."),
                JobKind::Analyze => write!(f, "Analyzing '{dataset}'..."),
            },
            Self::ModelTrained {
                model,
                accuracy,
                tier,
                ..
            } => write!(f, "Model '{model}' trained: R² = {accuracy:.4} ({tier})"),
            Self::Analyzed { report, .. } => write!(
                f,
                "Analysis of '{}' finished in {:.2}s",
                report.profile.name, report.elapsed_secs
            ),
            Self::Failed {
                dataset, message, ..
            } => write!(f, "Job on '{dataset}' failed: {message}"),
        }
    }
}

/// Registry + configuration + background worker.
pub struct Workbench {
    config: WorkbenchConfig,
    registry: Arc<Registry>,
    worker: TrainingWorker,
    events: UnboundedReceiver<WorkerEvent>,
    runtime: Handle,
}

impl fmt::Debug for Workbench {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workbench")
            .field("config", &self.config)
            .field("summary", &self.registry.summary())
            .finish_non_exhaustive()
    }
}

impl Workbench {
    /// Empty workbench whose background work runs on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid
    pub fn new(config: WorkbenchConfig, runtime: Handle) -> Result<Self> {
        config.validate()?;
        let (worker, events) = TrainingWorker::new(runtime.clone());
        Ok(Self {
            config,
            registry: Arc::new(Registry::new()),
            worker,
            events,
            runtime,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkbenchConfig {
        &self.config
    }

    /// Shared registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Load a file and register it under a name derived from the file name.
    ///
    /// # Errors
    ///
    /// Returns the loader error, see [`loader::load_table`]
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<String> {
        let table = loader::load_table(path)?;
        let candidate = table.name().to_string();
        self.registry.add_dataset(&candidate, table)
    }

    /// Register the two built-in example datasets.
    ///
    /// # Errors
    ///
    /// Returns error if generation fails
    pub fn load_samples(&self) -> Result<Vec<String>> {
        samples::example_tables()?
            .into_iter()
            .map(|table| {
                let candidate = table.name().to_string();
                self.registry.add_dataset(&candidate, table)
            })
            .collect()
    }

    /// Register a table under `name` (disambiguated on collision).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank name
    pub fn add_dataset(&self, name: &str, table: TableHandle) -> Result<String> {
        self.registry.add_dataset(name, table)
    }

    /// Remove a dataset (its models stay).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if absent
    pub fn remove_dataset(&self, name: &str) -> Result<()> {
        self.registry.remove_dataset(name).map(drop)
    }

    /// Remove a model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if absent
    pub fn remove_model(&self, name: &str) -> Result<()> {
        self.registry.remove_model(name).map(drop)
    }

    /// Mark a model active or inactive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if absent
    pub fn set_model_active(&self, name: &str, active: bool) -> Result<()> {
        self.registry.set_model_active(name, active)
    }

    fn dataset(&self, name: &str) -> Result<Arc<TableHandle>> {
        self.registry
            .dataset(name)
            .ok_or_else(|| Error::dataset_not_found(name))
    }

    fn register_model(&self, record: ModelRecord) -> Result<String> {
        let candidate = self.registry.next_model_name(record.source_dataset());
        self.registry.add_model(&candidate, record)
    }

    /// Train on a dataset on the calling thread and register the model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown dataset, or the pipeline's
    /// error (the registry is left untouched)
    pub fn train(&self, dataset: &str) -> Result<String> {
        let table = self.dataset(dataset)?;
        let record = TrainingPipeline::new(self.config.training.clone()).train(&table)?;
        self.register_model(record)
    }

    /// Train on a dataset in the background.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown dataset
    pub fn submit_training(&self, dataset: &str) -> Result<JobId> {
        let table = self.dataset(dataset)?;
        Ok(self
            .worker
            .submit_training(table, self.config.training.clone()))
    }

    /// Analyze a dataset in the background.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown dataset
    pub fn submit_analysis(&self, dataset: &str) -> Result<JobId> {
        let table = self.dataset(dataset)?;
        Ok(self.worker.submit_analysis(table))
    }

    /// State of a background job.
    ///
    /// A job leaves the board once its final update has been applied, after
    /// which this returns `None`.
    #[must_use]
    pub fn job_state(&self, job: JobId) -> Option<JobState> {
        self.worker.job_state(job)
    }

    /// Background jobs not yet finished.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.worker.pending_jobs()
    }

    /// Jobs still on the board (pending, or finished but not yet applied).
    #[must_use]
    pub fn tracked_jobs(&self) -> usize {
        self.worker.tracked_jobs()
    }

    /// Apply every worker event received so far, without blocking.
    pub fn poll_updates(&mut self) -> Vec<StatusUpdate> {
        let mut updates = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => updates.push(self.apply(event)),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        updates
    }

    /// Wait for the next worker event and apply it.
    ///
    /// Returns `None` once the worker is gone.
    pub async fn next_update(&mut self) -> Option<StatusUpdate> {
        let event = self.events.recv().await?;
        Some(self.apply(event))
    }

    fn apply(&self, event: WorkerEvent) -> StatusUpdate {
        match event {
            WorkerEvent::Started { job, dataset, kind } => StatusUpdate::Started { job, dataset, kind },
            WorkerEvent::Finished {
                job,
                dataset,
                outcome,
            } => {
                self.worker.forget(job);
                match outcome.and_then(|o| self.apply_outcome(job, o)) {
                    Ok(update) => update,
                    Err(e) => {
                        warn!(%job, dataset = %dataset, error = %e, "background job failed");
                        StatusUpdate::Failed {
                            job,
                            dataset,
                            message: e.to_string(),
                        }
                    }
                }
            }
        }
    }

    fn apply_outcome(&self, job: JobId, outcome: JobOutcome) -> Result<StatusUpdate> {
        match outcome {
            JobOutcome::Trained(record) => {
                let accuracy = record.metrics().accuracy();
                let tier = record.tier();
                let model = self.register_model(record)?;
                Ok(StatusUpdate::ModelTrained {
                    job,
                    model,
                    accuracy,
                    tier,
                })
            }
            JobOutcome::Analyzed(report) => Ok(StatusUpdate::Analyzed {
                job,
                report: Box::new(report),
            }),
        }
    }

    /// Profile of a registered dataset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown dataset
    pub fn profile(&self, dataset: &str) -> Result<DatasetProfile> {
        let table = self.dataset(dataset)?;
        Ok(stats::profile(&table))
    }

    /// Side-by-side accuracy of the first `limit` models.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] with fewer than two models
    pub fn compare_models(&self, limit: usize) -> Result<Vec<ComparisonEntry>> {
        compare_models(&self.registry.snapshot().models, limit)
    }

    /// Dashboard counters.
    #[must_use]
    pub fn summary(&self) -> RegistrySummary {
        self.registry.summary()
    }

    /// Save every dataset and model under `dir`.
    ///
    /// # Errors
    ///
    /// See [`persistence::save_all`]
    pub fn save_all(&self, dir: impl AsRef<Path>) -> Result<SaveReport> {
        persistence::save_all(
            &self.registry.snapshot(),
            dir.as_ref(),
            &self.config.workspace_name,
        )
    }

    /// Export a dataset's descriptive statistics as CSV into `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] or the export error
    pub fn export_statistics(&self, dataset: &str, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let table = self.dataset(dataset)?;
        export::export_describe_csv(&table, dir.as_ref())
    }

    /// Export a dataset's text report into `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] or the export error
    pub fn export_report(&self, dataset: &str, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let table = self.dataset(dataset)?;
        export::export_report(&table, dir.as_ref())
    }

    /// Start the periodic backup with the configured interval and directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the backup directory cannot be resolved,
    /// or [`Error::InvalidInput`] for a zero interval
    pub fn start_autosave(&self) -> Result<AutosaveHandle> {
        let dir = self.config.autosave.resolve_backup_dir()?;
        info!(dir = %dir.display(), "starting autosave");
        autosave::spawn(
            Arc::clone(&self.registry),
            dir,
            self.config.autosave.interval(),
            &self.runtime,
        )
    }
}
