//! Periodic background backup
//!
//! Every `interval` the task takes a [`Registry::snapshot`]. If it is not
//! empty, the snapshot is written into the backup directory on tokio's
//! blocking pool:
//!
//! ```text
//! <backup>/autosave_dataset_<name>_<YYYYmmdd_HHMMSS>_<tick>.csv   per dataset
//! <backup>/autosave_models_<YYYYmmdd_HHMMSS>_<tick>.json          when models exist
//! ```
//!
//! Each tick creates new files and overwrites nothing. A failed tick is
//! logged and the next one still fires.
//!
//! ```text
//! Idle ──tick──> Ticking ──> Idle ──tick──> ...
//!   └──shutdown──> Stopped
//! ```

use super::{clean_item_name, create_unique, file_timestamp, item_error, write_csv, write_json, SaveFailure};
use crate::model::Metrics;
use crate::registry::{Registry, RegistrySnapshot};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Model entry of an autosave models file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutosaveModelEntry {
    /// Source dataset
    pub dataset: String,
    /// Target column
    pub target: String,
    /// Feature columns
    pub features: Vec<String>,
    /// Accuracy / error / cost
    pub metrics: Metrics,
    /// Creation time
    pub created: DateTime<Utc>,
}

/// Files written (and items skipped) by one tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Tick number, starting at 1
    pub tick: u64,
    /// New files
    pub files: Vec<PathBuf>,
    /// Items that could not be written
    pub failures: Vec<SaveFailure>,
}

/// Write one backup of `snapshot` into `backup_dir`.
///
/// An empty snapshot writes nothing.
///
/// # Errors
///
/// Returns error if the backup directory cannot be created or the models
/// file cannot be written; a failing dataset is recorded in the report.
pub fn run_tick(snapshot: &RegistrySnapshot, backup_dir: &Path, tick: u64) -> Result<TickReport> {
    let mut report = TickReport {
        tick,
        ..TickReport::default()
    };
    if snapshot.is_empty() {
        return Ok(report);
    }
    std::fs::create_dir_all(backup_dir)?;
    let timestamp = file_timestamp();

    for table in &snapshot.datasets {
        let written = clean_item_name(table.name()).and_then(|clean| {
            let stem = format!("autosave_dataset_{clean}_{timestamp}_{tick}");
            let (file, path) = create_unique(backup_dir, &stem, "csv")?;
            write_csv(table.batch(), file)?;
            Ok(path)
        });
        match written {
            Ok(path) => report.files.push(path),
            Err(e) => {
                let e = item_error(table.name(), e);
                warn!(tick, dataset = table.name(), error = %e, "autosave skipped dataset");
                report.failures.push(SaveFailure::from(e));
            }
        }
    }

    if !snapshot.models.is_empty() {
        let entries: BTreeMap<&str, AutosaveModelEntry> = snapshot
            .models
            .iter()
            .map(|m| {
                (
                    m.name(),
                    AutosaveModelEntry {
                        dataset: m.source_dataset().to_string(),
                        target: m.target_column().to_string(),
                        features: m.feature_columns().to_vec(),
                        metrics: *m.metrics(),
                        created: m.created_at(),
                    },
                )
            })
            .collect();
        let stem = format!("autosave_models_{timestamp}_{tick}");
        let (file, path) = create_unique(backup_dir, &stem, "json")?;
        write_json(&entries, file)?;
        report.files.push(path);
    }
    Ok(report)
}

/// Running autosave task.
///
/// Dropping the handle also stops the task.
#[derive(Debug)]
pub struct AutosaveHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<u64>,
    ticks: Arc<AtomicU64>,
    backup_dir: PathBuf,
}

impl AutosaveHandle {
    /// Ticks that found something to save.
    #[must_use]
    pub fn completed_ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Directory backups are written to.
    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Stop the timer and wait for an in-flight tick to finish.
    ///
    /// Returns the number of completed ticks.
    pub async fn shutdown(mut self) -> u64 {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match (&mut self.task).await {
            Ok(ticks) => ticks,
            Err(e) => {
                error!(error = %e, "autosave task ended abnormally");
                self.completed_ticks()
            }
        }
    }
}

/// Start the autosave loop on `runtime`.
///
/// The first backup happens one full `period` after the start.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for a zero `period`
pub fn spawn(
    registry: Arc<Registry>,
    backup_dir: PathBuf,
    period: Duration,
    runtime: &Handle,
) -> Result<AutosaveHandle> {
    if period.is_zero() {
        return Err(Error::InvalidInput(
            "autosave period must be greater than zero".to_string(),
        ));
    }
    let (stop, mut stopped) = oneshot::channel::<()>();
    let ticks = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&ticks);
    let dir = backup_dir.clone();
    info!(dir = %backup_dir.display(), seconds = period.as_secs_f64(), "autosave started");

    let task = runtime.spawn(async move {
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval completes immediately.
        timer.tick().await;
        let mut tick = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = &mut stopped => break,
                _ = timer.tick() => {}
            }
            tick += 1;
            let snapshot = registry.snapshot();
            if snapshot.is_empty() {
                debug!(tick, "autosave tick: registry empty");
                continue;
            }
            let dir = dir.clone();
            let outcome =
                tokio::task::spawn_blocking(move || run_tick(&snapshot, &dir, tick)).await;
            match outcome {
                Ok(Ok(report)) => {
                    counter.fetch_add(1, Ordering::AcqRel);
                    info!(
                        tick,
                        files = report.files.len(),
                        failures = report.failures.len(),
                        "autosave completed"
                    );
                }
                Ok(Err(e)) => error!(tick, error = %e, "autosave tick failed"),
                Err(e) => error!(tick, error = %e, "autosave tick aborted"),
            }
        }
        info!(ticks = tick, "autosave stopped");
        counter.load(Ordering::Acquire)
    });

    Ok(AutosaveHandle {
        stop: Some(stop),
        task,
        ticks,
        backup_dir,
    })
}
