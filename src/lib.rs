//! # Datamine: Dataset Registry and Regression Workbench
//!
//! **Version**: 0.3.0
//!
//! Datamine keeps named tabular datasets and the regression models trained on
//! them in one in-memory registry, trains seeded random-forest regressors with
//! reproducible metrics, buckets model quality into tiers, and persists the
//! registry on demand and on a background timer.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: Fixed seed (42) for split and ensemble, so identical
//!   inputs give bit-identical metrics
//! - **Poka-Yoke safety**: Typed column kinds are derived once; training
//!   preconditions fail with explicit errors before any work is done
//! - **Heijunka**: CPU-bound fits run on a blocking pool and report back
//!   through events; the registry is only mutated by its owner
//! - **Genchi Genbutsu**: Every state change is logged with `tracing`
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use datamine::config::WorkbenchConfig;
//! use datamine::workbench::Workbench;
//!
//! # #[tokio::main]
//! # async fn main() -> datamine::Result<()> {
//! let bench = Workbench::new(WorkbenchConfig::default(), tokio::runtime::Handle::current())?;
//! bench.load_samples()?;
//!
//! let model = bench.train("Mining 2026")?;
//! let record = bench.registry().model(&model).expect("just registered");
//! println!("{model}: R² = {:.3} ({})", record.metrics().accuracy(), record.tier());
//!
//! let report = bench.save_all("workspace")?;
//! println!("{} datasets, {} models saved", report.datasets_saved, report.models_saved);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod persistence;
pub mod registry;
pub mod table;
pub mod training;
pub mod workbench;

pub use error::{Error, Result};
pub use model::{classify, Metrics, ModelRecord, Tier};
pub use registry::{Registry, RegistrySnapshot, RegistrySummary};
pub use table::TableHandle;
pub use training::{train, TrainingPipeline};
pub use workbench::{StatusUpdate, Workbench};
