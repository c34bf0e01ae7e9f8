//! In-memory registry of datasets and trained models
//!
//! Two name-keyed collections with insertion order kept for display.
//! Entries are stored behind `Arc`, so a [`RegistrySnapshot`] is a list of
//! pointer copies taken under one read lock: consistent at a single point in
//! time and unaffected by later mutation.
//!
//! Every mutation happens under the write lock, so concurrent readers see
//! an entry either fully present or absent.
//!
//! Models reference their source dataset by name only. Removing a dataset
//! never removes the models trained on it.

use crate::model::ModelRecord;
use crate::table::TableHandle;
use crate::{Error, Result};
use chrono::Local;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Name-keyed entries in insertion order.
#[derive(Debug)]
struct Entries<T> {
    order: Vec<String>,
    index: FxHashMap<String, Arc<T>>,
}

impl<T> Default for Entries<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<T> Entries<T> {
    fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn insert(&mut self, name: String, value: T) {
        self.order.push(name.clone());
        self.index.insert(name, Arc::new(value));
    }

    fn remove(&mut self, name: &str) -> Option<Arc<T>> {
        let removed = self.index.remove(name)?;
        self.order.retain(|n| n != name);
        Some(removed)
    }

    fn ordered(&self) -> Vec<Arc<T>> {
        self.order
            .iter()
            .filter_map(|n| self.index.get(n).cloned())
            .collect()
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

#[derive(Debug, Default)]
struct Inner {
    datasets: Entries<TableHandle>,
    models: Entries<ModelRecord>,
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistrySummary {
    /// Registered datasets
    pub datasets: usize,
    /// Registered models
    pub models: usize,
    /// Columns summed over all datasets
    pub total_columns: usize,
    /// Rows summed over all datasets
    pub total_rows: usize,
}

/// Point-in-time copy of the registry contents, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    /// Datasets
    pub datasets: Vec<Arc<TableHandle>>,
    /// Models
    pub models: Vec<Arc<ModelRecord>>,
}

impl RegistrySnapshot {
    /// True if there is nothing to persist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty() && self.models.is_empty()
    }

    /// Dataset by name.
    #[must_use]
    pub fn dataset(&self, name: &str) -> Option<&Arc<TableHandle>> {
        self.datasets.iter().find(|t| t.name() == name)
    }

    /// Model by name.
    #[must_use]
    pub fn model(&self, name: &str) -> Option<&Arc<ModelRecord>> {
        self.models.iter().find(|m| m.name() == name)
    }

    /// Counters over this snapshot.
    #[must_use]
    pub fn summary(&self) -> RegistrySummary {
        RegistrySummary {
            datasets: self.datasets.len(),
            models: self.models.len(),
            total_columns: self.datasets.iter().map(|t| t.num_columns()).sum(),
            total_rows: self.datasets.iter().map(|t| t.num_rows()).sum(),
        }
    }
}

/// Shared dataset/model registry.
///
/// # Example
///
/// ```rust
/// use datamine::registry::Registry;
/// use datamine::table::samples::mining_table;
///
/// # fn main() -> datamine::Result<()> {
/// let registry = Registry::new();
/// let first = registry.add_dataset("Ores", mining_table()?)?;
/// let second = registry.add_dataset("Ores", mining_table()?)?;
/// assert_eq!(first, "Ores");
/// assert_ne!(first, second);
/// assert_eq!(registry.snapshot().datasets.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave `Inner` half-updated:
    // every mutation is a single insert/remove pair, so poisoned data is
    // still consistent.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a dataset, disambiguating the name on collision.
    ///
    /// A taken name gets a `_v<HHMMSS>` suffix from the local clock, and a
    /// further `_<n>` if that is taken too. The stored table is renamed to
    /// the final key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank name
    pub fn add_dataset(&self, candidate: &str, table: TableHandle) -> Result<String> {
        let candidate = non_blank(candidate)?;
        let mut inner = self.write();
        let name = if inner.datasets.contains(candidate) {
            let stamped = format!("{candidate}_v{}", Local::now().format("%H%M%S"));
            first_free(&stamped, 2, |n| inner.datasets.contains(n))
        } else {
            candidate.to_string()
        };
        let rows = table.num_rows();
        let table = if table.name() == name {
            table
        } else {
            table.renamed(name.clone())
        };
        inner.datasets.insert(name.clone(), table);
        drop(inner);
        info!(dataset = %name, rows, "dataset added");
        Ok(name)
    }

    /// Remove a dataset. Models trained on it are kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if absent (registry unchanged)
    pub fn remove_dataset(&self, name: &str) -> Result<Arc<TableHandle>> {
        let removed = self
            .write()
            .datasets
            .remove(name)
            .ok_or_else(|| Error::dataset_not_found(name))?;
        info!(dataset = %name, "dataset removed");
        Ok(removed)
    }

    /// Register a model, disambiguating the name with a running count.
    ///
    /// A taken name becomes `<name>_<count+1>` (count = models registered),
    /// counting upward until free.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank name
    pub fn add_model(&self, candidate: &str, record: ModelRecord) -> Result<String> {
        let candidate = non_blank(candidate)?;
        let mut inner = self.write();
        let name = if inner.models.contains(candidate) {
            first_free(candidate, inner.models.len() + 1, |n| inner.models.contains(n))
        } else {
            candidate.to_string()
        };
        let accuracy = record.metrics().accuracy();
        inner.models.insert(name.clone(), record.with_name(name.clone()));
        drop(inner);
        info!(model = %name, accuracy, "model added");
        Ok(name)
    }

    /// Remove a model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if absent (registry unchanged)
    pub fn remove_model(&self, name: &str) -> Result<Arc<ModelRecord>> {
        let removed = self
            .write()
            .models
            .remove(name)
            .ok_or_else(|| Error::model_not_found(name))?;
        info!(model = %name, "model removed");
        Ok(removed)
    }

    /// Dataset by name.
    #[must_use]
    pub fn dataset(&self, name: &str) -> Option<Arc<TableHandle>> {
        self.read().datasets.index.get(name).cloned()
    }

    /// Model by name.
    #[must_use]
    pub fn model(&self, name: &str) -> Option<Arc<ModelRecord>> {
        self.read().models.index.get(name).cloned()
    }

    /// Flip a model's `active` flag.
    ///
    /// The stored record is replaced by a modified copy; snapshots taken
    /// earlier keep the old record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if absent
    pub fn set_model_active(&self, name: &str, active: bool) -> Result<()> {
        let mut inner = self.write();
        let slot = inner
            .models
            .index
            .get_mut(name)
            .ok_or_else(|| Error::model_not_found(name))?;
        *slot = Arc::new(slot.with_active(active));
        drop(inner);
        debug!(model = %name, active, "model flag updated");
        Ok(())
    }

    /// Default candidate name for the next model trained on `dataset`.
    #[must_use]
    pub fn next_model_name(&self, dataset: &str) -> String {
        format!("Model_{dataset}_{}", self.read().models.len() + 1)
    }

    /// Consistent copy of both collections.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        let inner = self.read();
        RegistrySnapshot {
            datasets: inner.datasets.ordered(),
            models: inner.models.ordered(),
        }
    }

    /// Dashboard counters.
    #[must_use]
    pub fn summary(&self) -> RegistrySummary {
        self.snapshot().summary()
    }

    /// Dataset names in insertion order.
    #[must_use]
    pub fn dataset_names(&self) -> Vec<String> {
        self.read().datasets.order.clone()
    }

    /// Model names in insertion order.
    #[must_use]
    pub fn model_names(&self) -> Vec<String> {
        self.read().models.order.clone()
    }
}

fn non_blank(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(Error::InvalidInput("name must not be blank".to_string()))
    } else {
        Ok(trimmed)
    }
}

/// `base` if free, else `base_<n>` for the first free `n >= start`.
fn first_free(base: &str, start: usize, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (start..)
        .map(|n| format!("{base}_{n}"))
        .find(|name| !taken(name))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::record;
    use crate::table::test_support::linear_table;
    use std::thread;

    #[test]
    fn test_add_dataset_unique_name_kept() {
        let registry = Registry::new();
        let name = registry.add_dataset("Ores", linear_table("x", 5)).unwrap();
        assert_eq!(name, "Ores");
        assert_eq!(registry.dataset("Ores").unwrap().name(), "Ores");
    }

    #[test]
    fn test_dataset_collision_gets_time_suffix() {
        let registry = Registry::new();
        registry.add_dataset("Ores", linear_table("Ores", 5)).unwrap();
        let second = registry.add_dataset("Ores", linear_table("Ores", 5)).unwrap();
        assert!(second.starts_with("Ores_v"));
        let suffix = &second["Ores_v".len()..second.len().min("Ores_v".len() + 6)];
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(registry.dataset(&second).unwrap().name(), second);
    }

    #[test]
    fn test_repeated_collisions_stay_unique() {
        let registry = Registry::new();
        let names: Vec<_> = (0..5)
            .map(|_| registry.add_dataset("Ores", linear_table("Ores", 3)).unwrap())
            .collect();
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 5);
        assert_eq!(registry.dataset_names(), names);
    }

    #[test]
    fn test_blank_name_rejected() {
        let registry = Registry::new();
        assert!(matches!(
            registry.add_dataset("  ", linear_table("x", 3)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_model_collision_uses_count() {
        let registry = Registry::new();
        registry.add_model("M", record("d", 0.5)).unwrap();
        let second = registry.add_model("M", record("d", 0.5)).unwrap();
        assert_eq!(second, "M_2");
        let third = registry.add_model("M", record("d", 0.5)).unwrap();
        assert_eq!(third, "M_3");
        assert_eq!(registry.model("M_3").unwrap().name(), "M_3");
    }

    #[test]
    fn test_next_model_name() {
        let registry = Registry::new();
        assert_eq!(registry.next_model_name("Ores"), "Model_Ores_1");
        registry.add_model("m", record("Ores", 0.5)).unwrap();
        assert_eq!(registry.next_model_name("Ores"), "Model_Ores_2");
    }

    #[test]
    fn test_remove_absent_is_not_found() {
        let registry = Registry::new();
        registry.add_dataset("d", linear_table("d", 3)).unwrap();
        assert!(matches!(
            registry.remove_dataset("nope"),
            Err(Error::NotFound { kind: "dataset", .. })
        ));
        assert!(matches!(
            registry.remove_model("nope"),
            Err(Error::NotFound { kind: "model", .. })
        ));
        assert_eq!(registry.summary().datasets, 1);
    }

    #[test]
    fn test_remove_dataset_keeps_models() {
        let registry = Registry::new();
        registry.add_dataset("Ores", linear_table("Ores", 3)).unwrap();
        registry.add_model("m", record("Ores", 0.9)).unwrap();
        registry.remove_dataset("Ores").unwrap();

        let snapshot = registry.snapshot();
        assert!(snapshot.datasets.is_empty());
        assert_eq!(snapshot.models.len(), 1);
        assert_eq!(snapshot.models[0].source_dataset(), "Ores");
        assert!(registry.dataset("Ores").is_none());
    }

    #[test]
    fn test_snapshot_isolated_from_later_mutation() {
        let registry = Registry::new();
        registry.add_dataset("a", linear_table("a", 3)).unwrap();
        registry.add_model("m", record("a", 0.7)).unwrap();
        let before = registry.snapshot();

        registry.add_dataset("b", linear_table("b", 3)).unwrap();
        registry.remove_model("m").unwrap();

        assert_eq!(before.datasets.len(), 1);
        assert_eq!(before.models.len(), 1);
        assert!(before.model("m").is_some());
    }

    #[test]
    fn test_set_model_active_copy_on_write() {
        let registry = Registry::new();
        registry.add_model("m", record("a", 0.7)).unwrap();
        let before = registry.snapshot();
        registry.set_model_active("m", false).unwrap();

        assert!(before.models[0].is_active());
        assert!(!registry.model("m").unwrap().is_active());
        assert!(registry.set_model_active("zz", true).is_err());
    }

    #[test]
    fn test_summary_counts() {
        let registry = Registry::new();
        registry.add_dataset("a", linear_table("a", 10)).unwrap();
        registry.add_dataset("b", linear_table("b", 5)).unwrap();
        registry.add_model("m", record("a", 0.7)).unwrap();
        assert_eq!(
            registry.summary(),
            RegistrySummary {
                datasets: 2,
                models: 1,
                total_columns: 8,
                total_rows: 15,
            }
        );
    }

    #[test]
    fn test_concurrent_readers_see_whole_entries() {
        let registry = Arc::new(Registry::new());
        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..200 {
                    let name = format!("d{i}");
                    registry.add_dataset(&name, linear_table(&name, 4)).unwrap();
                    if i % 3 == 0 {
                        registry.remove_dataset(&name).unwrap();
                    }
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let snapshot = registry.snapshot();
                        for table in &snapshot.datasets {
                            assert_eq!(table.num_rows(), 4);
                            assert!(table.name().starts_with('d'));
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(registry.summary().datasets, 133);
    }

    mod property_tests {
        use super::*;
        use quickcheck::{QuickCheck, TestResult};

        /// Property: every add yields a distinct key and the registry holds
        /// exactly as many models as were added
        fn prop_model_names_unique(picks: Vec<u8>) -> TestResult {
            if picks.len() > 40 {
                return TestResult::discard();
            }
            let registry = Registry::new();
            let mut names: Vec<String> = picks
                .iter()
                .map(|p| {
                    let candidate = format!("m{}", p % 4);
                    registry.add_model(&candidate, record("d", 0.5)).unwrap()
                })
                .collect();
            names.sort();
            names.dedup();
            TestResult::from_bool(
                names.len() == picks.len() && registry.summary().models == picks.len(),
            )
        }

        #[test]
        fn quickcheck_model_names_unique() {
            QuickCheck::new()
                .tests(100)
                .quickcheck(prop_model_names_unique as fn(Vec<u8>) -> TestResult);
        }
    }
}
