use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::data::filter::distinct_sorted;
use crate::data::loader::Source;
use crate::data::model::{KnownColumn, Table};
use crate::error::SchemaError;

// ---------------------------------------------------------------------------
// Dataset – one immutable load of the feedback table
// ---------------------------------------------------------------------------

/// The base table plus the selection lists derived from it at load time.
#[derive(Debug)]
pub struct Dataset {
    pub table: Table,
    pub ai_models: Vec<String>,
    pub project_names: Vec<String>,
}

impl Dataset {
    pub fn new(table: Table) -> Result<Self, SchemaError> {
        let ai_models = distinct_sorted(&table, KnownColumn::AiModel.name())?;
        let project_names = distinct_sorted(&table, KnownColumn::ProjectName.name())?;
        Ok(Dataset {
            table,
            ai_models,
            project_names,
        })
    }
}

/// Process-wide handle to the current dataset.
///
/// Readers take an `Arc` snapshot and keep filtering against it even if a
/// refresh swaps in a new dataset meanwhile. The lock is only held for the
/// pointer copy or swap, never while filtering.
#[derive(Debug)]
pub struct SharedDataset {
    current: RwLock<Arc<Dataset>>,
}

impl SharedDataset {
    pub fn new(dataset: Dataset) -> Self {
        SharedDataset {
            current: RwLock::new(Arc::new(dataset)),
        }
    }

    pub fn snapshot(&self) -> Arc<Dataset> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install `next` and return the dataset it replaced.
    pub fn replace(&self, next: Arc<Dataset>) -> Arc<Dataset> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, next)
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// State shared by every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub dataset: Arc<SharedDataset>,
    pub source: Arc<Source>,
    // Held for the whole load-and-swap so an older load never lands last.
    refresh_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(dataset: Dataset, source: Source) -> Self {
        AppState {
            dataset: Arc::new(SharedDataset::new(dataset)),
            source: Arc::new(source),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Reload from the source and swap the result in. On failure the
    /// current dataset stays untouched.
    pub async fn refresh(&self) -> Result<Arc<Dataset>> {
        let _guard = self.refresh_lock.lock().await;
        let table = self.source.load().await?;
        let current = Arc::new(Dataset::new(table)?);
        let previous = self.dataset.replace(current.clone());
        log::info!(
            "dataset refreshed from {}: {} -> {} rows",
            self.source,
            previous.table.len(),
            current.table.len()
        );
        Ok(current)
    }

    /// Refresh every `every` in the background until the runtime shuts down.
    pub fn spawn_periodic_refresh(&self, every: Duration) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately and the startup load is fresh.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = state.refresh().await {
                    log::warn!("periodic refresh failed, keeping current dataset: {err:#}");
                }
            }
        })
    }
}
