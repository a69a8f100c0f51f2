use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::domain::{ResourceSeries, SeriesKey};
use super::forecaster::{DepletionAlert, ForecastError, ResourceForecast, SeriesFitter};
use crate::config::ForecastConfig;

/// Latest fitted forecast per series. Readers get an `Arc` to a complete snapshot; a refit
/// swaps the `Arc` and never mutates one in place.
#[derive(Debug, Default)]
pub struct ForecastSnapshots {
    inner: RwLock<HashMap<SeriesKey, Arc<ResourceForecast>>>,
}

impl ForecastSnapshots {
    pub fn get(&self, key: &SeriesKey) -> Option<Arc<ResourceForecast>> {
        self.read().get(key).cloned()
    }

    pub fn replace(&self, forecast: ResourceForecast) -> Arc<ResourceForecast> {
        let snapshot = Arc::new(forecast);
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(snapshot.key.clone(), Arc::clone(&snapshot));
        snapshot
    }

    /// Every snapshot ordered by key.
    pub fn all(&self) -> Vec<Arc<ResourceForecast>> {
        let mut snapshots: Vec<_> = self.read().values().cloned().collect();
        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn depletion_alerts(&self, reference: NaiveDate, window_days: i64) -> Vec<DepletionAlert> {
        self.all()
            .iter()
            .filter_map(|forecast| forecast.depletion_alert(reference, window_days))
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SeriesKey, Arc<ResourceForecast>>> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub workers: usize,
    pub fit_budget: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            fit_budget: Duration::from_secs(30),
        }
    }
}

impl From<&ForecastConfig> for BatchSettings {
    fn from(config: &ForecastConfig) -> Self {
        Self {
            workers: config.workers,
            fit_budget: config.fit_budget,
        }
    }
}

/// Result of one series within a batch.
#[derive(Debug, Clone)]
pub enum FitOutcome {
    Refreshed(Arc<ResourceForecast>),
    Skipped(ForecastError),
}

#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub key: SeriesKey,
    pub outcome: FitOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn refreshed(&self) -> impl Iterator<Item = &Arc<ResourceForecast>> {
        self.entries.iter().filter_map(|entry| match &entry.outcome {
            FitOutcome::Refreshed(forecast) => Some(forecast),
            FitOutcome::Skipped(_) => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&SeriesKey, &ForecastError)> {
        self.entries.iter().filter_map(|entry| match &entry.outcome {
            FitOutcome::Skipped(error) => Some((&entry.key, error)),
            FitOutcome::Refreshed(_) => None,
        })
    }
}

/// Fits independent series concurrently on the blocking pool, bounded by a worker count
/// and a per-fit time budget.
#[derive(Debug, Clone)]
pub struct ForecastBatchRunner {
    forecaster: Arc<dyn SeriesFitter>,
    snapshots: Arc<ForecastSnapshots>,
    settings: BatchSettings,
}

impl ForecastBatchRunner {
    pub fn new(
        forecaster: Arc<dyn SeriesFitter>,
        snapshots: Arc<ForecastSnapshots>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            forecaster,
            snapshots,
            settings,
        }
    }

    pub fn snapshots(&self) -> &Arc<ForecastSnapshots> {
        &self.snapshots
    }

    /// Refit every series. Failures are per series: the prior snapshot for a failed or
    /// timed-out fit is kept.
    pub async fn run(&self, series: Vec<ResourceSeries>) -> BatchReport {
        let permits = Arc::new(Semaphore::new(self.settings.workers.max(1)));
        let mut tasks = JoinSet::new();

        for (index, item) in series.into_iter().enumerate() {
            let permits = Arc::clone(&permits);
            let forecaster = Arc::clone(&self.forecaster);
            let budget = self.settings.fit_budget;

            tasks.spawn(async move {
                let key = item.key().clone();
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => fit_within_budget(forecaster, item, budget).await,
                    Err(_) => Err(ForecastError::Aborted {
                        key: key.clone(),
                        reason: "worker pool closed".to_string(),
                    }),
                };
                (index, key, outcome)
            });
        }

        let mut finished = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => finished.push(result),
                Err(err) => warn!(error = %err, "forecast task failed to join"),
            }
        }
        finished.sort_by_key(|(index, _, _)| *index);

        let mut report = BatchReport::default();
        for (_, key, outcome) in finished {
            let outcome = match outcome {
                Ok(forecast) => FitOutcome::Refreshed(self.snapshots.replace(forecast)),
                Err(error) => {
                    warn!(series = %key, error = %error, "forecast skipped");
                    FitOutcome::Skipped(error)
                }
            };
            report.entries.push(BatchEntry { key, outcome });
        }

        info!(
            refreshed = report.refreshed().count(),
            skipped = report.skipped().count(),
            "forecast batch complete"
        );
        report
    }
}

async fn fit_within_budget(
    forecaster: Arc<dyn SeriesFitter>,
    series: ResourceSeries,
    budget: Duration,
) -> Result<ResourceForecast, ForecastError> {
    let key = series.key().clone();
    let task = tokio::task::spawn_blocking(move || forecaster.fit(&series));

    match tokio::time::timeout(budget, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(ForecastError::Aborted {
            key,
            reason: join_error.to_string(),
        }),
        Err(_) => Err(ForecastError::TimedOut {
            key,
            budget_ms: budget.as_millis(),
        }),
    }
}
