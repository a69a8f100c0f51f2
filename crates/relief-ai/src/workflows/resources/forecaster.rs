use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::domain::{ResourceSeries, ResourceType, SeriesError, SeriesKey};
use super::model::{ModelError, StockModel};
use crate::config::ForecastConfig;
use crate::workflows::sites::SiteId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{key} has {available} samples; at least {required} are needed to forecast")]
pub struct InsufficientHistoryError {
    pub key: SeriesKey,
    pub available: usize,
    pub required: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForecastError {
    #[error(transparent)]
    InsufficientHistory(#[from] InsufficientHistoryError),
    #[error("invalid resource series: {0}")]
    InvalidSeries(#[from] SeriesError),
    #[error("model fit failed for {key}: {source}")]
    Solver {
        key: SeriesKey,
        #[source]
        source: ModelError,
    },
    #[error("fit for {key} exceeded its {budget_ms}ms budget")]
    TimedOut { key: SeriesKey, budget_ms: u128 },
    #[error("fit for {key} was aborted: {reason}")]
    Aborted { key: SeriesKey, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastSettings {
    pub horizon_days: u32,
    pub minimum_history: usize,
    pub alert_window_days: i64,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            horizon_days: 60,
            minimum_history: 14,
            alert_window_days: 7,
        }
    }
}

impl From<&ForecastConfig> for ForecastSettings {
    fn from(config: &ForecastConfig) -> Self {
        Self {
            horizon_days: config.horizon_days,
            minimum_history: config.minimum_history,
            alert_window_days: config.alert_window_days,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub at: NaiveDateTime,
    pub quantity: f64,
}

/// Projection for one (site, resource) pair. Replaced wholesale on refit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceForecast {
    pub key: SeriesKey,
    pub country: String,
    pub last_observed: NaiveDateTime,
    pub last_quantity: f64,
    pub threshold: f64,
    pub points: Vec<ForecastPoint>,
    pub depletion_date: Option<NaiveDate>,
}

impl ResourceForecast {
    pub fn site_id(&self) -> &SiteId {
        &self.key.site_id
    }

    pub fn resource(&self) -> ResourceType {
        self.key.resource
    }

    /// Depletion before `reference + window_days` is worth escalating.
    pub fn depletes_within(&self, reference: NaiveDate, window_days: i64) -> bool {
        self.depletion_date
            .is_some_and(|date| date < reference + Duration::days(window_days))
    }

    pub fn depletion_alert(&self, reference: NaiveDate, window_days: i64) -> Option<DepletionAlert> {
        if !self.depletes_within(reference, window_days) {
            return None;
        }
        let depletion_date = self.depletion_date?;
        let projected_quantity = self
            .points
            .iter()
            .find(|point| point.at.date() == depletion_date)
            .map(|point| point.quantity)
            .unwrap_or(self.threshold);

        Some(DepletionAlert {
            site_id: self.key.site_id.clone(),
            country: self.country.clone(),
            resource: self.key.resource,
            depletion_date,
            threshold: self.threshold,
            projected_quantity,
            last_quantity: self.last_quantity,
        })
    }
}

/// A resource projected to fall below its floor inside the alert window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepletionAlert {
    pub site_id: SiteId,
    pub country: String,
    pub resource: ResourceType,
    pub depletion_date: NaiveDate,
    pub threshold: f64,
    pub projected_quantity: f64,
    pub last_quantity: f64,
}

impl DepletionAlert {
    pub fn subject(&self) -> String {
        format!(
            "{} depletion predicted at {} on {}",
            self.resource, self.site_id, self.depletion_date
        )
    }
}

/// First projected point strictly below `threshold`.
pub fn depletion_date(points: &[ForecastPoint], threshold: f64) -> Option<NaiveDate> {
    points
        .iter()
        .find(|point| point.quantity < threshold)
        .map(|point| point.at.date())
}

/// Fits one series. The batch runner only sees this seam.
pub trait SeriesFitter: Send + Sync + std::fmt::Debug {
    fn fit(&self, series: &ResourceSeries) -> Result<ResourceForecast, ForecastError>;
}

#[derive(Debug, Clone, Default)]
pub struct DepletionForecaster {
    settings: ForecastSettings,
}

impl DepletionForecaster {
    pub fn new(settings: ForecastSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    /// Fit the series and project `horizon_days` daily points past its last sample, holding
    /// the latest segment counts constant.
    pub fn forecast(&self, series: &ResourceSeries) -> Result<ResourceForecast, ForecastError> {
        let required = self.settings.minimum_history.max(2);
        let latest = match series.latest() {
            Some(latest) if series.len() >= required => latest,
            _ => {
                return Err(InsufficientHistoryError {
                    key: series.key().clone(),
                    available: series.len(),
                    required,
                }
                .into())
            }
        };

        let model = StockModel::fit(series.samples()).map_err(|source| ForecastError::Solver {
            key: series.key().clone(),
            source,
        })?;

        let population = latest.population;
        let points: Vec<ForecastPoint> = (1..=i64::from(self.settings.horizon_days))
            .map(|offset| {
                let at = latest.observed_at + Duration::days(offset);
                ForecastPoint {
                    at,
                    quantity: model.predict(at, &population),
                }
            })
            .collect();

        let threshold = series.resource().depletion_threshold();
        Ok(ResourceForecast {
            key: series.key().clone(),
            country: series.country().to_string(),
            last_observed: latest.observed_at,
            last_quantity: latest.quantity,
            threshold,
            depletion_date: depletion_date(&points, threshold),
            points,
        })
    }
}

impl SeriesFitter for DepletionForecaster {
    fn fit(&self, series: &ResourceSeries) -> Result<ResourceForecast, ForecastError> {
        self.forecast(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::resources::ResourceSample;
    use crate::workflows::sites::SegmentCounts;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn series(quantities: &[f64], resource: ResourceType) -> ResourceSeries {
        let population = SegmentCounts::new(30, 30, 30, 10);
        let samples = quantities
            .iter()
            .enumerate()
            .map(|(day, quantity)| {
                ResourceSample::on_date(
                    start() + Duration::days(day as i64),
                    *quantity,
                    100.0,
                    population,
                )
            })
            .collect();
        ResourceSeries::new(SiteId("camp-1".to_string()), "Kenya", resource, samples)
            .expect("valid series")
    }

    #[test]
    fn linear_consumption_depletes_after_five_days() {
        let quantities: Vec<f64> = (0..15).map(|day| 2400.0 - 100.0 * day as f64).collect();
        let forecast = DepletionForecaster::default()
            .forecast(&series(&quantities, ResourceType::Food))
            .expect("forecast");

        assert_eq!(forecast.points.len(), 60);
        assert_eq!(forecast.threshold, 500.0);
        let last_day = start() + Duration::days(14);
        let depletion = forecast.depletion_date.expect("depletes");
        let offset = (depletion - last_day).num_days();
        assert!((5..=6).contains(&offset), "depleted after {offset} days");
    }

    #[test]
    fn steady_stock_never_depletes() {
        let quantities = vec![8000.0; 21];
        let forecast = DepletionForecaster::default()
            .forecast(&series(&quantities, ResourceType::Water))
            .expect("forecast");
        assert!(forecast.depletion_date.is_none());
        assert!(!forecast.depletes_within(start(), 7));
    }

    #[test]
    fn short_history_is_rejected() {
        let quantities = vec![1000.0; 13];
        let error = DepletionForecaster::default()
            .forecast(&series(&quantities, ResourceType::Food))
            .expect_err("too short");
        match error {
            ForecastError::InsufficientHistory(error) => {
                assert_eq!(error.available, 13);
                assert_eq!(error.required, 14);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn alert_window_is_exclusive() {
        let quantities: Vec<f64> = (0..15).map(|day| 2400.0 - 100.0 * day as f64).collect();
        let forecast = DepletionForecaster::default()
            .forecast(&series(&quantities, ResourceType::Food))
            .expect("forecast");
        let depletion = forecast.depletion_date.expect("depletes");

        assert!(forecast.depletes_within(depletion - Duration::days(6), 7));
        assert!(!forecast.depletes_within(depletion - Duration::days(7), 7));

        let alert = forecast
            .depletion_alert(depletion - Duration::days(1), 7)
            .expect("alert");
        assert_eq!(alert.resource, ResourceType::Food);
        assert_eq!(alert.country, "Kenya");
        assert!(alert.projected_quantity < 500.0);
    }

    #[test]
    fn first_breach_wins() {
        let at = |d: i64| (start() + Duration::days(d)).and_time(chrono::NaiveTime::MIN);
        let points = vec![
            ForecastPoint { at: at(1), quantity: 700.0 },
            ForecastPoint { at: at(2), quantity: 400.0 },
            ForecastPoint { at: at(3), quantity: 900.0 },
            ForecastPoint { at: at(4), quantity: 100.0 },
        ];
        assert_eq!(depletion_date(&points, 500.0), Some(start() + Duration::days(2)));
        assert_eq!(depletion_date(&points, 50.0), None);
    }
}
