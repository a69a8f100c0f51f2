//! Resource depletion forecasting per (site, resource) stock line.

mod batch;
mod domain;
mod forecaster;
mod importer;
mod model;

pub use batch::{
    BatchEntry, BatchReport, BatchSettings, FitOutcome, ForecastBatchRunner, ForecastSnapshots,
};
pub use domain::{
    ResourceSample, ResourceSeries, ResourceType, SeriesError, SeriesKey, UnknownResourceType,
};
pub use forecaster::{
    depletion_date, DepletionAlert, DepletionForecaster, ForecastError, ForecastPoint,
    ForecastSettings, InsufficientHistoryError, ResourceForecast, SeriesFitter,
};
pub use importer::{ResourceHistoryImporter, ResourceImportError};
pub use model::ModelError;
