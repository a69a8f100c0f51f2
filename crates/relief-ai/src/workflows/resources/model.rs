//! Additive stock model: piecewise-linear trend, weekly and daily Fourier seasonality, and
//! standardised population-segment regressors, fitted as a penalised least-squares problem.

use chrono::{NaiveDateTime, Timelike};
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

use super::domain::ResourceSample;
use crate::workflows::sites::SegmentCounts;

const SECONDS_PER_DAY: f64 = 86_400.0;
const MAX_CHANGEPOINTS: usize = 25;
const CHANGEPOINT_RANGE: f64 = 0.8;
const CHANGEPOINT_PRIOR_SCALE: f64 = 0.05;
const SEASONALITY_PRIOR_SCALE: f64 = 10.0;
const REGRESSOR_PRIOR_SCALE: f64 = 10.0;
const WEEKLY_PERIOD_DAYS: f64 = 7.0;
const WEEKLY_ORDER: usize = 3;
const DAILY_ORDER: usize = 4;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("at least two samples are required, got {0}")]
    TooFewSamples(usize),
    #[error("penalised normal equations are not positive definite")]
    Singular,
}

#[derive(Debug, Clone, Copy)]
struct Standardiser {
    mean: f64,
    scale: f64,
}

impl Standardiser {
    fn fit(values: &[f64]) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = if values.len() > 1 {
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
        } else {
            0.0
        };
        let std = variance.sqrt();
        Self {
            mean,
            scale: if std > f64::EPSILON { std } else { 1.0 },
        }
    }

    fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }
}

/// Immutable fitted model for one stock series.
#[derive(Debug, Clone)]
pub(crate) struct StockModel {
    origin_days: f64,
    span_days: f64,
    changepoints: Vec<f64>,
    daily: bool,
    regressors: [Standardiser; 4],
    y_scale: f64,
    coefficients: DVector<f64>,
}

fn days_since_epoch(timestamp: NaiveDateTime) -> f64 {
    let utc = timestamp.and_utc();
    utc.timestamp() as f64 / SECONDS_PER_DAY
        + f64::from(utc.timestamp_subsec_nanos()) / (SECONDS_PER_DAY * 1e9)
}

impl StockModel {
    pub(crate) fn fit(samples: &[ResourceSample]) -> Result<Self, ModelError> {
        let n = samples.len();
        if n < 2 {
            return Err(ModelError::TooFewSamples(n));
        }

        let days: Vec<f64> = samples
            .iter()
            .map(|sample| days_since_epoch(sample.observed_at))
            .collect();
        let origin_days = days[0];
        let span_days = days[n - 1] - origin_days;
        if span_days <= 0.0 {
            return Err(ModelError::TooFewSamples(1));
        }

        let scaled: Vec<f64> = days.iter().map(|d| (d - origin_days) / span_days).collect();
        let changepoints = place_changepoints(&scaled);

        let first_time = samples[0].observed_at.time();
        let daily = samples
            .iter()
            .any(|sample| sample.observed_at.time() != first_time);

        let segments: Vec<[f64; 4]> = samples.iter().map(|s| s.population.as_array()).collect();
        let regressors = std::array::from_fn(|column| {
            let values: Vec<f64> = segments.iter().map(|row| row[column]).collect();
            Standardiser::fit(&values)
        });

        let y_scale = samples
            .iter()
            .map(|sample| sample.quantity.abs())
            .fold(0.0, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        let mut model = Self {
            origin_days,
            span_days,
            changepoints,
            daily,
            regressors,
            y_scale,
            coefficients: DVector::zeros(0),
        };

        let width = model.width();
        let mut design = DMatrix::<f64>::zeros(n, width);
        for (row, sample) in samples.iter().enumerate() {
            let features = model.features(sample.observed_at, &sample.population);
            for (column, value) in features.into_iter().enumerate() {
                design[(row, column)] = value;
            }
        }
        let target = DVector::from_iterator(n, samples.iter().map(|s| s.quantity / y_scale));

        let mut normal = design.transpose() * &design;
        for (index, penalty) in model.penalties().into_iter().enumerate() {
            normal[(index, index)] += penalty;
        }
        let rhs = design.transpose() * target;

        let cholesky = normal.cholesky().ok_or(ModelError::Singular)?;
        model.coefficients = cholesky.solve(&rhs);
        Ok(model)
    }

    pub(crate) fn predict(&self, at: NaiveDateTime, population: &SegmentCounts) -> f64 {
        let features = self.features(at, population);
        let value: f64 = features
            .iter()
            .zip(self.coefficients.iter())
            .map(|(x, beta)| x * beta)
            .sum();
        value * self.y_scale
    }

    fn width(&self) -> usize {
        let daily = if self.daily { 2 * DAILY_ORDER } else { 0 };
        2 + self.changepoints.len() + 2 * WEEKLY_ORDER + daily + self.regressors.len()
    }

    /// Diagonal ridge penalties matching each feature's prior scale. Intercept and base slope
    /// are left free.
    fn penalties(&self) -> Vec<f64> {
        let changepoint = CHANGEPOINT_PRIOR_SCALE.powi(-2);
        let seasonal = SEASONALITY_PRIOR_SCALE.powi(-2);
        let regressor = REGRESSOR_PRIOR_SCALE.powi(-2);

        let mut penalties = vec![0.0, 0.0];
        penalties.extend(std::iter::repeat(changepoint).take(self.changepoints.len()));
        penalties.extend(std::iter::repeat(seasonal).take(2 * WEEKLY_ORDER));
        if self.daily {
            penalties.extend(std::iter::repeat(seasonal).take(2 * DAILY_ORDER));
        }
        penalties.extend(std::iter::repeat(regressor).take(self.regressors.len()));
        penalties
    }

    fn features(&self, at: NaiveDateTime, population: &SegmentCounts) -> Vec<f64> {
        let days = days_since_epoch(at);
        let t = (days - self.origin_days) / self.span_days;

        let mut row = Vec::with_capacity(self.width());
        row.push(1.0);
        row.push(t);
        row.extend(self.changepoints.iter().map(|s| (t - s).max(0.0)));
        push_fourier(&mut row, days, WEEKLY_PERIOD_DAYS, WEEKLY_ORDER);
        if self.daily {
            let time_of_day = f64::from(at.num_seconds_from_midnight()) / SECONDS_PER_DAY;
            push_fourier(&mut row, time_of_day, 1.0, DAILY_ORDER);
        }
        row.extend(
            self.regressors
                .iter()
                .zip(population.as_array())
                .map(|(standardiser, value)| standardiser.apply(value)),
        );
        row
    }
}

fn push_fourier(row: &mut Vec<f64>, days: f64, period: f64, order: usize) {
    for k in 1..=order {
        let angle = 2.0 * PI * k as f64 * days / period;
        row.push(angle.sin());
        row.push(angle.cos());
    }
}

/// Evenly spaced candidate changepoints across the leading portion of the history.
fn place_changepoints(scaled: &[f64]) -> Vec<f64> {
    let history = (scaled.len() as f64 * CHANGEPOINT_RANGE).floor() as usize;
    let count = MAX_CHANGEPOINTS.min(history.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }

    let last_index = (history - 1) as f64;
    (1..=count)
        .map(|i| {
            let index = (i as f64 * last_index / count as f64).round() as usize;
            scaled[index]
        })
        .collect()
}
