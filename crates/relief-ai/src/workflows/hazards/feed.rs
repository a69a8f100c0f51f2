use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::warn;

use super::domain::{AlertLevel, HazardEvent};
use crate::geo::Coordinates;

/// Source of hazard-event snapshots for one poll.
pub trait HazardFeed: Send + Sync {
    fn fetch(&self) -> Result<Vec<HazardEvent>, UpstreamFeedError>;
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamFeedError {
    #[error("hazard feed unreachable: {0}")]
    Unreachable(String),
    #[error("hazard feed payload malformed: {0}")]
    Malformed(String),
    #[error("failed to read hazard feed: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads a GeoJSON feature collection saved to disk.
#[derive(Debug, Clone)]
pub struct FileHazardFeed {
    path: PathBuf,
}

impl FileHazardFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HazardFeed for FileHazardFeed {
    fn fetch(&self) -> Result<Vec<HazardEvent>, UpstreamFeedError> {
        let bytes = std::fs::read(&self.path)?;
        parse_feature_collection(&bytes)
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Properties,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Value,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(default)]
    eventid: Value,
    #[serde(default)]
    eventtype: Option<String>,
    #[serde(default)]
    alertlevel: Option<String>,
    #[serde(default)]
    alertscore: Value,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    fromdate: Option<String>,
    #[serde(default)]
    severitydata: Option<SeverityData>,
}

#[derive(Debug, Default, Deserialize)]
struct SeverityData {
    #[serde(default)]
    severity: Value,
}

/// Parse a GDACS-style feature collection, dropping features without usable coordinates or id.
pub fn parse_feature_collection(bytes: &[u8]) -> Result<Vec<HazardEvent>, UpstreamFeedError> {
    let collection: FeatureCollection = serde_json::from_slice(bytes)
        .map_err(|err| UpstreamFeedError::Malformed(err.to_string()))?;

    let mut events = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let props = feature.properties;
        let Some(id) = scalar_to_string(&props.eventid) else {
            warn!("skipping hazard feature without an event id");
            continue;
        };
        let Some(coordinates) = feature.geometry.as_ref().and_then(point_coordinates) else {
            warn!(event_id = %id, "skipping hazard event with missing coordinates");
            continue;
        };

        let alert_level = props
            .alertlevel
            .as_deref()
            .and_then(|level| level.parse::<AlertLevel>().ok())
            .unwrap_or(AlertLevel::Green);

        events.push(HazardEvent {
            id,
            event_type: props.eventtype.unwrap_or_else(|| "Unknown".to_string()),
            alert_level,
            alert_score: scalar_to_f64(&props.alertscore).unwrap_or(0.0),
            coordinates,
            country: props.country.unwrap_or_default(),
            from_date: props.fromdate.as_deref().and_then(parse_datetime),
            severity: props
                .severitydata
                .as_ref()
                .and_then(|data| scalar_to_f64(&data.severity))
                .unwrap_or(0.0),
        });
    }

    Ok(events)
}

/// GeoJSON points are `[lon, lat]`.
fn point_coordinates(geometry: &Geometry) -> Option<Coordinates> {
    let pair = geometry.coordinates.as_array()?;
    if pair.len() < 2 {
        return None;
    }
    let lon = pair[0].as_f64()?;
    let lat = pair[1].as_f64()?;
    Coordinates::checked(lat, lon)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn scalar_to_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    None
}
