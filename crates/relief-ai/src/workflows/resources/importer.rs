use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use super::domain::{ResourceSample, ResourceSeries, ResourceType, SeriesError};
use crate::workflows::sites::{SegmentCounts, SiteId};

#[derive(Debug)]
pub enum ResourceImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, message: String },
    Series { series: String, source: SeriesError },
}

impl std::fmt::Display for ResourceImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceImportError::Io(err) => write!(f, "failed to read resource history: {}", err),
            ResourceImportError::Csv(err) => write!(f, "invalid resource history CSV: {}", err),
            ResourceImportError::InvalidRow { line, message } => {
                write!(f, "resource history line {}: {}", line, message)
            }
            ResourceImportError::Series { series, source } => {
                write!(f, "resource history for {} is invalid: {}", series, source)
            }
        }
    }
}

impl std::error::Error for ResourceImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceImportError::Io(err) => Some(err),
            ResourceImportError::Csv(err) => Some(err),
            ResourceImportError::InvalidRow { .. } => None,
            ResourceImportError::Series { source, .. } => Some(source),
        }
    }
}

impl From<std::io::Error> for ResourceImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ResourceImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Deserialize)]
struct HistoryRow {
    site_id: String,
    country: String,
    resource_type: String,
    date: String,
    quantity: f64,
    #[serde(default)]
    consumption_rate: Option<f64>,
    men: u32,
    women: u32,
    children: u32,
    elderly: u32,
}

/// Reads per-site stock histories exported as CSV and groups them into series.
pub struct ResourceHistoryImporter;

impl ResourceHistoryImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<ResourceSeries>, ResourceImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Series come back ordered by site then resource. Rows within a series must already be
    /// in time order.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<ResourceSeries>, ResourceImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut grouped: BTreeMap<(String, ResourceType), (String, Vec<ResourceSample>)> =
            BTreeMap::new();

        let headers = csv_reader.headers()?.clone();
        let mut raw = csv::StringRecord::new();
        while csv_reader.read_record(&mut raw)? {
            let line = raw.position().map(|position| position.line()).unwrap_or_default();
            let row: HistoryRow = raw.deserialize(Some(&headers))?;

            let resource = row
                .resource_type
                .parse::<ResourceType>()
                .map_err(|err| ResourceImportError::InvalidRow {
                    line,
                    message: err.to_string(),
                })?;
            let observed_at =
                parse_timestamp(&row.date).ok_or_else(|| ResourceImportError::InvalidRow {
                    line,
                    message: format!("unrecognised date '{}'", row.date),
                })?;

            let entry = grouped
                .entry((row.site_id, resource))
                .or_insert_with(|| (row.country, Vec::new()));
            entry.1.push(ResourceSample {
                observed_at,
                quantity: row.quantity,
                consumption_rate: row.consumption_rate.unwrap_or(0.0),
                population: SegmentCounts::new(row.men, row.women, row.children, row.elderly),
            });
        }

        grouped
            .into_iter()
            .map(|((site_id, resource), (country, samples))| {
                let label = format!("{}/{}", site_id, resource);
                ResourceSeries::new(SiteId(site_id), country, resource, samples).map_err(
                    |source| ResourceImportError::Series {
                        series: label,
                        source,
                    },
                )
            })
            .collect()
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HISTORY: &str = "\
site_id,country,resource_type,date,quantity,consumption_rate,men,women,children,elderly
camp-1,Kenya,Food (kg),2025-01-01,10000,1800,400,400,300,100
camp-1,Kenya,Water (L),2025-01-01,50000,13000,400,400,300,100
camp-1,Kenya,Food (kg),2025-01-02,8200,1800,400,400,300,100
camp-2,Uganda,food,2025-01-01 06:00:00,900,,10,10,10,5
";

    #[test]
    fn groups_rows_per_site_and_resource() {
        let series = ResourceHistoryImporter::from_reader(HISTORY.as_bytes()).expect("import");
        assert_eq!(series.len(), 3);

        let food = &series[0];
        assert_eq!(food.site_id(), &SiteId("camp-1".to_string()));
        assert_eq!(food.resource(), ResourceType::Food);
        assert_eq!(food.len(), 2);
        assert_eq!(food.samples()[1].quantity, 8200.0);
        assert_eq!(food.samples()[1].population.total(), 1200);

        let water = &series[1];
        assert_eq!(water.resource(), ResourceType::Water);

        let other = &series[2];
        assert_eq!(other.country(), "Uganda");
        assert_eq!(other.samples()[0].consumption_rate, 0.0);
        assert_eq!(other.samples()[0].observed_at.time().to_string(), "06:00:00");
    }

    #[test]
    fn rejects_unknown_resource_types() {
        let csv = "\
site_id,country,resource_type,date,quantity,consumption_rate,men,women,children,elderly
camp-1,Kenya,Fuel,2025-01-01,10,1,1,1,1,1
";
        let error = ResourceHistoryImporter::from_reader(csv.as_bytes()).expect_err("fuel");
        assert!(matches!(error, ResourceImportError::InvalidRow { .. }));
    }

    #[test]
    fn rejects_rows_out_of_time_order() {
        let csv = "\
site_id,country,resource_type,date,quantity,consumption_rate,men,women,children,elderly
camp-1,Kenya,Food,2025-01-02,10,1,1,1,1,1
camp-1,Kenya,Food,2025-01-01,10,1,1,1,1,1
";
        let error = ResourceHistoryImporter::from_reader(csv.as_bytes()).expect_err("order");
        assert!(matches!(
            error,
            ResourceImportError::Series {
                source: SeriesError::NotIncreasing { index: 1, .. },
                ..
            }
        ));
    }
}
