use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::workflows::sites::{SegmentCounts, SiteId};

/// Stock categories tracked per site. Each carries its own per-segment consumption and
/// critical floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Food,
    Water,
    Medicine,
    Shelter,
}

impl ResourceType {
    pub const ALL: [ResourceType; 4] = [Self::Food, Self::Water, Self::Medicine, Self::Shelter];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Water => "water",
            Self::Medicine => "medicine",
            Self::Shelter => "shelter",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::Food => "kg",
            Self::Water => "L",
            Self::Medicine | Self::Shelter => "units",
        }
    }

    /// Per-person daily consumption for men, women, children, elderly.
    pub const fn segment_rates(self) -> [f64; 4] {
        match self {
            Self::Food => [2.0, 1.8, 1.0, 1.5],
            Self::Water => [15.0, 12.0, 8.0, 10.0],
            Self::Medicine => [0.1, 0.15, 0.2, 0.3],
            Self::Shelter => [0.01, 0.01, 0.005, 0.01],
        }
    }

    /// Critical stock floor; forecasts below it count as depletion.
    pub const fn depletion_threshold(self) -> f64 {
        match self {
            Self::Food => 500.0,
            Self::Water => 2500.0,
            Self::Medicine => 100.0,
            Self::Shelter => 5.0,
        }
    }

    /// Focus-area tags of organisations able to resupply this resource.
    pub const fn relief_tags(self) -> &'static [&'static str] {
        match self {
            Self::Food => &["Food Security", "Humanitarian Aid"],
            Self::Water => &["Water Sanitation", "Humanitarian Aid"],
            Self::Medicine => &["Health", "Medical", "Humanitarian Aid"],
            Self::Shelter => &["Shelter", "Housing", "Humanitarian Aid"],
        }
    }

    pub fn expected_daily_consumption(self, population: &SegmentCounts) -> f64 {
        self.segment_rates()
            .iter()
            .zip(population.as_array())
            .map(|(rate, count)| rate * count)
            .sum()
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource type '{0}'")]
pub struct UnknownResourceType(pub String);

impl FromStr for ResourceType {
    type Err = UnknownResourceType;

    /// Accepts bare names and unit-suffixed labels such as `Food (kg)`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let name = value
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match name.as_str() {
            "food" => Ok(Self::Food),
            "water" => Ok(Self::Water),
            "medicine" => Ok(Self::Medicine),
            "shelter" => Ok(Self::Shelter),
            _ => Err(UnknownResourceType(value.to_string())),
        }
    }
}

/// One observation of stock on hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub observed_at: NaiveDateTime,
    pub quantity: f64,
    pub consumption_rate: f64,
    pub population: SegmentCounts,
}

impl ResourceSample {
    pub fn on_date(
        date: NaiveDate,
        quantity: f64,
        consumption_rate: f64,
        population: SegmentCounts,
    ) -> Self {
        Self {
            observed_at: date.and_time(chrono::NaiveTime::MIN),
            quantity,
            consumption_rate,
            population,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.observed_at.date()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("sample {index} at {observed_at} does not follow the previous sample")]
    NotIncreasing {
        index: usize,
        observed_at: NaiveDateTime,
    },
    #[error("sample {index} has invalid quantity {quantity}")]
    InvalidQuantity { index: usize, quantity: f64 },
}

/// Key of one forecastable stock line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub site_id: SiteId,
    pub resource: ResourceType,
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.site_id, self.resource)
    }
}

/// Validated stock history for one (site, resource) pair: strictly increasing timestamps and
/// non-negative quantities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSeries {
    key: SeriesKey,
    country: String,
    samples: Vec<ResourceSample>,
}

impl ResourceSeries {
    pub fn new(
        site_id: SiteId,
        country: impl Into<String>,
        resource: ResourceType,
        samples: Vec<ResourceSample>,
    ) -> Result<Self, SeriesError> {
        for (index, sample) in samples.iter().enumerate() {
            if !sample.quantity.is_finite() || sample.quantity < 0.0 {
                return Err(SeriesError::InvalidQuantity {
                    index,
                    quantity: sample.quantity,
                });
            }
            if index > 0 && sample.observed_at <= samples[index - 1].observed_at {
                return Err(SeriesError::NotIncreasing {
                    index,
                    observed_at: sample.observed_at,
                });
            }
        }

        Ok(Self {
            key: SeriesKey { site_id, resource },
            country: country.into(),
            samples,
        })
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    pub fn site_id(&self) -> &SiteId {
        &self.key.site_id
    }

    pub fn resource(&self) -> ResourceType {
        self.key.resource
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn samples(&self) -> &[ResourceSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&ResourceSample> {
        self.samples.last()
    }
}
