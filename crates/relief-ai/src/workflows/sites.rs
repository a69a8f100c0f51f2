use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;

use super::catalog::{CatalogError, Table};
use crate::geo::Coordinates;

/// Identifier wrapper for managed sites (camps, settlements, distribution points).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SiteId(pub String);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Population split into demographic bands. The total is always the sum of the bands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCounts {
    pub men: u32,
    pub women: u32,
    pub children: u32,
    pub elderly: u32,
}

impl SegmentCounts {
    pub const fn new(men: u32, women: u32, children: u32, elderly: u32) -> Self {
        Self {
            men,
            women,
            children,
            elderly,
        }
    }

    pub fn total(&self) -> u64 {
        u64::from(self.men) + u64::from(self.women) + u64::from(self.children) + u64::from(self.elderly)
    }

    pub(crate) fn as_array(&self) -> [f64; 4] {
        [
            f64::from(self.men),
            f64::from(self.women),
            f64::from(self.children),
            f64::from(self.elderly),
        ]
    }
}

/// A managed site hazards are checked against and resources are forecast for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    pub country: String,
    pub coordinates: Coordinates,
    population: SegmentCounts,
}

impl Site {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        country: impl Into<String>,
        coordinates: Coordinates,
        population: SegmentCounts,
    ) -> Self {
        Self {
            id: SiteId(id.into()),
            name: name.into(),
            country: country.into(),
            coordinates,
            population,
        }
    }

    pub fn population(&self) -> SegmentCounts {
        self.population
    }

    pub fn total_population(&self) -> u64 {
        self.population.total()
    }

    pub fn update_population(&mut self, population: SegmentCounts) {
        self.population = population;
    }
}

/// Monitored sites from CSV with columns `id, name, country, lat, lon, men, women, children,
/// elderly`.
pub fn load_sites<R: Read>(reader: R) -> Result<Vec<Site>, CatalogError> {
    let table = Table::read(reader)?;
    let mut sites = Vec::new();
    for row in table.rows() {
        let number = |column: &str| -> Result<f64, CatalogError> {
            let cell = row.required(column)?;
            cell.parse::<f64>().map_err(|_| CatalogError::InvalidValue {
                line: row.line(),
                column: column.to_string(),
                value: cell.to_string(),
            })
        };
        let count = |column: &str| -> Result<u32, CatalogError> {
            let cell = row.get(column).unwrap_or("0");
            cell.parse::<u32>().map_err(|_| CatalogError::InvalidValue {
                line: row.line(),
                column: column.to_string(),
                value: cell.to_string(),
            })
        };

        let (lat, lon) = (number("lat")?, number("lon")?);
        let coordinates =
            Coordinates::checked(lat, lon).ok_or_else(|| CatalogError::InvalidValue {
                line: row.line(),
                column: "lat/lon".to_string(),
                value: format!("{lat},{lon}"),
            })?;

        sites.push(Site::new(
            row.required("id")?,
            row.required("name")?,
            row.required("country")?,
            coordinates,
            SegmentCounts::new(
                count("men")?,
                count("women")?,
                count("children")?,
                count("elderly")?,
            ),
        ));
    }
    Ok(sites)
}

/// The two survey locations monitored when no site table is configured.
pub fn builtin_sites() -> Vec<Site> {
    vec![
        Site::new(
            "nairobi",
            "Nairobi",
            "Kenya",
            Coordinates::new(-1.286389, 36.817223),
            SegmentCounts::new(1400, 1500, 1100, 300),
        ),
        Site::new(
            "melkadida",
            "Melkadida",
            "Ethiopia",
            Coordinates::new(4.516667, 41.966667),
            SegmentCounts::new(900, 1000, 1300, 200),
        ),
    ]
}
