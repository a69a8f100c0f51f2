use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use crate::workflows::catalog::{split_tags, CatalogError, Table};
use crate::workflows::encoding::{AttributeRecord, BeneficiaryProfile, FeatureSchema, RecordOrigin};

/// Cell value in the `hazard_types` column meaning "applies under any hazard".
pub const ALWAYS_APPLICABLE: &str = "none";

/// Hazard types a service is prioritised for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "types", rename_all = "snake_case")]
pub enum HazardApplicability {
    Always,
    Types(BTreeSet<String>),
}

impl HazardApplicability {
    pub fn parse(cell: &str) -> Self {
        let tags = split_tags(cell);
        if tags.is_empty() || tags.iter().any(|tag| tag.eq_ignore_ascii_case(ALWAYS_APPLICABLE)) {
            return Self::Always;
        }
        Self::Types(tags.into_iter().map(|tag| tag.to_ascii_uppercase()).collect())
    }

    pub fn types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Types(
            types
                .into_iter()
                .map(|t| t.as_ref().trim().to_ascii_uppercase())
                .collect(),
        )
    }

    pub fn covers(&self, event_type: &str) -> bool {
        match self {
            Self::Always => true,
            Self::Types(types) => types.contains(&event_type.trim().to_ascii_uppercase()),
        }
    }
}

/// One service and the recipient profile it is designed for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceOffering {
    pub name: String,
    pub attributes: AttributeRecord,
    pub applicability: HazardApplicability,
}

impl ServiceOffering {
    pub fn new(
        name: impl Into<String>,
        profile: &BeneficiaryProfile,
        applicability: HazardApplicability,
    ) -> Self {
        Self {
            name: name.into(),
            attributes: profile.to_record(),
            applicability,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceCatalog {
    services: Vec<ServiceOffering>,
}

impl ServiceCatalog {
    pub fn new(services: Vec<ServiceOffering>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &[ServiceOffering] {
        &self.services
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn from_path<P: AsRef<Path>>(path: P, schema: &FeatureSchema) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, schema)
    }

    /// Columns: `name`, `hazard_types`, then one column per schema field.
    pub fn from_reader<R: Read>(reader: R, schema: &FeatureSchema) -> Result<Self, CatalogError> {
        let table = Table::read(reader)?;
        table.require_columns(
            ["name", "hazard_types"].into_iter().chain(schema.fields()),
            RecordOrigin::Catalog,
        )?;

        let services = table
            .rows()
            .map(|row| -> Result<ServiceOffering, CatalogError> {
                Ok(ServiceOffering {
                    name: row.required("name")?.to_string(),
                    attributes: row.attributes(schema)?,
                    applicability: HazardApplicability::parse(row.get("hazard_types").unwrap_or("")),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { services })
    }

    /// Six baseline services covering livelihoods, health, finance, education, shelter and food.
    pub fn builtin() -> Self {
        let profile = |age: f64,
                       education: f64,
                       income: f64,
                       assets: f64,
                       mental: f64,
                       remittances: f64,
                       location: &str,
                       nationality: &str,
                       gender: &str,
                       employment: &str,
                       health: &str| BeneficiaryProfile {
            age: Some(age),
            education_years: Some(education),
            income: Some(income),
            assets: Some(assets),
            mental_health_score: Some(mental),
            remittances: Some(remittances),
            location: Some(location.to_string()),
            nationality: Some(nationality.to_string()),
            gender: Some(gender.to_string()),
            employment: Some(employment.to_string()),
            health_difficulty: Some(health.to_string()),
        };

        Self::new(vec![
            ServiceOffering::new(
                "Job Training",
                &profile(30.0, 10.0, 5000.0, 2.0, 5.0, 100.0, "Nairobi", "Congolese", "Male", "no work", "No Difficulty"),
                HazardApplicability::Always,
            ),
            ServiceOffering::new(
                "Health Support",
                &profile(50.0, 0.0, 5000.0, 0.0, 15.0, 0.0, "Melkadida", "Somali", "Female", "no work", "Severe difficulty"),
                HazardApplicability::types(["EQ", "TC", "FL"]),
            ),
            ServiceOffering::new(
                "Microfinance",
                &profile(35.0, 3.0, 5000.0, 0.0, 8.0, 0.0, "Nairobi", "Congolese", "Female", "Hawking", "Mild difficulty"),
                HazardApplicability::types(["FL", "TC"]),
            ),
            ServiceOffering::new(
                "Education Program",
                &profile(25.0, 2.0, 2000.0, 1.0, 3.0, 50.0, "Melkadida", "Somali", "Male", "no work", "No Difficulty"),
                HazardApplicability::Always,
            ),
            ServiceOffering::new(
                "Shelter Assistance",
                &profile(40.0, 5.0, 3000.0, 0.0, 10.0, 20.0, "Nairobi", "Somali", "Male", "no work", "Moderate difficulty"),
                HazardApplicability::types(["EQ", "TC"]),
            ),
            ServiceOffering::new(
                "Food Aid",
                &profile(45.0, 4.0, 2000.0, 0.0, 12.0, 0.0, "Melkadida", "Congolese", "Female", "no work", "Mild difficulty"),
                HazardApplicability::types(["FL", "DR"]),
            ),
        ])
    }
}

/// Small fixed survey sample used to fit the encoder when no reference file is configured.
pub fn builtin_reference_population() -> Vec<AttributeRecord> {
    const ROWS: [(f64, f64, f64, f64, f64, f64, &str, &str, &str, &str, &str); 12] = [
        (24.0, 9.0, 12000.0, 1.0, 6.0, 40.0, "Nairobi", "Congolese", "Male", "Restaurant", "No Difficulty"),
        (31.0, 12.0, 30000.0, 3.0, 4.0, 150.0, "Nairobi", "Somali", "Female", "Hawking", "No Difficulty"),
        (45.0, 4.0, 5000.0, 0.0, 14.0, 0.0, "Melkadida", "Somali", "Female", "no work", "Moderate difficulty"),
        (52.0, 0.0, 2000.0, 0.0, 18.0, 0.0, "Melkadida", "Somali", "Male", "no work", "Severe difficulty"),
        (28.0, 6.0, 8000.0, 1.0, 9.0, 60.0, "Nairobi", "Congolese", "Female", "Hawking", "Mild difficulty"),
        (37.0, 8.0, 15000.0, 2.0, 7.0, 90.0, "Nairobi", "Congolese", "Male", "Restaurant", "No Difficulty"),
        (63.0, 2.0, 1000.0, 0.0, 20.0, 10.0, "Melkadida", "Congolese", "Female", "no work", "Severe difficulty"),
        (19.0, 11.0, 0.0, 0.0, 5.0, 0.0, "Melkadida", "Somali", "Male", "no work", "No Difficulty"),
        (41.0, 5.0, 4000.0, 1.0, 11.0, 25.0, "Nairobi", "Somali", "Male", "no work", "Moderate difficulty"),
        (33.0, 14.0, 45000.0, 4.0, 3.0, 300.0, "Nairobi", "Congolese", "Male", "Restaurant", "No Difficulty"),
        (56.0, 1.0, 2500.0, 0.0, 16.0, 5.0, "Melkadida", "Somali", "Female", "no work", "Mild difficulty"),
        (26.0, 7.0, 9000.0, 2.0, 8.0, 80.0, "Nairobi", "Somali", "Female", "Hawking", "Mild difficulty"),
    ];

    ROWS.iter()
        .map(
            |&(age, education, income, assets, mental, remittances, location, nationality, gender, employment, health)| {
                BeneficiaryProfile {
                    age: Some(age),
                    education_years: Some(education),
                    income: Some(income),
                    assets: Some(assets),
                    mental_health_score: Some(mental),
                    remittances: Some(remittances),
                    location: Some(location.to_string()),
                    nationality: Some(nationality.to_string()),
                    gender: Some(gender.to_string()),
                    employment: Some(employment.to_string()),
                    health_difficulty: Some(health.to_string()),
                }
                .to_record()
            },
        )
        .collect()
}
