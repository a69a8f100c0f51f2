use serde::{Deserialize, Serialize};

use super::schema::{AttributeRecord, FeatureSchema};

pub const AGE: &str = "age";
pub const EDUCATION_YEARS: &str = "education_years";
pub const INCOME: &str = "income";
pub const ASSETS: &str = "assets";
pub const MENTAL_HEALTH_SCORE: &str = "mental_health_score";
pub const REMITTANCES: &str = "remittances";

pub const LOCATION: &str = "location";
pub const NATIONALITY: &str = "nationality";
pub const GENDER: &str = "gender";
pub const EMPLOYMENT: &str = "employment";
pub const HEALTH_DIFFICULTY: &str = "health_difficulty";

/// Beneficiary attributes collected at intake. Any attribute may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BeneficiaryProfile {
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub education_years: Option<f64>,
    #[serde(default)]
    pub income: Option<f64>,
    #[serde(default)]
    pub assets: Option<f64>,
    #[serde(default)]
    pub mental_health_score: Option<f64>,
    #[serde(default)]
    pub remittances: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub employment: Option<String>,
    #[serde(default)]
    pub health_difficulty: Option<String>,
}

impl BeneficiaryProfile {
    /// Field lists shared by beneficiary profiles and service offerings.
    pub fn schema() -> FeatureSchema {
        FeatureSchema::new(
            [
                AGE,
                EDUCATION_YEARS,
                INCOME,
                ASSETS,
                MENTAL_HEALTH_SCORE,
                REMITTANCES,
            ],
            [LOCATION, NATIONALITY, GENDER, EMPLOYMENT, HEALTH_DIFFICULTY],
        )
    }

    pub fn to_record(&self) -> AttributeRecord {
        AttributeRecord::new()
            .with_numeric(AGE, self.age)
            .with_numeric(EDUCATION_YEARS, self.education_years)
            .with_numeric(INCOME, self.income)
            .with_numeric(ASSETS, self.assets)
            .with_numeric(MENTAL_HEALTH_SCORE, self.mental_health_score)
            .with_numeric(REMITTANCES, self.remittances)
            .with_categorical(LOCATION, self.location.as_deref())
            .with_categorical(NATIONALITY, self.nationality.as_deref())
            .with_categorical(GENDER, self.gender.as_deref())
            .with_categorical(EMPLOYMENT, self.employment.as_deref())
            .with_categorical(HEALTH_DIFFICULTY, self.health_difficulty.as_deref())
    }
}
