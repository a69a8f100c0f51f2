use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered field lists an encoder is fitted against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

impl FeatureSchema {
    pub fn new<N, C>(numeric: N, categorical: C) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            numeric: numeric.into_iter().map(Into::into).collect(),
            categorical: categorical.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.numeric
            .iter()
            .chain(self.categorical.iter())
            .map(String::as_str)
    }

    pub(crate) fn knows(&self, field: &str) -> bool {
        self.fields().any(|known| known == field)
    }
}

/// A record with named numeric and categorical attributes.
///
/// A field that is present with `None` is a missing value and gets imputed; a field that is
/// absent altogether is a schema violation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    numeric: BTreeMap<String, Option<f64>>,
    categorical: BTreeMap<String, Option<String>>,
}

impl AttributeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numeric(mut self, field: impl Into<String>, value: Option<f64>) -> Self {
        self.set_numeric(field, value);
        self
    }

    pub fn with_categorical(mut self, field: impl Into<String>, value: Option<&str>) -> Self {
        self.set_categorical(field, value.map(str::to_string));
        self
    }

    pub fn set_numeric(&mut self, field: impl Into<String>, value: Option<f64>) {
        let value = value.filter(|v| v.is_finite());
        self.numeric.insert(field.into(), value);
    }

    pub fn set_categorical(&mut self, field: impl Into<String>, value: Option<String>) {
        let value = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        self.categorical.insert(field.into(), value);
    }

    /// Outer `None` when the field is absent, inner `None` when its value is missing.
    pub fn numeric(&self, field: &str) -> Option<Option<f64>> {
        self.numeric.get(field).copied()
    }

    pub fn categorical(&self, field: &str) -> Option<Option<&str>> {
        self.categorical.get(field).map(|value| value.as_deref())
    }

    pub(crate) fn field_names(&self) -> impl Iterator<Item = &str> {
        self.numeric
            .keys()
            .chain(self.categorical.keys())
            .map(String::as_str)
    }
}

/// Where a record being validated came from, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrigin {
    Reference,
    Catalog,
    Request,
}

impl RecordOrigin {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reference => "reference population",
            Self::Catalog => "service catalog",
            Self::Request => "request",
        }
    }
}

/// Required field absent, or a field the schema does not know about.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("{} record {index} is missing required field '{field}'", origin.label())]
    MissingField {
        origin: RecordOrigin,
        index: usize,
        field: String,
    },
    #[error("{} record {index} carries unknown field '{field}'", origin.label())]
    UnknownField {
        origin: RecordOrigin,
        index: usize,
        field: String,
    },
    #[error("{} is missing required column '{column}'", origin.label())]
    MissingColumn { origin: RecordOrigin, column: String },
}

pub(crate) fn validate_record(
    schema: &FeatureSchema,
    record: &AttributeRecord,
    origin: RecordOrigin,
    index: usize,
) -> Result<(), SchemaError> {
    for field in &schema.numeric {
        if record.numeric(field).is_none() {
            return Err(SchemaError::MissingField {
                origin,
                index,
                field: field.clone(),
            });
        }
    }
    for field in &schema.categorical {
        if record.categorical(field).is_none() {
            return Err(SchemaError::MissingField {
                origin,
                index,
                field: field.clone(),
            });
        }
    }
    if let Some(unknown) = record.field_names().find(|name| !schema.knows(name)) {
        return Err(SchemaError::UnknownField {
            origin,
            index,
            field: unknown.to_string(),
        });
    }
    Ok(())
}
