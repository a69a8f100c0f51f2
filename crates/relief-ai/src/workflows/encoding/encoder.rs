use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::schema::{validate_record, AttributeRecord, FeatureSchema, RecordOrigin, SchemaError};

/// Identity of one fitted encoder instance; vectors only compare within the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncoderId(pub u64);

static ENCODER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_encoder_id() -> EncoderId {
    EncoderId(ENCODER_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

/// Fixed-width numeric encoding of one record, tagged with the encoder that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodedVector {
    encoder: EncoderId,
    values: Vec<f64>,
}

impl EncodedVector {
    pub fn encoder(&self) -> EncoderId {
        self.encoder
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("cannot fit an encoder on an empty reference population")]
    EmptyReference,
}

#[derive(Debug, Clone, Serialize)]
struct NumericColumn {
    field: String,
    mean: f64,
    scale: f64,
}

#[derive(Debug, Clone, Serialize)]
struct CategoricalColumn {
    field: String,
    mode: Option<String>,
    categories: Vec<String>,
}

/// Fitting entry point: learns imputation, scaling, and category vocabularies.
pub struct FeatureEncoder;

impl FeatureEncoder {
    pub fn fit(
        schema: FeatureSchema,
        reference: &[AttributeRecord],
    ) -> Result<FittedEncoder, EncodingError> {
        if reference.is_empty() {
            return Err(EncodingError::EmptyReference);
        }
        for (index, record) in reference.iter().enumerate() {
            validate_record(&schema, record, RecordOrigin::Reference, index)?;
        }

        let numeric = schema
            .numeric
            .iter()
            .map(|field| fit_numeric(field, reference))
            .collect();
        let categorical = schema
            .categorical
            .iter()
            .map(|field| fit_categorical(field, reference))
            .collect();

        Ok(FittedEncoder {
            id: next_encoder_id(),
            schema,
            numeric,
            categorical,
        })
    }
}

fn fit_numeric(field: &str, reference: &[AttributeRecord]) -> NumericColumn {
    let observed: Vec<f64> = reference
        .iter()
        .filter_map(|record| record.numeric(field).flatten())
        .collect();

    let mean = if observed.is_empty() {
        0.0
    } else {
        observed.iter().sum::<f64>() / observed.len() as f64
    };

    // Variance over the imputed column: imputed entries sit at the mean and add nothing.
    let squared: f64 = observed.iter().map(|value| (value - mean).powi(2)).sum();
    let std = (squared / reference.len() as f64).sqrt();
    let scale = if std > f64::EPSILON { std } else { 1.0 };

    NumericColumn {
        field: field.to_string(),
        mean,
        scale,
    }
}

fn fit_categorical(field: &str, reference: &[AttributeRecord]) -> CategoricalColumn {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in reference
        .iter()
        .filter_map(|record| record.categorical(field).flatten())
    {
        *counts.entry(value).or_default() += 1;
    }

    // BTreeMap iteration is sorted, so the first maximum is the smallest tied category.
    let mode = counts
        .iter()
        .fold(None::<(&str, usize)>, |best, (value, count)| match best {
            Some((_, best_count)) if best_count >= *count => best,
            _ => Some((*value, *count)),
        })
        .map(|(value, _)| value.to_string());

    CategoricalColumn {
        field: field.to_string(),
        mode,
        categories: counts.keys().map(|value| value.to_string()).collect(),
    }
}

/// Immutable transformation produced by [`FeatureEncoder::fit`].
#[derive(Debug, Clone, Serialize)]
pub struct FittedEncoder {
    id: EncoderId,
    schema: FeatureSchema,
    numeric: Vec<NumericColumn>,
    categorical: Vec<CategoricalColumn>,
}

impl FittedEncoder {
    pub fn id(&self) -> EncoderId {
        self.id
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn width(&self) -> usize {
        self.numeric.len()
            + self
                .categorical
                .iter()
                .map(|column| column.categories.len())
                .sum::<usize>()
    }

    /// Output column names in vector order: numeric fields, then `field=category` indicators.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|c| c.field.clone()).collect();
        for column in &self.categorical {
            names.extend(
                column
                    .categories
                    .iter()
                    .map(|category| format!("{}={}", column.field, category)),
            );
        }
        names
    }

    pub fn encode(
        &self,
        record: &AttributeRecord,
        origin: RecordOrigin,
    ) -> Result<EncodedVector, SchemaError> {
        self.encode_indexed(record, origin, 0)
    }

    pub fn encode_all(
        &self,
        records: &[AttributeRecord],
        origin: RecordOrigin,
    ) -> Result<Vec<EncodedVector>, SchemaError> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| self.encode_indexed(record, origin, index))
            .collect()
    }

    fn encode_indexed(
        &self,
        record: &AttributeRecord,
        origin: RecordOrigin,
        index: usize,
    ) -> Result<EncodedVector, SchemaError> {
        validate_record(&self.schema, record, origin, index)?;

        let mut values = Vec::with_capacity(self.width());
        for column in &self.numeric {
            let raw = record
                .numeric(&column.field)
                .flatten()
                .unwrap_or(column.mean);
            values.push((raw - column.mean) / column.scale);
        }

        for column in &self.categorical {
            let observed = record
                .categorical(&column.field)
                .flatten()
                .or(column.mode.as_deref());
            values.extend(
                column
                    .categories
                    .iter()
                    .map(|category| match observed {
                        Some(value) if value == category.as_str() => 1.0,
                        _ => 0.0,
                    }),
            );
        }

        Ok(EncodedVector {
            encoder: self.id,
            values,
        })
    }
}
