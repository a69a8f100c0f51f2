//! Static tabular catalogs (services, organisations, reference profiles) read from CSV.

use std::collections::BTreeSet;
use std::io::Read;

use super::encoding::{AttributeRecord, FeatureSchema, RecordOrigin, SchemaError};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid catalog CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("catalog line {line}: column '{column}' has invalid value '{value}'")]
    InvalidValue {
        line: u64,
        column: String,
        value: String,
    },
    #[error("catalog line {line}: '{column}' must not be empty")]
    EmptyValue { line: u64, column: String },
}

/// Split a `;`-separated tag cell, dropping blanks and duplicates.
pub fn split_tags(cell: &str) -> BTreeSet<String> {
    cell.split(';')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// A CSV table with trimmed cells and header lookup by name.
pub(crate) struct Table {
    headers: csv::StringRecord,
    rows: Vec<csv::StringRecord>,
}

pub(crate) struct Row<'a> {
    headers: &'a csv::StringRecord,
    record: &'a csv::StringRecord,
}

impl Table {
    pub(crate) fn read<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let rows = csv_reader
            .records()
            .collect::<Result<Vec<_>, csv::Error>>()?;
        Ok(Self { headers, rows })
    }

    pub(crate) fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|header| header == column)
    }

    pub(crate) fn require_columns<'c>(
        &self,
        columns: impl IntoIterator<Item = &'c str>,
        origin: RecordOrigin,
    ) -> Result<(), SchemaError> {
        for column in columns {
            if !self.has_column(column) {
                return Err(SchemaError::MissingColumn {
                    origin,
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|record| Row {
            headers: &self.headers,
            record,
        })
    }
}

impl<'a> Row<'a> {
    pub(crate) fn line(&self) -> u64 {
        self.record
            .position()
            .map(|position| position.line())
            .unwrap_or_default()
    }

    /// Cell value, or `None` when the column is absent or the cell is blank.
    pub(crate) fn get(&self, column: &str) -> Option<&'a str> {
        let index = self.headers.iter().position(|header| header == column)?;
        self.record.get(index).filter(|cell| !cell.is_empty())
    }

    pub(crate) fn required(&self, column: &str) -> Result<&'a str, CatalogError> {
        self.get(column).ok_or_else(|| CatalogError::EmptyValue {
            line: self.line(),
            column: column.to_string(),
        })
    }

    /// Attribute record carrying exactly the schema's fields; blank cells become unknown values.
    pub(crate) fn attributes(&self, schema: &FeatureSchema) -> Result<AttributeRecord, CatalogError> {
        let mut record = AttributeRecord::new();
        for field in &schema.numeric {
            let value = match self.get(field) {
                Some(cell) => Some(cell.parse::<f64>().map_err(|_| CatalogError::InvalidValue {
                    line: self.line(),
                    column: field.clone(),
                    value: cell.to_string(),
                })?),
                None => None,
            };
            record.set_numeric(field.clone(), value);
        }
        for field in &schema.categorical {
            record.set_categorical(field.clone(), self.get(field).map(str::to_string));
        }
        Ok(record)
    }
}

/// Reference population rows: one record per line, every schema field as a column.
pub fn load_reference_population<R: Read>(
    reader: R,
    schema: &FeatureSchema,
) -> Result<Vec<AttributeRecord>, CatalogError> {
    let table = Table::read(reader)?;
    table.require_columns(schema.fields(), RecordOrigin::Reference)?;
    table.rows().map(|row| row.attributes(schema)).collect()
}
