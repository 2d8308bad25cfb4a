// SPDX-License-Identifier: MIT

//! Cell values and rows

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

use super::schema::DatasetSchema;
use crate::error::StoreError;
use crate::formula::document::{datetime_in_range, format_datetime, parse_datetime};
use crate::formula::{DataType, Literal};

/// A single typed cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Number(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// The type this cell holds, `None` for null
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            CellValue::Null => None,
            CellValue::Text(_) => Some(DataType::String),
            CellValue::Number(_) => Some(DataType::Number),
            CellValue::Boolean(_) => Some(DataType::Boolean),
            CellValue::DateTime(_) => Some(DataType::DateTime),
        }
    }

    /// Order two cells of the same type. `None` for nulls or mixed types.
    pub fn compare(&self, other: &CellValue) -> Option<Ordering> {
        match (self, other) {
            (CellValue::Text(a), CellValue::Text(b)) => Some(a.as_str().cmp(b.as_str())),
            (CellValue::Number(a), CellValue::Number(b)) => a.partial_cmp(b),
            (CellValue::Boolean(a), CellValue::Boolean(b)) => Some(a.cmp(b)),
            (CellValue::DateTime(a), CellValue::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Convert a JSON value under the column's declared type
    pub fn from_json(column: &str, value: &Value, data_type: DataType) -> Result<Self, StoreError> {
        let invalid = || {
            StoreError::conversion(column, format!("{} is not a valid {} value", value, data_type))
        };

        if value.is_null() {
            return Ok(CellValue::Null);
        }

        match data_type {
            DataType::String => match value {
                Value::String(s) => Ok(CellValue::Text(s.clone())),
                Value::Number(n) => Ok(CellValue::Text(n.to_string())),
                _ => Err(invalid()),
            },
            DataType::Number => match value {
                Value::Number(n) => n.as_f64().map(CellValue::Number).ok_or_else(invalid),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .map(CellValue::Number)
                    .ok_or_else(invalid),
                _ => Err(invalid()),
            },
            DataType::Boolean => match value {
                Value::Bool(b) => Ok(CellValue::Boolean(*b)),
                Value::String(s) if s == "true" => Ok(CellValue::Boolean(true)),
                Value::String(s) if s == "false" => Ok(CellValue::Boolean(false)),
                _ => Err(invalid()),
            },
            DataType::DateTime => value
                .as_str()
                .and_then(parse_datetime)
                .map(CellValue::DateTime)
                .ok_or_else(invalid),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Null => Value::Null,
            CellValue::Text(s) => Value::String(s.clone()),
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Boolean(b) => Value::Bool(*b),
            CellValue::DateTime(dt) => Value::String(format_datetime(dt)),
        }
    }
}

impl From<&Literal> for CellValue {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Text(s) => CellValue::Text(s.clone()),
            Literal::Number(n) => CellValue::Number(*n),
            Literal::Boolean(b) => CellValue::Boolean(*b),
            Literal::DateTime(dt) => CellValue::DateTime(*dt),
        }
    }
}

/// One recipient: column name -> cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: HashMap<String, CellValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: CellValue) {
        self.cells.insert(column.into(), value);
    }

    /// Builder-style insertion
    pub fn with(mut self, column: impl Into<String>, value: CellValue) -> Self {
        self.insert(column, value);
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.cells.keys()
    }

    pub fn into_cells(self) -> impl Iterator<Item = (String, CellValue)> {
        self.cells.into_iter()
    }

    /// Convert a JSON object under a schema. Keys outside the schema are rejected;
    /// schema columns absent from the object stay absent.
    pub fn from_json(schema: &DatasetSchema, obj: &Map<String, Value>) -> Result<Self, StoreError> {
        let mut row = Row::new();
        for (column, value) in obj {
            let spec = schema
                .get(column)
                .ok_or_else(|| StoreError::conversion(column, "column is not in the schema"))?;
            row.insert(
                column.clone(),
                CellValue::from_json(column, value, spec.data_type)?,
            );
        }
        Ok(row)
    }

    /// Check the row against `schema` before it enters a table: every schema
    /// column present, no other columns, each cell of its column's type, nulls
    /// only in nullable columns and timestamps with four digit years.
    pub fn validate(&self, schema: &DatasetSchema) -> Result<(), StoreError> {
        if let Some(stray) = self.cells.keys().find(|c| !schema.contains(c)) {
            return Err(StoreError::conversion(
                stray.as_str(),
                "column is not in the schema",
            ));
        }

        for name in schema.column_names() {
            let spec = &schema.columns[name];
            let cell = self
                .get(name)
                .ok_or_else(|| StoreError::conversion(name, "row has no value for this column"))?;
            match (cell, cell.data_type()) {
                (_, None) if !spec.nullable => {
                    return Err(StoreError::conversion(name, "column is not nullable"))
                }
                (_, Some(found)) if found != spec.data_type => {
                    return Err(StoreError::conversion(
                        name,
                        format!("expected a {} value, found {}", spec.data_type, found),
                    ))
                }
                (CellValue::DateTime(dt), _) if !datetime_in_range(dt) => {
                    return Err(StoreError::conversion(
                        name,
                        format!("timestamp {} is out of range", dt),
                    ))
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.cells
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

/// Convert a list of JSON objects under a schema
pub fn rows_from_json(schema: &DatasetSchema, rows: &[Value]) -> Result<Vec<Row>, StoreError> {
    rows.iter()
        .enumerate()
        .map(|(i, value)| {
            let obj = value.as_object().ok_or_else(|| {
                StoreError::conversion(format!("row {}", i), "expected a JSON object")
            })?;
            Row::from_json(schema, obj)
        })
        .collect()
}

impl FromIterator<(String, CellValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, CellValue)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}
