// SPDX-License-Identifier: MIT

//! In-memory dataset evaluated with row masks

use async_trait::async_trait;
use serde_json::Value;

use super::schema::DatasetSchema;
use super::source::RowSource;
use super::value::{rows_from_json, Row};
use crate::engine;
use crate::error::StoreError;
use crate::formula::Node;

/// A dataset held as a vector of rows
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    schema: DatasetSchema,
    rows: Vec<Row>,
}

impl MemoryTable {
    /// Every row must validate against `schema`
    pub fn new(schema: DatasetSchema, rows: Vec<Row>) -> Result<Self, StoreError> {
        for row in &rows {
            row.validate(&schema)?;
        }
        Ok(Self { schema, rows })
    }

    /// Build from JSON objects, converting each under the schema
    pub fn from_json(schema: DatasetSchema, rows: &[Value]) -> Result<Self, StoreError> {
        let rows = rows_from_json(&schema, rows)?;
        Self::new(schema, rows)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn push(&mut self, row: Row) -> Result<(), StoreError> {
        row.validate(&self.schema)?;
        self.rows.push(row);
        Ok(())
    }

    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<(), StoreError> {
        let spec = self
            .schema
            .columns
            .remove(old)
            .ok_or_else(|| StoreError::conversion(old, "column is not in the schema"))?;
        self.schema.columns.insert(new.to_string(), spec);
        self.rows = self
            .rows
            .drain(..)
            .map(|row| {
                row.into_cells()
                    .map(|(k, v)| if k == old { (new.to_string(), v) } else { (k, v) })
                    .collect()
            })
            .collect();
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> Result<(), StoreError> {
        self.schema
            .columns
            .remove(name)
            .ok_or_else(|| StoreError::conversion(name, "column is not in the schema"))?;
        self.rows = self
            .rows
            .drain(..)
            .map(|row| row.into_cells().filter(|(k, _)| k != name).collect())
            .collect();
        Ok(())
    }
}

#[async_trait]
impl RowSource for MemoryTable {
    fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    async fn count_selected(&self, formula: Option<&Node>) -> Result<usize, StoreError> {
        match formula {
            None => Ok(self.rows.len()),
            Some(node) => Ok(engine::to_row_mask(node, &self.schema)?.count(&self.rows)?),
        }
    }

    async fn select_rows(&self, formula: Option<&Node>) -> Result<Vec<Row>, StoreError> {
        match formula {
            None => Ok(self.rows.clone()),
            Some(node) => {
                let mask = engine::to_row_mask(node, &self.schema)?;
                let mut selected = Vec::new();
                for row in &self.rows {
                    if mask.test(row)? {
                        selected.push(row.clone());
                    }
                }
                Ok(selected)
            }
        }
    }
}
