// SPDX-License-Identifier: MIT

//! Dataset schema as supplied by the storage layer

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::formula::DataType;

/// Column name -> column contract
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct DatasetSchema {
    #[serde(flatten)]
    pub columns: HashMap<String, ColumnSpec>,
}

/// Contract for a single column
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ColumnSpec {
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub is_key: bool,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// What `is_empty` tests for in this column
    #[serde(default)]
    pub empty: EmptySentinel,
}

/// The storage layer's representation of an empty cell
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmptySentinel {
    /// Only null is empty
    #[default]
    Null,
    /// Null and the empty string are both empty
    NullOrBlank,
}

fn default_nullable() -> bool {
    true
}

impl ColumnSpec {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            is_key: false,
            nullable: true,
            empty: EmptySentinel::Null,
        }
    }

    pub fn key(mut self) -> Self {
        self.is_key = true;
        self.nullable = false;
        self
    }

    pub fn with_empty(mut self, empty: EmptySentinel) -> Self {
        self.empty = empty;
        self
    }
}

impl DatasetSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion, used by tests and fixtures
    pub fn with(mut self, name: impl Into<String>, spec: ColumnSpec) -> Self {
        self.columns.insert(name.into(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Column names in a stable (sorted) order
    pub fn column_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The first key column, by name
    pub fn key_column(&self) -> Option<&str> {
        self.column_names()
            .into_iter()
            .find(|name| self.columns[*name].is_key)
    }
}
