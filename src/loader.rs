//! Loading workflow definitions and dataset fixtures
//!
//! Workflows are YAML, datasets are JSON (or YAML, by file extension):
//!
//! ```yaml
//! name: ELEC1601
//! attributes:
//!   course: ELEC1601
//! actions:
//!   - name: welcome
//!     template: "{% if HighAge %}Hi there{% endif %}"
//!     filter: {field: age, type: number, operator: greater, value: 18}
//!     conditions:
//!       - name: HighAge
//!         formula: {field: age, type: number, operator: greater, value: 25}
//! ```

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::dataset::{rows_from_json, DatasetSchema, MemoryTable, Row, RowSource};
use crate::error::{AudienceError, LedgerError, StoreError};
use crate::formula::Node;
use crate::ledger::{Action, ConditionDraft, Workflow};

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionDefinition {
    pub name: String,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub filter: Option<Node>,
    #[serde(default)]
    pub conditions: Vec<ConditionDraft>,
}

/// A schema with its rows, as JSON objects
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetFixture {
    pub schema: DatasetSchema,
    #[serde(default)]
    pub rows: Vec<Value>,
}

impl DatasetFixture {
    /// Convert every row under the schema
    pub fn typed_rows(&self) -> Result<Vec<Row>, StoreError> {
        rows_from_json(&self.schema, &self.rows)
    }

    pub fn into_memory_table(self) -> Result<MemoryTable, StoreError> {
        MemoryTable::from_json(self.schema, &self.rows)
    }
}

impl WorkflowDefinition {
    /// Build the workflow, saving every filter and condition against `source`
    pub async fn build(self, source: &dyn RowSource) -> Result<Workflow, LedgerError> {
        let mut workflow = Workflow::new(self.name);
        for (key, value) in self.attributes {
            workflow.set_attribute(key, value);
        }

        for def in self.actions {
            let action_id = workflow.add_action(Action::new(def.name, def.template));
            if let Some(filter) = def.filter {
                workflow.create_filter(action_id, filter, source).await?;
            }
            for draft in def.conditions {
                workflow.create_condition(action_id, draft, source).await?;
            }
        }

        log::info!(
            "Loaded workflow '{}' with {} actions",
            workflow.name,
            workflow.actions().len()
        );
        Ok(workflow)
    }
}

/// Loads workflow definitions and dataset fixtures from files
pub struct Loader;

impl Loader {
    pub fn new() -> Self {
        Self
    }

    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowDefinition, AudienceError> {
        let content = fs::read_to_string(path)?;
        Self::parse_workflow(&content)
    }

    pub fn parse_workflow(content: &str) -> Result<WorkflowDefinition, AudienceError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load_dataset<P: AsRef<Path>>(&self, path: P) -> Result<DatasetFixture, AudienceError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            _ => Self::parse_dataset(&content),
        }
    }

    pub fn parse_dataset(content: &str) -> Result<DatasetFixture, AudienceError> {
        Ok(serde_json::from_str(content)?)
    }

    /// A formula document file, JSON or YAML by extension
    pub fn load_formula<P: AsRef<Path>>(&self, path: P) -> Result<Node, AudienceError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let doc: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        Ok(crate::formula::parse(&doc)?)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
