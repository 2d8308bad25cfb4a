// SPDX-License-Identifier: MIT

//! Workflows own actions and the attributes condition names must avoid.
//! Dataset and schema changes enter the ledger here.

use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::action::{Action, ConditionDraft, ConditionUpdate, FilterDraft};
use crate::dataset::RowSource;
use crate::error::LedgerError;
use crate::formula::Node;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Workflow {
    pub name: String,
    attributes: BTreeMap<String, String>,
    actions: Vec<Action>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn add_action(&mut self, action: Action) -> Uuid {
        let id = action.id;
        self.actions.push(action);
        id
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn action(&self, id: Uuid) -> Option<&Action> {
        self.actions.iter().find(|a| a.id == id)
    }

    pub fn action_mut(&mut self, id: Uuid) -> Option<&mut Action> {
        self.actions.iter_mut().find(|a| a.id == id)
    }

    pub async fn create_filter(
        &mut self,
        action_id: Uuid,
        draft: impl Into<FilterDraft>,
        source: &dyn RowSource,
    ) -> Result<Uuid, LedgerError> {
        self.require(action_id)?.create_filter(draft, source).await
    }

    pub async fn update_filter(
        &mut self,
        action_id: Uuid,
        formula: Node,
        source: &dyn RowSource,
    ) -> Result<(), LedgerError> {
        self.require(action_id)?.update_filter(formula, source).await
    }

    pub async fn delete_filter(
        &mut self,
        action_id: Uuid,
        source: &dyn RowSource,
    ) -> Result<(), LedgerError> {
        self.require(action_id)?.delete_filter(source).await
    }

    pub async fn create_condition(
        &mut self,
        action_id: Uuid,
        draft: ConditionDraft,
        source: &dyn RowSource,
    ) -> Result<Uuid, LedgerError> {
        let attributes = &self.attributes;
        let action = self
            .actions
            .iter_mut()
            .find(|a| a.id == action_id)
            .ok_or(LedgerError::ActionNotFound(action_id))?;
        action.create_condition(draft, attributes, source).await
    }

    pub async fn update_condition(
        &mut self,
        action_id: Uuid,
        condition_id: Uuid,
        update: ConditionUpdate,
        source: &dyn RowSource,
    ) -> Result<(), LedgerError> {
        let attributes = &self.attributes;
        let action = self
            .actions
            .iter_mut()
            .find(|a| a.id == action_id)
            .ok_or(LedgerError::ActionNotFound(action_id))?;
        action
            .update_condition(condition_id, update, attributes, source)
            .await
    }

    pub async fn delete_condition(
        &mut self,
        action_id: Uuid,
        condition_id: Uuid,
        source: &dyn RowSource,
    ) -> Result<(), LedgerError> {
        self.require(action_id)?
            .delete_condition(condition_id, source)
            .await
    }

    /// The rows changed: every action is marked stale and recounted.
    ///
    /// Each action is its own unit of work. On failure the failing action and
    /// those after it stay stale.
    pub async fn dataset_changed(&mut self, source: &dyn RowSource) -> Result<(), LedgerError> {
        for action in &mut self.actions {
            action.mark_stale();
        }
        for action in &mut self.actions {
            action.recompute(source).await?;
        }
        log::info!("Recomputed {} actions of workflow '{}'", self.actions.len(), self.name);
        Ok(())
    }

    /// A column was renamed in `source`. Formulas naming it are rewritten and
    /// their actions recounted.
    pub async fn column_renamed(
        &mut self,
        old: &str,
        new: &str,
        source: &dyn RowSource,
    ) -> Result<(), LedgerError> {
        for action in &mut self.actions {
            action.column_renamed(old, new, source).await?;
        }
        Ok(())
    }

    /// A column was dropped from `source`. Every filter or condition reading it
    /// is deleted. Returns the ids of the deleted records.
    pub async fn column_deleted(
        &mut self,
        column: &str,
        source: &dyn RowSource,
    ) -> Result<Vec<Uuid>, LedgerError> {
        let mut deleted = Vec::new();
        for action in &mut self.actions {
            deleted.extend(action.column_deleted(column, source).await?);
        }
        Ok(deleted)
    }

    fn require(&mut self, action_id: Uuid) -> Result<&mut Action, LedgerError> {
        self.action_mut(action_id)
            .ok_or(LedgerError::ActionNotFound(action_id))
    }
}
