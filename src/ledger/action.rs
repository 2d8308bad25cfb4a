// SPDX-License-Identifier: MIT

//! Actions with their filter and conditions
//!
//! Every mutation works on a candidate copy of the action: the change is
//! applied, the affected counters are recomputed, and the copy replaces the
//! action only if all of that succeeded. Readers therefore always see one
//! complete generation of counters.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::naming;
use super::recompute;
use crate::dataset::RowSource;
use crate::error::LedgerError;
use crate::formula::Node;

/// Freshness of a record's derived counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// Counters match the current formula and dataset
    Persisted,
    /// Counters were invalidated and await a recompute
    Stale,
}

/// The audience filter of an action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub formula: Node,
    pub referenced_columns: BTreeSet<String>,
    pub n_rows_selected: usize,
    pub text_description: String,
    pub state: RecordState,
}

/// A named formula used for content branching
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub formula: Node,
    pub referenced_columns: BTreeSet<String>,
    pub n_rows_selected: usize,
    pub text_description: String,
    pub state: RecordState,
}

/// An unsaved filter. A bare formula converts into an unnamed draft.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub formula: Node,
}

impl From<Node> for FilterDraft {
    fn from(formula: Node) -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            formula,
        }
    }
}

/// An unsaved condition
#[derive(Debug, Clone, Deserialize)]
pub struct ConditionDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub formula: Node,
}

impl ConditionDraft {
    pub fn new(name: impl Into<String>, formula: Node) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            formula,
        }
    }
}

/// Changes to an existing condition; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct ConditionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub formula: Option<Node>,
}

impl Filter {
    fn draft(draft: FilterDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: draft.name,
            description: draft.description,
            formula: draft.formula,
            referenced_columns: BTreeSet::new(),
            n_rows_selected: 0,
            text_description: String::new(),
            state: RecordState::Stale,
        }
    }
}

impl Condition {
    fn draft(draft: ConditionDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: draft.name,
            description: draft.description,
            formula: draft.formula,
            referenced_columns: BTreeSet::new(),
            n_rows_selected: 0,
            text_description: String::new(),
            state: RecordState::Stale,
        }
    }
}

/// Which counters a change invalidates
#[derive(Debug, Clone, Copy)]
enum Scope {
    /// The filter and every condition
    Everything,
    /// One condition
    Condition(Uuid),
    /// Only the set of conditions changed
    Membership,
}

/// A personalized message with its audience filter and branching conditions
#[derive(Debug, Clone, Serialize)]
pub struct Action {
    pub id: Uuid,
    pub name: String,
    template: String,
    filter: Option<Filter>,
    conditions: Vec<Condition>,
    rows_all_false: Option<bool>,
    generation: u64,
}

impl Action {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            template: template.into(),
            filter: None,
            conditions: Vec::new(),
            rows_all_false: None,
            generation: 0,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Replace the message template. Counters are not affected.
    pub fn set_template(&mut self, template: impl Into<String>) {
        self.template = template.into();
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn condition(&self, id: Uuid) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.id == id)
    }

    pub fn condition_by_name(&self, name: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.name == name)
    }

    /// Number of committed generations
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The cached flag, `None` when unknown
    pub fn cached_rows_all_false(&self) -> Option<bool> {
        self.rows_all_false
    }

    pub async fn create_filter(
        &mut self,
        draft: impl Into<FilterDraft>,
        source: &dyn RowSource,
    ) -> Result<Uuid, LedgerError> {
        if self.filter.is_some() {
            return Err(LedgerError::DuplicateFilter);
        }

        let filter = Filter::draft(draft.into());
        let id = filter.id;
        let mut candidate = self.clone();
        candidate.filter = Some(filter);
        candidate.refresh(Scope::Everything, source).await?;
        self.commit(candidate);

        self.log_filter("Created");
        Ok(id)
    }

    pub async fn update_filter(
        &mut self,
        formula: Node,
        source: &dyn RowSource,
    ) -> Result<(), LedgerError> {
        let mut candidate = self.clone();
        let filter = candidate.filter.as_mut().ok_or(LedgerError::NoFilter)?;
        filter.formula = formula;
        candidate.refresh(Scope::Everything, source).await?;
        self.commit(candidate);

        self.log_filter("Updated");
        Ok(())
    }

    /// Remove the filter; every condition is recounted over the whole dataset
    pub async fn delete_filter(&mut self, source: &dyn RowSource) -> Result<(), LedgerError> {
        let mut candidate = self.clone();
        let removed = candidate.filter.take().ok_or(LedgerError::NoFilter)?;
        candidate.refresh(Scope::Everything, source).await?;
        self.commit(candidate);

        log::info!("Deleted filter {} of action {}", removed.id, self.id);
        Ok(())
    }

    pub async fn create_condition(
        &mut self,
        draft: ConditionDraft,
        attributes: &BTreeMap<String, String>,
        source: &dyn RowSource,
    ) -> Result<Uuid, LedgerError> {
        naming::check_condition_name(
            &draft.name,
            self.conditions.iter().map(|c| c.name.as_str()),
            source.schema(),
            attributes,
        )?;

        let condition = Condition::draft(draft);
        let id = condition.id;
        let mut candidate = self.clone();
        candidate.conditions.push(condition);
        candidate.refresh(Scope::Condition(id), source).await?;
        self.commit(candidate);

        self.log_condition("Created", id);
        Ok(id)
    }

    /// Rename and/or re-formulate a condition. A rename relabels the
    /// condition's blocks in the template.
    pub async fn update_condition(
        &mut self,
        id: Uuid,
        update: ConditionUpdate,
        attributes: &BTreeMap<String, String>,
        source: &dyn RowSource,
    ) -> Result<(), LedgerError> {
        let current = self
            .condition(id)
            .ok_or(LedgerError::ConditionNotFound(id))?;
        let old_name = current.name.clone();

        let mut candidate = self.clone();

        if let Some(name) = update.name.filter(|name| *name != old_name) {
            naming::check_condition_name(
                &name,
                self.conditions
                    .iter()
                    .filter(|c| c.id != id)
                    .map(|c| c.name.as_str()),
                source.schema(),
                attributes,
            )?;
            candidate.template = naming::rename_in_template(&candidate.template, &old_name, &name)?;
            candidate.condition_mut(id)?.name = name;
        }

        if let Some(description) = update.description {
            candidate.condition_mut(id)?.description = description;
        }

        if let Some(formula) = update.formula {
            candidate.condition_mut(id)?.formula = formula;
            candidate.refresh(Scope::Condition(id), source).await?;
        }

        self.commit(candidate);
        self.log_condition("Updated", id);
        Ok(())
    }

    /// Remove a condition. The other counters keep their values; only
    /// `rows_all_false` is invalidated.
    pub async fn delete_condition(
        &mut self,
        id: Uuid,
        source: &dyn RowSource,
    ) -> Result<(), LedgerError> {
        let mut candidate = self.clone();
        let index = candidate
            .conditions
            .iter()
            .position(|c| c.id == id)
            .ok_or(LedgerError::ConditionNotFound(id))?;
        let removed = candidate.conditions.remove(index);
        candidate.refresh(Scope::Membership, source).await?;
        self.commit(candidate);

        log::info!(
            "Deleted condition '{}' ({}) of action {}",
            removed.name,
            removed.id,
            self.id
        );
        Ok(())
    }

    /// Recompute every counter as one generation
    pub async fn recompute(&mut self, source: &dyn RowSource) -> Result<(), LedgerError> {
        let mut candidate = self.clone();
        candidate.refresh(Scope::Everything, source).await?;
        self.commit(candidate);
        Ok(())
    }

    /// Whether some row admitted by the filter satisfies none of the
    /// conditions. Computed on demand and cached until the next change.
    pub async fn rows_all_false(&mut self, source: &dyn RowSource) -> Result<bool, LedgerError> {
        if let Some(cached) = self.rows_all_false {
            return Ok(cached);
        }

        let value = recompute::any_row_all_false(
            source,
            self.filter.as_ref().map(|f| &f.formula),
            self.conditions.iter().map(|c| &c.formula),
        )
        .await?;
        self.rows_all_false = Some(value);
        Ok(value)
    }

    /// Flag every counter as stale after a schema or dataset change
    pub fn mark_stale(&mut self) {
        if let Some(filter) = self.filter.as_mut() {
            filter.state = RecordState::Stale;
        }
        for condition in &mut self.conditions {
            condition.state = RecordState::Stale;
        }
        self.rows_all_false = None;
    }

    /// Rewrite formulas that name the renamed column `old`, then recount.
    /// Returns whether any formula changed.
    pub(crate) async fn column_renamed(
        &mut self,
        old: &str,
        new: &str,
        source: &dyn RowSource,
    ) -> Result<bool, LedgerError> {
        let mut candidate = self.clone();
        let mut changed = false;
        if let Some(filter) = candidate.filter.as_mut() {
            changed |= filter.formula.rename_column(old, new);
        }
        for condition in &mut candidate.conditions {
            changed |= condition.formula.rename_column(old, new);
        }
        if !changed {
            return Ok(false);
        }

        candidate.refresh(Scope::Everything, source).await?;
        self.commit(candidate);
        log::info!("Renamed column '{}' to '{}' in action {}", old, new, self.id);
        Ok(true)
    }

    /// Delete every record that reads the dropped `column`. Losing the filter
    /// recounts every condition; losing only conditions invalidates
    /// `rows_all_false`. Returns the removed ids.
    pub(crate) async fn column_deleted(
        &mut self,
        column: &str,
        source: &dyn RowSource,
    ) -> Result<Vec<Uuid>, LedgerError> {
        let mut candidate = self.clone();
        let mut removed = Vec::new();

        let lost_filter = candidate
            .filter
            .as_ref()
            .is_some_and(|f| f.referenced_columns.contains(column));
        if lost_filter {
            if let Some(filter) = candidate.filter.take() {
                removed.push(filter.id);
            }
        }

        candidate.conditions.retain(|c| {
            if c.referenced_columns.contains(column) {
                removed.push(c.id);
                false
            } else {
                true
            }
        });

        if removed.is_empty() {
            return Ok(removed);
        }

        let scope = if lost_filter {
            Scope::Everything
        } else {
            Scope::Membership
        };
        candidate.refresh(scope, source).await?;
        self.commit(candidate);
        log::info!(
            "Deleted {} records of action {} reading column '{}'",
            removed.len(),
            self.id,
            column
        );
        Ok(removed)
    }

    /// Recompute whatever `scope` covers. `rows_all_false` always becomes unknown.
    async fn refresh(&mut self, scope: Scope, source: &dyn RowSource) -> Result<(), LedgerError> {
        let schema = source.schema();

        match scope {
            Scope::Everything => {
                if let Some(filter) = self.filter.as_mut() {
                    let (columns, text) = recompute::describe(&filter.formula, schema)?;
                    filter.n_rows_selected =
                        recompute::count(source, Some(&filter.formula)).await?;
                    filter.referenced_columns = columns;
                    filter.text_description = text;
                    filter.state = RecordState::Persisted;
                }

                for condition in &mut self.conditions {
                    let (columns, text) = recompute::describe(&condition.formula, schema)?;
                    condition.referenced_columns = columns;
                    condition.text_description = text;
                }

                let filter = self.filter.as_ref().map(|f| &f.formula);
                let counts = recompute::count_conditions(
                    source,
                    filter,
                    self.conditions.iter().map(|c| &c.formula),
                )
                .await?;
                for (condition, n) in self.conditions.iter_mut().zip(counts) {
                    condition.n_rows_selected = n;
                    condition.state = RecordState::Persisted;
                }
            }
            Scope::Condition(id) => {
                let filter = self.filter.as_ref().map(|f| f.formula.clone());
                let condition = self.condition_mut(id)?;
                let (columns, text) = recompute::describe(&condition.formula, schema)?;
                let restricted = recompute::restricted(filter.as_ref(), &condition.formula);
                condition.n_rows_selected = recompute::count(source, Some(&restricted)).await?;
                condition.referenced_columns = columns;
                condition.text_description = text;
                condition.state = RecordState::Persisted;
            }
            Scope::Membership => {}
        }

        self.rows_all_false = None;
        Ok(())
    }

    fn condition_mut(&mut self, id: Uuid) -> Result<&mut Condition, LedgerError> {
        self.conditions
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(LedgerError::ConditionNotFound(id))
    }

    fn commit(&mut self, mut candidate: Action) {
        candidate.generation = self.generation + 1;
        *self = candidate;
        log::debug!("Action {} at generation {}", self.id, self.generation);
    }

    fn log_filter(&self, verb: &str) {
        if let Some(filter) = &self.filter {
            log::info!(
                "{} filter '{}' of action {}: {} rows selected by {}",
                verb,
                filter.name,
                self.id,
                filter.n_rows_selected,
                filter.text_description
            );
        }
    }

    fn log_condition(&self, verb: &str, id: Uuid) {
        if let Some(condition) = self.condition(id) {
            log::info!(
                "{} condition '{}' of action {}: {} rows selected by {}",
                verb,
                condition.name,
                self.id,
                condition.n_rows_selected,
                condition.text_description
            );
        }
    }
}
