// SPDX-License-Identifier: MIT

//! Counting primitives for a recompute generation

use futures::future::try_join_all;
use std::collections::BTreeSet;

use crate::dataset::{DatasetSchema, RowSource};
use crate::engine;
use crate::error::LedgerError;
use crate::formula::Node;

/// Validate `formula` against `schema`, returning its referenced columns and
/// its text rendering
pub(crate) fn describe(
    formula: &Node,
    schema: &DatasetSchema,
) -> Result<(BTreeSet<String>, String), LedgerError> {
    let columns = engine::variables(formula, schema)?;
    let text = engine::to_text(formula, schema)?;
    Ok((columns, text))
}

/// Rows selected by `formula` within the population `filter` admits
pub(crate) fn restricted(filter: Option<&Node>, formula: &Node) -> Node {
    match filter {
        Some(filter) => Node::and(vec![filter.clone(), formula.clone()]),
        None => formula.clone(),
    }
}

pub(crate) async fn count(
    source: &dyn RowSource,
    formula: Option<&Node>,
) -> Result<usize, LedgerError> {
    source
        .count_selected(formula)
        .await
        .map_err(|e| LedgerError::RecomputeFailure(e.to_string()))
}

/// Count every condition within the filter population, concurrently.
/// Any failure fails the whole batch.
pub(crate) async fn count_conditions<'a>(
    source: &dyn RowSource,
    filter: Option<&Node>,
    conditions: impl Iterator<Item = &'a Node>,
) -> Result<Vec<usize>, LedgerError> {
    let formulas: Vec<Node> = conditions.map(|c| restricted(filter, c)).collect();
    try_join_all(formulas.iter().map(|f| count(source, Some(f)))).await
}

/// Whether some row in the filter population satisfies none of `conditions`
pub(crate) async fn any_row_all_false<'a>(
    source: &dyn RowSource,
    filter: Option<&Node>,
    conditions: impl Iterator<Item = &'a Node>,
) -> Result<bool, LedgerError> {
    let conditions: Vec<Node> = conditions.cloned().collect();
    if conditions.is_empty() {
        return Ok(false);
    }
    let none = restricted(filter, &Node::not(Node::or(conditions)));
    Ok(count(source, Some(&none)).await? > 0)
}
