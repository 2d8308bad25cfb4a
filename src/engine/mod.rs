// SPDX-License-Identifier: MIT

//! Formula evaluation
//!
//! One formula tree, four targets:
//! - `EvalMode::Predicate` - a parameterized SQL fragment for the relational store
//! - `EvalMode::RowMask` - a boolean test over in-memory rows
//! - `EvalMode::Text` - a readable rendering for listings and logs
//! - `EvalMode::Variables` - the set of columns the formula reads
//!
//! Every mode runs the same validating descent, so a formula that fails in one
//! mode fails the same way in all of them.

mod descent;
mod mask;
mod predicate;
mod text;
mod variables;

use std::collections::BTreeSet;

use crate::dataset::DatasetSchema;
use crate::error::EvalError;
use crate::formula::Node;

use descent::walk;
pub use mask::RowMask;
pub use predicate::{quote_ident, Predicate, SqlParam};

/// Evaluation target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    Predicate,
    RowMask,
    Text,
    Variables,
}

/// Output of `evaluate`, one variant per mode
#[derive(Debug)]
pub enum EvalResult {
    Predicate(Predicate),
    RowMask(RowMask),
    Text(String),
    Variables(BTreeSet<String>),
}

impl EvalResult {
    pub fn into_predicate(self) -> Option<Predicate> {
        match self {
            EvalResult::Predicate(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_row_mask(self) -> Option<RowMask> {
        match self {
            EvalResult::RowMask(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            EvalResult::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_variables(self) -> Option<BTreeSet<String>> {
        match self {
            EvalResult::Variables(v) => Some(v),
            _ => None,
        }
    }
}

/// Evaluate `node` against `schema` in the requested mode
pub fn evaluate(node: &Node, mode: EvalMode, schema: &DatasetSchema) -> Result<EvalResult, EvalError> {
    Ok(match mode {
        EvalMode::Predicate => EvalResult::Predicate(to_predicate(node, schema)?),
        EvalMode::RowMask => EvalResult::RowMask(to_row_mask(node, schema)?),
        EvalMode::Text => EvalResult::Text(to_text(node, schema)?),
        EvalMode::Variables => EvalResult::Variables(variables(node, schema)?),
    })
}

pub fn to_predicate(node: &Node, schema: &DatasetSchema) -> Result<Predicate, EvalError> {
    walk(node, schema, &mut predicate::PredicateBackend)
}

pub fn to_row_mask(node: &Node, schema: &DatasetSchema) -> Result<RowMask, EvalError> {
    walk(node, schema, &mut mask::MaskBackend)
}

pub fn to_text(node: &Node, schema: &DatasetSchema) -> Result<String, EvalError> {
    walk(node, schema, &mut text::TextBackend)
}

pub fn variables(node: &Node, schema: &DatasetSchema) -> Result<BTreeSet<String>, EvalError> {
    walk(node, schema, &mut variables::VariablesBackend)
}

/// Check a formula against a schema without producing anything
pub fn validate(node: &Node, schema: &DatasetSchema) -> Result<(), EvalError> {
    variables(node, schema).map(|_| ())
}
