// SPDX-License-Identifier: MIT

//! Condition & filter ledger
//!
//! Owns the filter and conditions of each action, keeps their derived
//! counters consistent and enforces condition naming rules.

mod action;
pub mod naming;
mod recompute;
mod workflow;

pub use action::{
    Action, Condition, ConditionDraft, ConditionUpdate, Filter, FilterDraft, RecordState,
};
pub use workflow::Workflow;
