// SPDX-License-Identifier: MIT

//! Formula expression model
//!
//! Formulas arrive from the visual query builder as JSON documents and are
//! persisted verbatim next to the filter or condition that owns them. This
//! module provides:
//! - `Node` - the typed formula tree
//! - `parse` / `serialize` - strict conversion to and from the builder document
//! - `DataType` / `Operator` - the registry of operand types and their operators

mod ast;
pub mod document;
mod types;

pub use ast::{Comparison, Connective, Literal, Node, Operand};
pub use document::{parse, parse_str, serialize};
pub use types::{DataType, OperandShape, Operator};
