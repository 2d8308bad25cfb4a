// SPDX-License-Identifier: MIT

//! Row-mask compilation for in-memory datasets

use super::descent::Backend;
use crate::dataset::{CellValue, ColumnSpec, EmptySentinel, Row};
use crate::error::EvalError;
use crate::formula::{Comparison, Connective, Operand, Operator};

type MaskFn = Box<dyn Fn(&Row) -> Result<bool, EvalError> + Send + Sync>;

/// A compiled boolean test over a single row
pub struct RowMask {
    test: MaskFn,
}

impl RowMask {
    pub fn test(&self, row: &Row) -> Result<bool, EvalError> {
        (self.test)(row)
    }

    /// Indices of the rows the mask selects
    pub fn select(&self, rows: &[Row]) -> Result<Vec<usize>, EvalError> {
        let mut selected = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if self.test(row)? {
                selected.push(index);
            }
        }
        Ok(selected)
    }

    pub fn count(&self, rows: &[Row]) -> Result<usize, EvalError> {
        let mut total = 0;
        for row in rows {
            if self.test(row)? {
                total += 1;
            }
        }
        Ok(total)
    }
}

impl std::fmt::Debug for RowMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RowMask")
    }
}

enum Rhs {
    Nothing,
    Value(CellValue),
    Range(CellValue, CellValue),
    Column(String),
}

pub(crate) struct MaskBackend;

impl Backend for MaskBackend {
    type Output = RowMask;

    fn connective(&mut self, op: Connective, children: Vec<RowMask>) -> RowMask {
        // Every child is evaluated so that a missing value anywhere surfaces
        let test: MaskFn = match op {
            Connective::And => Box::new(move |row| {
                let mut all = true;
                for child in &children {
                    all &= child.test(row)?;
                }
                Ok(all)
            }),
            Connective::Or => Box::new(move |row| {
                let mut any = false;
                for child in &children {
                    any |= child.test(row)?;
                }
                Ok(any)
            }),
            Connective::Not => Box::new(move |row| {
                let mut result = true;
                for child in &children {
                    result = !child.test(row)?;
                }
                Ok(result)
            }),
        };
        RowMask { test }
    }

    fn comparison(&mut self, cmp: &Comparison, column: &ColumnSpec) -> RowMask {
        let name = cmp.column.clone();
        let operator = cmp.operator;
        let sentinel = column.empty;
        let rhs = match &cmp.operand {
            Operand::None => Rhs::Nothing,
            Operand::Value(lit) => Rhs::Value(CellValue::from(lit)),
            Operand::Range(low, high) => Rhs::Range(CellValue::from(low), CellValue::from(high)),
            Operand::Column(other) => Rhs::Column(other.clone()),
        };

        let test: MaskFn = Box::new(move |row| {
            let cell = lookup(row, &name)?;

            if operator.is_emptiness() {
                let empty = is_empty(cell, sentinel);
                return Ok(if operator == Operator::IsEmpty {
                    empty
                } else {
                    !empty
                });
            }

            let positive = operator.negates().unwrap_or(operator);
            let hit = match &rhs {
                Rhs::Value(value) => holds(positive, cell, value),
                Rhs::Column(other) => holds(positive, cell, lookup(row, other)?),
                Rhs::Range(low, high) => {
                    holds(Operator::GreaterEq, cell, low) && holds(Operator::LessEq, cell, high)
                }
                Rhs::Nothing => false,
            };

            Ok(if operator.negates().is_some() {
                !hit
            } else {
                hit
            })
        });
        RowMask { test }
    }
}

fn lookup<'r>(row: &'r Row, column: &str) -> Result<&'r CellValue, EvalError> {
    row.get(column).ok_or_else(|| EvalError::MissingValue {
        column: column.to_string(),
    })
}

fn is_empty(cell: &CellValue, sentinel: EmptySentinel) -> bool {
    match (cell, sentinel) {
        (CellValue::Null, _) => true,
        (CellValue::Text(s), EmptySentinel::NullOrBlank) => s.is_empty(),
        _ => false,
    }
}

/// A positive comparison; false whenever either side is null
fn holds(op: Operator, left: &CellValue, right: &CellValue) -> bool {
    if left.is_null() || right.is_null() {
        return false;
    }
    match (op, left, right) {
        (Operator::BeginsWith, CellValue::Text(l), CellValue::Text(r)) => l.starts_with(r.as_str()),
        (Operator::Contains, CellValue::Text(l), CellValue::Text(r)) => l.contains(r.as_str()),
        (Operator::EndsWith, CellValue::Text(l), CellValue::Text(r)) => l.ends_with(r.as_str()),
        _ => left
            .compare(right)
            .map(|ordering| op.accepts_ordering(ordering))
            .unwrap_or(false),
    }
}
