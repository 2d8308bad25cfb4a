//! Parameterized predicates for the relational store
//!
//! Literals are never interpolated into the SQL text; every literal becomes a
//! `?` placeholder with a matching entry in `params`. Comparisons are guarded
//! against NULL so the predicate is two valued and `NOT` agrees with the row
//! mask.

use super::descent::Backend;
use crate::dataset::{ColumnSpec, EmptySentinel};
use crate::formula::document::format_datetime;
use crate::formula::{Comparison, Connective, Literal, Operand, Operator};

/// A compiled WHERE fragment with its bound values, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// A bound value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Number(f64),
    Boolean(bool),
    /// Canonical timestamp text, as stored
    DateTime(String),
}

impl From<&Literal> for SqlParam {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Text(s) => SqlParam::Text(s.clone()),
            Literal::Number(n) => SqlParam::Number(*n),
            Literal::Boolean(b) => SqlParam::Boolean(*b),
            Literal::DateTime(dt) => SqlParam::DateTime(format_datetime(dt)),
        }
    }
}

/// Quote an identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) struct PredicateBackend;

impl Backend for PredicateBackend {
    type Output = Predicate;

    fn connective(&mut self, op: Connective, children: Vec<Predicate>) -> Predicate {
        let mut params = Vec::new();
        let mut parts = Vec::with_capacity(children.len());
        for child in children {
            parts.push(child.sql);
            params.extend(child.params);
        }

        let sql = match op {
            Connective::And => format!("({})", parts.join(" AND ")),
            Connective::Or => format!("({})", parts.join(" OR ")),
            Connective::Not => format!("(NOT {})", parts.join("")),
        };
        Predicate { sql, params }
    }

    fn comparison(&mut self, cmp: &Comparison, column: &ColumnSpec) -> Predicate {
        let col = quote_ident(&cmp.column);

        if cmp.operator.is_emptiness() {
            let empty = match column.empty {
                EmptySentinel::Null => format!("{} IS NULL", col),
                EmptySentinel::NullOrBlank => format!("({0} IS NULL OR {0} = '')", col),
            };
            let sql = if cmp.operator == Operator::IsEmpty {
                format!("({})", empty)
            } else {
                format!("(NOT ({}))", empty)
            };
            return Predicate {
                sql,
                params: vec![],
            };
        }

        let negated = cmp.operator.negates().is_some();
        let positive = cmp.operator.negates().unwrap_or(cmp.operator);

        let mut guards = vec![format!("{} IS NOT NULL", col)];
        let mut params = Vec::new();

        let test = match &cmp.operand {
            Operand::Value(lit) => {
                let (fragment, count) = positive_fragment(positive, &col, "?");
                params.extend(std::iter::repeat(SqlParam::from(lit)).take(count));
                fragment
            }
            Operand::Column(other) => {
                let other = quote_ident(other);
                guards.push(format!("{} IS NOT NULL", other));
                positive_fragment(positive, &col, &other).0
            }
            Operand::Range(low, high) => {
                params.push(SqlParam::from(low));
                params.push(SqlParam::from(high));
                format!("{0} >= ? AND {0} <= ?", col)
            }
            // Rejected by the descent
            Operand::None => "0".to_string(),
        };

        let guarded = format!("({} AND {})", guards.join(" AND "), test);
        let sql = if negated {
            format!("(NOT {})", guarded)
        } else {
            guarded
        };
        Predicate { sql, params }
    }
}

/// SQL for a positive single-operand comparison, and how many times `rhs` appears
fn positive_fragment(op: Operator, col: &str, rhs: &str) -> (String, usize) {
    match op {
        Operator::Equal => (format!("{} = {}", col, rhs), 1),
        Operator::Less => (format!("{} < {}", col, rhs), 1),
        Operator::LessEq => (format!("{} <= {}", col, rhs), 1),
        Operator::Greater => (format!("{} > {}", col, rhs), 1),
        Operator::GreaterEq => (format!("{} >= {}", col, rhs), 1),
        // instr is case sensitive, unlike LIKE
        Operator::BeginsWith => (format!("instr({}, {}) = 1", col, rhs), 1),
        Operator::Contains => (format!("instr({}, {}) > 0", col, rhs), 1),
        Operator::EndsWith => (
            format!(
                "substr({0}, length({0}) - length({1}) + 1) = {1}",
                col, rhs
            ),
            2,
        ),
        // Negated, emptiness and range operators never reach here
        _ => ("0".to_string(), 0),
    }
}
