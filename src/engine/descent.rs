//! The single recursive descent shared by every backend
//!
//! Arity, column resolution and type/operator checks happen here, once, so a
//! backend only ever sees comparisons that are valid against the schema.

use crate::dataset::{ColumnSpec, DatasetSchema};
use crate::error::EvalError;
use crate::formula::document::datetime_in_range;
use crate::formula::{Comparison, Connective, Literal, Node, Operand, OperandShape};

/// A compilation target for formula trees
pub(crate) trait Backend {
    type Output;

    fn connective(&mut self, op: Connective, children: Vec<Self::Output>) -> Self::Output;

    /// `column` is the schema entry for `cmp.column`
    fn comparison(&mut self, cmp: &Comparison, column: &ColumnSpec) -> Self::Output;
}

/// Walk `node` left to right, handing validated pieces to `backend`
pub(crate) fn walk<B: Backend>(
    node: &Node,
    schema: &DatasetSchema,
    backend: &mut B,
) -> Result<B::Output, EvalError> {
    match node {
        Node::Connective { op, children } => {
            check_arity(*op, children.len())?;
            let mut outputs = Vec::with_capacity(children.len());
            for child in children {
                outputs.push(walk(child, schema, backend)?);
            }
            Ok(backend.connective(*op, outputs))
        }
        Node::Comparison(cmp) => {
            let column = check_comparison(cmp, schema)?;
            Ok(backend.comparison(cmp, column))
        }
    }
}

fn check_arity(op: Connective, found: usize) -> Result<(), EvalError> {
    match op {
        Connective::Not if found != 1 => Err(EvalError::MalformedExpression(format!(
            "NOT expects exactly one operand, found {}",
            found
        ))),
        Connective::And | Connective::Or if found == 0 => Err(EvalError::MalformedExpression(
            format!("{} expects at least one operand", op),
        )),
        _ => Ok(()),
    }
}

fn check_comparison<'s>(
    cmp: &Comparison,
    schema: &'s DatasetSchema,
) -> Result<&'s ColumnSpec, EvalError> {
    let column = schema
        .get(&cmp.column)
        .ok_or_else(|| EvalError::UnknownColumn(cmp.column.clone()))?;

    if column.data_type != cmp.data_type {
        return Err(EvalError::TypeMismatch {
            column: cmp.column.clone(),
            expected: column.data_type,
            found: cmp.data_type,
        });
    }

    if !cmp.operator.admits(cmp.data_type) {
        return Err(EvalError::UnsupportedOperator {
            operator: cmp.operator,
            data_type: cmp.data_type,
        });
    }

    match (cmp.operator.shape(), &cmp.operand) {
        (OperandShape::Nothing, Operand::None) => {}
        (OperandShape::Single, Operand::Value(lit)) => check_literal(cmp, lit)?,
        (OperandShape::Range, Operand::Range(low, high)) => {
            check_literal(cmp, low)?;
            check_literal(cmp, high)?;
        }
        (OperandShape::Single, Operand::Column(other)) => {
            let spec = schema
                .get(other)
                .ok_or_else(|| EvalError::UnknownColumn(other.clone()))?;
            if spec.data_type != cmp.data_type {
                return Err(EvalError::TypeMismatch {
                    column: other.clone(),
                    expected: spec.data_type,
                    found: cmp.data_type,
                });
            }
        }
        _ => {
            return Err(EvalError::MalformedExpression(format!(
                "operator '{}' on column '{}' has the wrong operand",
                cmp.operator, cmp.column
            )))
        }
    }

    Ok(column)
}

fn check_literal(cmp: &Comparison, lit: &Literal) -> Result<(), EvalError> {
    if lit.data_type() != cmp.data_type {
        return Err(EvalError::TypeMismatch {
            column: cmp.column.clone(),
            expected: cmp.data_type,
            found: lit.data_type(),
        });
    }
    match lit {
        Literal::DateTime(dt) if !datetime_in_range(dt) => Err(EvalError::MalformedExpression(
            format!("timestamp {} on column '{}' is out of range", dt, cmp.column),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{DataType, Operator};

    /// Counts comparisons; enough to drive the checks
    struct Counter;

    impl Backend for Counter {
        type Output = usize;

        fn connective(&mut self, _op: Connective, children: Vec<usize>) -> usize {
            children.into_iter().sum()
        }

        fn comparison(&mut self, _cmp: &Comparison, _column: &ColumnSpec) -> usize {
            1
        }
    }

    fn schema() -> DatasetSchema {
        DatasetSchema::new()
            .with("age", ColumnSpec::new(DataType::Number))
            .with("name", ColumnSpec::new(DataType::String))
    }

    #[test]
    fn test_walk_counts_leaves() {
        let node = Node::and(vec![
            Node::compare("age", Operator::Greater, Literal::Number(1.0)),
            Node::not(Node::compare(
                "name",
                Operator::Equal,
                Literal::Text("x".to_string()),
            )),
        ]);
        assert_eq!(walk(&node, &schema(), &mut Counter).unwrap(), 2);
    }

    #[test]
    fn test_unknown_column() {
        let node = Node::compare("gpa", Operator::Greater, Literal::Number(1.0));
        assert_eq!(
            walk(&node, &schema(), &mut Counter),
            Err(EvalError::UnknownColumn("gpa".to_string()))
        );
    }

    #[test]
    fn test_type_mismatch() {
        let node = Node::compare("age", Operator::Equal, Literal::Text("20".to_string()));
        assert!(matches!(
            walk(&node, &schema(), &mut Counter),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_literal_disagrees_with_declared_type() {
        let node = Node::Comparison(Comparison {
            operator: Operator::Equal,
            column: "age".to_string(),
            data_type: DataType::Number,
            operand: Operand::Value(Literal::Boolean(true)),
        });
        assert!(matches!(
            walk(&node, &schema(), &mut Counter),
            Err(EvalError::TypeMismatch {
                found: DataType::Boolean,
                ..
            })
        ));
    }

    #[test]
    fn test_unsupported_operator() {
        let node = Node::compare("age", Operator::Contains, Literal::Number(1.0));
        assert_eq!(
            walk(&node, &schema(), &mut Counter),
            Err(EvalError::UnsupportedOperator {
                operator: Operator::Contains,
                data_type: DataType::Number,
            })
        );
    }

    #[test]
    fn test_malformed_arity() {
        let node = Node::Connective {
            op: Connective::Not,
            children: vec![],
        };
        assert!(matches!(
            walk(&node, &schema(), &mut Counter),
            Err(EvalError::MalformedExpression(_))
        ));
        assert!(matches!(
            walk(&Node::or(vec![]), &schema(), &mut Counter),
            Err(EvalError::MalformedExpression(_))
        ));
    }

    #[test]
    fn test_timestamp_outside_four_digit_years() {
        let schema = schema().with("joined", ColumnSpec::new(DataType::DateTime));
        let far = chrono::NaiveDate::from_ymd_opt(10000, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let node = Node::compare("joined", Operator::Greater, Literal::DateTime(far));
        assert!(matches!(
            walk(&node, &schema, &mut Counter),
            Err(EvalError::MalformedExpression(_))
        ));
    }

    #[test]
    fn test_malformed_operand() {
        let node = Node::compare("age", Operator::Between, Literal::Number(1.0));
        assert!(matches!(
            walk(&node, &schema(), &mut Counter),
            Err(EvalError::MalformedExpression(_))
        ));
    }

    #[test]
    fn test_column_operand_type_checked() {
        let node = Node::compare_columns("age", Operator::Equal, "name", DataType::Number);
        assert!(matches!(
            walk(&node, &schema(), &mut Counter),
            Err(EvalError::TypeMismatch { column, .. }) if column == "name"
        ));
    }
}
