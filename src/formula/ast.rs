// SPDX-License-Identifier: MIT

//! Abstract Syntax Tree for formulas built in the query builder

use chrono::NaiveDateTime;

use super::types::{DataType, Operator};

/// A formula node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Boolean group over child nodes
    Connective {
        op: Connective,
        children: Vec<Node>,
    },
    /// Leaf comparison against a column
    Comparison(Comparison),
}

/// Boolean connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
    /// Exactly one child
    Not,
}

/// A typed comparison: `column <operator> operand`
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub operator: Operator,
    /// Left operand, resolved against the dataset schema when evaluated
    pub column: String,
    /// Declared operand type, checked against the column type when evaluated
    pub data_type: DataType,
    pub operand: Operand,
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `is_empty` / `is_not_empty`
    None,
    Value(Literal),
    /// `between` / `not_between`, inclusive on both ends
    Range(Literal, Literal),
    /// Another column of the same dataset
    Column(String),
}

/// Literal values in comparisons
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Number(f64),
    Boolean(bool),
    /// Naive timestamp, UTC
    DateTime(NaiveDateTime),
}

impl Literal {
    /// The type this literal carries
    pub fn data_type(&self) -> DataType {
        match self {
            Literal::Text(_) => DataType::String,
            Literal::Number(_) => DataType::Number,
            Literal::Boolean(_) => DataType::Boolean,
            Literal::DateTime(_) => DataType::DateTime,
        }
    }
}

impl Node {
    pub fn and(children: Vec<Node>) -> Self {
        Node::Connective {
            op: Connective::And,
            children,
        }
    }

    pub fn or(children: Vec<Node>) -> Self {
        Node::Connective {
            op: Connective::Or,
            children,
        }
    }

    pub fn not(child: Node) -> Self {
        Node::Connective {
            op: Connective::Not,
            children: vec![child],
        }
    }

    /// Comparison against a literal. The declared type is taken from the literal.
    pub fn compare(column: impl Into<String>, operator: Operator, value: Literal) -> Self {
        Node::Comparison(Comparison {
            operator,
            column: column.into(),
            data_type: value.data_type(),
            operand: Operand::Value(value),
        })
    }

    /// Inclusive range comparison (`between` or `not_between`)
    pub fn range(
        column: impl Into<String>,
        operator: Operator,
        low: Literal,
        high: Literal,
    ) -> Self {
        Node::Comparison(Comparison {
            operator,
            column: column.into(),
            data_type: low.data_type(),
            operand: Operand::Range(low, high),
        })
    }

    /// Emptiness test (`is_empty` or `is_not_empty`)
    pub fn emptiness(column: impl Into<String>, operator: Operator, data_type: DataType) -> Self {
        Node::Comparison(Comparison {
            operator,
            column: column.into(),
            data_type,
            operand: Operand::None,
        })
    }

    /// Column against column
    pub fn compare_columns(
        column: impl Into<String>,
        operator: Operator,
        other: impl Into<String>,
        data_type: DataType,
    ) -> Self {
        Node::Comparison(Comparison {
            operator,
            column: column.into(),
            data_type,
            operand: Operand::Column(other.into()),
        })
    }

    /// Rewrite every reference to `old` as `new`, returning whether anything changed
    pub fn rename_column(&mut self, old: &str, new: &str) -> bool {
        match self {
            Node::Connective { children, .. } => children
                .iter_mut()
                .fold(false, |changed, child| child.rename_column(old, new) || changed),
            Node::Comparison(cmp) => {
                let mut changed = false;
                if cmp.column == old {
                    cmp.column = new.to_string();
                    changed = true;
                }
                if let Operand::Column(other) = &mut cmp.operand {
                    if other == old {
                        *other = new.to_string();
                        changed = true;
                    }
                }
                changed
            }
        }
    }
}

impl std::fmt::Display for Connective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connective::And => write!(f, "AND"),
            Connective::Or => write!(f, "OR"),
            Connective::Not => write!(f, "NOT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connective_display() {
        assert_eq!(Connective::And.to_string(), "AND");
        assert_eq!(Connective::Or.to_string(), "OR");
        assert_eq!(Connective::Not.to_string(), "NOT");
    }

    #[test]
    fn test_compare_takes_type_from_literal() {
        let node = Node::compare("age", Operator::Greater, Literal::Number(25.0));
        match node {
            Node::Comparison(cmp) => assert_eq!(cmp.data_type, DataType::Number),
            _ => panic!("Expected comparison"),
        }
    }

    #[test]
    fn test_structural_equality() {
        let a = Node::and(vec![Node::compare(
            "name",
            Operator::Equal,
            Literal::Text("Ann".to_string()),
        )]);
        let b = Node::and(vec![Node::compare(
            "name",
            Operator::Equal,
            Literal::Text("Ann".to_string()),
        )]);
        assert_eq!(a, b);
        assert_ne!(a, Node::or(vec![]));
    }

    #[test]
    fn test_rename_column_reaches_both_operands() {
        let mut node = Node::or(vec![
            Node::compare("age", Operator::Less, Literal::Number(3.0)),
            Node::not(Node::compare_columns(
                "start",
                Operator::Less,
                "age",
                DataType::Number,
            )),
        ]);
        assert!(node.rename_column("age", "years"));
        let expected = Node::or(vec![
            Node::compare("years", Operator::Less, Literal::Number(3.0)),
            Node::not(Node::compare_columns(
                "start",
                Operator::Less,
                "years",
                DataType::Number,
            )),
        ]);
        assert_eq!(node, expected);
        assert!(!node.rename_column("missing", "other"));
    }
}
