// SPDX-License-Identifier: MIT

//! Operand types and the operators each type admits
//!
//! This is the single table the parser, the registry checks in the engine and
//! every backend consult. Adding an operator means adding a variant here,
//! listing it under the types that admit it, and the compiler then points at
//! every backend match that has to handle it.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Declared operand/column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Number,
    Boolean,
    DateTime,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    BeginsWith,
    NotBeginsWith,
    Contains,
    NotContains,
    EndsWith,
    NotEndsWith,
    IsEmpty,
    IsNotEmpty,
    Between,
    NotBetween,
}

/// What a comparison carries on its right-hand side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    /// No operand
    Nothing,
    /// One literal or one column
    Single,
    /// Two literals
    Range,
}

const STRING_OPERATORS: &[Operator] = &[
    Operator::Equal,
    Operator::NotEqual,
    Operator::BeginsWith,
    Operator::NotBeginsWith,
    Operator::Contains,
    Operator::NotContains,
    Operator::EndsWith,
    Operator::NotEndsWith,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

const ORDERED_OPERATORS: &[Operator] = &[
    Operator::Equal,
    Operator::NotEqual,
    Operator::Less,
    Operator::LessEq,
    Operator::Greater,
    Operator::GreaterEq,
    Operator::Between,
    Operator::NotBetween,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

const BOOLEAN_OPERATORS: &[Operator] = &[
    Operator::Equal,
    Operator::NotEqual,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

const ALL_OPERATORS: &[Operator] = &[
    Operator::Equal,
    Operator::NotEqual,
    Operator::Less,
    Operator::LessEq,
    Operator::Greater,
    Operator::GreaterEq,
    Operator::BeginsWith,
    Operator::NotBeginsWith,
    Operator::Contains,
    Operator::NotContains,
    Operator::EndsWith,
    Operator::NotEndsWith,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
    Operator::Between,
    Operator::NotBetween,
];

impl DataType {
    /// Builder token for this type
    pub fn token(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::DateTime => "datetime",
        }
    }

    /// Resolve a builder type token. Accepts the legacy builder names as aliases.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "string" => Some(DataType::String),
            "number" | "integer" | "double" => Some(DataType::Number),
            "boolean" => Some(DataType::Boolean),
            "datetime" | "date" => Some(DataType::DateTime),
            _ => None,
        }
    }

    /// Operators admitted for operands of this type
    pub fn operators(&self) -> &'static [Operator] {
        match self {
            DataType::String => STRING_OPERATORS,
            DataType::Number | DataType::DateTime => ORDERED_OPERATORS,
            DataType::Boolean => BOOLEAN_OPERATORS,
        }
    }
}

impl Operator {
    /// Every operator the registry knows
    pub fn all() -> &'static [Operator] {
        ALL_OPERATORS
    }

    /// Builder token
    pub fn token(&self) -> &'static str {
        match self {
            Operator::Equal => "equal",
            Operator::NotEqual => "not_equal",
            Operator::Less => "less",
            Operator::LessEq => "less_eq",
            Operator::Greater => "greater",
            Operator::GreaterEq => "greater_eq",
            Operator::BeginsWith => "begins_with",
            Operator::NotBeginsWith => "not_begins_with",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::EndsWith => "ends_with",
            Operator::NotEndsWith => "not_ends_with",
            Operator::IsEmpty => "is_empty",
            Operator::IsNotEmpty => "is_not_empty",
            Operator::Between => "between",
            Operator::NotBetween => "not_between",
        }
    }

    /// Resolve a builder token. The query builder's `less_or_equal` and
    /// `greater_or_equal` are accepted as aliases.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "less_or_equal" => Some(Operator::LessEq),
            "greater_or_equal" => Some(Operator::GreaterEq),
            other => ALL_OPERATORS.iter().copied().find(|op| op.token() == other),
        }
    }

    /// Human readable token for text renderings
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::Less => "<",
            Operator::LessEq => "<=",
            Operator::Greater => ">",
            Operator::GreaterEq => ">=",
            Operator::BeginsWith => "begins with",
            Operator::NotBeginsWith => "does not begin with",
            Operator::Contains => "contains",
            Operator::NotContains => "does not contain",
            Operator::EndsWith => "ends with",
            Operator::NotEndsWith => "does not end with",
            Operator::IsEmpty => "is empty",
            Operator::IsNotEmpty => "is not empty",
            Operator::Between => "between",
            Operator::NotBetween => "not between",
        }
    }

    /// Whether operands of `data_type` may be compared with this operator
    pub fn admits(&self, data_type: DataType) -> bool {
        data_type.operators().contains(self)
    }

    pub fn shape(&self) -> OperandShape {
        match self {
            Operator::IsEmpty | Operator::IsNotEmpty => OperandShape::Nothing,
            Operator::Between | Operator::NotBetween => OperandShape::Range,
            _ => OperandShape::Single,
        }
    }

    /// Emptiness tests look at the null/blank sentinel and are never null-guarded
    pub fn is_emptiness(&self) -> bool {
        matches!(self, Operator::IsEmpty | Operator::IsNotEmpty)
    }

    /// The operator this one negates, if any.
    ///
    /// Negated operators are evaluated as `NOT positive` and are true on a
    /// null cell; positive operators are false on a null cell.
    pub fn negates(&self) -> Option<Operator> {
        match self {
            Operator::NotEqual => Some(Operator::Equal),
            Operator::NotBeginsWith => Some(Operator::BeginsWith),
            Operator::NotContains => Some(Operator::Contains),
            Operator::NotEndsWith => Some(Operator::EndsWith),
            Operator::IsNotEmpty => Some(Operator::IsEmpty),
            Operator::NotBetween => Some(Operator::Between),
            _ => None,
        }
    }

    /// Apply an ordering operator to the result of comparing the two operands
    pub fn accepts_ordering(&self, ordering: Ordering) -> bool {
        match self {
            Operator::Equal => ordering == Ordering::Equal,
            Operator::Less => ordering == Ordering::Less,
            Operator::LessEq => ordering != Ordering::Greater,
            Operator::Greater => ordering == Ordering::Greater,
            Operator::GreaterEq => ordering != Ordering::Less,
            _ => false,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        for op in Operator::all() {
            assert_eq!(Operator::from_token(op.token()), Some(*op));
        }
        assert_eq!(Operator::from_token("less_or_equal"), Some(Operator::LessEq));
        assert_eq!(
            Operator::from_token("greater_or_equal"),
            Some(Operator::GreaterEq)
        );
        assert_eq!(Operator::from_token("like"), None);
    }

    #[test]
    fn test_type_aliases() {
        assert_eq!(DataType::from_token("integer"), Some(DataType::Number));
        assert_eq!(DataType::from_token("double"), Some(DataType::Number));
        assert_eq!(DataType::from_token("date"), Some(DataType::DateTime));
        assert_eq!(DataType::from_token("object"), None);
    }

    #[test]
    fn test_string_operators() {
        assert!(Operator::Contains.admits(DataType::String));
        assert!(Operator::BeginsWith.admits(DataType::String));
        assert!(!Operator::Greater.admits(DataType::String));
        assert!(!Operator::Between.admits(DataType::String));
    }

    #[test]
    fn test_boolean_only_equality() {
        assert!(Operator::Equal.admits(DataType::Boolean));
        assert!(Operator::NotEqual.admits(DataType::Boolean));
        assert!(!Operator::Less.admits(DataType::Boolean));
        assert!(!Operator::Contains.admits(DataType::Boolean));
    }

    #[test]
    fn test_emptiness_applies_to_every_type() {
        for dt in [
            DataType::String,
            DataType::Number,
            DataType::Boolean,
            DataType::DateTime,
        ] {
            assert!(Operator::IsEmpty.admits(dt));
            assert!(Operator::IsNotEmpty.admits(dt));
        }
    }

    #[test]
    fn test_between_is_inclusive() {
        assert!(Operator::GreaterEq.accepts_ordering(Ordering::Equal));
        assert!(Operator::LessEq.accepts_ordering(Ordering::Equal));
        assert!(!Operator::Greater.accepts_ordering(Ordering::Equal));
    }

    #[test]
    fn test_negations_point_at_positive_operators() {
        for op in Operator::all() {
            if let Some(positive) = op.negates() {
                assert!(positive.negates().is_none());
                assert_eq!(positive.shape(), op.shape());
            }
        }
    }
}
