//! Builder document parser and serializer
//!
//! Documents look like:
//! - `{"condition": "AND", "rules": [...]}`
//! - `{"field": "age", "type": "number", "operator": "greater", "value": 25}`
//! - `{"field": "age", "type": "number", "operator": "between", "value": [20, 30]}`
//! - `{"field": "end", "type": "datetime", "operator": "less", "value_field": "start"}`

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use std::ops::RangeInclusive;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

use super::ast::{Comparison, Connective, Literal, Node, Operand};
use super::types::{DataType, OperandShape, Operator};
use crate::error::FormulaParseError;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATETIME_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Years whose canonical text is four digits, so text order is time order
const YEAR_RANGE: RangeInclusive<i32> = 0..=9999;

const GROUP_KEYS: &[&str] = &["condition", "rules", "not", "id", "input", "valid"];
const RULE_KEYS: &[&str] = &[
    "field",
    "type",
    "operator",
    "value",
    "value_field",
    "id",
    "input",
    "valid",
];

/// Largest integer an f64 holds exactly
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Parse a builder document into a formula tree
pub fn parse(doc: &Value) -> Result<Node, FormulaParseError> {
    let obj = doc.as_object().ok_or(FormulaParseError::NotAnObject)?;

    if obj.contains_key("condition") {
        parse_group(obj)
    } else {
        parse_rule(obj).map(Node::Comparison)
    }
}

/// Parse a builder document given as JSON text
pub fn parse_str(input: &str) -> Result<Node, FormulaParseError> {
    let doc: Value = serde_json::from_str(input)?;
    parse(&doc)
}

/// Serialize a formula tree to its canonical builder document
pub fn serialize(node: &Node) -> Value {
    match node {
        Node::Connective { op, children } => json!({
            "condition": op.to_string(),
            "rules": children.iter().map(serialize).collect::<Vec<_>>(),
        }),
        Node::Comparison(cmp) => serialize_rule(cmp),
    }
}

fn check_keys(obj: &Map<String, Value>, allowed: &[&str]) -> Result<(), FormulaParseError> {
    match obj.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(FormulaParseError::invalid(key.as_str(), "unexpected key")),
        None => Ok(()),
    }
}

fn parse_group(obj: &Map<String, Value>) -> Result<Node, FormulaParseError> {
    check_keys(obj, GROUP_KEYS)?;
    let token = obj
        .get("condition")
        .and_then(Value::as_str)
        .ok_or(FormulaParseError::MissingField("condition"))?;

    let op = match token {
        "AND" => Connective::And,
        "OR" => Connective::Or,
        "NOT" => Connective::Not,
        other => return Err(FormulaParseError::UnknownConnective(other.to_string())),
    };

    let rules = obj
        .get("rules")
        .and_then(Value::as_array)
        .ok_or(FormulaParseError::MissingField("rules"))?;

    match op {
        Connective::Not if rules.len() != 1 => {
            return Err(FormulaParseError::BadArity {
                connective: op.to_string(),
                expected: "exactly 1",
                found: rules.len(),
            })
        }
        Connective::And | Connective::Or if rules.is_empty() => {
            return Err(FormulaParseError::BadArity {
                connective: op.to_string(),
                expected: "at least 1",
                found: 0,
            })
        }
        _ => {}
    }

    let children = rules.iter().map(parse).collect::<Result<Vec<_>, _>>()?;
    let node = Node::Connective { op, children };

    // Query builder groups carry negation as a flag
    match obj.get("not") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(node),
        Some(Value::Bool(true)) => Ok(Node::not(node)),
        Some(_) => Err(FormulaParseError::invalid("not", "expected a boolean")),
    }
}

fn parse_rule(obj: &Map<String, Value>) -> Result<Comparison, FormulaParseError> {
    check_keys(obj, RULE_KEYS)?;
    let column = obj
        .get("field")
        .and_then(Value::as_str)
        .ok_or(FormulaParseError::MissingField("field"))?
        .to_string();

    let op_token = obj
        .get("operator")
        .and_then(Value::as_str)
        .ok_or(FormulaParseError::MissingField("operator"))?;
    let operator = Operator::from_token(op_token)
        .ok_or_else(|| FormulaParseError::UnknownOperator(op_token.to_string()))?;

    let type_token = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(FormulaParseError::MissingField("type"))?;
    let data_type = DataType::from_token(type_token)
        .ok_or_else(|| FormulaParseError::UnknownType(type_token.to_string()))?;

    let value = obj.get("value").filter(|v| !v.is_null());
    let value_field = obj.get("value_field").filter(|v| !v.is_null());

    let operand = match (operator.shape(), value, value_field) {
        (OperandShape::Nothing, None, None) => Operand::None,
        (OperandShape::Single, Some(v), None) => Operand::Value(parse_literal(v, data_type)?),
        (OperandShape::Single, None, Some(other)) => Operand::Column(
            other
                .as_str()
                .ok_or_else(|| FormulaParseError::invalid("value_field", "expected a column name"))?
                .to_string(),
        ),
        (OperandShape::Single | OperandShape::Range, None, None) => {
            return Err(FormulaParseError::MissingField("value"))
        }
        (OperandShape::Range, Some(v), None) => match v.as_array().map(Vec::as_slice) {
            Some([low, high]) => Operand::Range(
                parse_literal(low, data_type)?,
                parse_literal(high, data_type)?,
            ),
            _ => {
                return Err(FormulaParseError::invalid(
                    "value",
                    "between expects a two element array",
                ))
            }
        },
        _ => {
            return Err(FormulaParseError::UnexpectedOperand {
                operator: operator.to_string(),
            })
        }
    };

    Ok(Comparison {
        operator,
        column,
        data_type,
        operand,
    })
}

fn parse_literal(value: &Value, data_type: DataType) -> Result<Literal, FormulaParseError> {
    let invalid = || {
        FormulaParseError::invalid(
            "value",
            format!("{} is not a valid {} value", value, data_type),
        )
    };

    match data_type {
        DataType::String => value
            .as_str()
            .map(|s| Literal::Text(s.to_string()))
            .ok_or_else(invalid),
        DataType::Number => {
            let n = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            n.filter(|n| n.is_finite())
                .map(Literal::Number)
                .ok_or_else(invalid)
        }
        DataType::Boolean => match value {
            Value::Bool(b) => Ok(Literal::Boolean(*b)),
            Value::String(s) if s == "true" => Ok(Literal::Boolean(true)),
            Value::String(s) if s == "false" => Ok(Literal::Boolean(false)),
            _ => Err(invalid()),
        },
        DataType::DateTime => value
            .as_str()
            .and_then(parse_datetime)
            .map(Literal::DateTime)
            .ok_or_else(invalid),
    }
}

/// Parse a timestamp, converting any offset to UTC. Years outside
/// 0000-9999 are rejected.
pub fn parse_datetime(input: &str) -> Option<NaiveDateTime> {
    parse_any_datetime(input.trim()).filter(datetime_in_range)
}

/// Whether `dt` has a four digit year
pub fn datetime_in_range(dt: &NaiveDateTime) -> bool {
    YEAR_RANGE.contains(&dt.year())
}

fn parse_any_datetime(input: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.naive_utc());
    }
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Canonical text form of a timestamp. Sorts lexicographically in time order.
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

fn serialize_rule(cmp: &Comparison) -> Value {
    let mut obj = Map::new();
    obj.insert("field".to_string(), Value::String(cmp.column.clone()));
    obj.insert(
        "type".to_string(),
        Value::String(cmp.data_type.token().to_string()),
    );
    obj.insert(
        "operator".to_string(),
        Value::String(cmp.operator.token().to_string()),
    );
    match &cmp.operand {
        Operand::None => {}
        Operand::Value(lit) => {
            obj.insert("value".to_string(), literal_to_json(lit));
        }
        Operand::Range(low, high) => {
            obj.insert(
                "value".to_string(),
                Value::Array(vec![literal_to_json(low), literal_to_json(high)]),
            );
        }
        Operand::Column(other) => {
            obj.insert("value_field".to_string(), Value::String(other.clone()));
        }
    }
    Value::Object(obj)
}

fn literal_to_json(lit: &Literal) -> Value {
    match lit {
        Literal::Text(s) => Value::String(s.clone()),
        Literal::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_EXACT_INTEGER => {
            json!(*n as i64)
        }
        Literal::Number(n) => json!(n),
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::DateTime(dt) => Value::String(format_datetime(dt)),
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let doc = Value::deserialize(deserializer)?;
        parse(&doc).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_rule() {
        let node = parse(&json!({
            "field": "age", "type": "number", "operator": "greater", "value": 25
        }))
        .unwrap();
        assert_eq!(
            node,
            Node::compare("age", Operator::Greater, Literal::Number(25.0))
        );
    }

    #[test]
    fn test_parse_group() {
        let node = parse(&json!({
            "condition": "AND",
            "rules": [
                {"field": "age", "type": "number", "operator": "greater", "value": 25},
                {"field": "name", "type": "string", "operator": "begins_with", "value": "A"}
            ]
        }))
        .unwrap();
        assert_eq!(
            node,
            Node::and(vec![
                Node::compare("age", Operator::Greater, Literal::Number(25.0)),
                Node::compare(
                    "name",
                    Operator::BeginsWith,
                    Literal::Text("A".to_string())
                ),
            ])
        );
    }

    #[test]
    fn test_parse_not_requires_one_child() {
        let err = parse(&json!({"condition": "NOT", "rules": []})).unwrap_err();
        assert!(matches!(err, FormulaParseError::BadArity { found: 0, .. }));

        let rule = json!({"field": "a", "type": "boolean", "operator": "equal", "value": true});
        let err = parse(&json!({"condition": "NOT", "rules": [rule.clone(), rule]})).unwrap_err();
        assert!(matches!(err, FormulaParseError::BadArity { found: 2, .. }));
    }

    #[test]
    fn test_parse_empty_and_rejected() {
        let err = parse(&json!({"condition": "OR", "rules": []})).unwrap_err();
        assert!(matches!(err, FormulaParseError::BadArity { .. }));
    }

    #[test]
    fn test_parse_unknown_operator() {
        let err = parse(&json!({
            "field": "age", "type": "number", "operator": "like", "value": 1
        }))
        .unwrap_err();
        assert!(matches!(err, FormulaParseError::UnknownOperator(op) if op == "like"));
    }

    #[test]
    fn test_parse_unknown_connective() {
        let err = parse(&json!({"condition": "XOR", "rules": []})).unwrap_err();
        assert!(matches!(err, FormulaParseError::UnknownConnective(_)));
    }

    #[test]
    fn test_parse_missing_type() {
        let err = parse(&json!({"field": "age", "operator": "greater", "value": 1})).unwrap_err();
        assert!(matches!(err, FormulaParseError::MissingField("type")));
    }

    #[test]
    fn test_parse_missing_value() {
        let err = parse(&json!({"field": "age", "type": "number", "operator": "greater"}))
            .unwrap_err();
        assert!(matches!(err, FormulaParseError::MissingField("value")));
    }

    #[test]
    fn test_parse_is_empty_rejects_value() {
        let node = parse(&json!({
            "field": "email", "type": "string", "operator": "is_empty", "value": null
        }))
        .unwrap();
        assert_eq!(
            node,
            Node::emptiness("email", Operator::IsEmpty, DataType::String)
        );

        let err = parse(&json!({
            "field": "email", "type": "string", "operator": "is_empty", "value": "x"
        }))
        .unwrap_err();
        assert!(matches!(err, FormulaParseError::UnexpectedOperand { .. }));
    }

    #[test]
    fn test_parse_between() {
        let node = parse(&json!({
            "field": "age", "type": "number", "operator": "between", "value": [20, 30]
        }))
        .unwrap();
        assert_eq!(
            node,
            Node::range(
                "age",
                Operator::Between,
                Literal::Number(20.0),
                Literal::Number(30.0)
            )
        );

        let err = parse(&json!({
            "field": "age", "type": "number", "operator": "between", "value": [20]
        }))
        .unwrap_err();
        assert!(matches!(err, FormulaParseError::InvalidValue { .. }));
    }

    #[test]
    fn test_parse_value_field() {
        let node = parse(&json!({
            "field": "end", "type": "datetime", "operator": "greater", "value_field": "start"
        }))
        .unwrap();
        assert_eq!(
            node,
            Node::compare_columns("end", Operator::Greater, "start", DataType::DateTime)
        );
    }

    #[test]
    fn test_parse_type_mismatched_literal() {
        let err = parse(&json!({
            "field": "age", "type": "number", "operator": "equal", "value": "old"
        }))
        .unwrap_err();
        assert!(matches!(err, FormulaParseError::InvalidValue { .. }));
    }

    #[test]
    fn test_parse_legacy_builder_group() {
        let node = parse(&json!({
            "condition": "OR",
            "not": true,
            "valid": true,
            "rules": [{
                "id": "age", "field": "age", "type": "integer", "input": "number",
                "operator": "less_or_equal", "value": "25"
            }]
        }))
        .unwrap();
        assert_eq!(
            node,
            Node::not(Node::or(vec![Node::compare(
                "age",
                Operator::LessEq,
                Literal::Number(25.0)
            )]))
        );
    }

    #[test]
    fn test_datetime_offset_converted_to_utc() {
        let node = parse(&json!({
            "field": "due", "type": "datetime", "operator": "less",
            "value": "2024-03-01T10:00:00+02:00"
        }))
        .unwrap();
        assert_eq!(
            serialize(&node)["value"],
            json!("2024-03-01T08:00:00")
        );
    }

    #[test]
    fn test_serialize_canonical_and_idempotent() {
        let doc = json!({
            "condition": "AND",
            "not": false,
            "rules": [
                {"field": "age", "type": "double", "operator": "greater_or_equal", "value": "20.5"},
                {"field": "ok", "type": "boolean", "operator": "equal", "value": "true"},
                {"field": "age", "type": "number", "operator": "not_between", "value": [1, 2]}
            ]
        });
        let once = serialize(&parse(&doc).unwrap());
        assert_eq!(
            once,
            json!({
                "condition": "AND",
                "rules": [
                    {"field": "age", "type": "number", "operator": "greater_eq", "value": 20.5},
                    {"field": "ok", "type": "boolean", "operator": "equal", "value": true},
                    {"field": "age", "type": "number", "operator": "not_between", "value": [1, 2]}
                ]
            })
        );
        let twice = serialize(&parse(&once).unwrap());
        assert_eq!(
            serde_json::to_string(&once).unwrap(),
            serde_json::to_string(&twice).unwrap()
        );
    }

    #[test]
    fn test_node_serde_through_yaml() {
        let yaml = r#"
condition: NOT
rules:
  - field: age
    type: number
    operator: greater
    value: 25
"#;
        let node: Node = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            node,
            Node::not(Node::compare(
                "age",
                Operator::Greater,
                Literal::Number(25.0)
            ))
        );
    }

    #[test]
    fn test_parse_rejects_unexpected_keys() {
        let err = parse(&json!({
            "field": "age", "type": "number", "operator": "greater", "value": 25, "bogus": 1
        }))
        .unwrap_err();
        assert!(matches!(err, FormulaParseError::InvalidValue { ref field, .. } if field == "bogus"));

        let err = parse(&json!({
            "condition": "AND",
            "rules": [{"field": "age", "type": "number", "operator": "greater", "value": 25}],
            "field": "x"
        }))
        .unwrap_err();
        assert!(matches!(err, FormulaParseError::InvalidValue { ref field, .. } if field == "field"));
    }

    #[test]
    fn test_datetime_year_range() {
        assert!(parse_datetime("0000-01-01T00:00:00").is_some());
        assert!(parse_datetime("9999-12-31T23:59:59").is_some());
        assert!(parse_datetime("+10000-01-01T00:00:00").is_none());
        assert!(parse_datetime("-0001-12-31T00:00:00").is_none());

        let err = parse(&json!({
            "field": "joined", "type": "datetime", "operator": "greater",
            "value": "+10000-01-01T00:00:00"
        }))
        .unwrap_err();
        assert!(matches!(err, FormulaParseError::InvalidValue { .. }));
    }

    #[test]
    fn test_canonical_datetimes_sort_in_time_order() {
        let inputs = [
            "0000-01-01",
            "0999-06-30T12:00:00",
            "2024-01-01",
            "9999-12-31T23:59:59.5",
        ];
        let texts: Vec<String> = inputs
            .iter()
            .map(|t| format_datetime(&parse_datetime(t).unwrap()))
            .collect();
        let mut sorted = texts.clone();
        sorted.sort();
        assert_eq!(texts, sorted);
    }

    #[test]
    fn test_parse_not_an_object() {
        assert!(matches!(
            parse(&json!([1, 2])),
            Err(FormulaParseError::NotAnObject)
        ));
        assert!(parse_str("{not json").is_err());
    }
}
