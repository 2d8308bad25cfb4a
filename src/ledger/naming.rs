//! Condition names and the template tokens that carry them

use regex::{Captures, Regex};
use std::collections::BTreeMap;

use crate::dataset::DatasetSchema;
use crate::error::{LedgerError, ReservedBy};

/// `^[A-Za-z_][A-Za-z0-9_]*$`
pub fn is_legal_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Check a condition name against its siblings, the dataset columns and the
/// workflow attributes. `siblings` must not include the condition being renamed.
pub(crate) fn check_condition_name<'a>(
    name: &str,
    mut siblings: impl Iterator<Item = &'a str>,
    schema: &DatasetSchema,
    attributes: &BTreeMap<String, String>,
) -> Result<(), LedgerError> {
    if !is_legal_name(name) {
        return Err(LedgerError::IllegalConditionName(name.to_string()));
    }
    if siblings.any(|sibling| sibling == name) {
        return Err(LedgerError::DuplicateConditionName(name.to_string()));
    }
    if schema.contains(name) {
        return Err(LedgerError::ReservedConditionName {
            name: name.to_string(),
            reserved_by: ReservedBy::Column,
        });
    }
    if attributes.contains_key(name) {
        return Err(LedgerError::ReservedConditionName {
            name: name.to_string(),
            reserved_by: ReservedBy::Attribute,
        });
    }
    Ok(())
}

/// Relabel every `{% if OLD %}` block in `template` to `{% if NEW %}`.
///
/// Whitespace inside the block is kept; nothing outside the blocks changes.
pub fn rename_in_template(template: &str, old: &str, new: &str) -> Result<String, LedgerError> {
    let block = Regex::new(&format!(r"(\{{%\s*if\s+){}(\s*%\}})", regex::escape(old)))
        .map_err(|_| LedgerError::IllegalConditionName(old.to_string()))?;

    Ok(block
        .replace_all(template, |caps: &Captures| {
            format!("{}{}{}", &caps[1], new, &caps[2])
        })
        .into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnSpec;
    use crate::formula::DataType;

    #[test]
    fn test_legal_names() {
        assert!(is_legal_name("C1"));
        assert!(is_legal_name("_high_age"));
        assert!(!is_legal_name(""));
        assert!(!is_legal_name("1st"));
        assert!(!is_legal_name("high age"));
        assert!(!is_legal_name("año"));
    }

    #[test]
    fn test_check_condition_name_errors_are_distinct() {
        let schema = DatasetSchema::new().with("age", ColumnSpec::new(DataType::Number));
        let attributes = BTreeMap::from([("course".to_string(), "ELEC1601".to_string())]);
        let siblings = ["C1", "C2"];

        let check = |name: &str| {
            check_condition_name(name, siblings.iter().copied(), &schema, &attributes)
        };

        assert!(check("C3").is_ok());
        assert!(matches!(check("C1"), Err(LedgerError::DuplicateConditionName(_))));
        assert!(matches!(
            check("age"),
            Err(LedgerError::ReservedConditionName {
                reserved_by: ReservedBy::Column,
                ..
            })
        ));
        assert!(matches!(
            check("course"),
            Err(LedgerError::ReservedConditionName {
                reserved_by: ReservedBy::Attribute,
                ..
            })
        ));
        assert!(matches!(check("no way"), Err(LedgerError::IllegalConditionName(_))));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let schema = DatasetSchema::new();
        let attributes = BTreeMap::new();
        assert!(check_condition_name("c1", ["C1"].into_iter(), &schema, &attributes).is_ok());
    }

    #[test]
    fn test_rename_in_template() {
        let template = "Hi {{ name }},{% if C1 %} well done{% endif %}{%if   C1%}!{% endif %} C1 {% if C10 %}x{% endif %}";
        let renamed = rename_in_template(template, "C1", "HighAge").unwrap();
        assert_eq!(
            renamed,
            "Hi {{ name }},{% if HighAge %} well done{% endif %}{%if   HighAge%}!{% endif %} C1 {% if C10 %}x{% endif %}"
        );
    }
}
