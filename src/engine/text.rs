//! Human-readable rendering

use super::descent::Backend;
use super::predicate::quote_ident;
use crate::dataset::ColumnSpec;
use crate::formula::document::format_datetime;
use crate::formula::{Comparison, Connective, Literal, Operand};

pub(crate) struct TextBackend;

impl Backend for TextBackend {
    type Output = String;

    fn connective(&mut self, op: Connective, children: Vec<String>) -> String {
        match op {
            Connective::Not => {
                let inner = children.concat();
                if inner.starts_with('(') {
                    format!("NOT {}", inner)
                } else {
                    format!("NOT ({})", inner)
                }
            }
            _ => format!("({})", children.join(&format!(" {} ", op))),
        }
    }

    fn comparison(&mut self, cmp: &Comparison, _column: &ColumnSpec) -> String {
        let column = quote_ident(&cmp.column);
        let symbol = cmp.operator.symbol();
        match &cmp.operand {
            Operand::None => format!("{} {}", column, symbol),
            Operand::Value(lit) => format!("{} {} {}", column, symbol, literal(lit)),
            Operand::Range(low, high) => {
                format!("{} {} {} and {}", column, symbol, literal(low), literal(high))
            }
            Operand::Column(other) => format!("{} {} {}", column, symbol, quote_ident(other)),
        }
    }
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Text(s) => format!("'{}'", s.replace('\'', "\\'")),
        Literal::Number(n) => n.to_string(),
        Literal::Boolean(b) => b.to_string(),
        Literal::DateTime(dt) => format!("'{}'", format_datetime(dt)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetSchema;
    use crate::engine::descent::walk;
    use crate::formula::{DataType, Node, Operator};

    fn render(node: &Node) -> String {
        let schema = DatasetSchema::new()
            .with("age", ColumnSpec::new(DataType::Number))
            .with("name", ColumnSpec::new(DataType::String))
            .with("vip", ColumnSpec::new(DataType::Boolean));
        walk(node, &schema, &mut TextBackend).unwrap()
    }

    #[test]
    fn test_render_and() {
        let node = Node::and(vec![
            Node::compare("age", Operator::Greater, Literal::Number(25.0)),
            Node::compare("name", Operator::BeginsWith, Literal::Text("A".to_string())),
        ]);
        assert_eq!(render(&node), r#"("age" > 25 AND "name" begins with 'A')"#);
    }

    #[test]
    fn test_render_not() {
        let leaf = Node::compare("vip", Operator::Equal, Literal::Boolean(true));
        assert_eq!(render(&Node::not(leaf.clone())), r#"NOT ("vip" = true)"#);

        let group = Node::or(vec![leaf.clone(), Node::emptiness("name", Operator::IsEmpty, DataType::String)]);
        assert_eq!(
            render(&Node::not(group)),
            r#"NOT ("vip" = true OR "name" is empty)"#
        );
    }

    #[test]
    fn test_render_between_and_fraction() {
        let node = Node::range(
            "age",
            Operator::NotBetween,
            Literal::Number(2.5),
            Literal::Number(30.0),
        );
        assert_eq!(render(&node), r#""age" not between 2.5 and 30"#);
    }

    #[test]
    fn test_render_escapes_quotes_in_column_names() {
        let schema = DatasetSchema::new().with("a\"b", ColumnSpec::new(DataType::Number));
        let node = Node::compare("a\"b", Operator::Less, Literal::Number(1.0));
        assert_eq!(
            walk(&node, &schema, &mut TextBackend).unwrap(),
            r#""a""b" < 1"#
        );
    }
}
