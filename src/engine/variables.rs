use std::collections::BTreeSet;

use super::descent::Backend;
use crate::dataset::ColumnSpec;
use crate::formula::{Comparison, Connective, Operand};

/// Collects every column a formula reads, including column operands
pub(crate) struct VariablesBackend;

impl Backend for VariablesBackend {
    type Output = BTreeSet<String>;

    fn connective(&mut self, _op: Connective, children: Vec<BTreeSet<String>>) -> BTreeSet<String> {
        children.into_iter().flatten().collect()
    }

    fn comparison(&mut self, cmp: &Comparison, _column: &ColumnSpec) -> BTreeSet<String> {
        let mut names = BTreeSet::from([cmp.column.clone()]);
        if let Operand::Column(other) = &cmp.operand {
            names.insert(other.clone());
        }
        names
    }
}
