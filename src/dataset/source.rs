// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use super::schema::DatasetSchema;
use super::value::Row;
use crate::error::StoreError;
use crate::formula::Node;

/// Where recipients come from.
///
/// Implementations must agree on every formula: the same logical snapshot
/// selects the same rows whether it is tested in memory or queried in a store.
/// `None` selects every row.
#[async_trait]
pub trait RowSource: Send + Sync {
    fn schema(&self) -> &DatasetSchema;

    async fn count_selected(&self, formula: Option<&Node>) -> Result<usize, StoreError>;

    async fn select_rows(&self, formula: Option<&Node>) -> Result<Vec<Row>, StoreError>;
}
