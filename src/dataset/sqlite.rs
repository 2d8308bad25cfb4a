// SPDX-License-Identifier: MIT

//! SQLite-backed dataset evaluated with compiled predicates

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row as _;
use std::str::FromStr;

use super::schema::DatasetSchema;
use super::source::RowSource;
use super::value::{CellValue, Row};
use crate::engine::{self, quote_ident, Predicate, SqlParam};
use crate::error::StoreError;
use crate::formula::document::{format_datetime, parse_datetime};
use crate::formula::{DataType, Node};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Open a pool for `database_url`.
///
/// The pool holds a single connection: an in-memory database lives and dies
/// with its connection.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    log::debug!("Connected to {}", database_url);
    Ok(pool)
}

/// One dataset table
pub struct SqliteTable {
    pool: SqlitePool,
    table: String,
    schema: DatasetSchema,
}

impl SqliteTable {
    /// (Re)create the table for `schema`, dropping any previous contents
    pub async fn create(
        pool: SqlitePool,
        table: &str,
        schema: DatasetSchema,
    ) -> Result<Self, StoreError> {
        let columns = schema
            .column_names()
            .into_iter()
            .map(|name| {
                let spec = &schema.columns[name];
                let mut ddl = format!("{} {}", quote_ident(name), column_type(spec.data_type));
                if !spec.nullable {
                    ddl.push_str(" NOT NULL");
                }
                ddl
            })
            .collect::<Vec<_>>()
            .join(", ");

        let quoted = quote_ident(table);
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", quoted))
            .execute(&pool)
            .await?;
        sqlx::query(&format!("CREATE TABLE {} ({})", quoted, columns))
            .execute(&pool)
            .await?;

        log::debug!("Created table {} with {} columns", table, schema.columns.len());
        Ok(Self {
            pool,
            table: table.to_string(),
            schema,
        })
    }

    /// Create the table and fill it with `rows`
    pub async fn load(
        pool: SqlitePool,
        table: &str,
        schema: DatasetSchema,
        rows: &[Row],
    ) -> Result<Self, StoreError> {
        let store = Self::create(pool, table, schema).await?;
        store.insert_rows(rows).await?;
        Ok(store)
    }

    /// Append rows in one transaction. Every row must validate against the schema.
    pub async fn insert_rows(&self, rows: &[Row]) -> Result<(), StoreError> {
        let names = self.schema.column_names();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.table),
            names
                .iter()
                .map(|n| quote_ident(n))
                .collect::<Vec<_>>()
                .join(", "),
            vec!["?"; names.len()].join(", ")
        );

        for row in rows {
            row.validate(&self.schema)?;
        }

        let mut tx = self.pool.begin().await?;
        for row in rows {
            let mut query = sqlx::query(&sql);
            for name in &names {
                query = bind_cell(query, row.get(name));
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        log::debug!("Inserted {} rows into {}", rows.len(), self.table);
        Ok(())
    }

    pub async fn rename_column(&mut self, old: &str, new: &str) -> Result<(), StoreError> {
        let spec = self
            .schema
            .get(old)
            .cloned()
            .ok_or_else(|| StoreError::conversion(old, "column is not in the schema"))?;
        sqlx::query(&format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            quote_ident(&self.table),
            quote_ident(old),
            quote_ident(new)
        ))
        .execute(&self.pool)
        .await?;

        self.schema.columns.remove(old);
        self.schema.columns.insert(new.to_string(), spec);
        Ok(())
    }

    pub async fn drop_column(&mut self, name: &str) -> Result<(), StoreError> {
        if !self.schema.contains(name) {
            return Err(StoreError::conversion(name, "column is not in the schema"));
        }
        sqlx::query(&format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_ident(&self.table),
            quote_ident(name)
        ))
        .execute(&self.pool)
        .await?;

        self.schema.columns.remove(name);
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn compile(&self, formula: Option<&Node>) -> Result<Predicate, StoreError> {
        match formula {
            Some(node) => Ok(engine::to_predicate(node, &self.schema)?),
            None => Ok(Predicate {
                sql: "1=1".to_string(),
                params: vec![],
            }),
        }
    }

    fn decode_row(&self, row: &SqliteRow) -> Result<Row, StoreError> {
        let mut decoded = Row::new();
        for (name, spec) in &self.schema.columns {
            let column = name.as_str();
            let cell = match spec.data_type {
                DataType::String => row
                    .try_get::<Option<String>, _>(column)?
                    .map(CellValue::Text),
                DataType::Number => row
                    .try_get::<Option<f64>, _>(column)?
                    .map(CellValue::Number),
                DataType::Boolean => row
                    .try_get::<Option<bool>, _>(column)?
                    .map(CellValue::Boolean),
                DataType::DateTime => match row.try_get::<Option<String>, _>(column)? {
                    Some(text) => Some(CellValue::DateTime(parse_datetime(&text).ok_or_else(
                        || StoreError::conversion(column, format!("'{}' is not a timestamp", text)),
                    )?)),
                    None => None,
                },
            };
            decoded.insert(name.clone(), cell.unwrap_or(CellValue::Null));
        }
        Ok(decoded)
    }
}

#[async_trait]
impl RowSource for SqliteTable {
    fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    async fn count_selected(&self, formula: Option<&Node>) -> Result<usize, StoreError> {
        let predicate = self.compile(formula)?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            quote_ident(&self.table),
            predicate.sql
        );
        log::debug!("{} {:?}", sql, predicate.params);

        let mut query = sqlx::query(&sql);
        for param in &predicate.params {
            query = bind_param(query, param);
        }
        let count: i64 = query.fetch_one(&self.pool).await?.try_get(0)?;
        Ok(count as usize)
    }

    async fn select_rows(&self, formula: Option<&Node>) -> Result<Vec<Row>, StoreError> {
        let predicate = self.compile(formula)?;
        let sql = format!(
            "SELECT * FROM {} WHERE {} ORDER BY rowid",
            quote_ident(&self.table),
            predicate.sql
        );

        let mut query = sqlx::query(&sql);
        for param in &predicate.params {
            query = bind_param(query, param);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(|row| self.decode_row(row)).collect()
    }
}

fn column_type(data_type: DataType) -> &'static str {
    match data_type {
        DataType::String => "TEXT",
        DataType::Number => "REAL",
        DataType::Boolean => "BOOLEAN",
        // Canonical timestamps sort lexicographically
        DataType::DateTime => "TEXT",
    }
}

fn bind_cell<'q>(query: SqliteQuery<'q>, cell: Option<&CellValue>) -> SqliteQuery<'q> {
    match cell {
        None | Some(CellValue::Null) => query.bind(None::<String>),
        Some(CellValue::Text(s)) => query.bind(s.clone()),
        Some(CellValue::Number(n)) => query.bind(*n),
        Some(CellValue::Boolean(b)) => query.bind(*b),
        Some(CellValue::DateTime(dt)) => query.bind(format_datetime(dt)),
    }
}

fn bind_param<'q>(query: SqliteQuery<'q>, param: &SqlParam) -> SqliteQuery<'q> {
    match param {
        SqlParam::Text(s) | SqlParam::DateTime(s) => query.bind(s.clone()),
        SqlParam::Number(n) => query.bind(*n),
        SqlParam::Boolean(b) => query.bind(*b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ColumnSpec, EmptySentinel};
    use crate::formula::{parse, Literal, Operator};
    use serde_json::json;

    fn schema() -> DatasetSchema {
        DatasetSchema::new()
            .with("sid", ColumnSpec::new(DataType::Number).key())
            .with("age", ColumnSpec::new(DataType::Number))
            .with(
                "name",
                ColumnSpec::new(DataType::String).with_empty(EmptySentinel::NullOrBlank),
            )
            .with("vip", ColumnSpec::new(DataType::Boolean))
            .with("joined", ColumnSpec::new(DataType::DateTime))
    }

    fn rows() -> Vec<Row> {
        let s = schema();
        [
            json!({"sid": 1, "age": 20, "name": "Ann", "vip": true, "joined": "2024-01-10T09:00:00"}),
            json!({"sid": 2, "age": 30, "name": "", "vip": false, "joined": "2024-03-01T12:30:00.250"}),
            json!({"sid": 3, "age": 40, "name": null, "vip": null, "joined": null}),
        ]
        .iter()
        .map(|v| Row::from_json(&s, v.as_object().unwrap()).unwrap())
        .collect()
    }

    async fn table() -> SqliteTable {
        let pool = connect("sqlite::memory:").await.unwrap();
        SqliteTable::load(pool, "dataset", schema(), &rows())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_count_selected() {
        let t = table().await;
        let over = Node::compare("age", Operator::Greater, Literal::Number(25.0));
        assert_eq!(t.count_selected(None).await.unwrap(), 3);
        assert_eq!(t.count_selected(Some(&over)).await.unwrap(), 2);
        assert_eq!(t.count_selected(Some(&Node::not(over))).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_null_and_blank_semantics() {
        let t = table().await;
        let empty = Node::emptiness("name", Operator::IsEmpty, DataType::String);
        let not_vip = Node::compare("vip", Operator::NotEqual, Literal::Boolean(true));
        let vip = Node::compare("vip", Operator::Equal, Literal::Boolean(true));

        assert_eq!(t.count_selected(Some(&empty)).await.unwrap(), 2);
        assert_eq!(t.count_selected(Some(&not_vip)).await.unwrap(), 2);
        assert_eq!(t.count_selected(Some(&Node::not(vip))).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_datetime_comparison() {
        let t = table().await;
        let node = parse(&json!({
            "field": "joined", "type": "datetime", "operator": "between",
            "value": ["2024-03-01T12:30:00", "2024-12-31T00:00:00"]
        }))
        .unwrap();
        assert_eq!(t.count_selected(Some(&node)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_string_operators_are_case_sensitive() {
        let t = table().await;
        let lower = Node::compare("name", Operator::BeginsWith, Literal::Text("a".to_string()));
        let ends = Node::compare("name", Operator::EndsWith, Literal::Text("nn".to_string()));
        assert_eq!(t.count_selected(Some(&lower)).await.unwrap(), 0);
        assert_eq!(t.count_selected(Some(&ends)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_select_rows_round_trips_cells() {
        let t = table().await;
        let selected = t.select_rows(None).await.unwrap();
        assert_eq!(selected, rows());
    }

    #[tokio::test]
    async fn test_rename_and_drop_column() {
        let mut t = table().await;
        t.rename_column("age", "years").await.unwrap();
        let over = Node::compare("years", Operator::Greater, Literal::Number(25.0));
        assert_eq!(t.count_selected(Some(&over)).await.unwrap(), 2);

        t.drop_column("years").await.unwrap();
        assert!(!t.schema().contains("years"));
        assert!(matches!(
            t.count_selected(Some(&over)).await,
            Err(StoreError::Eval(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_rejects_unknown_column() {
        let t = table().await;
        let stray = Row::new().with("gpa", CellValue::Number(3.0));
        assert!(t.insert_rows(&[stray]).await.is_err());
    }

    #[tokio::test]
    async fn test_insert_rejects_sparse_and_mistyped_rows() {
        let t = table().await;
        let sparse: Row = rows()
            .remove(0)
            .into_cells()
            .filter(|(k, _)| k != "age")
            .collect();
        assert!(matches!(
            t.insert_rows(&[sparse]).await,
            Err(StoreError::Conversion { .. })
        ));

        let mistyped = rows().remove(0).with("age", CellValue::Text("abc".to_string()));
        assert!(matches!(
            t.insert_rows(&[mistyped]).await,
            Err(StoreError::Conversion { .. })
        ));

        // Nothing from a rejected batch is stored
        assert_eq!(t.count_selected(None).await.unwrap(), 3);
    }
}
