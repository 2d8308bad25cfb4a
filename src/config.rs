// SPDX-License-Identifier: MIT

//! Environment-driven settings

use std::env;
use std::str::FromStr;

use crate::dataset::{sqlite, MemoryTable, RowSource, SqliteTable};
use crate::error::AudienceError;
use crate::loader::DatasetFixture;

const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";
const DEFAULT_TABLE: &str = "dataset";

/// Which row source counts selected rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// In-memory rows tested with row masks
    Memory,
    /// SQLite queried with compiled predicates
    Store,
}

impl FromStr for Backend {
    type Err = AudienceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "store" => Ok(Backend::Store),
            other => Err(AudienceError::config(format!(
                "AUDIENCE_BACKEND must be 'memory' or 'store', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend: Backend,
    pub database_url: String,
    pub table: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl Settings {
    /// Read `AUDIENCE_BACKEND`, `AUDIENCE_DATABASE_URL` and `AUDIENCE_TABLE`
    pub fn from_env() -> Result<Self, AudienceError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AudienceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(backend) = lookup("AUDIENCE_BACKEND") {
            settings.backend = backend.parse()?;
        }
        if let Some(url) = lookup("AUDIENCE_DATABASE_URL") {
            if !url.starts_with("sqlite:") {
                return Err(AudienceError::config(format!(
                    "AUDIENCE_DATABASE_URL must be a sqlite URL, got '{}'",
                    url
                )));
            }
            settings.database_url = url;
        }
        if let Some(table) = lookup("AUDIENCE_TABLE") {
            if table.trim().is_empty() {
                return Err(AudienceError::config("AUDIENCE_TABLE must not be empty"));
            }
            settings.table = table;
        }

        Ok(settings)
    }

    /// Open the configured row source over a dataset fixture
    pub async fn open_source(
        &self,
        fixture: DatasetFixture,
    ) -> Result<Box<dyn RowSource>, AudienceError> {
        match self.backend {
            Backend::Memory => Ok(Box::new(fixture.into_memory_table()?)),
            Backend::Store => {
                let rows = fixture.typed_rows()?;
                let pool = sqlite::connect(&self.database_url).await?;
                let table = SqliteTable::load(pool, &self.table, fixture.schema, &rows).await?;
                Ok(Box::new(table))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.backend, Backend::Memory);
        assert_eq!(settings.database_url, "sqlite::memory:");
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("AUDIENCE_BACKEND", "Store"),
            ("AUDIENCE_DATABASE_URL", "sqlite://audience.db"),
            ("AUDIENCE_TABLE", "students"),
        ]))
        .unwrap();
        assert_eq!(settings.backend, Backend::Store);
        assert_eq!(settings.database_url, "sqlite://audience.db");
        assert_eq!(settings.table, "students");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Settings::from_lookup(lookup(&[("AUDIENCE_BACKEND", "pandas")])),
            Err(AudienceError::Config(_))
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[("AUDIENCE_DATABASE_URL", "postgres://x")])),
            Err(AudienceError::Config(_))
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[("AUDIENCE_TABLE", " ")])),
            Err(AudienceError::Config(_))
        ));
    }
}
