//! Schema Catalog
//!
//! Describes the queryable tables: live columns and types, a configured
//! semantic description, and a few sample rows. Rebuilt per request from the
//! live schema and immutable once built.

use crate::config::TableConfig;
use crate::error::{AskError, Result};
use crate::store::decode_row;
use crate::value::ResultSet;
use async_trait::async_trait;
use sqlx::PgPool;
use std::fmt::Write as _;
use tracing::debug;

/// One table's routing/synthesis context.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    pub name: String,
    /// Ordered `(column_name, declared_type)` pairs.
    pub columns: Vec<(String, String)>,
    pub description: Option<String>,
    pub sample_rows: ResultSet,
}

impl TableDescriptor {
    /// Prompt rendering: name, description, typed column list, sample rows.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Table: {}", self.name);
        if let Some(ref desc) = self.description {
            let _ = writeln!(out, "Description: {}", desc);
        }
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|(name, ty)| format!("\"{}\" ({})", name, ty))
            .collect();
        let _ = writeln!(out, "Columns: {}", columns.join(", "));
        if !self.sample_rows.is_empty() {
            let _ = writeln!(out, "Sample rows:\n{}", self.sample_rows.to_markdown());
        }
        out
    }
}

/// Schema introspection seam, consumed read-only by routing and synthesis.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn columns(&self, table: &str) -> Result<Vec<(String, String)>>;
    async fn sample_rows(&self, table: &str, limit: usize) -> Result<ResultSet>;
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub tables: Vec<TableDescriptor>,
}

impl Catalog {
    /// Build descriptors for every configured table from the live schema.
    pub async fn build(
        source: &dyn SchemaSource,
        tables: &[TableConfig],
        sample_rows: usize,
    ) -> Result<Catalog> {
        let mut descriptors = Vec::with_capacity(tables.len());
        for table in tables {
            let columns = source.columns(&table.name).await?;
            if columns.is_empty() {
                return Err(AskError::Catalog(format!(
                    "table '{}' has no columns in the live schema",
                    table.name
                )));
            }
            let samples = source.sample_rows(&table.name, sample_rows).await?;
            debug!(table = %table.name, columns = columns.len(), "catalog entry built");
            descriptors.push(TableDescriptor {
                name: table.name.clone(),
                columns,
                description: table.description.clone(),
                sample_rows: samples,
            });
        }
        Ok(Catalog {
            tables: descriptors,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn render(&self) -> String {
        self.tables
            .iter()
            .map(TableDescriptor::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// `information_schema`-backed source for PostgreSQL.
pub struct PgSchemaSource {
    pool: PgPool,
}

impl PgSchemaSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaSource for PgSchemaSource {
    async fn columns(&self, table: &str) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE table_name = $1 ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AskError::Catalog(format!("failed to read columns of '{}': {}", table, e)))?;
        Ok(rows)
    }

    async fn sample_rows(&self, table: &str, limit: usize) -> Result<ResultSet> {
        // Table names come from configuration, not from generated text.
        let statement = format!("SELECT * FROM \"{}\" LIMIT {}", table, limit);
        let rows = sqlx::query(&statement)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AskError::Catalog(format!("failed to sample '{}': {}", table, e)))?;

        let mut result = match rows.first() {
            Some(first) => {
                use sqlx::{Column, Row as SqlxRow};
                ResultSet::new(
                    first
                        .columns()
                        .iter()
                        .map(|c| c.name().to_string())
                        .collect(),
                )
            }
            None => return Ok(ResultSet::empty()),
        };
        for row in &rows {
            result.push(decode_row(row));
        }
        Ok(result)
    }
}
