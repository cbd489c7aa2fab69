//! Data store access
//!
//! The pipeline executes exactly one statement per question through the
//! `QueryBackend` seam. The Postgres implementation maps driver failures into
//! a closed error taxonomy so the execution guard can tell a malformed
//! generated statement apart from a lost connection.

use crate::value::{CellValue, ResultSet, Row};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row as SqlxRow, TypeInfo};
use thiserror::Error;
use tracing::warn;

/// Closed failure classes for statement execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The statement itself is invalid (syntax, unknown column/table).
    MalformedStatement,
    /// The statement ran into a data/type coercion problem.
    DataCoercion,
    /// The store is unreachable or the connection dropped.
    Connection,
    /// Anything the driver reports that fits no other class.
    Other,
}

#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Statement execution seam. Each request runs over its own acquired
/// connection; backends must not share per-request state.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// The store's native current-date expression, substituted for the
    /// symbolic `CURRENT_DATE` token before execution.
    fn current_date_expr(&self) -> &str;

    async fn run(&self, statement: &str) -> Result<ResultSet, StoreError>;
}

/// PostgreSQL query backend over a connection pool.
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryBackend for PgBackend {
    fn current_date_expr(&self) -> &str {
        "CURRENT_DATE"
    }

    async fn run(&self, statement: &str) -> Result<ResultSet, StoreError> {
        let rows = sqlx::query(statement)
            .fetch_all(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;

        let mut result = match rows.first() {
            Some(first) => ResultSet::new(
                first
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
            ),
            None => return Ok(ResultSet::empty()),
        };

        for row in &rows {
            result.push(decode_row(row));
        }
        Ok(result)
    }
}

pub(crate) fn decode_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| decode_cell(row, idx, column.type_info().name()))
        .collect()
}

fn decode_cell(row: &PgRow, idx: usize, type_name: &str) -> CellValue {
    match type_name {
        "INT2" => opt(row.try_get::<Option<i16>, _>(idx)).map_or(CellValue::Null, |v| {
            CellValue::Int(i64::from(v))
        }),
        "INT4" => opt(row.try_get::<Option<i32>, _>(idx)).map_or(CellValue::Null, |v| {
            CellValue::Int(i64::from(v))
        }),
        "INT8" => opt(row.try_get::<Option<i64>, _>(idx)).map_or(CellValue::Null, CellValue::Int),
        "NUMERIC" => {
            opt(row.try_get::<Option<Decimal>, _>(idx)).map_or(CellValue::Null, CellValue::Decimal)
        }
        "FLOAT4" => opt(row.try_get::<Option<f32>, _>(idx))
            .and_then(|v| Decimal::try_from(v).ok())
            .map_or(CellValue::Null, CellValue::Decimal),
        "FLOAT8" => opt(row.try_get::<Option<f64>, _>(idx))
            .and_then(|v| Decimal::try_from(v).ok())
            .map_or(CellValue::Null, CellValue::Decimal),
        "DATE" => {
            opt(row.try_get::<Option<NaiveDate>, _>(idx)).map_or(CellValue::Null, CellValue::Date)
        }
        "TIMESTAMP" => opt(row.try_get::<Option<NaiveDateTime>, _>(idx))
            .map_or(CellValue::Null, CellValue::Timestamp),
        "TIMESTAMPTZ" => opt(row.try_get::<Option<DateTime<Utc>>, _>(idx))
            .map_or(CellValue::Null, |v| CellValue::Timestamp(v.naive_utc())),
        "BYTEA" => {
            opt(row.try_get::<Option<Vec<u8>>, _>(idx)).map_or(CellValue::Null, CellValue::Bytes)
        }
        "BOOL" => opt(row.try_get::<Option<bool>, _>(idx))
            .map_or(CellValue::Null, |v| CellValue::Int(i64::from(v))),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
            opt(row.try_get::<Option<String>, _>(idx)).map_or(CellValue::Null, CellValue::Text)
        }
        other => match opt(row.try_get::<Option<String>, _>(idx)) {
            Some(text) => CellValue::Text(text),
            None => {
                warn!(column_type = other, "undecodable column type, treating as NULL");
                CellValue::Null
            }
        },
    }
}

fn opt<T>(value: Result<Option<T>, sqlx::Error>) -> Option<T> {
    value.ok().flatten()
}

/// Map a driver error onto the closed taxonomy. SQLSTATE class 42 covers
/// syntax and unknown-object errors, class 22 covers data exceptions.
fn classify_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) => {
            let class: String = db
                .code()
                .map(|c| c.chars().take(2).collect())
                .unwrap_or_default();
            let kind = match class.as_str() {
                "42" | "26" => StoreErrorKind::MalformedStatement,
                "22" => StoreErrorKind::DataCoercion,
                "08" => StoreErrorKind::Connection,
                _ => StoreErrorKind::Other,
            };
            StoreError::new(kind, db.message().to_string())
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => StoreError::new(StoreErrorKind::Connection, err.to_string()),
        _ => StoreError::new(StoreErrorKind::Other, err.to_string()),
    }
}
