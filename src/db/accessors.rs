// db/accessors.rs
// Connection provider interface and its PostgreSQL implementation.

use super::models::{Row, SqlValue};
use crate::error::{BoxError, ExportError, Result};
use async_trait::async_trait;
use chrono::NaiveTime;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

/// What the exporters need from a live database: run one query at a time and
/// hand back fully decoded rows. Socket lifecycle stays with the implementor.
///
/// Parameters are bound positionally as text (`$1`, `$2`, ...).
#[async_trait]
pub trait ConnectionProvider: Send {
    async fn query(&mut self, sql: &str, params: &[&str]) -> std::result::Result<Vec<Row>, BoxError>;

    async fn close(&mut self) -> std::result::Result<(), BoxError> {
        Ok(())
    }
}

// ------------------- PostgreSQL -------------------
pub struct PostgresAccessor {
    pool: sqlx::Pool<sqlx::Postgres>,
}

impl PostgresAccessor {
    pub async fn connect_with(options: PgConnectOptions) -> Result<Self> {
        // One connection: an export never runs two queries at once.
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| ExportError::connection("Failed to connect to PostgreSQL", e))?;
        Ok(Self { pool })
    }

    /// Server version string, used for the script header.
    pub async fn server_version(&self) -> Result<String> {
        sqlx::query_scalar::<_, String>("SELECT version()")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ExportError::connection("Failed to query server version", e))
    }
}

#[async_trait]
impl ConnectionProvider for PostgresAccessor {
    async fn query(&mut self, sql: &str, params: &[&str]) -> std::result::Result<Vec<Row>, BoxError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(*param);
        }
        let rows = query.fetch_all(&self.pool).await?;
        tracing::trace!(rows = rows.len(), "query returned");
        rows.iter().map(decode_row).collect()
    }

    async fn close(&mut self) -> std::result::Result<(), BoxError> {
        self.pool.close().await;
        Ok(())
    }
}

fn decode_row(row: &PgRow) -> std::result::Result<Row, BoxError> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());
        values.push(decode_value(row, idx, column.type_info().name())?);
    }
    Ok(Row::new(columns, values))
}

fn decode_value(row: &PgRow, idx: usize, type_name: &str) -> std::result::Result<SqlValue, BoxError> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(SqlValue::Null);
    }
    let value = match type_name {
        "BOOL" => SqlValue::Bool(row.try_get::<bool, _>(idx)?),
        "INT2" => SqlValue::Int(row.try_get::<i16, _>(idx)?.into()),
        "INT4" => SqlValue::Int(row.try_get::<i32, _>(idx)?.into()),
        "INT8" => SqlValue::Int(row.try_get::<i64, _>(idx)?),
        "FLOAT4" => SqlValue::Float(row.try_get::<f32, _>(idx)?.into()),
        "FLOAT8" => SqlValue::Float(row.try_get::<f64, _>(idx)?),
        "OID" => SqlValue::Int(row.try_get::<sqlx::postgres::types::Oid, _>(idx)?.0.into()),
        "BYTEA" => SqlValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?),
        "TIME" => SqlValue::Time(row.try_get::<NaiveTime, _>(idx)?),
        other => match row.try_get::<String, _>(idx) {
            Ok(s) => SqlValue::Text(s),
            Err(e) => {
                return Err(format!(
                    "column {} has type {} which cannot be decoded; select it as ::text ({})",
                    idx, other, e
                )
                .into())
            }
        },
    };
    Ok(value)
}
