//! PostgreSQL database backend using `tokio-postgres`.
//!
//! This module provides the [`PostgresBackend`] which implements the
//! [`DatabaseBackend`](crate::base::DatabaseBackend) trait over one
//! `tokio_postgres::Client`. The connection future is driven by a spawned
//! task for the lifetime of the client.

use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::NoTls;
use uno_rs_core::UnoError;

use crate::base::{DatabaseBackend, DatabaseBackendType};
use crate::value::{Row, Value};

/// A PostgreSQL database backend.
///
/// Also serves Redshift, which speaks the PostgreSQL wire protocol.
pub struct PostgresBackend {
    client: tokio_postgres::Client,
}

impl PostgresBackend {
    /// Connects using a libpq-style connection string or a `postgres://` URL.
    ///
    /// # Errors
    ///
    /// Returns [`UnoError::OperationalError`] if the connection fails.
    pub async fn connect(dbstring: &str) -> Result<Self, UnoError> {
        let (client, connection) = tokio_postgres::connect(dbstring, NoTls)
            .await
            .map_err(|e| UnoError::OperationalError(format!("PostgreSQL connect failed: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection closed with error");
            }
        });

        Ok(Self { client })
    }

    /// Converts `Value` parameters to `tokio-postgres` parameters.
    fn value_to_sql_params(params: &[Value]) -> Vec<Box<dyn ToSql + Sync + Send>> {
        params
            .iter()
            .map(|v| -> Box<dyn ToSql + Sync + Send> {
                match v {
                    Value::Null => Box::new(Option::<String>::None),
                    Value::Bool(b) => Box::new(*b),
                    Value::Int(i) => Box::new(*i),
                    Value::Float(f) => Box::new(*f),
                    Value::String(s) => Box::new(s.clone()),
                    Value::Bytes(b) => Box::new(b.clone()),
                    Value::DateTime(dt) => Box::new(*dt),
                }
            })
            .collect()
    }

    /// Converts a `tokio_postgres::Row` to our generic `Row`.
    fn convert_row(pg_row: &tokio_postgres::Row) -> Row {
        let columns: Vec<String> = pg_row
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let values: Vec<Value> = pg_row
            .columns()
            .iter()
            .enumerate()
            .map(|(i, col)| match *col.type_() {
                Type::BOOL => pg_row
                    .try_get::<_, Option<bool>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Bool),
                Type::INT2 => pg_row
                    .try_get::<_, Option<i16>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |v| Value::Int(i64::from(v))),
                Type::INT4 => pg_row
                    .try_get::<_, Option<i32>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |v| Value::Int(i64::from(v))),
                Type::INT8 => pg_row
                    .try_get::<_, Option<i64>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Int),
                Type::FLOAT4 => pg_row
                    .try_get::<_, Option<f32>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |v| Value::Float(f64::from(v))),
                Type::FLOAT8 => pg_row
                    .try_get::<_, Option<f64>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Float),
                Type::BYTEA => pg_row
                    .try_get::<_, Option<Vec<u8>>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Bytes),
                Type::TIMESTAMP => pg_row
                    .try_get::<_, Option<chrono::NaiveDateTime>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::DateTime),
                Type::TIMESTAMPTZ => pg_row
                    .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |v| Value::DateTime(v.naive_utc())),
                // Fall back to string representation for everything else
                _ => pg_row
                    .try_get::<_, Option<String>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::String),
            })
            .collect();

        Row::new(columns, values)
    }
}

#[async_trait::async_trait]
impl DatabaseBackend for PostgresBackend {
    fn vendor(&self) -> &str {
        "postgresql"
    }

    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::PostgreSQL
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, UnoError> {
        if params.is_empty() {
            self.client
                .batch_execute(sql)
                .await
                .map_err(|e| UnoError::DatabaseError(format!("{e}")))?;
            return Ok(0);
        }

        let sql_params = Self::value_to_sql_params(params);
        let param_refs: Vec<&(dyn ToSql + Sync)> = sql_params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        self.client
            .execute(sql, &param_refs)
            .await
            .map_err(|e| UnoError::DatabaseError(format!("{e}")))
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, UnoError> {
        let sql_params = Self::value_to_sql_params(params);
        let param_refs: Vec<&(dyn ToSql + Sync)> = sql_params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let rows = self
            .client
            .query(sql, &param_refs)
            .await
            .map_err(|e| UnoError::DatabaseError(format!("{e}")))?;

        Ok(rows.iter().map(Self::convert_row).collect())
    }
}

impl std::fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresBackend").finish_non_exhaustive()
    }
}
