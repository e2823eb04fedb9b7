//! Query executor: runs resolved queries against Postgres.
//!
//! The [`Datastore`] trait is the seam between the pipeline and the actual
//! store; tests substitute an in-memory double. [`PgStore`] opens one
//! connection per call, verifies the target table exists, runs the query
//! under a bounded timeout, and always closes the connection.

use std::time::Duration;

use chrono::SecondsFormat;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Connection, Row, TypeInfo};
use tracing::instrument;

use super::{RawRow, ResolvedQuery, SqlParam};

/// Default bound on each connect / query round trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

/// Errors surfaced by the datastore layer.
///
/// Timeouts, connection failures, and schema drift are deliberately
/// distinguishable so the tool façade can pick a user-facing message; none
/// of them is ever collapsed into an empty result set.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Could not reach the database.
    #[error("failed to connect to the database: {0}")]
    Connection(#[source] sqlx::Error),

    /// Connect or query exceeded the configured timeout.
    #[error("database operation timed out after {0:?}")]
    Timeout(Duration),

    /// The expected backing table is missing (schema drift).
    #[error("expected table {0:?} does not exist")]
    SchemaMissing(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read-only access to the relational store.
///
/// One call is one logical round trip: the implementation owns connection
/// handling, timeouts, and row decoding.
pub trait Datastore {
    /// Run a resolved query and return its raw rows.
    fn fetch(
        &self,
        query: &ResolvedQuery,
    ) -> impl Future<Output = Result<Vec<RawRow>, StoreError>> + Send;
}

/// Postgres-backed [`Datastore`] with per-call connections.
///
/// No pooling: each fetch connects, checks the table, queries, and closes.
/// This matches the serverless driver pattern the data layer was designed
/// around and keeps failure classification per request.
#[derive(Clone)]
pub struct PgStore {
    database_url: SecretString,
    timeout: Duration,
}

impl PgStore {
    /// Create a store for the given connection string.
    #[must_use]
    pub const fn new(database_url: SecretString, timeout: Duration) -> Self {
        Self {
            database_url,
            timeout,
        }
    }

    /// Open a connection, bounded by the store timeout.
    async fn connect(&self) -> Result<PgConnection, StoreError> {
        let connect = PgConnection::connect(self.database_url.expose_secret());
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(StoreError::Connection(e)),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }

    /// Liveness probe for the readiness endpoint.
    ///
    /// # Errors
    ///
    /// Returns the same classification as a regular fetch.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connect().await?;
        let result = run_with_timeout(self.timeout, sqlx::query("SELECT 1").execute(&mut conn))
            .await
            .map(|_| ());
        close_quietly(conn).await;
        result
    }

    async fn table_exists(
        &self,
        conn: &mut PgConnection,
        table: &str,
    ) -> Result<bool, StoreError> {
        let query = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
               SELECT FROM information_schema.tables \
               WHERE table_name = $1 \
             )",
        )
        .bind(table);
        run_with_timeout(self.timeout, query.fetch_one(conn)).await
    }
}

impl Datastore for PgStore {
    #[instrument(skip(self, query), fields(entity = %query.entity))]
    async fn fetch(&self, query: &ResolvedQuery) -> Result<Vec<RawRow>, StoreError> {
        let mut conn = self.connect().await?;
        let result = self.fetch_on(&mut conn, query).await;
        // Closing is best-effort; a close failure must not mask the result.
        close_quietly(conn).await;
        result
    }
}

impl PgStore {
    async fn fetch_on(
        &self,
        conn: &mut PgConnection,
        query: &ResolvedQuery,
    ) -> Result<Vec<RawRow>, StoreError> {
        let table = query.entity.schema_name();
        if !self.table_exists(conn, table).await? {
            return Err(StoreError::SchemaMissing(table.to_owned()));
        }

        let mut prepared = sqlx::query(&query.sql);
        for param in &query.params {
            prepared = match param {
                SqlParam::Email(email) => prepared.bind(email.clone()),
                SqlParam::ProductIds(ids) => prepared.bind(ids.clone()),
                SqlParam::OrderIds(ids) => prepared.bind(ids.clone()),
                SqlParam::TicketIds(ids) => prepared.bind(ids.clone()),
            };
        }

        let rows = run_with_timeout(self.timeout, prepared.fetch_all(conn)).await?;
        rows.iter().map(decode_row).collect::<Result<Vec<_>, _>>()
    }
}

async fn run_with_timeout<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, sqlx::Error>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(classify(e)),
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

fn classify(error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Connection(error)
        }
        other => StoreError::Database(other),
    }
}

async fn close_quietly(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "failed to close database connection");
    }
}

/// Decode a Postgres row into a JSON object keyed by column name.
///
/// Timestamps become RFC 3339 strings, numerics become strings (precision
/// preserved for the money formatter), floats and integers pass through as
/// numbers.
fn decode_row(row: &PgRow) -> Result<RawRow, StoreError> {
    let mut object = serde_json::Map::with_capacity(row.columns().len());
    for (index, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, index, column.type_info().name())?;
        object.insert(column.name().to_owned(), value);
    }
    Ok(serde_json::Value::Object(object))
}

fn decode_column(
    row: &PgRow,
    index: usize,
    type_name: &str,
) -> Result<serde_json::Value, StoreError> {
    use serde_json::Value;

    let value = match type_name {
        "INT2" => row
            .try_get::<Option<i16>, _>(index)?
            .map_or(Value::Null, |v| Value::from(i64::from(v))),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)?
            .map_or(Value::Null, |v| Value::from(i64::from(v))),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)?
            .map_or(Value::Null, Value::from),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .map_or(Value::Null, |v| Value::from(f64::from(v))),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)?
            .map_or(Value::Null, Value::from),
        "NUMERIC" => row
            .try_get::<Option<Decimal>, _>(index)?
            .map_or(Value::Null, |v| Value::String(v.to_string())),
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)?
            .map_or(Value::Null, Value::from),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)?
            .map_or(Value::Null, |v| {
                Value::String(v.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true))
            }),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)?
            .map_or(Value::Null, |v| {
                Value::String(v.to_rfc3339_opts(SecondsFormat::Millis, true))
            }),
        // TEXT, VARCHAR, BPCHAR, NAME and anything else stringly typed.
        _ => row
            .try_get::<Option<String>, _>(index)?
            .map_or(Value::Null, Value::String),
    };

    Ok(value)
}
