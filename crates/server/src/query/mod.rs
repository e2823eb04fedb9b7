//! The scoped query pipeline: routing, authorization, execution, formatting.
//!
//! The pipeline is a strict sequence. [`guard::authorize`] runs before
//! [`router::resolve`], which runs before [`executor::Datastore::fetch`],
//! which runs before [`format::format_rows`]. The tool façade in
//! [`crate::tools`] is the only caller that composes all four.

use serde::Deserialize;

pub mod executor;
pub mod format;
pub mod guard;
pub mod router;

pub use executor::{Datastore, PgStore, StoreError};
pub use format::{FormatError, QueryResult, format_rows};
pub use router::{ResolvedQuery, SqlParam};

/// A raw row as returned by the datastore: column name to JSON value.
///
/// Using JSON values keeps the [`Datastore`] trait implementable by test
/// doubles without dragging database row types through the formatter.
pub type RawRow = serde_json::Value;

/// One identifier object as supplied in tool arguments.
///
/// At most one field is expected per object; extra fields are ignored by the
/// router, which only reads the field matching the requested entity type.
/// ID fields accept both JSON numbers and numeric strings, since models
/// routinely emit either.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    /// Product ID filter.
    pub product_id: Option<serde_json::Value>,
    /// Order ID filter.
    pub order_id: Option<serde_json::Value>,
    /// Ticket ID filter.
    pub ticket_id: Option<serde_json::Value>,
    /// Customer email filter. Must match the caller's identity.
    pub email: Option<String>,
}

/// Errors produced by the routing and authorization layers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    /// The requested entity type is not in the closed set.
    #[error("invalid query type: {0:?}")]
    InvalidType(String),

    /// An identifier failed validation (bad ID or email format).
    #[error("{0}")]
    Validation(String),

    /// A required identifier is missing for this entity type.
    #[error("missing required identifier: {0}")]
    MissingIdentifier(&'static str),

    /// No verified identity is available for a customer-scoped query.
    #[error("authentication required")]
    AuthenticationRequired,

    /// An identifier references another identity's data.
    #[error("cannot access another identity's data")]
    AccessDenied,
}

/// Parse an ID-like identifier value into a positive integer.
///
/// Accepts a JSON number or a numeric string. Anything else, including
/// zero and negative values, is a validation error rather than a silently
/// dropped filter.
pub(crate) fn parse_positive_id(
    value: &serde_json::Value,
    field: &str,
) -> Result<i32, QueryError> {
    let parsed = match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| QueryError::Validation(format!("{field} is not a valid integer: {n}"))),
        serde_json::Value::String(s) => s.trim().parse::<i32>().map_err(|_| {
            QueryError::Validation(format!("{field} is not a valid integer: {s:?}"))
        }),
        other => Err(QueryError::Validation(format!(
            "{field} must be a number or numeric string, got {other}"
        ))),
    }?;

    if parsed <= 0 {
        return Err(QueryError::Validation(format!(
            "{field} must be a positive integer, got {parsed}"
        )));
    }

    Ok(parsed)
}
