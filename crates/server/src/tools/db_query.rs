//! The `db_query` tool façade.
//!
//! Single entry point the model layer invokes to fetch customer, product,
//! order, or ticket data. Runs the pipeline in fixed order (validate
//! identity, authorize, execute, format) and converts every failure into a
//! structured payload. No error ever propagates past this boundary, and no
//! fabricated rows are ever substituted for a store failure.

use serde::{Deserialize, Serialize};
use serde_json::json;
use techtrend_support_core::{Email, EntityType};
use tracing::{debug, error, instrument, warn};

use crate::gemini::FunctionDeclaration;
use crate::query::{
    Datastore, Identifier, QueryError, QueryResult, StoreError, format, guard, router,
};

/// Arguments the model supplies when calling `db_query`.
///
/// The entity type arrives as a raw string so an out-of-enumeration value
/// becomes a polite validation payload instead of a deserialization error.
#[derive(Debug, Clone, Deserialize)]
pub struct DbQueryInput {
    /// Requested entity type: customer, product, order, or ticket.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Identifier objects to filter by.
    #[serde(default)]
    pub identifiers: Vec<Identifier>,
}

/// Failure classification carried on error payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthenticationRequired,
    AccessDenied,
    ValidationError,
    ConnectionError,
    Timeout,
    SchemaError,
    InternalError,
}

/// Structured, renderable error returned in place of a result.
///
/// `formatted` is always safe to show directly to the end user.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    /// Always `true`; lets the model distinguish errors without inspecting shape.
    pub error: bool,
    /// Machine-readable failure kind.
    pub kind: ErrorKind,
    /// Always empty; failures never carry rows, so callers keying on `data`
    /// see the same shape as a result.
    pub data: Vec<serde_json::Value>,
    /// Short description of what went wrong.
    pub message: String,
    /// Actionable next step for the user.
    pub suggestion: String,
    /// User-facing rendering combining message and suggestion.
    pub formatted: String,
}

/// What the tool returns to the model layer: a result or an error payload.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ToolResponse {
    /// The query ran and was formatted.
    Result(QueryResult),
    /// Some pipeline stage failed.
    Error(ErrorPayload),
}

impl ToolResponse {
    /// The formatted result, if the call succeeded.
    #[must_use]
    pub const fn as_result(&self) -> Option<&QueryResult> {
        match self {
            Self::Result(result) => Some(result),
            Self::Error(_) => None,
        }
    }
}

/// Run a scoped data query on behalf of the model.
///
/// `identity` is the email extracted from the conversation by
/// [`crate::identity::extract_identity`]; it is the only trusted identity
/// source. Emails inside `input.identifiers` are treated as claims to be
/// checked against it, never as authentication.
#[instrument(skip(store, identity, input), fields(entity = %input.entity_type))]
pub async fn run_db_query<S: Datastore>(
    store: &S,
    identity: Option<&Email>,
    input: &DbQueryInput,
) -> ToolResponse {
    debug!(identifiers = input.identifiers.len(), "validating identity");

    let entity = match input.entity_type.parse::<EntityType>() {
        Ok(entity) => entity,
        Err(_) => {
            return query_error_payload(&QueryError::InvalidType(input.entity_type.clone()));
        }
    };

    // Fail closed: customer-scoped queries never proceed without identity.
    if entity.is_customer_scoped() && identity.is_none() {
        return error_payload(ErrorKind::AuthenticationRequired, None);
    }

    debug!("authorizing");
    if let Err(e) = guard::authorize(entity, identity, &input.identifiers) {
        return query_error_payload(&e);
    }

    let resolved = match router::resolve(entity, identity, &input.identifiers) {
        Ok(resolved) => resolved,
        Err(e) => return query_error_payload(&e),
    };

    debug!("executing");
    let rows = match store.fetch(&resolved).await {
        Ok(rows) => rows,
        Err(e) => return store_error_payload(&e),
    };

    debug!(rows = rows.len(), "formatting");
    match format::format_rows(entity, &rows) {
        Ok(result) => ToolResponse::Result(result),
        Err(e) => {
            // Contract violation between executor and formatter.
            error!(error = %e, entity = %entity, "formatter rejected row shape");
            error_payload(ErrorKind::InternalError, None)
        }
    }
}

fn query_error_payload(error: &QueryError) -> ToolResponse {
    match error {
        QueryError::AuthenticationRequired => {
            error_payload(ErrorKind::AuthenticationRequired, None)
        }
        QueryError::AccessDenied => error_payload(ErrorKind::AccessDenied, None),
        QueryError::InvalidType(_) | QueryError::Validation(_) | QueryError::MissingIdentifier(_) => {
            error_payload(ErrorKind::ValidationError, Some(error.to_string()))
        }
    }
}

fn store_error_payload(error: &StoreError) -> ToolResponse {
    warn!(error = %error, "datastore failure");
    match error {
        StoreError::Timeout(_) => error_payload(ErrorKind::Timeout, None),
        StoreError::Connection(_) => error_payload(ErrorKind::ConnectionError, None),
        StoreError::SchemaMissing(_) => error_payload(ErrorKind::SchemaError, None),
        StoreError::Database(e) => {
            error!(error = %e, "unexpected database error");
            error_payload(ErrorKind::InternalError, None)
        }
    }
}

fn error_payload(kind: ErrorKind, detail: Option<String>) -> ToolResponse {
    let (message, suggestion) = match kind {
        ErrorKind::AuthenticationRequired => (
            "I need your email address to look that up.".to_owned(),
            "Please share the email address associated with your account.".to_owned(),
        ),
        ErrorKind::AccessDenied => (
            "You can only access data linked to your own email address.".to_owned(),
            "Double-check the email or ID you provided and try again.".to_owned(),
        ),
        ErrorKind::ValidationError => (
            detail.unwrap_or_else(|| "The query parameters were invalid.".to_owned()),
            "Please provide a specific identifier like an order number, ticket number, \
             product ID, or a valid email address."
                .to_owned(),
        ),
        ErrorKind::ConnectionError => (
            "I couldn't reach the order system right now.".to_owned(),
            "Please try again in a few minutes, or contact support if the problem persists."
                .to_owned(),
        ),
        ErrorKind::Timeout => (
            "The order system is taking too long to respond.".to_owned(),
            "Please try again in a few minutes, or contact support if the problem persists."
                .to_owned(),
        ),
        ErrorKind::SchemaError => (
            "Part of the order system is currently unavailable.".to_owned(),
            "Please contact support so we can look into it.".to_owned(),
        ),
        ErrorKind::InternalError => (
            "Something went wrong on our side while processing that request.".to_owned(),
            "Please try again, or contact support if the problem persists.".to_owned(),
        ),
    };

    let formatted = format!("{message} {suggestion}");
    ToolResponse::Error(ErrorPayload {
        error: true,
        kind,
        data: Vec::new(),
        message,
        suggestion,
        formatted,
    })
}

/// The `db_query` function declaration advertised to the model.
#[must_use]
pub fn db_query_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: "db_query".to_owned(),
        description: "Query the store for customers, products, orders, or support tickets. \
                      Requires specific identifiers like productId, orderId, ticketId, or email."
            .to_owned(),
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "type": {
                    "type": "STRING",
                    "enum": ["customer", "product", "order", "ticket"],
                    "description": "Type of query: customer, product, order, or ticket"
                },
                "identifiers": {
                    "type": "ARRAY",
                    "description": "At least one identifier object to filter by",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "productId": {
                                "type": "STRING",
                                "description": "Product ID to filter by"
                            },
                            "orderId": {
                                "type": "STRING",
                                "description": "Order ID to filter by"
                            },
                            "ticketId": {
                                "type": "STRING",
                                "description": "Ticket ID to filter by"
                            },
                            "email": {
                                "type": "STRING",
                                "description": "Customer email to filter by (must match the signed-in user)"
                            }
                        }
                    }
                }
            },
            "required": ["type"]
        }),
    }
}
