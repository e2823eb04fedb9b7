//! Query router: maps entity type + identifiers to a fixed query template.
//!
//! Exactly four parameterized templates exist, one per [`EntityType`]. SQL
//! text is never assembled from caller input; identifiers only ever appear
//! as bind parameters.

use techtrend_support_core::{Email, EntityType, OrderId, ProductId, TicketId};

use super::{Identifier, QueryError, parse_positive_id};

/// A bind parameter for a resolved query.
///
/// Parameters stay typed until the executor hands them to the driver, so
/// the newtype sqlx impls do the encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    /// The identity email.
    Email(Email),
    /// Product IDs, bound as an `int4[]` for `= ANY($n)` clauses.
    ProductIds(Vec<ProductId>),
    /// Order IDs, bound as an `int4[]`.
    OrderIds(Vec<OrderId>),
    /// Ticket IDs, bound as an `int4[]`.
    TicketIds(Vec<TicketId>),
}

/// A fully resolved query: template plus parameters, ready for execution.
#[derive(Debug, Clone)]
pub struct ResolvedQuery {
    /// Entity type the query targets; selects the formatter profile.
    pub entity: EntityType,
    /// Parameterized SQL text with `$n` placeholders.
    pub sql: String,
    /// Bind parameters in placeholder order.
    pub params: Vec<SqlParam>,
}

/// The typed filter an identifier list reduces to for one entity type.
///
/// Resolving to a tagged union up front removes optional-field shape
/// checking from everything downstream of the router.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EntityFilter {
    Customer { email: Email },
    Product { ids: Vec<ProductId> },
    Order { email: Email, ids: Vec<OrderId> },
    Ticket { email: Email, ids: Vec<TicketId> },
}

/// Resolve an entity type and identifier list into a query template.
///
/// The identity is required for customer-scoped entities and ignored for
/// products. Every ID must parse as a positive integer; results are always
/// ordered by primary key so formatted output is stable across runs.
///
/// # Errors
///
/// Returns [`QueryError::AuthenticationRequired`] for a scoped query with
/// no identity, [`QueryError::MissingIdentifier`] for a product query with
/// no product ID, and [`QueryError::Validation`] for malformed IDs.
pub fn resolve(
    entity: EntityType,
    identity: Option<&Email>,
    identifiers: &[Identifier],
) -> Result<ResolvedQuery, QueryError> {
    let filter = build_filter(entity, identity, identifiers)?;

    let (sql, params) = match filter {
        EntityFilter::Customer { email } => customer_query(email),
        EntityFilter::Product { ids } => product_query(ids),
        EntityFilter::Order { email, ids } => order_query(email, ids),
        EntityFilter::Ticket { email, ids } => ticket_query(email, ids),
    };

    Ok(ResolvedQuery {
        entity,
        sql,
        params,
    })
}

fn build_filter(
    entity: EntityType,
    identity: Option<&Email>,
    identifiers: &[Identifier],
) -> Result<EntityFilter, QueryError> {
    if entity == EntityType::Product {
        let ids = collect_ids(identifiers, |id| id.product_id.as_ref(), "productId")?;
        if ids.is_empty() {
            return Err(QueryError::MissingIdentifier(
                "productId is required for product queries",
            ));
        }
        return Ok(EntityFilter::Product { ids });
    }

    // Customer-scoped entities filter on the verified identity only.
    let email = identity
        .ok_or(QueryError::AuthenticationRequired)?
        .clone();

    Ok(match entity {
        // Identifiers carry no customer ID field; customers resolve by email only.
        EntityType::Customer => EntityFilter::Customer { email },
        EntityType::Order => EntityFilter::Order {
            email,
            ids: collect_ids(identifiers, |id| id.order_id.as_ref(), "orderId")?,
        },
        EntityType::Ticket => EntityFilter::Ticket {
            email,
            ids: collect_ids(identifiers, |id| id.ticket_id.as_ref(), "ticketId")?,
        },
        EntityType::Product => unreachable!("handled above"),
    })
}

fn collect_ids<'a, T: From<i32>>(
    identifiers: &'a [Identifier],
    field: impl Fn(&'a Identifier) -> Option<&'a serde_json::Value>,
    name: &str,
) -> Result<Vec<T>, QueryError> {
    identifiers
        .iter()
        .filter_map(|id| field(id))
        .map(|value| parse_positive_id(value, name).map(T::from))
        .collect()
}

fn customer_query(email: Email) -> (String, Vec<SqlParam>) {
    let sql = format!(
        "SELECT id, name, email, phone, address \
         FROM {table} \
         WHERE email = $1 \
         ORDER BY id",
        table = EntityType::Customer.table_name(),
    );
    (sql, vec![SqlParam::Email(email)])
}

fn product_query(ids: Vec<ProductId>) -> (String, Vec<SqlParam>) {
    let sql = format!(
        "SELECT id, name, price, description, stock \
         FROM {table} \
         WHERE id = ANY($1) \
         ORDER BY id",
        table = EntityType::Product.table_name(),
    );
    (sql, vec![SqlParam::ProductIds(ids)])
}

fn order_query(email: Email, ids: Vec<OrderId>) -> (String, Vec<SqlParam>) {
    let mut sql = format!(
        "SELECT o.id, o.order_date, o.total, o.status, \
                c.name AS customer_name, c.email AS customer_email, \
                p.name AS product_name, p.price AS product_price \
         FROM {table} o \
         JOIN customer c ON o.customer_id = c.id \
         JOIN product p ON o.product_id = p.id \
         WHERE c.email = $1",
        table = EntityType::Order.table_name(),
    );
    let mut params = vec![SqlParam::Email(email)];
    if !ids.is_empty() {
        sql.push_str(" AND o.id = ANY($2)");
        params.push(SqlParam::OrderIds(ids));
    }
    sql.push_str(" ORDER BY o.id");
    (sql, params)
}

fn ticket_query(email: Email, ids: Vec<TicketId>) -> (String, Vec<SqlParam>) {
    let mut sql = format!(
        "SELECT st.id, st.issue, st.status, st.created_at, \
                c.name AS customer_name, c.email AS customer_email \
         FROM {table} st \
         JOIN customer c ON st.customer_id = c.id \
         WHERE c.email = $1",
        table = EntityType::Ticket.table_name(),
    );
    let mut params = vec![SqlParam::Email(email)];
    if !ids.is_empty() {
        sql.push_str(" AND st.id = ANY($2)");
        params.push(SqlParam::TicketIds(ids));
    }
    sql.push_str(" ORDER BY st.id");
    (sql, params)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> Email {
        Email::parse("alice@example.com").unwrap()
    }

    fn identifier(value: serde_json::Value) -> Identifier {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_order_query_without_ids() {
        let resolved = resolve(EntityType::Order, Some(&alice()), &[]).unwrap();
        assert!(resolved.sql.contains("FROM \"order\" o"));
        assert!(resolved.sql.contains("WHERE c.email = $1"));
        assert!(resolved.sql.ends_with("ORDER BY o.id"));
        assert!(!resolved.sql.contains("$2"));
        assert_eq!(resolved.params, vec![SqlParam::Email(alice())]);
    }

    #[test]
    fn test_order_query_with_ids() {
        let ids = [identifier(json!({"orderId": 3})), identifier(json!({"orderId": "7"}))];
        let resolved = resolve(EntityType::Order, Some(&alice()), &ids).unwrap();
        assert!(resolved.sql.contains("AND o.id = ANY($2)"));
        assert_eq!(
            resolved.params,
            vec![
                SqlParam::Email(alice()),
                SqlParam::OrderIds(vec![OrderId::new(3), OrderId::new(7)]),
            ]
        );
    }

    #[test]
    fn test_product_query_requires_id() {
        let err = resolve(EntityType::Product, None, &[]).unwrap_err();
        assert!(matches!(err, QueryError::MissingIdentifier(_)));
    }

    #[test]
    fn test_product_query_ignores_identity() {
        let ids = [identifier(json!({"productId": "4"}))];
        let resolved = resolve(EntityType::Product, None, &ids).unwrap();
        assert!(resolved.sql.contains("FROM product"));
        assert!(!resolved.sql.contains("email"));
        assert_eq!(
            resolved.params,
            vec![SqlParam::ProductIds(vec![ProductId::new(4)])]
        );
    }

    #[test]
    fn test_scoped_query_requires_identity() {
        let err = resolve(EntityType::Ticket, None, &[]).unwrap_err();
        assert!(matches!(err, QueryError::AuthenticationRequired));
    }

    #[test]
    fn test_non_numeric_id_is_validation_error() {
        let ids = [identifier(json!({"ticketId": "twelve"}))];
        let err = resolve(EntityType::Ticket, Some(&alice()), &ids).unwrap_err();
        assert!(matches!(err, QueryError::Validation(_)));
    }

    #[test]
    fn test_ticket_query_shape() {
        let ids = [identifier(json!({"ticketId": 12}))];
        let resolved = resolve(EntityType::Ticket, Some(&alice()), &ids).unwrap();
        assert!(resolved.sql.contains("FROM support_ticket st"));
        assert!(resolved.sql.contains("JOIN customer c ON st.customer_id = c.id"));
        assert!(resolved.sql.contains("AND st.id = ANY($2)"));
    }

    #[test]
    fn test_customer_query_shape() {
        let resolved = resolve(EntityType::Customer, Some(&alice()), &[]).unwrap();
        assert!(resolved.sql.contains("FROM customer"));
        assert!(resolved.sql.contains("WHERE email = $1"));
    }
}
