//! Authorization guard: row-level scoping to the caller's own identity.
//!
//! Runs strictly before the query executor; a denial never reaches the
//! datastore.

use techtrend_support_core::{Email, EntityType};

use super::{Identifier, QueryError};

/// Check that a query stays inside the caller's own data.
///
/// For customer-scoped entities (customer, order, ticket) the only email
/// ever used to filter rows is the verified identity. An explicit
/// `identifier.email` is allowed only when it equals the identity, so a
/// crafted identifier can never widen the scope. Product queries are
/// public catalog data and exempt from scoping.
///
/// # Errors
///
/// - [`QueryError::AuthenticationRequired`] when a scoped query has no
///   identity.
/// - [`QueryError::AccessDenied`] when an identifier references a
///   different email, regardless of whether matching rows exist.
/// - [`QueryError::Validation`] when an identifier email is malformed.
pub fn authorize(
    entity: EntityType,
    identity: Option<&Email>,
    identifiers: &[Identifier],
) -> Result<(), QueryError> {
    if !entity.is_customer_scoped() {
        return Ok(());
    }

    let identity = identity.ok_or(QueryError::AuthenticationRequired)?;

    for identifier in identifiers {
        if let Some(raw) = identifier.email.as_deref() {
            let claimed = Email::parse(raw).map_err(|e| {
                QueryError::Validation(format!("invalid email in identifier: {e}"))
            })?;
            if &claimed != identity {
                tracing::warn!(
                    entity = %entity,
                    "identifier email does not match verified identity, denying"
                );
                return Err(QueryError::AccessDenied);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> Email {
        Email::parse("alice@example.com").unwrap()
    }

    fn with_email(email: &str) -> Identifier {
        serde_json::from_value(json!({ "email": email })).unwrap()
    }

    #[test]
    fn test_own_email_is_allowed() {
        let ids = [with_email("alice@example.com")];
        assert!(authorize(EntityType::Order, Some(&alice()), &ids).is_ok());
    }

    #[test]
    fn test_own_email_differing_in_case_is_allowed() {
        let ids = [with_email("Alice@Example.COM")];
        assert!(authorize(EntityType::Ticket, Some(&alice()), &ids).is_ok());
    }

    #[test]
    fn test_foreign_email_is_denied() {
        let ids = [with_email("bob@example.com")];
        let err = authorize(EntityType::Order, Some(&alice()), &ids).unwrap_err();
        assert!(matches!(err, QueryError::AccessDenied));
    }

    #[test]
    fn test_foreign_email_among_valid_ones_is_denied() {
        let ids = [with_email("alice@example.com"), with_email("bob@example.com")];
        let err = authorize(EntityType::Customer, Some(&alice()), &ids).unwrap_err();
        assert!(matches!(err, QueryError::AccessDenied));
    }

    #[test]
    fn test_missing_identity_is_authentication_required() {
        let err = authorize(EntityType::Order, None, &[]).unwrap_err();
        assert!(matches!(err, QueryError::AuthenticationRequired));
    }

    #[test]
    fn test_product_is_exempt_from_scoping() {
        assert!(authorize(EntityType::Product, None, &[]).is_ok());
        let ids = [with_email("bob@example.com")];
        assert!(authorize(EntityType::Product, None, &ids).is_ok());
    }

    #[test]
    fn test_malformed_identifier_email_is_validation_error() {
        let ids = [with_email("not-an-email")];
        let err = authorize(EntityType::Order, Some(&alice()), &ids).unwrap_err();
        assert!(matches!(err, QueryError::Validation(_)));
    }
}
