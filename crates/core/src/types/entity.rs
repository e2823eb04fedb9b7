//! The closed set of entity types the support tooling can query.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`EntityType`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum EntityTypeError {
    /// The input is not one of the recognized entity names.
    #[error("unknown entity type: {0:?}")]
    Unknown(String),
}

/// The four entity categories a support query can target.
///
/// The set is closed: any other value is rejected at parse time rather than
/// reaching the query layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// A store customer.
    Customer,
    /// A catalog product.
    Product,
    /// A placed order.
    Order,
    /// A support ticket.
    Ticket,
}

impl EntityType {
    /// The backing table name, quoted where it collides with a SQL keyword.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Product => "product",
            Self::Order => "\"order\"",
            Self::Ticket => "support_ticket",
        }
    }

    /// The unquoted table name, as it appears in `information_schema`.
    #[must_use]
    pub const fn schema_name(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Product => "product",
            Self::Order => "order",
            Self::Ticket => "support_ticket",
        }
    }

    /// Lowercase name used on the wire and in tool arguments.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Product => "product",
            Self::Order => "order",
            Self::Ticket => "ticket",
        }
    }

    /// Whether rows of this type belong to one specific customer.
    ///
    /// Customer-scoped entities require an authenticated identity to query;
    /// products are public catalog data.
    #[must_use]
    pub const fn is_customer_scoped(self) -> bool {
        !matches!(self, Self::Product)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = EntityTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "product" => Ok(Self::Product),
            "order" => Ok(Self::Order),
            "ticket" => Ok(Self::Ticket),
            other => Err(EntityTypeError::Unknown(other.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert_eq!(EntityType::Customer.table_name(), "customer");
        assert_eq!(EntityType::Order.table_name(), "\"order\"");
        assert_eq!(EntityType::Order.schema_name(), "order");
        assert_eq!(EntityType::Ticket.table_name(), "support_ticket");
    }

    #[test]
    fn test_parse() {
        assert_eq!("order".parse::<EntityType>().unwrap(), EntityType::Order);
        assert!("ORDER".parse::<EntityType>().is_err());
        assert!("invoice".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&EntityType::Ticket).unwrap(),
            "\"ticket\""
        );
        let parsed: EntityType = serde_json::from_str("\"product\"").unwrap();
        assert_eq!(parsed, EntityType::Product);
    }

    #[test]
    fn test_customer_scoping() {
        assert!(EntityType::Order.is_customer_scoped());
        assert!(EntityType::Ticket.is_customer_scoped());
        assert!(EntityType::Customer.is_customer_scoped());
        assert!(!EntityType::Product.is_customer_scoped());
    }
}
