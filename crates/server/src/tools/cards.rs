//! Server-side card components for the chat widget.
//!
//! Each record of a successful query becomes a `ServerCardWrapper`
//! descriptor the front end can render directly, with Markdown fallback.
//! Records are re-filtered against the verified identity before emission
//! as a second line of defense behind the authorization guard.

use serde::Serialize;
use techtrend_support_core::{Email, EntityType};

use crate::query::QueryResult;

/// One renderable card descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct CardComponent {
    /// Front-end component name; always `ServerCardWrapper`.
    pub component: &'static str,
    /// Component props.
    pub props: CardProps,
}

/// Props passed to the card wrapper.
#[derive(Debug, Clone, Serialize)]
pub struct CardProps {
    /// Card flavor: user, product, order, or ticket.
    #[serde(rename = "type")]
    pub card_type: &'static str,
    /// The record to render.
    pub data: serde_json::Value,
    pub loading: bool,
    #[serde(rename = "fallbackToMarkdown")]
    pub fallback_to_markdown: bool,
}

const fn card_type(entity: EntityType) -> &'static str {
    match entity {
        EntityType::Customer => "user",
        EntityType::Product => "product",
        EntityType::Order => "order",
        EntityType::Ticket => "ticket",
    }
}

/// Build card descriptors for a query result.
///
/// Customer-scoped records whose email does not match the identity are
/// dropped rather than rendered. Product records carry no owner and pass
/// through unfiltered.
#[must_use]
pub fn build_cards(identity: Option<&Email>, result: &QueryResult) -> Vec<CardComponent> {
    result
        .data
        .iter()
        .filter_map(|record| {
            let data = serde_json::to_value(record).ok()?;
            if result.entity.is_customer_scoped() && !owned_by(&data, result.entity, identity) {
                tracing::warn!(entity = %result.entity, "dropping card for record outside identity scope");
                return None;
            }
            Some(CardComponent {
                component: "ServerCardWrapper",
                props: CardProps {
                    card_type: card_type(result.entity),
                    data,
                    loading: false,
                    fallback_to_markdown: true,
                },
            })
        })
        .collect()
}

fn owned_by(data: &serde_json::Value, entity: EntityType, identity: Option<&Email>) -> bool {
    let Some(identity) = identity else {
        return false;
    };
    let email = match entity {
        EntityType::Customer => data.get("email"),
        EntityType::Order | EntityType::Ticket => {
            data.get("customer").and_then(|c| c.get("email"))
        }
        EntityType::Product => return true,
    };
    email.and_then(serde_json::Value::as_str) == Some(identity.as_str())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::query::format_rows;
    use serde_json::json;

    fn alice() -> Email {
        Email::parse("alice@example.com").unwrap()
    }

    fn order_row(id: i32, email: &str) -> serde_json::Value {
        json!({
            "id": id,
            "order_date": "2024-03-07T10:30:00.000Z",
            "total": 10.0,
            "status": "shipped",
            "customer_name": "Somebody",
            "customer_email": email,
            "product_name": "Widget",
            "product_price": 10.0,
        })
    }

    #[test]
    fn test_cards_for_own_orders() {
        let rows = vec![order_row(1, "alice@example.com")];
        let result = format_rows(EntityType::Order, &rows).unwrap();
        let cards = build_cards(Some(&alice()), &result);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].component, "ServerCardWrapper");
        assert_eq!(cards[0].props.card_type, "order");
        assert!(cards[0].props.fallback_to_markdown);
        assert!(!cards[0].props.loading);
    }

    #[test]
    fn test_foreign_records_are_filtered() {
        let rows = vec![
            order_row(1, "alice@example.com"),
            order_row(2, "bob@example.com"),
        ];
        let result = format_rows(EntityType::Order, &rows).unwrap();
        let cards = build_cards(Some(&alice()), &result);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].props.data["id"], json!(1));
    }

    #[test]
    fn test_no_identity_yields_no_scoped_cards() {
        let rows = vec![order_row(1, "alice@example.com")];
        let result = format_rows(EntityType::Order, &rows).unwrap();
        assert!(build_cards(None, &result).is_empty());
    }

    #[test]
    fn test_product_cards_need_no_identity() {
        let rows = vec![json!({
            "id": 1, "name": "Widget", "price": 9.99, "description": null, "stock": 3,
        })];
        let result = format_rows(EntityType::Product, &rows).unwrap();
        let cards = build_cards(None, &result);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].props.card_type, "product");
    }

    #[test]
    fn test_card_serialization_shape() {
        let rows = vec![json!({
            "id": 1, "name": "Widget", "price": 9.99, "description": null, "stock": 3,
        })];
        let result = format_rows(EntityType::Product, &rows).unwrap();
        let cards = build_cards(None, &result);
        let json = serde_json::to_value(&cards[0]).unwrap();
        assert_eq!(json["component"], json!("ServerCardWrapper"));
        assert_eq!(json["props"]["type"], json!("product"));
        assert_eq!(json["props"]["fallbackToMarkdown"], json!(true));
    }
}
