//! Result formatter: raw rows to structured records plus Markdown.
//!
//! Output is deterministic: stable field ordering, fixed placeholder
//! strings for missing data, two-decimal money, RFC 3339 dates in the
//! structured data and a fixed locale rendering in the Markdown. Given
//! identical rows, the output is byte-identical across runs.

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use techtrend_support_core::EntityType;

use super::RawRow;

/// Placeholder for missing optional customer fields.
const NOT_PROVIDED: &str = "Not provided";
/// Placeholder for products without a description.
const NO_DESCRIPTION: &str = "No description available";
/// Placeholder for missing names and statuses.
const UNKNOWN: &str = "Unknown";

/// The formatter received a row that does not match the entity contract.
///
/// This is a programming defect (executor and formatter disagree on row
/// shape), surfaced as an internal error by the façade.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unexpected row shape: {0}")]
pub struct FormatError(String);

/// A formatted query result: structured data plus renderings.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Entity type the result describes.
    #[serde(rename = "type")]
    pub entity: EntityType,
    /// Structured records, one per row, in query order.
    pub data: Vec<ResultRecord>,
    /// One-line count statement.
    pub summary: String,
    /// Markdown rendering safe to show directly to the end user.
    pub formatted: String,
    /// Present only on error results built by the façade.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One structured record, shaped per entity type.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResultRecord {
    /// A customer row.
    Customer(CustomerRecord),
    /// A product row.
    Product(ProductRecord),
    /// An order row with joined customer and product.
    Order(OrderRecord),
    /// A ticket row with joined customer.
    Ticket(TicketRecord),
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductRecord {
    pub id: i64,
    pub name: String,
    /// Rendered price, e.g. `$19.99`.
    pub price: String,
    pub description: String,
    pub stock: i64,
    pub available: String,
}

/// Joined customer reference on orders and tickets.
#[derive(Debug, Clone, Serialize)]
pub struct PartyRef {
    pub name: String,
    pub email: String,
}

/// Joined product reference on orders.
#[derive(Debug, Clone, Serialize)]
pub struct ProductRef {
    pub name: String,
    pub price: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: i64,
    pub customer: PartyRef,
    pub product: ProductRef,
    pub status: String,
    /// RFC 3339 timestamp.
    pub order_date: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRecord {
    pub id: i64,
    pub customer: PartyRef,
    pub issue: String,
    pub status: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

/// Format raw rows for one entity type.
///
/// An empty row set is not an error: the result carries `data: []` and a
/// human-readable "nothing found" rendering.
///
/// # Errors
///
/// Returns [`FormatError`] only when a row is missing a required column or
/// carries an unconvertible value, which indicates an executor bug.
pub fn format_rows(entity: EntityType, rows: &[RawRow]) -> Result<QueryResult, FormatError> {
    match entity {
        EntityType::Customer => format_customers(rows),
        EntityType::Product => format_products(rows),
        EntityType::Order => format_orders(rows),
        EntityType::Ticket => format_tickets(rows),
    }
}

fn format_customers(rows: &[RawRow]) -> Result<QueryResult, FormatError> {
    let records: Vec<CustomerRecord> = rows
        .iter()
        .map(|row| {
            Ok(CustomerRecord {
                id: required_i64(row, "id")?,
                name: optional_str(row, "name").unwrap_or_else(|| UNKNOWN.to_owned()),
                email: required_str(row, "email")?,
                phone: optional_str(row, "phone").unwrap_or_else(|| NOT_PROVIDED.to_owned()),
                address: optional_str(row, "address").unwrap_or_else(|| NOT_PROVIDED.to_owned()),
            })
        })
        .collect::<Result<_, FormatError>>()?;

    let summary = count_summary(records.len(), "customer(s)", "No customers found");
    let formatted = if records.is_empty() {
        "No customer information found for your account.".to_owned()
    } else {
        let mut out = String::new();
        for record in &records {
            let _ = writeln!(out, "### {}", record.name);
            let _ = writeln!(out, "- **Email**: {}", record.email);
            let _ = writeln!(out, "- **Phone**: {}", record.phone);
            let _ = writeln!(out, "- **Address**: {}", record.address);
            out.push('\n');
        }
        out
    };

    Ok(QueryResult {
        entity: EntityType::Customer,
        data: records.into_iter().map(ResultRecord::Customer).collect(),
        summary,
        formatted,
        error: None,
    })
}

fn format_products(rows: &[RawRow]) -> Result<QueryResult, FormatError> {
    let records: Vec<ProductRecord> = rows
        .iter()
        .map(|row| {
            let stock = required_i64(row, "stock")?;
            Ok(ProductRecord {
                id: required_i64(row, "id")?,
                name: optional_str(row, "name").unwrap_or_else(|| UNKNOWN.to_owned()),
                price: money(row, "price")?,
                description: optional_str(row, "description")
                    .unwrap_or_else(|| NO_DESCRIPTION.to_owned()),
                stock,
                available: if stock > 0 { "In stock" } else { "Out of stock" }.to_owned(),
            })
        })
        .collect::<Result<_, FormatError>>()?;

    let summary = count_summary(records.len(), "product(s)", "No products found");
    let formatted = if records.is_empty() {
        "No products found for the provided IDs.".to_owned()
    } else {
        let mut out = String::from("| ID | Name | Price | Stock | Availability |\n");
        out.push_str("| --- | --- | --- | --- | --- |\n");
        for record in &records {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                record.id, record.name, record.price, record.stock, record.available
            );
        }
        out
    };

    Ok(QueryResult {
        entity: EntityType::Product,
        data: records.into_iter().map(ResultRecord::Product).collect(),
        summary,
        formatted,
        error: None,
    })
}

fn format_orders(rows: &[RawRow]) -> Result<QueryResult, FormatError> {
    let records: Vec<OrderRecord> = rows
        .iter()
        .map(|row| {
            Ok(OrderRecord {
                id: required_i64(row, "id")?,
                customer: PartyRef {
                    name: optional_str(row, "customer_name")
                        .unwrap_or_else(|| UNKNOWN.to_owned()),
                    email: required_str(row, "customer_email")?,
                },
                product: ProductRef {
                    name: optional_str(row, "product_name")
                        .unwrap_or_else(|| UNKNOWN.to_owned()),
                    price: money(row, "product_price")?,
                },
                status: optional_str(row, "status").unwrap_or_else(|| UNKNOWN.to_owned()),
                order_date: iso_date(row, "order_date")?,
            })
        })
        .collect::<Result<_, FormatError>>()?;

    let summary = count_summary(records.len(), "order(s)", "No orders found");
    let formatted = if records.is_empty() {
        "No orders found for your account.".to_owned()
    } else {
        let mut out = String::new();
        for record in &records {
            let _ = writeln!(out, "### Order #{}", record.id);
            let _ = writeln!(out, "- **Status**: {}", record.status);
            let _ = writeln!(out, "- **Placed**: {}", human_date(&record.order_date));
            let _ = writeln!(
                out,
                "- **Product**: {} ({})",
                record.product.name, record.product.price
            );
            let _ = writeln!(
                out,
                "- **Customer**: {} ({})",
                record.customer.name, record.customer.email
            );
            out.push('\n');
        }
        out
    };

    Ok(QueryResult {
        entity: EntityType::Order,
        data: records.into_iter().map(ResultRecord::Order).collect(),
        summary,
        formatted,
        error: None,
    })
}

fn format_tickets(rows: &[RawRow]) -> Result<QueryResult, FormatError> {
    let records: Vec<TicketRecord> = rows
        .iter()
        .map(|row| {
            Ok(TicketRecord {
                id: required_i64(row, "id")?,
                customer: PartyRef {
                    name: optional_str(row, "customer_name")
                        .unwrap_or_else(|| UNKNOWN.to_owned()),
                    email: required_str(row, "customer_email")?,
                },
                issue: optional_str(row, "issue").unwrap_or_else(|| NOT_PROVIDED.to_owned()),
                status: optional_str(row, "status").unwrap_or_else(|| UNKNOWN.to_owned()),
                created_at: iso_date(row, "created_at")?,
            })
        })
        .collect::<Result<_, FormatError>>()?;

    let summary = count_summary(records.len(), "support ticket(s)", "No support tickets found");
    let formatted = if records.is_empty() {
        "No support tickets found for your account.".to_owned()
    } else {
        let mut out = String::new();
        for record in &records {
            let _ = writeln!(out, "### Ticket #{}", record.id);
            let _ = writeln!(out, "- **Status**: {}", record.status);
            let _ = writeln!(out, "- **Opened**: {}", human_date(&record.created_at));
            let _ = writeln!(out, "- **Issue**: {}", record.issue);
            let _ = writeln!(
                out,
                "- **Customer**: {} ({})",
                record.customer.name, record.customer.email
            );
            out.push('\n');
        }
        out
    };

    Ok(QueryResult {
        entity: EntityType::Ticket,
        data: records.into_iter().map(ResultRecord::Ticket).collect(),
        summary,
        formatted,
        error: None,
    })
}

fn count_summary(count: usize, noun: &str, empty: &str) -> String {
    if count == 0 {
        empty.to_owned()
    } else {
        format!("Found {count} {noun}")
    }
}

fn field<'a>(row: &'a RawRow, key: &str) -> Option<&'a serde_json::Value> {
    row.get(key).filter(|v| !v.is_null())
}

fn required_i64(row: &RawRow, key: &str) -> Result<i64, FormatError> {
    field(row, key)
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| FormatError(format!("missing or non-integer column {key:?}")))
}

fn required_str(row: &RawRow, key: &str) -> Result<String, FormatError> {
    optional_str(row, key).ok_or_else(|| FormatError(format!("missing column {key:?}")))
}

fn optional_str(row: &RawRow, key: &str) -> Option<String> {
    field(row, key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

/// Render a money column with exactly two decimals and a leading `$`.
///
/// Accepts numbers (FLOAT columns) and strings (NUMERIC columns decoded to
/// preserve precision).
fn money(row: &RawRow, key: &str) -> Result<String, FormatError> {
    let value = field(row, key)
        .ok_or_else(|| FormatError(format!("missing money column {key:?}")))?;

    let decimal = match value {
        serde_json::Value::Number(n) => {
            // serde_json prints the shortest exact representation, which
            // Decimal parses without binary float artifacts.
            Decimal::from_str(&n.to_string())
                .map_err(|e| FormatError(format!("bad money value in {key:?}: {e}")))?
        }
        serde_json::Value::String(s) => Decimal::from_str(s)
            .map_err(|e| FormatError(format!("bad money value in {key:?}: {e}")))?,
        other => {
            return Err(FormatError(format!(
                "money column {key:?} has unexpected value {other}"
            )));
        }
    };

    Ok(format!("${decimal:.2}"))
}

/// Read a timestamp column as an RFC 3339 string.
fn iso_date(row: &RawRow, key: &str) -> Result<String, FormatError> {
    let raw = field(row, key)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| FormatError(format!("missing date column {key:?}")))?;
    parse_timestamp(raw)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .ok_or_else(|| FormatError(format!("bad date value in {key:?}: {raw:?}")))
}

/// Render an RFC 3339 timestamp as `Month D, YYYY` for Markdown output.
fn human_date(iso: &str) -> String {
    parse_timestamp(iso).map_or_else(
        || iso.to_owned(),
        |dt| dt.format("%B %-d, %Y").to_string(),
    )
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::from_str(raw)
                .ok()
                .map(|naive| naive.and_utc())
        })
}
