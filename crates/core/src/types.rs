use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

/// Catalogue product with its unit price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: String,
    pub description: String,
    pub unit_price: f64,
}

/// Customer joined with the display name of its state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub state_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_name: Option<String>,
    pub postal_code: String,
    pub tax_id: String,
}

/// Date stored on an order header.
///
/// Stored values are expected to be `YYYY-MM-DD`; anything else is kept
/// verbatim so a single malformed row does not hide the rest of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderDate {
    Parsed(NaiveDate),
    Raw(String),
}

impl fmt::Display for OrderDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Raw(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for OrderDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One row of a customer's order history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub order_id: String,
    pub order_date: Option<OrderDate>,
}

/// Historical order line with totals recomputed at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLineDetail {
    pub product_code: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

/// Product and quantity pair written as one order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLineInput {
    pub product_id: String,
    pub quantity: u32,
}
