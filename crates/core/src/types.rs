//! Core data types for the basket-returns pipeline.

use crate::schema::ColumnSchema;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Naive (zone-less) timestamp, as recorded by the shop.
pub type Timestamp = NaiveDateTime;

/// Timestamp layouts accepted in the input, tried in order.
const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M",
];

/// Parse a timestamp cell. Unparseable input yields `None`.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }

    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// One row of the cleaned input: a single product within a single invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Invoice (order) identifier.
    pub invoice_no: String,
    /// Product identifier.
    pub stock_code: Option<String>,
    /// Signed quantity; negative encodes a returned unit.
    pub quantity: Option<i64>,
    /// Unit price.
    pub unit_price: Option<f64>,
    /// Line timestamp.
    pub invoice_date: Option<Timestamp>,
    /// Customer identifier.
    pub customer_id: Option<String>,
    /// Customer country.
    pub country: String,
    /// Quantity × UnitPrice, signed.
    pub total_price: Option<f64>,
    /// Precomputed return flag.
    pub is_return: Option<bool>,
}

impl LineItem {
    /// Whether the invoice number marks a cancellation.
    #[inline]
    pub fn is_cancellation(&self) -> bool {
        self.invoice_no.starts_with('C')
    }
}

/// Grouping key of an order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    pub invoice_no: String,
    pub customer_id: String,
    pub country: String,
}

/// Basket summary of all line items sharing an [`OrderKey`].
///
/// Optional fields are `None` either because the input column is missing or
/// because no line item carried a usable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub key: OrderKey,
    /// Number of line items.
    pub item_count: u32,
    /// Input position of the first line item, used as the final tie-breaker.
    pub first_seen: usize,
    /// Signed sum of Quantity.
    pub basket_size: Option<i64>,
    /// Distinct StockCode count.
    pub unique_products: Option<u32>,
    pub avg_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_price: Option<f64>,
    /// Signed sum of TotalPrice.
    pub total_value: Option<f64>,
    /// Fraction of items priced below the cheap threshold.
    pub cheap_item_share: Option<f64>,
    /// Latest item timestamp, the canonical order time.
    pub invoice_date: Option<Timestamp>,
    /// Whether any item is a return.
    pub is_return: Option<bool>,
}

impl Order {
    /// Orders without a time or a label cannot be placed on a timeline.
    #[inline]
    pub fn is_usable(&self) -> bool {
        self.invoice_date.is_some() && self.is_return.is_some()
    }
}

/// Calendar fields derived from the order time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFeatures {
    /// 1-12.
    pub month: u32,
    /// 0 = Monday … 6 = Sunday.
    pub weekday: u32,
    /// 0-23.
    pub hour: u32,
    /// 1-4.
    pub quarter: u32,
    pub is_weekend: bool,
}

/// Causal per-customer statistics, computed from earlier orders only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CustomerHistory {
    /// Number of earlier orders.
    pub past_orders: u32,
    /// Returns among earlier orders.
    pub past_returns: u32,
    /// `past_returns / past_orders`; `None` for a first order.
    pub return_rate: Option<f64>,
    /// Time of the previous order.
    pub prev_date: Option<Timestamp>,
    /// Whole days since the previous order.
    pub recency_days: Option<f64>,
    /// Set when `recency_days` was filled with the dataset median.
    pub recency_imputed: bool,
}

/// Sign-free magnitudes that replace the signed basket totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardedMagnitudes {
    pub abs_basket_size: Option<u64>,
    pub abs_total_value: Option<f64>,
    /// `unique_products / abs_basket_size`; `None` for an empty net basket.
    pub diversity: Option<f64>,
}

/// An order and everything derived from it so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketRow {
    pub order: Order,
    pub calendar: Option<CalendarFeatures>,
    pub history: Option<CustomerHistory>,
    pub magnitudes: GuardedMagnitudes,
}

impl BasketRow {
    /// Wrap a freshly aggregated order.
    pub fn new(order: Order) -> Self {
        Self {
            order,
            calendar: None,
            history: None,
            magnitudes: GuardedMagnitudes::default(),
        }
    }

    /// Whether the row can be used for training or evaluation.
    #[inline]
    pub fn is_usable(&self) -> bool {
        self.order.is_usable()
    }

    /// Integer label, 1 for a returned order.
    #[inline]
    pub fn label(&self) -> Option<u8> {
        self.order.is_return.map(u8::from)
    }
}

/// The order-level table passed between pipeline stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasketTable {
    /// Columns the source line items carried.
    pub schema: ColumnSchema,
    pub rows: Vec<BasketRow>,
}

impl BasketTable {
    /// Build a table from aggregated orders.
    pub fn from_orders(schema: ColumnSchema, orders: Vec<Order>) -> Self {
        Self {
            schema,
            rows: orders.into_iter().map(BasketRow::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BasketRow> {
        self.rows.iter()
    }

    /// Number of rows that cannot be placed in time or lack a label.
    pub fn unusable_count(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_usable()).count()
    }
}
