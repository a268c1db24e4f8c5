//! Order aggregation from line items.
//!
//! Groups line items by (InvoiceNo, CustomerID, Country) and summarizes each
//! basket. Signed totals are kept as-is here; the leakage guard downstream is
//! responsible for removing the sign.

use crate::loader::LineItemTable;
use ordered_float::OrderedFloat;
use returns_core::{BasketTable, Column, ColumnSchema, LineItem, Order, OrderKey, Timestamp};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Counts describing one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationStats {
    /// Line items seen.
    pub line_items: u64,
    /// Orders produced.
    pub orders: u64,
    /// Line items without a CustomerID, which cannot form a key.
    pub dropped_missing_customer: u64,
    /// Orders where no item timestamp parsed.
    pub orders_without_date: u64,
}

/// An order that's currently being built.
#[derive(Debug, Clone)]
struct OrderInProgress<'a> {
    first_seen: usize,
    item_count: u32,
    quantity_sum: Option<i64>,
    stock_codes: BTreeSet<&'a str>,
    price_sum: f64,
    price_count: u32,
    cheap_count: u32,
    max_price: Option<OrderedFloat<f64>>,
    min_price: Option<OrderedFloat<f64>>,
    total_value: Option<f64>,
    latest: Option<Timestamp>,
    is_return: Option<bool>,
}

impl<'a> OrderInProgress<'a> {
    fn new(first_seen: usize) -> Self {
        Self {
            first_seen,
            item_count: 0,
            quantity_sum: None,
            stock_codes: BTreeSet::new(),
            price_sum: 0.0,
            price_count: 0,
            cheap_count: 0,
            max_price: None,
            min_price: None,
            total_value: None,
            latest: None,
            is_return: None,
        }
    }

    fn add_item(&mut self, item: &'a LineItem, cheap_price_threshold: f64) {
        self.item_count += 1;

        if let Some(q) = item.quantity {
            self.quantity_sum = Some(self.quantity_sum.unwrap_or(0).saturating_add(q));
        }
        if let Some(code) = item.stock_code.as_deref() {
            self.stock_codes.insert(code);
        }
        if let Some(price) = item.unit_price {
            let price = OrderedFloat(price);
            self.price_sum += price.0;
            self.price_count += 1;
            if price.0 < cheap_price_threshold {
                self.cheap_count += 1;
            }
            self.max_price = Some(self.max_price.map_or(price, |m| m.max(price)));
            self.min_price = Some(self.min_price.map_or(price, |m| m.min(price)));
        }
        if let Some(value) = item.total_price {
            self.total_value = Some(self.total_value.unwrap_or(0.0) + value);
        }
        if let Some(ts) = item.invoice_date {
            self.latest = Some(self.latest.map_or(ts, |l| l.max(ts)));
        }
        if let Some(flag) = item.is_return {
            self.is_return = Some(self.is_return.unwrap_or(false) || flag);
        }
    }

    fn to_order(&self, key: OrderKey, schema: &ColumnSchema) -> Order {
        let priced = self.price_count > 0;
        Order {
            key,
            item_count: self.item_count,
            first_seen: self.first_seen,
            basket_size: self.quantity_sum,
            unique_products: schema
                .has(Column::StockCode)
                .then(|| self.stock_codes.len() as u32),
            avg_price: priced.then(|| self.price_sum / self.price_count as f64),
            max_price: self.max_price.map(|p| p.0),
            min_price: self.min_price.map(|p| p.0),
            total_value: self.total_value,
            cheap_item_share: priced.then(|| self.cheap_count as f64 / self.price_count as f64),
            invoice_date: self.latest,
            is_return: self.is_return,
        }
    }
}

/// Builder for order-level baskets from line items.
#[derive(Debug, Clone)]
pub struct OrderBuilder {
    /// Items priced strictly below this count as cheap.
    cheap_price_threshold: f64,
}

impl OrderBuilder {
    /// Create a new order builder.
    pub fn new(cheap_price_threshold: f64) -> Self {
        Self {
            cheap_price_threshold,
        }
    }

    /// Aggregate line items into orders, sorted by key.
    pub fn aggregate(&self, items: &[LineItem], schema: &ColumnSchema) -> (Vec<Order>, AggregationStats) {
        let mut stats = AggregationStats {
            line_items: items.len() as u64,
            ..AggregationStats::default()
        };
        let mut orders: BTreeMap<OrderKey, OrderInProgress<'_>> = BTreeMap::new();

        for (position, item) in items.iter().enumerate() {
            let Some(customer_id) = item.customer_id.as_ref() else {
                stats.dropped_missing_customer += 1;
                continue;
            };

            let key = OrderKey {
                invoice_no: item.invoice_no.clone(),
                customer_id: customer_id.clone(),
                country: item.country.clone(),
            };
            orders
                .entry(key)
                .or_insert_with(|| OrderInProgress::new(position))
                .add_item(item, self.cheap_price_threshold);
        }

        let orders: Vec<Order> = orders
            .into_iter()
            .map(|(key, in_progress)| in_progress.to_order(key, schema))
            .collect();

        stats.orders = orders.len() as u64;
        stats.orders_without_date = orders.iter().filter(|o| o.invoice_date.is_none()).count() as u64;

        (orders, stats)
    }

    /// Aggregate a loaded table into the basket table the feature stages use.
    pub fn build(&self, table: &LineItemTable) -> (BasketTable, AggregationStats) {
        let (orders, stats) = self.aggregate(&table.items, &table.schema);

        if stats.dropped_missing_customer > 0 {
            warn!(
                items = stats.dropped_missing_customer,
                "Line items without CustomerID excluded from orders"
            );
        }
        if stats.orders_without_date > 0 {
            warn!(
                orders = stats.orders_without_date,
                "Orders without a valid InvoiceDate flagged as unusable"
            );
        }
        info!(
            line_items = stats.line_items,
            orders = stats.orders,
            "Aggregated line items into orders"
        );

        (BasketTable::from_orders(table.schema.clone(), orders), stats)
    }
}

impl Default for OrderBuilder {
    fn default() -> Self {
        Self::new(1.0)
    }
}
