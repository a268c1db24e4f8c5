//! Data-quality profile of a loaded line-item table.
//!
//! Observational only: nothing is dropped or rewritten here.

use returns_core::LineItem;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Counts describing the quality of the cleaned input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataProfile {
    /// Rows read from the input (including skipped ones).
    pub total_rows: u64,
    /// Rows skipped because they had no InvoiceNo.
    pub skipped_rows: u64,
    /// Rows whose InvoiceNo starts with `C`.
    pub cancellation_rows: u64,
    /// Rows with Quantity < 0.
    pub negative_quantity_rows: u64,
    /// Rows with UnitPrice <= 0.
    pub nonpositive_price_rows: u64,
    /// Rows without a CustomerID.
    pub missing_customer_rows: u64,
    /// Rows flagged as returns.
    pub return_rows: u64,
    /// InvoiceDate cells that could not be parsed.
    pub unparseable_timestamps: u64,
    /// Numeric or flag cells that could not be parsed.
    pub unparseable_values: u64,
}

impl DataProfile {
    /// Count the per-row indicators over loaded items.
    pub fn from_items(items: &[LineItem]) -> Self {
        let mut profile = Self {
            total_rows: items.len() as u64,
            ..Self::default()
        };
        for item in items {
            profile.record(item);
        }
        profile
    }

    /// Add one item to the counts.
    pub fn record(&mut self, item: &LineItem) {
        if item.is_cancellation() {
            self.cancellation_rows += 1;
        }
        if item.quantity.is_some_and(|q| q < 0) {
            self.negative_quantity_rows += 1;
        }
        if item.unit_price.is_some_and(|p| p <= 0.0) {
            self.nonpositive_price_rows += 1;
        }
        if item.customer_id.is_none() {
            self.missing_customer_rows += 1;
        }
        if item.is_return == Some(true) {
            self.return_rows += 1;
        }
    }

    /// Percentage of rows without a CustomerID.
    pub fn missing_customer_pct(&self) -> f64 {
        if self.total_rows > 0 {
            self.missing_customer_rows as f64 / self.total_rows as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Emit the profile as a tracing event.
    pub fn log(&self) {
        info!(
            total_rows = self.total_rows,
            skipped_rows = self.skipped_rows,
            cancellation_rows = self.cancellation_rows,
            negative_quantity_rows = self.negative_quantity_rows,
            nonpositive_price_rows = self.nonpositive_price_rows,
            missing_customer_rows = self.missing_customer_rows,
            missing_customer_pct = format!("{:.2}", self.missing_customer_pct()),
            return_rows = self.return_rows,
            unparseable_timestamps = self.unparseable_timestamps,
            unparseable_values = self.unparseable_values,
            "Input data profile"
        );
    }
}
