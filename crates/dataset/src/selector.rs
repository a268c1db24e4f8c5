//! Final feature selection.
//!
//! X keeps only engineered, leakage-safe columns. Identifiers, the order time,
//! the label, the signed BasketSize/TotalValue and the history counters
//! (PastOrders, PastReturns, ReturnRate, PrevDate) stay in the basket table
//! and never reach the matrix.

use crate::matrix::{CountryDomain, FeatureMatrix};
use returns_core::{BasketRow, BasketTable, ColumnSchema, Feature};
use tracing::{info, warn};

/// Builds the feature matrix and label vector from an enriched basket table.
#[derive(Debug, Clone)]
pub struct FeatureSelector {
    features: Vec<Feature>,
}

impl FeatureSelector {
    /// Keep every model feature the schema can support.
    pub fn new(schema: &ColumnSchema) -> Self {
        for feature in schema.skipped_features() {
            warn!(feature = feature.name(), "Feature omitted from X: input column missing");
        }
        Self {
            features: schema.available_features(),
        }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Matrix and labels aligned with the rows of `table`.
    ///
    /// Labels are `None` for rows without a usable IsReturn value.
    pub fn select(&self, table: &BasketTable) -> (FeatureMatrix, Vec<Option<u8>>) {
        let countries = CountryDomain::from_table(table);

        let rows: Vec<Vec<Option<f64>>> = table
            .iter()
            .map(|row| {
                self.features
                    .iter()
                    .map(|f| feature_value(row, *f, &countries))
                    .collect()
            })
            .collect();
        let labels: Vec<Option<u8>> = table.iter().map(BasketRow::label).collect();

        info!(
            rows = rows.len(),
            columns = self.features.len(),
            countries = countries.len(),
            "Feature matrix assembled"
        );
        (FeatureMatrix::new(self.features.clone(), countries, rows), labels)
    }
}

/// Value of one model feature for one row.
pub fn feature_value(row: &BasketRow, feature: Feature, countries: &CountryDomain) -> Option<f64> {
    let order = &row.order;
    let calendar = row.calendar.as_ref();
    match feature {
        Feature::Country => countries.code(&order.key.country).map(f64::from),
        Feature::UniqueProducts => order.unique_products.map(f64::from),
        Feature::AvgPrice => order.avg_price,
        Feature::MaxPrice => order.max_price,
        Feature::MinPrice => order.min_price,
        Feature::CheapItemShare => order.cheap_item_share,
        Feature::Diversity => row.magnitudes.diversity,
        Feature::Month => calendar.map(|c| f64::from(c.month)),
        Feature::Weekday => calendar.map(|c| f64::from(c.weekday)),
        Feature::Hour => calendar.map(|c| f64::from(c.hour)),
        Feature::IsWeekend => calendar.map(|c| f64::from(u8::from(c.is_weekend))),
        Feature::Quarter => calendar.map(|c| f64::from(c.quarter)),
        Feature::Recency => row.history.and_then(|h| h.recency_days),
        Feature::AbsBasketSize => row.magnitudes.abs_basket_size.map(|v| v as f64),
        Feature::AbsTotalValue => row.magnitudes.abs_total_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use returns_core::{
        parse_timestamp, CalendarFeatures, CustomerHistory, GuardedMagnitudes, Order, OrderKey,
    };

    fn make_row(country: &str, is_return: bool) -> BasketRow {
        let mut row = BasketRow::new(Order {
            key: OrderKey {
                invoice_no: "536365".to_string(),
                customer_id: "17850".to_string(),
                country: country.to_string(),
            },
            item_count: 2,
            first_seen: 0,
            basket_size: Some(-12),
            unique_products: Some(2),
            avg_price: Some(1.7),
            max_price: Some(2.55),
            min_price: Some(0.85),
            total_value: Some(-20.4),
            cheap_item_share: Some(0.5),
            invoice_date: parse_timestamp("2011-01-08 14:00:00"),
            is_return: Some(is_return),
        });
        row.calendar = Some(CalendarFeatures {
            month: 1,
            weekday: 5,
            hour: 14,
            quarter: 1,
            is_weekend: true,
        });
        row.history = Some(CustomerHistory {
            past_orders: 3,
            past_returns: 1,
            return_rate: Some(1.0 / 3.0),
            prev_date: parse_timestamp("2011-01-01 10:00:00"),
            recency_days: Some(7.0),
            recency_imputed: false,
        });
        row.magnitudes = GuardedMagnitudes {
            abs_basket_size: Some(12),
            abs_total_value: Some(20.4),
            diversity: Some(2.0 / 12.0),
        };
        row
    }

    #[test]
    fn test_full_contract() {
        let table = BasketTable {
            schema: ColumnSchema::complete(),
            rows: vec![make_row("United Kingdom", true), make_row("France", false)],
        };
        let (matrix, labels) = FeatureSelector::new(&table.schema).select(&table);

        assert_eq!(
            matrix.feature_names(),
            vec![
                "Country",
                "UniqueProducts",
                "AvgPrice",
                "MaxPrice",
                "MinPrice",
                "CheapItemShare",
                "Diversity",
                "Month",
                "Weekday",
                "Hour",
                "IsWeekend",
                "Quarter",
                "Recency",
                "AbsBasketSize",
                "AbsTotalValue",
            ]
        );
        assert_eq!(labels, vec![Some(1), Some(0)]);
        assert_eq!(matrix.value(0, Feature::Country), Some(1.0));
        assert_eq!(matrix.value(1, Feature::Country), Some(0.0));
        assert_eq!(matrix.value(0, Feature::AbsBasketSize), Some(12.0));
        assert_eq!(matrix.value(0, Feature::IsWeekend), Some(1.0));
        assert_eq!(matrix.value(0, Feature::Recency), Some(7.0));
    }

    #[test]
    fn test_no_signed_or_identifier_columns() {
        let names = FeatureSelector::new(&ColumnSchema::complete())
            .features()
            .iter()
            .map(|f| f.name())
            .collect::<Vec<_>>();
        for dropped in [
            "InvoiceNo",
            "InvoiceDate",
            "CustomerID",
            "IsReturn",
            "BasketSize",
            "TotalValue",
            "PastOrders",
            "PastReturns",
            "ReturnRate",
            "PrevDate",
        ] {
            assert!(!names.contains(&dropped), "{dropped} leaked into X");
        }
    }

    #[test]
    fn test_skipped_features_omitted() {
        let schema = ColumnSchema::from_headers([
            "InvoiceNo",
            "CustomerID",
            "Country",
            "InvoiceDate",
            "IsReturn",
            "Quantity",
        ]);
        let table = BasketTable {
            schema: schema.clone(),
            rows: vec![make_row("France", false)],
        };
        let (matrix, _) = FeatureSelector::new(&schema).select(&table);

        assert!(matrix.column_index(Feature::AvgPrice).is_none());
        assert!(matrix.column_index(Feature::Diversity).is_none());
        assert!(matrix.column_index(Feature::AbsTotalValue).is_none());
        assert!(matrix.column_index(Feature::AbsBasketSize).is_some());
        assert!(matrix.column_index(Feature::Recency).is_some());
    }

    #[test]
    fn test_unusable_row_has_null_features() {
        let mut row = make_row("France", false);
        row.order.invoice_date = None;
        row.calendar = None;
        row.history = None;
        let countries = CountryDomain::from_table(&BasketTable {
            schema: ColumnSchema::complete(),
            rows: vec![row.clone()],
        });

        assert_eq!(feature_value(&row, Feature::Month, &countries), None);
        assert_eq!(feature_value(&row, Feature::Recency, &countries), None);
        assert_eq!(feature_value(&row, Feature::Country, &countries), Some(0.0));
    }
}
