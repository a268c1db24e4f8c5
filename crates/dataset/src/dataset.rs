//! End-to-end dataset construction.
//!
//! `build_dataset` is the explicit entry point: nothing runs until a caller
//! hands over a line-item table and a configuration.

use crate::matrix::FeatureMatrix;
use crate::selector::FeatureSelector;
use crate::splitter::{DatasetSplitter, Split};
use returns_core::{BasketTable, Config, Feature, OrderKey, Result};
use returns_features::FeaturePipeline;
use returns_ingestion::{AggregationStats, LineItemTable};
use tracing::info;

/// A feature matrix with its aligned integer labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledMatrix {
    pub x: FeatureMatrix,
    pub y: Vec<u8>,
}

impl LabeledMatrix {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Fraction of positive labels.
    pub fn positive_rate(&self) -> f64 {
        if self.y.is_empty() {
            return 0.0;
        }
        self.y.iter().map(|&v| v as f64).sum::<f64>() / self.y.len() as f64
    }
}

/// Everything the pipeline produces for one input table.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Enriched basket table, all orders, including metadata and history.
    pub basket: BasketTable,
    /// Feature matrix aligned with `basket` rows.
    pub matrix: FeatureMatrix,
    /// Labels aligned with `basket` rows; `None` for unusable rows.
    pub labels: Vec<Option<u8>>,
    /// Chronological partition of `basket` rows.
    pub split: Split,
    /// Aggregation counts.
    pub stats: AggregationStats,
}

impl Dataset {
    fn labeled(&self, indices: &[usize]) -> LabeledMatrix {
        let kept: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| self.labels.get(i).copied().flatten().is_some())
            .collect();
        LabeledMatrix {
            x: self.matrix.select_rows(&kept),
            y: kept.iter().filter_map(|&i| self.labels[i]).collect(),
        }
    }

    /// X and y over every usable order, in basket order.
    pub fn features_and_target(&self) -> LabeledMatrix {
        let usable: Vec<usize> = (0..self.basket.len())
            .filter(|&i| self.basket.rows[i].is_usable())
            .collect();
        self.labeled(&usable)
    }

    /// Orders before the cutoff.
    pub fn train(&self) -> LabeledMatrix {
        self.labeled(&self.split.train)
    }

    /// Orders at or after the cutoff.
    pub fn test(&self) -> LabeledMatrix {
        self.labeled(&self.split.test)
    }

    /// Order keys of the test rows, aligned with `test()`.
    pub fn test_metadata(&self) -> Vec<&OrderKey> {
        self.split
            .test
            .iter()
            .filter(|&&i| self.labels[i].is_some())
            .map(|&i| &self.basket.rows[i].order.key)
            .collect()
    }

    /// Model features omitted because an input column was missing.
    pub fn skipped_features(&self) -> Vec<Feature> {
        self.basket.schema.skipped_features()
    }
}

/// Run the whole pipeline over a loaded line-item table.
pub fn build_dataset(items: &LineItemTable, config: &Config) -> Result<Dataset> {
    config.validate()?;
    let splitter = DatasetSplitter::from_config(&config.split)?;

    let output = FeaturePipeline::new(config).run(items)?;
    let basket = output.basket;

    let selector = FeatureSelector::new(&basket.schema);
    let (matrix, labels) = selector.select(&basket);
    let split = splitter.split(&basket);

    info!(
        orders = basket.len(),
        features = matrix.n_cols(),
        train = split.train.len(),
        test = split.test.len(),
        "Dataset built"
    );

    Ok(Dataset {
        basket,
        matrix,
        labels,
        split,
        stats: output.stats,
    })
}

/// Load the configured input file and build the dataset.
pub fn load_dataset(config: &Config) -> Result<Dataset> {
    config.validate()?;
    let items = LineItemTable::from_csv_path(&config.input.path, config.input.delimiter_byte())?;
    items.profile.log();
    build_dataset(&items, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use returns_core::{parse_timestamp, ColumnSchema, Error, LineItem};

    fn make_item(invoice: &str, customer: &str, quantity: i64, date: &str, is_return: bool) -> LineItem {
        LineItem {
            invoice_no: invoice.to_string(),
            stock_code: Some("85123A".to_string()),
            quantity: Some(quantity),
            unit_price: Some(2.55),
            invoice_date: parse_timestamp(date),
            customer_id: Some(customer.to_string()),
            country: "United Kingdom".to_string(),
            total_price: Some(quantity as f64 * 2.55),
            is_return: Some(is_return),
        }
    }

    fn config(cutoff: &str) -> Config {
        let mut config = Config::default();
        config.split.cutoff = cutoff.to_string();
        config
    }

    #[test]
    fn test_two_orders_around_cutoff() {
        let items = LineItemTable::from_items(
            ColumnSchema::complete(),
            vec![
                make_item("536365", "17850", 6, "2011-09-01 10:00:00", false),
                make_item("C580000", "17850", -6, "2011-11-01 10:00:00", true),
            ],
        );
        let dataset = build_dataset(&items, &config("2011-10-01")).unwrap();

        let train = dataset.train();
        let test = dataset.test();
        assert_eq!(train.len(), 1);
        assert_eq!(test.len(), 1);
        assert_eq!(train.y, vec![0]);
        assert_eq!(test.y, vec![1]);

        // 61 days between the two orders is the only defined recency, so
        // the first order is filled with that same value.
        assert_eq!(train.x.value(0, Feature::Recency), Some(61.0));
        assert_eq!(test.x.value(0, Feature::Recency), Some(61.0));
        assert_eq!(test.x.value(0, Feature::AbsBasketSize), Some(6.0));

        let meta = dataset.test_metadata();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].invoice_no, "C580000");
    }

    #[test]
    fn test_unusable_orders_excluded_from_xy() {
        let mut broken = make_item("536999", "13047", 1, "2011-01-01 00:00:00", false);
        broken.invoice_date = None;
        let items = LineItemTable::from_items(
            ColumnSchema::complete(),
            vec![make_item("536365", "17850", 6, "2011-01-01 10:00:00", false), broken],
        );
        let dataset = build_dataset(&items, &config("2011-10-01")).unwrap();

        assert_eq!(dataset.basket.len(), 2);
        assert_eq!(dataset.split.unusable.len(), 1);
        assert_eq!(dataset.features_and_target().len(), 1);
        assert_eq!(dataset.labels.len(), 2);
    }

    #[test]
    fn test_invalid_cutoff_fails_before_transform() {
        let items = LineItemTable::from_items(ColumnSchema::complete(), Vec::new());
        let result = build_dataset(&items, &config("soon"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_positive_rate() {
        let labeled = LabeledMatrix {
            x: FeatureMatrix::default(),
            y: vec![1, 0, 0, 1],
        };
        assert!((labeled.positive_rate() - 0.5).abs() < 1e-10);
        assert_eq!(LabeledMatrix::default().positive_rate(), 0.0);
    }
}
