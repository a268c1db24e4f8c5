//! Chronological train/test split.
//!
//! Orders strictly before the cutoff train, orders at or after it test. No
//! shuffling and no stratification: evaluation sees only the future.

use returns_core::config::SplitConfig;
use returns_core::{BasketTable, Result, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Row indices of each partition, in basket order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    /// Rows with no order time or label, kept out of both sets.
    pub unusable: Vec<usize>,
}

impl Split {
    /// Total number of rows covered.
    pub fn len(&self) -> usize {
        self.train.len() + self.test.len() + self.unusable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partitions a basket table by a cutoff timestamp.
#[derive(Debug, Clone, Copy)]
pub struct DatasetSplitter {
    cutoff: Timestamp,
}

impl DatasetSplitter {
    pub fn new(cutoff: Timestamp) -> Self {
        Self { cutoff }
    }

    /// Parse the cutoff from configuration.
    pub fn from_config(config: &SplitConfig) -> Result<Self> {
        Ok(Self::new(config.cutoff_datetime()?))
    }

    pub fn cutoff(&self) -> Timestamp {
        self.cutoff
    }

    pub fn split(&self, table: &BasketTable) -> Split {
        let mut split = Split::default();

        for (idx, row) in table.iter().enumerate() {
            match (row.order.invoice_date, row.order.is_return) {
                (Some(date), Some(_)) if date < self.cutoff => split.train.push(idx),
                (Some(_), Some(_)) => split.test.push(idx),
                _ => split.unusable.push(idx),
            }
        }

        if split.train.is_empty() || split.test.is_empty() {
            warn!(
                cutoff = %self.cutoff,
                train = split.train.len(),
                test = split.test.len(),
                "Chronological split left a partition empty"
            );
        }
        info!(
            cutoff = %self.cutoff,
            train = split.train.len(),
            test = split.test.len(),
            unusable = split.unusable.len(),
            "Chronological split"
        );
        split
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use returns_core::{parse_timestamp, ColumnSchema, Order, OrderKey};

    fn make_order(invoice: &str, date: Option<&str>) -> Order {
        Order {
            key: OrderKey {
                invoice_no: invoice.to_string(),
                customer_id: "17850".to_string(),
                country: "United Kingdom".to_string(),
            },
            item_count: 1,
            first_seen: 0,
            basket_size: Some(1),
            unique_products: Some(1),
            avg_price: Some(1.0),
            max_price: Some(1.0),
            min_price: Some(1.0),
            total_value: Some(1.0),
            cheap_item_share: Some(0.0),
            invoice_date: date.and_then(parse_timestamp),
            is_return: Some(false),
        }
    }

    fn splitter() -> DatasetSplitter {
        DatasetSplitter::from_config(&SplitConfig {
            cutoff: "2011-10-01".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_boundary_goes_to_test() {
        let table = BasketTable::from_orders(
            ColumnSchema::complete(),
            vec![
                make_order("1", Some("2011-09-30 23:59:59")),
                make_order("2", Some("2011-10-01 00:00:00")),
                make_order("3", Some("2011-12-09 12:50:00")),
            ],
        );
        let split = splitter().split(&table);

        assert_eq!(split.train, vec![0]);
        assert_eq!(split.test, vec![1, 2]);
        assert!(split.unusable.is_empty());
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let table = BasketTable::from_orders(
            ColumnSchema::complete(),
            vec![
                make_order("1", Some("2011-01-01 00:00:00")),
                make_order("2", None),
                make_order("3", Some("2011-11-01 00:00:00")),
                make_order("4", Some("2011-05-01 00:00:00")),
            ],
        );
        let split = splitter().split(&table);

        assert_eq!(split.len(), table.len());
        let mut all: Vec<usize> = split
            .train
            .iter()
            .chain(&split.test)
            .chain(&split.unusable)
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3]);
        assert_eq!(split.unusable, vec![1]);
        assert_eq!(split.train, vec![0, 3]);
    }

    #[test]
    fn test_missing_label_is_unusable() {
        let mut order = make_order("1", Some("2011-01-01 00:00:00"));
        order.is_return = None;
        let table = BasketTable::from_orders(ColumnSchema::complete(), vec![order]);
        let split = splitter().split(&table);
        assert_eq!(split.unusable, vec![0]);
    }

    #[test]
    fn test_missing_label_after_cutoff_is_unusable() {
        let mut late = make_order("1", Some("2011-11-01 00:00:00"));
        late.is_return = None;
        let table = BasketTable::from_orders(
            ColumnSchema::complete(),
            vec![late, make_order("2", Some("2011-11-02 00:00:00"))],
        );
        let split = splitter().split(&table);

        assert_eq!(split.unusable, vec![0]);
        assert_eq!(split.test, vec![1]);
        assert!(split.train.is_empty());
    }

    #[test]
    fn test_empty_table() {
        let split = splitter().split(&BasketTable::default());
        assert!(split.is_empty());
    }
}
