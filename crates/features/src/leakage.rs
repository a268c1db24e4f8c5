//! Removal of sign-encoded target leakage.
//!
//! A negative Quantity or TotalPrice is how a return is recorded, so the
//! signed basket totals give the label away. Only their magnitudes move on.

use returns_core::{BasketTable, GuardedMagnitudes, Order};
use tracing::debug;

/// Replaces signed basket totals with magnitudes and derives Diversity.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeakageGuard;

impl LeakageGuard {
    /// Magnitudes for one order.
    pub fn magnitudes(order: &Order) -> GuardedMagnitudes {
        let abs_basket_size = order.basket_size.map(i64::unsigned_abs);
        let diversity = match (order.unique_products, abs_basket_size) {
            (Some(unique), Some(size)) if size > 0 => Some(unique as f64 / size as f64),
            _ => None,
        };

        GuardedMagnitudes {
            abs_basket_size,
            abs_total_value: order.total_value.map(f64::abs),
            diversity,
        }
    }

    pub fn apply(&self, mut table: BasketTable) -> BasketTable {
        let mut empty_baskets = 0usize;
        for row in &mut table.rows {
            row.magnitudes = Self::magnitudes(&row.order);
            if row.magnitudes.abs_basket_size == Some(0) {
                empty_baskets += 1;
            }
        }
        debug!(empty_baskets, "Leakage guard applied");
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use returns_core::OrderKey;

    fn make_order(basket_size: Option<i64>, unique: Option<u32>, total_value: Option<f64>) -> Order {
        Order {
            key: OrderKey {
                invoice_no: "C536379".to_string(),
                customer_id: "14527".to_string(),
                country: "United Kingdom".to_string(),
            },
            item_count: 2,
            first_seen: 0,
            basket_size,
            unique_products: unique,
            avg_price: None,
            max_price: None,
            min_price: None,
            total_value,
            cheap_item_share: None,
            invoice_date: None,
            is_return: Some(true),
        }
    }

    #[test]
    fn test_negative_totals_become_magnitudes() {
        let m = LeakageGuard::magnitudes(&make_order(Some(-8), Some(2), Some(-27.5)));
        assert_eq!(m.abs_basket_size, Some(8));
        assert_relative_eq!(m.abs_total_value.unwrap(), 27.5);
        assert_relative_eq!(m.diversity.unwrap(), 0.25);
    }

    #[test]
    fn test_zero_net_basket_has_no_diversity() {
        let m = LeakageGuard::magnitudes(&make_order(Some(0), Some(2), Some(0.0)));
        assert_eq!(m.abs_basket_size, Some(0));
        assert_eq!(m.diversity, None);
    }

    #[test]
    fn test_missing_inputs_stay_missing() {
        let m = LeakageGuard::magnitudes(&make_order(None, Some(2), None));
        assert_eq!(m, GuardedMagnitudes::default());

        let m = LeakageGuard::magnitudes(&make_order(Some(4), None, Some(3.0)));
        assert_eq!(m.abs_basket_size, Some(4));
        assert_eq!(m.diversity, None);
    }

    #[test]
    fn test_extreme_quantity_does_not_overflow() {
        let m = LeakageGuard::magnitudes(&make_order(Some(i64::MIN), Some(1), None));
        assert_eq!(m.abs_basket_size, Some(i64::MIN.unsigned_abs()));
    }
}
