//! Feature pipeline.
//!
//! Chains aggregation, calendar, customer history and the leakage guard.
//! Each stage takes the table by value and hands back the enriched table, so
//! no stage observes another stage's intermediate state.

use crate::{
    history::CustomerHistoryBuilder, leakage::LeakageGuard, temporal::TemporalFeatureBuilder,
};
use returns_core::{BasketTable, Config, Result};
use returns_ingestion::{AggregationStats, LineItemTable, OrderBuilder};
use tracing::info;

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Fully enriched basket table, in aggregation order.
    pub basket: BasketTable,
    /// Aggregation counts.
    pub stats: AggregationStats,
}

/// Feature computation pipeline.
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    order_builder: OrderBuilder,
    temporal: TemporalFeatureBuilder,
    history: CustomerHistoryBuilder,
    leakage: LeakageGuard,
}

impl FeaturePipeline {
    /// Create a pipeline from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            order_builder: OrderBuilder::new(config.features.cheap_price_threshold),
            temporal: TemporalFeatureBuilder,
            history: CustomerHistoryBuilder,
            leakage: LeakageGuard,
        }
    }

    /// Run every stage over a line-item table.
    ///
    /// Fails only when the table lacks a required column.
    pub fn run(&self, items: &LineItemTable) -> Result<PipelineOutput> {
        items.schema.validate()?;

        let (basket, stats) = self.order_builder.build(items);
        let basket = self.temporal.apply(basket);
        let basket = self.history.apply(basket);
        let basket = self.leakage.apply(basket);

        info!(
            orders = basket.len(),
            unusable = basket.unusable_count(),
            "Feature pipeline finished"
        );
        Ok(PipelineOutput { basket, stats })
    }
}

impl Default for FeaturePipeline {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}
