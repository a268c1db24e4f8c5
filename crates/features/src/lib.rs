//! Order-level feature computation for the basket-returns pipeline.
//!
//! This crate handles:
//! - Calendar features from the order time
//! - Causal per-customer history (past orders, returns, recency)
//! - Leakage guarding of signed basket totals
//! - The pipeline chaining these stages

pub mod history;
pub mod leakage;
pub mod pipeline;
pub mod temporal;

pub use history::{customer_timelines, CustomerHistoryBuilder, CustomerTimeline};
pub use leakage::LeakageGuard;
pub use pipeline::{FeaturePipeline, PipelineOutput};
pub use temporal::TemporalFeatureBuilder;
