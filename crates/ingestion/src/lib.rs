//! Data ingestion and order aggregation for the basket-returns pipeline.
//!
//! This crate handles:
//! - Loading the cleaned line-item CSV with schema validation
//! - Timestamp and numeric coercion (bad cells become null)
//! - Data-quality profiling
//! - Order (basket) aggregation

pub mod loader;
pub mod order_builder;
pub mod profile;

pub use loader::{log_schema, LineItemTable};
pub use order_builder::{AggregationStats, OrderBuilder};
pub use profile::DataProfile;
