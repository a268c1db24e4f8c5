//! Dataset assembly for the basket-returns pipeline.
//!
//! This crate provides:
//! - Final feature selection (the X/y contract)
//! - Chronological train/test splitting
//! - The end-to-end `build_dataset` entry point
//! - CSV export of matrices, labels, the basket table and predictions

pub mod dataset;
pub mod export;
pub mod matrix;
pub mod selector;
pub mod splitter;

pub use dataset::{build_dataset, load_dataset, Dataset, LabeledMatrix};
pub use export::{export_dataset, ExportPaths, PredictionRecord, PredictionReport};
pub use matrix::{CountryDomain, FeatureMatrix};
pub use selector::FeatureSelector;
pub use splitter::{DatasetSplitter, Split};
