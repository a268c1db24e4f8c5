//! Core types and configuration for the basket-returns pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Line item, order and basket row types
//! - Input column schema and feature catalogue
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod schema;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use schema::{Column, ColumnSchema, Feature};
pub use types::*;
