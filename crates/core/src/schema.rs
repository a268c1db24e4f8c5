//! Input column schema and the catalogue of model features.
//!
//! Required columns carry the order key, the order time and the label; the
//! pipeline refuses to run without them. Optional columns only feed specific
//! features, which are omitted (and reported) when their inputs are absent.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A known column of the cleaned line-item table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Column {
    InvoiceNo,
    StockCode,
    Quantity,
    UnitPrice,
    InvoiceDate,
    CustomerId,
    Country,
    TotalPrice,
    IsReturn,
}

impl Column {
    /// All known columns in canonical order.
    pub const ALL: [Column; 9] = [
        Column::InvoiceNo,
        Column::StockCode,
        Column::Quantity,
        Column::UnitPrice,
        Column::InvoiceDate,
        Column::CustomerId,
        Column::Country,
        Column::TotalPrice,
        Column::IsReturn,
    ];

    /// Header name as it appears in the input file.
    pub fn name(self) -> &'static str {
        match self {
            Column::InvoiceNo => "InvoiceNo",
            Column::StockCode => "StockCode",
            Column::Quantity => "Quantity",
            Column::UnitPrice => "UnitPrice",
            Column::InvoiceDate => "InvoiceDate",
            Column::CustomerId => "CustomerID",
            Column::Country => "Country",
            Column::TotalPrice => "TotalPrice",
            Column::IsReturn => "IsReturn",
        }
    }

    /// Look up a column by header name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Whether the pipeline cannot run without this column.
    pub fn is_required(self) -> bool {
        matches!(
            self,
            Column::InvoiceNo
                | Column::CustomerId
                | Column::Country
                | Column::InvoiceDate
                | Column::IsReturn
        )
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A column of the final feature matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Feature {
    Country,
    UniqueProducts,
    AvgPrice,
    MaxPrice,
    MinPrice,
    CheapItemShare,
    Diversity,
    Month,
    Weekday,
    Hour,
    IsWeekend,
    Quarter,
    Recency,
    AbsBasketSize,
    AbsTotalValue,
}

impl Feature {
    /// The feature contract handed to the classifier, in column order.
    pub const MODEL_FEATURES: [Feature; 15] = [
        Feature::Country,
        Feature::UniqueProducts,
        Feature::AvgPrice,
        Feature::MaxPrice,
        Feature::MinPrice,
        Feature::CheapItemShare,
        Feature::Diversity,
        Feature::Month,
        Feature::Weekday,
        Feature::Hour,
        Feature::IsWeekend,
        Feature::Quarter,
        Feature::Recency,
        Feature::AbsBasketSize,
        Feature::AbsTotalValue,
    ];

    /// Column name in exported matrices.
    pub fn name(self) -> &'static str {
        match self {
            Feature::Country => "Country",
            Feature::UniqueProducts => "UniqueProducts",
            Feature::AvgPrice => "AvgPrice",
            Feature::MaxPrice => "MaxPrice",
            Feature::MinPrice => "MinPrice",
            Feature::CheapItemShare => "CheapItemShare",
            Feature::Diversity => "Diversity",
            Feature::Month => "Month",
            Feature::Weekday => "Weekday",
            Feature::Hour => "Hour",
            Feature::IsWeekend => "IsWeekend",
            Feature::Quarter => "Quarter",
            Feature::Recency => "Recency",
            Feature::AbsBasketSize => "AbsBasketSize",
            Feature::AbsTotalValue => "AbsTotalValue",
        }
    }

    /// Input columns this feature is computed from.
    pub fn required_columns(self) -> &'static [Column] {
        match self {
            Feature::Country => &[Column::Country],
            Feature::UniqueProducts => &[Column::StockCode],
            Feature::AvgPrice
            | Feature::MaxPrice
            | Feature::MinPrice
            | Feature::CheapItemShare => &[Column::UnitPrice],
            Feature::Diversity => &[Column::StockCode, Column::Quantity],
            Feature::Month
            | Feature::Weekday
            | Feature::Hour
            | Feature::IsWeekend
            | Feature::Quarter
            | Feature::Recency => &[Column::InvoiceDate],
            Feature::AbsBasketSize => &[Column::Quantity],
            Feature::AbsTotalValue => &[Column::TotalPrice],
        }
    }

    /// Whether the feature is categorical rather than numeric.
    pub fn is_categorical(self) -> bool {
        matches!(self, Feature::Country)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The columns actually available in an input table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    present: BTreeSet<Column>,
    derived: BTreeSet<Column>,
    unknown: Vec<String>,
}

impl ColumnSchema {
    /// Build a schema from header names. Headers are trimmed and a leading
    /// UTF-8 byte order mark is ignored.
    pub fn from_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut schema = Self::default();
        for header in headers {
            let name = header.trim_start_matches('\u{feff}').trim();
            match Column::from_name(name) {
                Some(column) => {
                    schema.present.insert(column);
                }
                None => schema.unknown.push(name.to_string()),
            }
        }

        // TotalPrice can be rebuilt per item from its two factors.
        if !schema.present.contains(&Column::TotalPrice)
            && schema.present.contains(&Column::Quantity)
            && schema.present.contains(&Column::UnitPrice)
        {
            schema.derived.insert(Column::TotalPrice);
        }

        schema
    }

    /// Schema with every known column present.
    pub fn complete() -> Self {
        Self::from_headers(Column::ALL.iter().map(|c| c.name()))
    }

    /// Whether the column was read from the input.
    pub fn has(&self, column: Column) -> bool {
        self.present.contains(&column)
    }

    /// Whether the column is derived from other columns.
    pub fn is_derived(&self, column: Column) -> bool {
        self.derived.contains(&column)
    }

    /// Whether values for the column exist, read or derived.
    pub fn provides(&self, column: Column) -> bool {
        self.has(column) || self.is_derived(column)
    }

    /// Headers that do not match a known column.
    pub fn unknown_headers(&self) -> &[String] {
        &self.unknown
    }

    /// Required columns absent from the input.
    pub fn missing_required(&self) -> Vec<Column> {
        Column::ALL
            .into_iter()
            .filter(|c| c.is_required() && !self.has(*c))
            .collect()
    }

    /// Optional columns absent from the input (and not derivable).
    pub fn missing_optional(&self) -> Vec<Column> {
        Column::ALL
            .into_iter()
            .filter(|c| !c.is_required() && !self.provides(*c))
            .collect()
    }

    /// Fail when any required column is missing.
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_required();
        if missing.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = missing.iter().map(|c| c.name()).collect();
        Err(Error::schema(format!(
            "missing required column(s): {}",
            names.join(", ")
        )))
    }

    /// Whether every input of the feature is available.
    pub fn supports(&self, feature: Feature) -> bool {
        feature.required_columns().iter().all(|c| self.provides(*c))
    }

    /// Model features that will be present in the final matrix.
    pub fn available_features(&self) -> Vec<Feature> {
        Feature::MODEL_FEATURES
            .into_iter()
            .filter(|f| self.supports(*f))
            .collect()
    }

    /// Model features omitted because an input column is missing.
    pub fn skipped_features(&self) -> Vec<Feature> {
        Feature::MODEL_FEATURES
            .into_iter()
            .filter(|f| !self.supports(*f))
            .collect()
    }
}
