//! Feature matrix handed to the classifier.

use returns_core::{BasketTable, Feature};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Bounded categorical domain for Country, shared by every split.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryDomain {
    /// Sorted, distinct labels. A label's position is its code.
    labels: Vec<String>,
}

impl CountryDomain {
    /// Collect the countries present in a basket table.
    pub fn from_table(table: &BasketTable) -> Self {
        let labels: BTreeSet<&str> = table.iter().map(|r| r.order.key.country.as_str()).collect();
        Self {
            labels: labels.into_iter().map(str::to_string).collect(),
        }
    }

    /// Category code of a label.
    pub fn code(&self, label: &str) -> Option<u32> {
        self.labels
            .binary_search_by(|l| l.as_str().cmp(label))
            .ok()
            .map(|i| i as u32)
    }

    /// Label of a category code.
    pub fn label(&self, code: u32) -> Option<&str> {
        self.labels.get(code as usize).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Row-major feature matrix with a fixed column contract.
///
/// Missing values are `None`. The Country column holds category codes from
/// [`CountryDomain`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    features: Vec<Feature>,
    countries: CountryDomain,
    rows: Vec<Vec<Option<f64>>>,
}

impl FeatureMatrix {
    /// Create a matrix. Every row must have one value per feature.
    pub fn new(features: Vec<Feature>, countries: CountryDomain, rows: Vec<Vec<Option<f64>>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == features.len()));
        Self {
            features,
            countries,
            rows,
        }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Column names in order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        self.features.iter().map(|f| f.name()).collect()
    }

    pub fn countries(&self) -> &CountryDomain {
        &self.countries
    }

    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a feature in the column order.
    pub fn column_index(&self, feature: Feature) -> Option<usize> {
        self.features.iter().position(|f| *f == feature)
    }

    /// One cell.
    pub fn value(&self, row: usize, feature: Feature) -> Option<f64> {
        let col = self.column_index(feature)?;
        self.rows.get(row)?.get(col).copied().flatten()
    }

    /// A whole column.
    pub fn column(&self, feature: Feature) -> Option<Vec<Option<f64>>> {
        let col = self.column_index(feature)?;
        Some(self.rows.iter().map(|r| r[col]).collect())
    }

    /// New matrix holding the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.clone(),
            countries: self.countries.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }
}
