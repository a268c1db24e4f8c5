//! PyO3 bindings for the basket-returns pipeline.
//!
//! Exposes the Rust pipeline to Python:
//! - Line-item loading and data-quality profiling
//! - Order aggregation and feature computation
//! - Chronological train/test split
//! - Prediction report export

use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use returns_core::{Config as RustConfig, Error as RustError};
use returns_dataset::{
    build_dataset as rust_build_dataset, export_dataset, Dataset as RustDataset, PredictionReport,
};
use returns_ingestion::{log_schema, DataProfile as RustDataProfile, LineItemTable};

fn to_py_err(err: RustError) -> PyErr {
    match err {
        RustError::Io(e) => PyIOError::new_err(e.to_string()),
        e @ (RustError::Config(_) | RustError::Schema(_) | RustError::Data(_)) => {
            PyValueError::new_err(e.to_string())
        }
        e => PyRuntimeError::new_err(e.to_string()),
    }
}

fn load_items(path: &str, delimiter: char) -> PyResult<LineItemTable> {
    if !delimiter.is_ascii() {
        return Err(PyValueError::new_err(format!(
            "delimiter must be a single ASCII character, got {delimiter:?}"
        )));
    }
    LineItemTable::from_csv_path(path, delimiter as u8).map_err(to_py_err)
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// Data-quality counts over the loaded line items.
#[pyclass]
#[derive(Clone)]
pub struct DataProfile {
    #[pyo3(get)]
    pub total_rows: u64,
    #[pyo3(get)]
    pub skipped_rows: u64,
    #[pyo3(get)]
    pub cancellation_rows: u64,
    #[pyo3(get)]
    pub negative_quantity_rows: u64,
    #[pyo3(get)]
    pub nonpositive_price_rows: u64,
    #[pyo3(get)]
    pub missing_customer_rows: u64,
    #[pyo3(get)]
    pub return_rows: u64,
    #[pyo3(get)]
    pub unparseable_timestamps: u64,
    #[pyo3(get)]
    pub unparseable_values: u64,
    #[pyo3(get)]
    pub missing_customer_pct: f64,
}

#[pymethods]
impl DataProfile {
    fn __repr__(&self) -> String {
        format!(
            "DataProfile(total_rows={}, cancellations={}, returns={}, missing_customer={})",
            self.total_rows, self.cancellation_rows, self.return_rows, self.missing_customer_rows
        )
    }
}

impl From<&RustDataProfile> for DataProfile {
    fn from(p: &RustDataProfile) -> Self {
        DataProfile {
            total_rows: p.total_rows,
            skipped_rows: p.skipped_rows,
            cancellation_rows: p.cancellation_rows,
            negative_quantity_rows: p.negative_quantity_rows,
            nonpositive_price_rows: p.nonpositive_price_rows,
            missing_customer_rows: p.missing_customer_rows,
            return_rows: p.return_rows,
            unparseable_timestamps: p.unparseable_timestamps,
            unparseable_values: p.unparseable_values,
            missing_customer_pct: p.missing_customer_pct(),
        }
    }
}

/// Model-ready dataset with a chronological split.
///
/// Feature rows are lists of optional floats in `feature_names` order;
/// Country is encoded as its index in `country_categories`.
#[pyclass]
pub struct Dataset {
    inner: RustDataset,
}

#[pymethods]
impl Dataset {
    #[getter]
    fn feature_names(&self) -> Vec<String> {
        self.inner
            .matrix
            .feature_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[getter]
    fn country_categories(&self) -> Vec<String> {
        self.inner.matrix.countries().labels().to_vec()
    }

    #[getter]
    fn x_train(&self) -> Vec<Vec<Option<f64>>> {
        self.inner.train().x.rows().to_vec()
    }

    #[getter]
    fn x_test(&self) -> Vec<Vec<Option<f64>>> {
        self.inner.test().x.rows().to_vec()
    }

    #[getter]
    fn y_train(&self) -> Vec<u8> {
        self.inner.train().y
    }

    #[getter]
    fn y_test(&self) -> Vec<u8> {
        self.inner.test().y
    }

    /// (InvoiceNo, CustomerID, Country) per test row, aligned with `x_test`.
    #[getter]
    fn test_metadata(&self) -> Vec<(String, String, String)> {
        self.inner
            .test_metadata()
            .into_iter()
            .map(|k| (k.invoice_no.clone(), k.customer_id.clone(), k.country.clone()))
            .collect()
    }

    #[getter]
    fn skipped_features(&self) -> Vec<String> {
        self.inner
            .skipped_features()
            .into_iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    #[getter]
    fn unusable_count(&self) -> usize {
        self.inner.split.unusable.len()
    }

    #[getter]
    fn order_count(&self) -> usize {
        self.inner.basket.len()
    }

    /// Write X/y matrices and the basket table as CSV files into `dir`.
    fn export(&self, dir: &str) -> PyResult<Vec<String>> {
        let paths = export_dataset(dir, &self.inner).map_err(to_py_err)?;
        Ok([
            paths.x_train,
            paths.x_test,
            paths.y_train,
            paths.y_test,
            paths.basket,
        ]
        .iter()
        .map(|p| p.display().to_string())
        .collect())
    }

    /// Join test-set predictions with order metadata and save as CSV.
    fn write_predictions(&self, path: &str, y_pred: Vec<u8>, proba: Vec<f64>) -> PyResult<()> {
        PredictionReport::for_test_split(&self.inner, &y_pred, &proba)
            .and_then(|report| report.write_to_path(path))
            .map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!(
            "Dataset(orders={}, train={}, test={}, features={})",
            self.inner.basket.len(),
            self.inner.split.train.len(),
            self.inner.split.test.len(),
            self.inner.matrix.n_cols()
        )
    }
}

// ============================================================================
// Python-exposed Functions
// ============================================================================

/// Load a line-item CSV and return its data-quality profile.
#[pyfunction]
#[pyo3(signature = (path, delimiter=','))]
fn profile(path: &str, delimiter: char) -> PyResult<DataProfile> {
    let items = load_items(path, delimiter)?;
    log_schema(&items.schema);
    Ok(DataProfile::from(&items.profile))
}

/// Run the full pipeline over a line-item CSV.
#[pyfunction]
#[pyo3(signature = (path, cutoff=None, cheap_price_threshold=None, delimiter=','))]
fn build_dataset(
    py: Python<'_>,
    path: &str,
    cutoff: Option<String>,
    cheap_price_threshold: Option<f64>,
    delimiter: char,
) -> PyResult<Dataset> {
    let mut config = RustConfig::default();
    config.input.path = path.into();
    config.input.delimiter = delimiter;
    if let Some(cutoff) = cutoff {
        config.split.cutoff = cutoff;
    }
    if let Some(threshold) = cheap_price_threshold {
        config.features.cheap_price_threshold = threshold;
    }
    config.validate().map_err(to_py_err)?;

    let items = load_items(path, delimiter)?;
    let inner = py
        .allow_threads(|| rust_build_dataset(&items, &config))
        .map_err(to_py_err)?;
    Ok(Dataset { inner })
}

// ============================================================================
// Module Definition
// ============================================================================

/// Basket Returns - order-level return-prediction features.
#[pymodule]
fn basket_returns(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<DataProfile>()?;
    m.add_class::<Dataset>()?;

    // Functions
    m.add_function(wrap_pyfunction!(profile, m)?)?;
    m.add_function(wrap_pyfunction!(build_dataset, m)?)?;

    Ok(())
}
