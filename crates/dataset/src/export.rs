//! CSV export of the dataset and of classifier predictions.
//!
//! Nulls are written as empty cells. The Country column is written as its
//! label rather than its category code.

use crate::dataset::Dataset;
use crate::matrix::FeatureMatrix;
use returns_core::{BasketTable, Error, Feature, OrderKey, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Files written by [`export_dataset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub x_train: PathBuf,
    pub x_test: PathBuf,
    pub y_train: PathBuf,
    pub y_test: PathBuf,
    pub basket: PathBuf,
}

fn fmt_opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write a feature matrix with a header row.
pub fn write_matrix<W: Write>(writer: W, matrix: &FeatureMatrix) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(matrix.feature_names())?;

    for row in matrix.rows() {
        let record: Vec<String> = matrix
            .features()
            .iter()
            .zip(row)
            .map(|(feature, value)| match feature {
                Feature::Country => (*value)
                    .and_then(|code| matrix.countries().label(code as u32))
                    .unwrap_or_default()
                    .to_string(),
                _ => fmt_opt(*value),
            })
            .collect();
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write a label vector under an `IsReturn` header.
pub fn write_labels<W: Write>(writer: W, labels: &[u8]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["IsReturn"])?;
    for label in labels {
        csv_writer.write_record([label.to_string()])?;
    }
    csv_writer.flush()?;
    Ok(())
}

const BASKET_HEADER: [&str; 28] = [
    "InvoiceNo",
    "CustomerID",
    "Country",
    "ItemCount",
    "BasketSize",
    "UniqueProducts",
    "AvgPrice",
    "MaxPrice",
    "MinPrice",
    "TotalValue",
    "CheapItemShare",
    "InvoiceDate",
    "IsReturn",
    "Diversity",
    "Month",
    "Weekday",
    "Hour",
    "IsWeekend",
    "Quarter",
    "PastOrders",
    "PastReturns",
    "ReturnRate",
    "PrevDate",
    "Recency",
    "RecencyImputed",
    "AbsBasketSize",
    "AbsTotalValue",
    "Usable",
];

/// Write the full basket table, metadata and history included.
pub fn write_basket<W: Write>(writer: W, table: &BasketTable) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(BASKET_HEADER)?;

    for row in table.iter() {
        let order = &row.order;
        let cal = row.calendar.as_ref();
        let hist = row.history.as_ref();
        let record: [String; 28] = [
            order.key.invoice_no.clone(),
            order.key.customer_id.clone(),
            order.key.country.clone(),
            order.item_count.to_string(),
            fmt_opt(order.basket_size),
            fmt_opt(order.unique_products),
            fmt_opt(order.avg_price),
            fmt_opt(order.max_price),
            fmt_opt(order.min_price),
            fmt_opt(order.total_value),
            fmt_opt(order.cheap_item_share),
            fmt_opt(order.invoice_date.map(|d| d.format("%Y-%m-%d %H:%M:%S"))),
            fmt_opt(row.label()),
            fmt_opt(row.magnitudes.diversity),
            fmt_opt(cal.map(|c| c.month)),
            fmt_opt(cal.map(|c| c.weekday)),
            fmt_opt(cal.map(|c| c.hour)),
            fmt_opt(cal.map(|c| u8::from(c.is_weekend))),
            fmt_opt(cal.map(|c| c.quarter)),
            fmt_opt(hist.map(|h| h.past_orders)),
            fmt_opt(hist.map(|h| h.past_returns)),
            fmt_opt(hist.and_then(|h| h.return_rate)),
            fmt_opt(hist.and_then(|h| h.prev_date).map(|d| d.format("%Y-%m-%d %H:%M:%S"))),
            fmt_opt(hist.and_then(|h| h.recency_days)),
            fmt_opt(hist.map(|h| u8::from(h.recency_imputed))),
            fmt_opt(row.magnitudes.abs_basket_size),
            fmt_opt(row.magnitudes.abs_total_value),
            u8::from(row.is_usable()).to_string(),
        ];
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn create(path: &Path) -> Result<fs::File> {
    fs::File::create(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("cannot create {}: {e}", path.display()),
        ))
    })
}

/// Write X_train, X_test, y_train, y_test and the basket table into `dir`.
pub fn export_dataset(dir: impl AsRef<Path>, dataset: &Dataset) -> Result<ExportPaths> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let paths = ExportPaths {
        x_train: dir.join("X_train.csv"),
        x_test: dir.join("X_test.csv"),
        y_train: dir.join("y_train.csv"),
        y_test: dir.join("y_test.csv"),
        basket: dir.join("basket.csv"),
    };

    let train = dataset.train();
    let test = dataset.test();
    write_matrix(create(&paths.x_train)?, &train.x)?;
    write_matrix(create(&paths.x_test)?, &test.x)?;
    write_labels(create(&paths.y_train)?, &train.y)?;
    write_labels(create(&paths.y_test)?, &test.y)?;
    write_basket(create(&paths.basket)?, &dataset.basket)?;

    info!(dir = %dir.display(), train = train.len(), test = test.len(), "Dataset exported");
    Ok(paths)
}

/// One scored test order.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub key: OrderKey,
    pub true_return: u8,
    pub predicted_return: u8,
    pub prob_return: f64,
}

/// Classifier output joined back onto order metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionReport {
    pub records: Vec<PredictionRecord>,
}

impl PredictionReport {
    /// Join predictions with the test rows they were made for.
    ///
    /// All four inputs must have the same length and order as X_test.
    pub fn new(
        metadata: &[&OrderKey],
        y_true: &[u8],
        y_pred: &[u8],
        proba: &[f64],
    ) -> Result<Self> {
        let n = metadata.len();
        if y_true.len() != n || y_pred.len() != n || proba.len() != n {
            return Err(Error::data(format!(
                "prediction lengths differ: metadata={n}, y_true={}, y_pred={}, proba={}",
                y_true.len(),
                y_pred.len(),
                proba.len()
            )));
        }

        let records = metadata
            .iter()
            .zip(y_true)
            .zip(y_pred)
            .zip(proba)
            .map(|(((key, &t), &p), &prob)| PredictionRecord {
                key: (*key).clone(),
                true_return: t,
                predicted_return: p,
                prob_return: prob,
            })
            .collect();
        Ok(Self { records })
    }

    /// Build from a dataset's test split.
    pub fn for_test_split(dataset: &Dataset, y_pred: &[u8], proba: &[f64]) -> Result<Self> {
        let test = dataset.test();
        Self::new(&dataset.test_metadata(), &test.y, y_pred, proba)
    }

    /// Write the report as CSV with a UTF-8 byte order mark.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all("\u{feff}".as_bytes())?;
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record([
            "InvoiceNo",
            "CustomerID",
            "Country",
            "TrueReturn",
            "PredictedReturn",
            "ProbReturn",
        ])?;
        for r in &self.records {
            csv_writer.write_record([
                r.key.invoice_no.clone(),
                r.key.customer_id.clone(),
                r.key.country.clone(),
                r.true_return.to_string(),
                r.predicted_return.to_string(),
                r.prob_return.to_string(),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write the report to a file.
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.write(create(path)?)?;
        info!(path = %path.display(), rows = self.records.len(), "Predictions saved");
        Ok(())
    }
}
