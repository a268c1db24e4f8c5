//! Loading the cleaned line-item CSV.
//!
//! The header is validated against the known column schema before any row is
//! read: missing required columns abort the load, missing optional columns
//! are reported together with the features they disable. Cells that fail to
//! parse become `None` and are counted in the [`DataProfile`].

use crate::profile::DataProfile;
use returns_core::{parse_timestamp, Column, ColumnSchema, Error, LineItem, Result};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// The typed line-item table handed to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct LineItemTable {
    /// Columns available in the source.
    pub schema: ColumnSchema,
    /// Items in input order.
    pub items: Vec<LineItem>,
    /// Quality counts gathered while loading.
    pub profile: DataProfile,
}

impl LineItemTable {
    /// Wrap already-typed items.
    pub fn from_items(schema: ColumnSchema, items: Vec<LineItem>) -> Self {
        let profile = DataProfile::from_items(&items);
        Self {
            schema,
            items,
            profile,
        }
    }

    /// Load a CSV file. A missing file is an error.
    pub fn from_csv_path(path: impl AsRef<Path>, delimiter: u8) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("cannot open input {}: {e}", path.display()),
            ))
        })?;
        info!(path = %path.display(), "Loading line items");
        Self::from_reader(file, delimiter)
    }

    /// Load CSV data from any reader.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let schema = ColumnSchema::from_headers(headers.iter());
        log_schema(&schema);
        schema.validate()?;

        let index = ColumnIndex::new(&headers);
        let mut items = Vec::new();
        let mut profile = DataProfile::default();

        for record in csv_reader.byte_records() {
            let record = decode_record(&record?, &mut profile);
            profile.total_rows += 1;

            match index.parse(&record, &schema, &mut profile) {
                Some(item) => {
                    profile.record(&item);
                    items.push(item);
                }
                None => profile.skipped_rows += 1,
            }
        }

        if profile.skipped_rows > 0 {
            warn!(rows = profile.skipped_rows, "Skipped rows without an InvoiceNo");
        }
        if profile.unparseable_timestamps > 0 {
            warn!(
                cells = profile.unparseable_timestamps,
                "Unparseable InvoiceDate values coerced to null"
            );
        }
        if profile.unparseable_values > 0 {
            warn!(
                cells = profile.unparseable_values,
                "Unparseable numeric values coerced to null"
            );
        }
        info!(items = items.len(), "Loaded line items");

        Ok(Self {
            schema,
            items,
            profile,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Report which columns are available and which features they disable.
pub fn log_schema(schema: &ColumnSchema) {
    let missing = schema.missing_required();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|c| c.name()).collect();
        warn!(columns = ?names, "Required columns missing");
    }

    if schema.is_derived(Column::TotalPrice) {
        info!("TotalPrice absent, deriving it as Quantity * UnitPrice");
    }

    for column in schema.missing_optional() {
        warn!(column = column.name(), "Optional column missing");
    }

    for feature in schema.skipped_features() {
        let inputs: Vec<&str> = feature
            .required_columns()
            .iter()
            .filter(|c| !schema.provides(**c))
            .map(|c| c.name())
            .collect();
        warn!(feature = feature.name(), missing = ?inputs, "Feature skipped");
    }

    if !schema.unknown_headers().is_empty() {
        debug!(headers = ?schema.unknown_headers(), "Ignoring unknown columns");
    }
}

/// Position of each known column in the CSV header.
struct ColumnIndex {
    positions: HashMap<Column, usize>,
}

impl ColumnIndex {
    fn new(headers: &csv::StringRecord) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| {
                let name = h.trim_start_matches('\u{feff}').trim();
                Column::from_name(name).map(|c| (c, i))
            })
            .collect();
        Self { positions }
    }

    /// Non-empty cell for a column, if the column and the cell exist.
    fn cell<'r>(&self, record: &'r csv::StringRecord, column: Column) -> Option<&'r str> {
        let pos = *self.positions.get(&column)?;
        record.get(pos).map(str::trim).filter(|s| !s.is_empty())
    }

    fn parse(
        &self,
        record: &csv::StringRecord,
        schema: &ColumnSchema,
        profile: &mut DataProfile,
    ) -> Option<LineItem> {
        let invoice_no = self.cell(record, Column::InvoiceNo)?.to_string();

        let quantity = self
            .cell(record, Column::Quantity)
            .and_then(|raw| count_failure(parse_quantity(raw), profile));
        let unit_price = self
            .cell(record, Column::UnitPrice)
            .and_then(|raw| count_failure(parse_number(raw), profile));

        let total_price = if schema.is_derived(Column::TotalPrice) {
            quantity.zip(unit_price).map(|(q, p)| q as f64 * p)
        } else {
            self.cell(record, Column::TotalPrice)
                .and_then(|raw| count_failure(parse_number(raw), profile))
        };

        let invoice_date = self.cell(record, Column::InvoiceDate).and_then(|raw| {
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                profile.unparseable_timestamps += 1;
            }
            parsed
        });

        let is_return = self
            .cell(record, Column::IsReturn)
            .and_then(|raw| count_failure(parse_flag(raw), profile));

        Some(LineItem {
            invoice_no,
            stock_code: self.cell(record, Column::StockCode).map(str::to_string),
            quantity,
            unit_price,
            invoice_date,
            customer_id: self.cell(record, Column::CustomerId).map(normalize_customer_id),
            country: self
                .cell(record, Column::Country)
                .unwrap_or_default()
                .to_string(),
            total_price,
            is_return,
        })
    }
}

/// Decode a raw row cell by cell. Invalid UTF-8 is replaced lossily and
/// counted, so one bad byte never drops the row or aborts the load.
fn decode_record(record: &csv::ByteRecord, profile: &mut DataProfile) -> csv::StringRecord {
    record
        .iter()
        .map(|field| match std::str::from_utf8(field) {
            Ok(text) => Cow::Borrowed(text),
            Err(_) => {
                profile.unparseable_values += 1;
                String::from_utf8_lossy(field)
            }
        })
        .collect()
}

fn count_failure<T>(value: Option<T>, profile: &mut DataProfile) -> Option<T> {
    if value.is_none() {
        profile.unparseable_values += 1;
    }
    value
}

/// Finite float.
fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integer quantity; integral floats such as `6.0` are accepted.
fn parse_quantity(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().or_else(|| {
        parse_number(raw)
            .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
            .map(|v| v as i64)
    })
}

/// 0/1 flag, also accepting booleans and integral floats.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" => Some(true),
        "0" | "0.0" | "false" => Some(false),
        _ => None,
    }
}

/// Customer ids exported through a float column read back as `17850.0`.
fn normalize_customer_id(raw: &str) -> String {
    match raw.strip_suffix(".0") {
        Some(head) if !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit()) => {
            head.to_string()
        }
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str =
        "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country,TotalPrice,IsReturn";

    fn load(body: &str) -> Result<LineItemTable> {
        let data = format!("{HEADER}\n{body}");
        LineItemTable::from_reader(data.as_bytes(), b',')
    }

    #[test]
    fn test_load_typed_rows() {
        let table = load(
            "536365,85123A,WHITE HANGING HEART,6,2010-12-01 08:26:00,2.55,17850.0,United Kingdom,15.3,0\n\
             C536379,D,Discount,-1,2010-12-01 09:41:00,27.5,14527,United Kingdom,-27.5,1\n",
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        let first = &table.items[0];
        assert_eq!(first.invoice_no, "536365");
        assert_eq!(first.quantity, Some(6));
        assert_eq!(first.customer_id.as_deref(), Some("17850"));
        assert_eq!(first.is_return, Some(false));
        assert!(first.invoice_date.is_some());

        let second = &table.items[1];
        assert_eq!(second.quantity, Some(-1));
        assert_eq!(second.is_return, Some(true));
        assert_eq!(table.profile.cancellation_rows, 1);
        assert_eq!(table.profile.negative_quantity_rows, 1);
        assert_eq!(table.schema.unknown_headers(), &["Description".to_string()]);
    }

    #[test]
    fn test_bad_cells_become_null() {
        let table = load(
            "536365,85123A,x,six,yesterday,2.55,,United Kingdom,abc,maybe\n",
        )
        .unwrap();

        let item = &table.items[0];
        assert_eq!(item.quantity, None);
        assert_eq!(item.invoice_date, None);
        assert_eq!(item.customer_id, None);
        assert_eq!(item.total_price, None);
        assert_eq!(item.is_return, None);
        assert_eq!(table.profile.unparseable_timestamps, 1);
        assert_eq!(table.profile.unparseable_values, 3);
        assert_eq!(table.profile.missing_customer_rows, 1);
    }

    #[test]
    fn test_invalid_utf8_cell_does_not_abort() {
        let mut data = format!(
            "{HEADER}\n536365,85123A,x,6,2010-12-01 08:26:00,2.55,17850,United Kingdom,15.3,0\n"
        )
        .into_bytes();
        data.extend_from_slice(b"536366,22633,HAND WARMER,6,2010-12-01 08:28:00,1.85,17850,Cura\xe7ao,11.1,0\n");

        let table = LineItemTable::from_reader(data.as_slice(), b',').unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.profile.total_rows, 2);
        assert_eq!(table.profile.unparseable_values, 1);
        let item = &table.items[1];
        assert_eq!(item.invoice_no, "536366");
        assert_eq!(item.country, "Cura\u{fffd}ao");
        assert_eq!(item.quantity, Some(6));
        assert_eq!(item.customer_id.as_deref(), Some("17850"));
    }

    #[test]
    fn test_row_without_invoice_is_skipped() {
        let table = load(",85123A,x,6,2010-12-01 08:26:00,2.55,17850,United Kingdom,15.3,0\n").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.profile.total_rows, 1);
        assert_eq!(table.profile.skipped_rows, 1);
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        let data = "InvoiceNo,Quantity,InvoiceDate,CustomerID,Country\n536365,6,2010-12-01 08:26:00,17850,UK\n";
        let result = LineItemTable::from_reader(data.as_bytes(), b',');
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_total_price_derived_when_absent() {
        let data = "InvoiceNo,StockCode,Quantity,InvoiceDate,UnitPrice,CustomerID,Country,IsReturn\n\
                    536365,85123A,6,2010-12-01 08:26:00,2.5,17850,United Kingdom,0\n";
        let table = LineItemTable::from_reader(data.as_bytes(), b',').unwrap();
        assert!(table.schema.is_derived(Column::TotalPrice));
        assert_eq!(table.items[0].total_price, Some(15.0));
    }

    #[test]
    fn test_semicolon_delimiter_and_bom() {
        let data = "\u{feff}InvoiceNo;CustomerID;Country;InvoiceDate;IsReturn\n536365;17850;France;12/1/2010 8:26;1\n";
        let table = LineItemTable::from_reader(data.as_bytes(), b';').unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.items[0].country, "France");
        assert_eq!(table.items[0].quantity, None);
        assert!(table.items[0].invoice_date.is_some());
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = LineItemTable::from_csv_path("/nonexistent/online_retail_clean.csv", b',');
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(
            file,
            "536365,85123A,x,6,2010-12-01 08:26:00,2.55,17850,United Kingdom,15.3,0"
        )
        .unwrap();
        file.flush().unwrap();

        let table = LineItemTable::from_csv_path(file.path(), b',').unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_quantity("12"), Some(12));
        assert_eq!(parse_quantity("-3.0"), Some(-3));
        assert_eq!(parse_quantity("1.5"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_flag("True"), Some(true));
        assert_eq!(parse_flag("0.0"), Some(false));
        assert_eq!(normalize_customer_id("12346.0"), "12346");
        assert_eq!(normalize_customer_id("A12.0"), "A12.0");
    }
}
