use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Date32Type, Float64Type};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use once_cell::unsync::OnceCell;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::error::{LoadError, Result};
use super::model::{SalesDataset, SalesRecord};

/// Format of the `Date` column in text sources.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

// Source column names.
const INVOICE_ID: &str = "Invoice ID";
const BRANCH: &str = "Branch";
const CITY: &str = "City";
const CUSTOMER_TYPE: &str = "Customer type";
const GENDER: &str = "Gender";
const PRODUCT_LINE: &str = "Product line";
const UNIT_PRICE: &str = "Unit price";
const QUANTITY: &str = "Quantity";
const TAX: &str = "Tax 5%";
const TOTAL: &str = "Total";
const DATE: &str = "Date";
const PAYMENT: &str = "Payment";
const COGS: &str = "cogs";
const GROSS_MARGIN_PCT: &str = "gross margin percentage";
const GROSS_INCOME: &str = "gross income";
const RATING: &str = "Rating";

/// Columns that must be present. `Time` is part of the source layout but
/// carries nothing the dashboard uses, so it may be absent.
const REQUIRED_COLUMNS: [&str; 16] = [
    INVOICE_ID,
    BRANCH,
    CITY,
    CUSTOMER_TYPE,
    GENDER,
    PRODUCT_LINE,
    UNIT_PRICE,
    QUANTITY,
    TAX,
    TOTAL,
    DATE,
    PAYMENT,
    COGS,
    GROSS_MARGIN_PCT,
    GROSS_INCOME,
    RATING,
];

const NUMERIC_COLUMNS: [&str; 8] = [
    UNIT_PRICE,
    QUANTITY,
    TAX,
    TOTAL,
    COGS,
    GROSS_MARGIN_PCT,
    GROSS_INCOME,
    RATING,
];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a sales dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – the exported sales sheet, one header row
/// * `.json`    – `[{ "Invoice ID": ..., "Date": "01/05/2019", ... }, ...]`
/// * `.parquet` – same column names; `Date` as text or a native date column
pub fn load_file(path: &Path) -> Result<SalesDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => Err(LoadError::UnsupportedFormat(other.to_string())),
    }
}

/// The session's dataset: read from `path` on the first [`DataSource::load`]
/// and shared, unchanged, by every later call.
#[derive(Debug)]
pub struct DataSource {
    path: PathBuf,
    cache: OnceCell<Arc<SalesDataset>>,
}

impl DataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load once, then hand out the cached value. A failed load is not
    /// cached, but callers treat it as fatal for the session anyway.
    pub fn load(&self) -> Result<Arc<SalesDataset>> {
        self.cache
            .get_or_try_init(|| {
                let dataset = load_file(&self.path)?;
                log::info!(
                    "Loaded {} sales records from {} (dates {:?})",
                    dataset.len(),
                    self.path.display(),
                    dataset.date_bounds
                );
                Ok(Arc::new(dataset))
            })
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// Row assembly shared by every format
// ---------------------------------------------------------------------------

/// One raw cell as the source format presents it.
enum Cell<'a> {
    Null,
    Text(Cow<'a, str>),
    Number(f64),
    Date(NaiveDate),
}

impl Cell<'_> {
    fn describe(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(s) => s.to_string(),
            Cell::Number(v) => v.to_string(),
            Cell::Date(d) => d.format(DATE_FORMAT).to_string(),
        }
    }
}

fn text_field(cell: Cell<'_>) -> String {
    match cell {
        Cell::Text(s) => s.into_owned(),
        other => other.describe(),
    }
}

fn number_field(row: usize, column: &str, cell: Cell<'_>) -> Result<Option<f64>> {
    let value = match cell {
        Cell::Null => return Ok(None),
        Cell::Number(v) => v,
        Cell::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| LoadError::InvalidNumber {
                    row,
                    column: column.to_string(),
                    value: s.to_string(),
                })?
        }
        Cell::Date(d) => {
            return Err(LoadError::InvalidNumber {
                row,
                column: column.to_string(),
                value: d.to_string(),
            })
        }
    };
    // NaN marks a missing value in dataframe exports.
    Ok(Some(value).filter(|v| !v.is_nan()))
}

fn date_field(row: usize, cell: Cell<'_>) -> Result<NaiveDate> {
    match cell {
        Cell::Date(d) => Ok(d),
        Cell::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| {
            LoadError::InvalidDate {
                row,
                value: s.to_string(),
            }
        }),
        other => Err(LoadError::InvalidDate {
            row,
            value: other.describe(),
        }),
    }
}

/// Assemble a record from a cell accessor. `row` is 1-based and only used in
/// error messages.
fn build_record<'a, F>(row: usize, mut cell: F) -> Result<SalesRecord>
where
    F: FnMut(&'static str) -> Result<Cell<'a>>,
{
    Ok(SalesRecord {
        invoice_id: text_field(cell(INVOICE_ID)?),
        branch: text_field(cell(BRANCH)?),
        city: text_field(cell(CITY)?),
        customer_type: text_field(cell(CUSTOMER_TYPE)?),
        gender: text_field(cell(GENDER)?),
        product_line: text_field(cell(PRODUCT_LINE)?),
        unit_price: number_field(row, UNIT_PRICE, cell(UNIT_PRICE)?)?,
        quantity: number_field(row, QUANTITY, cell(QUANTITY)?)?,
        tax: number_field(row, TAX, cell(TAX)?)?,
        total: number_field(row, TOTAL, cell(TOTAL)?)?,
        date: date_field(row, cell(DATE)?)?,
        payment: text_field(cell(PAYMENT)?),
        cogs: number_field(row, COGS, cell(COGS)?)?,
        gross_margin_pct: number_field(row, GROSS_MARGIN_PCT, cell(GROSS_MARGIN_PCT)?)?,
        gross_income: number_field(row, GROSS_INCOME, cell(GROSS_INCOME)?)?,
        rating: number_field(row, RATING, cell(RATING)?)?,
    })
}

/// Enforce invoice uniqueness and build the dataset.
fn finish(records: Vec<SalesRecord>) -> Result<SalesDataset> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        if !seen.insert(rec.invoice_id.as_str()) {
            return Err(LoadError::DuplicateInvoice {
                row: i + 1,
                invoice_id: rec.invoice_id.clone(),
            });
        }
    }
    Ok(SalesDataset::from_records(records))
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<SalesDataset> {
    let mut reader = csv::Reader::from_reader(open(path)?);
    let headers = reader.headers()?.clone();

    let mut index: BTreeMap<&'static str, usize> = BTreeMap::new();
    for col in REQUIRED_COLUMNS {
        let pos = headers
            .iter()
            .position(|h| h == col)
            .ok_or_else(|| LoadError::MissingColumn(col.to_string()))?;
        index.insert(col, pos);
    }

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let row = i + 1;
        let rec = build_record(row, |col| {
            Ok(match index.get(col).and_then(|&pos| record.get(pos)) {
                Some(s) if !s.is_empty() => Cell::Text(Cow::Borrowed(s)),
                _ => Cell::Null,
            })
        })?;
        records.push(rec);
    }

    finish(records)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, as written by `df.to_json(orient='records')`.
fn load_json(path: &Path) -> Result<SalesDataset> {
    let root: JsonValue = serde_json::from_reader(std::io::BufReader::new(open(path)?))?;

    let rows = root
        .as_array()
        .ok_or_else(|| LoadError::Malformed("expected a top-level JSON array".to_string()))?;

    let mut records = Vec::with_capacity(rows.len());
    for (i, value) in rows.iter().enumerate() {
        let row = i + 1;
        let obj = value
            .as_object()
            .ok_or_else(|| LoadError::Malformed(format!("row {row} is not a JSON object")))?;
        let rec = build_record(row, |col| {
            let value = obj
                .get(col)
                .ok_or_else(|| LoadError::MissingColumn(col.to_string()))?;
            Ok(match value {
                JsonValue::Null => Cell::Null,
                JsonValue::String(s) => Cell::Text(Cow::Borrowed(s.as_str())),
                JsonValue::Number(n) => n.as_f64().map_or(Cell::Null, Cell::Number),
                other => Cell::Text(Cow::Owned(other.to_string())),
            })
        })?;
        records.push(rec);
    }

    finish(records)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// The required columns of one record batch, normalised so that numeric
/// columns are `Float64` (or text, when stored as text), the date column is
/// `Date32` or text, and everything else is `Utf8`.
struct BatchColumns {
    arrays: BTreeMap<&'static str, ArrayRef>,
}

impl BatchColumns {
    fn new(batch: &RecordBatch) -> Result<Self> {
        let mut arrays = BTreeMap::new();
        for col in REQUIRED_COLUMNS {
            let array = batch
                .column_by_name(col)
                .ok_or_else(|| LoadError::MissingColumn(col.to_string()))?;
            let is_text = matches!(
                array.data_type(),
                DataType::Utf8 | DataType::LargeUtf8 | DataType::Dictionary(_, _)
            );
            let normalised = if col == DATE {
                match array.data_type() {
                    DataType::Date32 => array.clone(),
                    DataType::Date64 | DataType::Timestamp(_, _) => {
                        cast(array, &DataType::Date32)?
                    }
                    _ => cast(array, &DataType::Utf8)?,
                }
            } else if NUMERIC_COLUMNS.contains(&col) && !is_text {
                cast(array, &DataType::Float64)?
            } else {
                cast(array, &DataType::Utf8)?
            };
            arrays.insert(col, normalised);
        }
        Ok(Self { arrays })
    }

    fn cell(&self, col: &'static str, row: usize) -> Result<Cell<'_>> {
        let array = self
            .arrays
            .get(col)
            .ok_or_else(|| LoadError::MissingColumn(col.to_string()))?;
        if array.is_null(row) {
            return Ok(Cell::Null);
        }
        Ok(match array.data_type() {
            DataType::Float64 => Cell::Number(array.as_primitive::<Float64Type>().value(row)),
            DataType::Date32 => array
                .as_primitive::<Date32Type>()
                .value_as_date(row)
                .map_or(Cell::Null, Cell::Date),
            _ => Cell::Text(Cow::Borrowed(array.as_string::<i32>().value(row))),
        })
    }
}

/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<SalesDataset> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(open(path)?)?;
    let reader = builder.build()?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        let columns = BatchColumns::new(&batch)?;
        for i in 0..batch.num_rows() {
            let row = records.len() + 1;
            let rec = build_record(row, |col| columns.cell(col, i))?;
            records.push(rec);
        }
    }

    finish(records)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use arrow::array::{Date32Array, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use parquet::arrow::ArrowWriter;

    use super::*;
    use crate::data::model::Dimension;

    const HEADER: &str = "Invoice ID,Branch,City,Customer type,Gender,Product line,Unit price,Quantity,Tax 5%,Total,Date,Time,Payment,cogs,gross margin percentage,gross income,Rating";

    fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    fn csv_with(rows: &[&str]) -> String {
        let mut body = String::from(HEADER);
        for r in rows {
            body.push('\n');
            body.push_str(r);
        }
        body.push('\n');
        body
    }

    const ROW_A: &str = "750-67-8428,A,Yangon,Member,Female,Health and beauty,10.00,1,0.00,10.00,01/05/2019,13:08,Cash,10.00,4.761904762,0.50,7.0";
    const ROW_B: &str = "226-31-3081,B,Mandalay,Normal,Male,Electronic accessories,20.00,1,0.00,20.00,1/6/2019,10:29,Cash,20.00,4.761904762,1.00,9.0";

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "data.csv", &csv_with(&[ROW_A, ROW_B]));

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 2);
        let a = &ds.records[0];
        assert_eq!(a.invoice_id, "750-67-8428");
        assert_eq!(a.customer_type, "Member");
        assert_eq!(a.total, Some(10.0));
        assert_eq!(a.date, NaiveDate::from_ymd_opt(2019, 1, 5).unwrap());
        assert_eq!(ds.records[1].date, NaiveDate::from_ymd_opt(2019, 1, 6).unwrap());
        assert_eq!(ds.values(Dimension::Gender).len(), 2);
    }

    #[test]
    fn test_missing_and_nan_numbers_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let row = "111-11-1111,A,Yangon,Member,Female,Health and beauty,10.00,1,0.00,,01/05/2019,13:08,Cash,10.00,4.76,NaN,";
        let path = write_file(&dir, "data.csv", &csv_with(&[row]));

        let ds = load_file(&path).unwrap();
        let rec = &ds.records[0];
        assert_eq!(rec.total, None);
        assert_eq!(rec.gross_income, None);
        assert_eq!(rec.rating, None);
        assert_eq!(rec.unit_price, Some(10.0));
    }

    #[test]
    fn test_bad_date_fails_whole_load() {
        let dir = tempfile::tempdir().unwrap();
        let bad = "111-11-1111,A,Yangon,Member,Female,Health and beauty,10.00,1,0.00,10.00,2019-01-05,13:08,Cash,10.00,4.76,0.5,7.0";
        let path = write_file(&dir, "data.csv", &csv_with(&[ROW_A, bad]));

        match load_file(&path) {
            Err(LoadError::InvalidDate { row, value }) => {
                assert_eq!(row, 2);
                assert_eq!(value, "2019-01-05");
            }
            other => panic!("expected InvalidDate, got {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_total_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bad = "111-11-1111,A,Yangon,Member,Female,Health and beauty,10.00,1,0.00,ten,01/05/2019,13:08,Cash,10.00,4.76,0.5,7.0";
        let path = write_file(&dir, "data.csv", &csv_with(&[bad]));

        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, LoadError::InvalidNumber { ref column, .. } if column == "Total"));
    }

    #[test]
    fn test_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "data.csv", "Invoice ID,Branch,City\n1,A,Yangon\n");

        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn(ref c) if c == "Customer type"));
    }

    #[test]
    fn test_duplicate_invoice() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "data.csv", &csv_with(&[ROW_A, ROW_A]));

        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateInvoice { row: 2, .. }));
    }

    #[test]
    fn test_missing_file_and_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_file(&dir.path().join("absent.csv")),
            Err(LoadError::Io { .. })
        ));
        let path = write_file(&dir, "data.xlsx", "");
        assert!(matches!(
            load_file(&path),
            Err(LoadError::UnsupportedFormat(ref e)) if e == "xlsx"
        ));
    }

    #[test]
    fn test_load_json_records() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"[
            {"Invoice ID": "750-67-8428", "Branch": "A", "City": "Yangon",
             "Customer type": "Member", "Gender": "Female",
             "Product line": "Health and beauty", "Unit price": 10.0,
             "Quantity": 1, "Tax 5%": 0.0, "Total": 10.0, "Date": "01/05/2019",
             "Time": "13:08", "Payment": "Cash", "cogs": 10.0,
             "gross margin percentage": 4.76, "gross income": 0.5, "Rating": null}
        ]"#;
        let path = write_file(&dir, "data.json", body);

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.records[0].quantity, Some(1.0));
        assert_eq!(ds.records[0].rating, None);
    }

    #[test]
    fn test_load_parquet_with_native_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.parquet");

        let text = |v: &str| Arc::new(StringArray::from(vec![v])) as ArrayRef;
        let num = |v: f64| Arc::new(Float64Array::from(vec![v])) as ArrayRef;
        // 2019-01-05 is day 17901 since the epoch.
        let columns: Vec<(&str, ArrayRef)> = vec![
            (INVOICE_ID, text("750-67-8428")),
            (BRANCH, text("A")),
            (CITY, text("Yangon")),
            (CUSTOMER_TYPE, text("Member")),
            (GENDER, text("Female")),
            (PRODUCT_LINE, text("Health and beauty")),
            (UNIT_PRICE, num(10.0)),
            (QUANTITY, Arc::new(Int64Array::from(vec![1]))),
            (TAX, num(0.0)),
            (TOTAL, num(10.0)),
            (DATE, Arc::new(Date32Array::from(vec![17901]))),
            (PAYMENT, text("Cash")),
            (COGS, num(10.0)),
            (GROSS_MARGIN_PCT, num(4.76)),
            (GROSS_INCOME, num(0.5)),
            (RATING, num(7.0)),
        ];
        let schema = Arc::new(Schema::new(
            columns
                .iter()
                .map(|(name, arr)| Field::new(*name, arr.data_type().clone(), true))
                .collect::<Vec<_>>(),
        ));
        let batch =
            RecordBatch::try_new(schema.clone(), columns.into_iter().map(|(_, a)| a).collect())
                .unwrap();
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.records[0].date, NaiveDate::from_ymd_opt(2019, 1, 5).unwrap());
        assert_eq!(ds.records[0].quantity, Some(1.0));
        assert_eq!(ds.records[0].rating, Some(7.0));
    }

    #[test]
    fn test_data_source_reads_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "data.csv", &csv_with(&[ROW_A, ROW_B]));
        let source = DataSource::new(&path);

        let first = source.load().unwrap();
        std::fs::remove_file(&path).unwrap();
        let second = source.load().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 2);
    }
}
