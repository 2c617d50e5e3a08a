use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow::record_batch::RecordBatch;
use arrow::temporal_conversions::{
    date32_to_datetime, timestamp_ms_to_datetime, timestamp_ns_to_datetime,
    timestamp_s_to_datetime, timestamp_us_to_datetime,
};
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::{Lazy, OnceCell};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;

use super::model::{DeliveryStatus, OrderDataset, OrderRecord};
use crate::config::DEFAULT_DATASET_PATH;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

static SHARED: Lazy<DatasetCache> = Lazy::new(|| DatasetCache::new(DEFAULT_DATASET_PATH));

/// Load the order snapshot from the fixed relative path.
///
/// Returns `Ok(None)` when the file does not exist. The outcome is read once
/// per process; later calls return the same dataset without touching disk.
pub fn load() -> Result<Option<&'static OrderDataset>> {
    SHARED.get()
}

/// One-time-initialized, read-only holder of a dataset read from `path`.
///
/// Both outcomes (present / absent) are memoized. Parse errors are not, so a
/// fixed file can be picked up by a later call.
#[derive(Debug)]
pub struct DatasetCache {
    path: PathBuf,
    cell: OnceCell<Option<OrderDataset>>,
}

impl DatasetCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cell: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Result<Option<&OrderDataset>> {
        self.cell
            .get_or_try_init(|| read_if_present(&self.path))
            .map(Option::as_ref)
    }
}

fn read_if_present(path: &Path) -> Result<Option<OrderDataset>> {
    let exists = path
        .try_exists()
        .with_context(|| format!("checking for {}", path.display()))?;
    if !exists {
        log::warn!("Dataset {} not found", path.display());
        return Ok(None);
    }

    let dataset = load_file(path)?;
    log::info!(
        "Loaded {} orders from {} ({} states, {} statuses, {} categories)",
        dataset.len(),
        path.display(),
        dataset.states.len(),
        dataset.statuses.len(),
        dataset.categories.len()
    );
    Ok(Some(dataset))
}

/// Read an order snapshot without caching. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with the order columns (primary format)
/// * `.parquet` – same column names; timestamps as Timestamp/Date32 or text
pub fn load_file(path: &Path) -> Result<OrderDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => load_csv(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// Timestamp parsing
// ---------------------------------------------------------------------------

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse the timestamp layouts pandas writes, plus bare dates (midnight).
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .with_context(|| format!("'{s}' is not a timestamp"))
}

fn parse_optional_timestamp(s: Option<&str>) -> Result<Option<NaiveDateTime>> {
    match s.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_timestamp(text).map(Some),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Columns read from the CSV. Any other header is ignored.
#[derive(Debug, Deserialize)]
struct CsvOrderRow {
    order_id: String,
    customer_state: String,
    product_category_en: Option<String>,
    delivery_status: DeliveryStatus,
    /// pandas writes `4.0` once the column has held a NaN.
    review_score: f64,
    days_difference: f64,
    order_purchase_timestamp: String,
    order_estimated_delivery_date: String,
    order_delivered_customer_date: Option<String>,
    purchase_month: Option<String>,
}

impl CsvOrderRow {
    fn into_record(self) -> Result<OrderRecord> {
        Ok(OrderRecord {
            order_purchase_timestamp: parse_timestamp(&self.order_purchase_timestamp)
                .context("order_purchase_timestamp")?,
            order_estimated_delivery_date: parse_timestamp(&self.order_estimated_delivery_date)
                .context("order_estimated_delivery_date")?,
            order_delivered_customer_date: parse_optional_timestamp(
                self.order_delivered_customer_date.as_deref(),
            )
            .context("order_delivered_customer_date")?,
            order_id: self.order_id,
            customer_state: self.customer_state,
            product_category_en: non_empty(self.product_category_en),
            delivery_status: self.delivery_status,
            review_score: review_score(self.review_score)?,
            days_difference: self.days_difference,
            purchase_month: non_empty(self.purchase_month),
        })
    }
}

/// Accept integral scores in 1..=5 whatever numeric type carried them.
fn review_score(value: f64) -> Result<u8> {
    if !(1.0..=5.0).contains(&value) || value.fract() != 0.0 {
        bail!("review_score {value} is not an integer in 1..=5");
    }
    Ok(value as u8)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn load_csv(path: &Path) -> Result<OrderDataset> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;

    let mut records = Vec::new();
    for (row_no, result) in reader.deserialize::<CsvOrderRow>().enumerate() {
        let row = result.with_context(|| format!("CSV row {row_no}"))?;
        records.push(row.into_record().with_context(|| format!("CSV row {row_no}"))?);
    }

    Ok(OrderDataset::from_records(records))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with the same column names as the CSV.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`): strings may be Utf8 or LargeUtf8,
/// numbers any integer or float width, timestamps any unit.
fn load_parquet(path: &Path) -> Result<OrderDataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let columns = ParquetColumns::locate(&batch)?;
        let offset = records.len();
        for row in 0..batch.num_rows() {
            let record = columns
                .record(row)
                .with_context(|| format!("Row {}", offset + row))?;
            records.push(record);
        }
    }

    Ok(OrderDataset::from_records(records))
}

struct ParquetColumns {
    order_id: Arc<dyn Array>,
    customer_state: Arc<dyn Array>,
    product_category_en: Arc<dyn Array>,
    delivery_status: Arc<dyn Array>,
    review_score: Arc<dyn Array>,
    days_difference: Arc<dyn Array>,
    order_purchase_timestamp: Arc<dyn Array>,
    order_estimated_delivery_date: Arc<dyn Array>,
    order_delivered_customer_date: Arc<dyn Array>,
    purchase_month: Arc<dyn Array>,
}

impl ParquetColumns {
    fn locate(batch: &RecordBatch) -> Result<Self> {
        let column = |name: &str| -> Result<Arc<dyn Array>> {
            batch
                .column_by_name(name)
                .cloned()
                .with_context(|| format!("Parquet file missing '{name}' column"))
        };
        Ok(Self {
            order_id: column("order_id")?,
            customer_state: column("customer_state")?,
            product_category_en: column("product_category_en")?,
            delivery_status: column("delivery_status")?,
            review_score: column("review_score")?,
            days_difference: column("days_difference")?,
            order_purchase_timestamp: column("order_purchase_timestamp")?,
            order_estimated_delivery_date: column("order_estimated_delivery_date")?,
            order_delivered_customer_date: column("order_delivered_customer_date")?,
            purchase_month: column("purchase_month")?,
        })
    }

    fn record(&self, row: usize) -> Result<OrderRecord> {
        let required_str = |col: &Arc<dyn Array>, name: &str| -> Result<String> {
            extract_string(col, row)?.with_context(|| format!("null '{name}'"))
        };
        let required_ts = |col: &Arc<dyn Array>, name: &str| -> Result<NaiveDateTime> {
            extract_timestamp(col, row)
                .with_context(|| format!("reading '{name}'"))?
                .with_context(|| format!("null '{name}'"))
        };

        let status: DeliveryStatus = required_str(&self.delivery_status, "delivery_status")?
            .parse()?;
        let review = extract_f64(&self.review_score, row)?.context("null 'review_score'")?;

        Ok(OrderRecord {
            order_id: required_str(&self.order_id, "order_id")?,
            customer_state: required_str(&self.customer_state, "customer_state")?,
            product_category_en: non_empty(extract_string(&self.product_category_en, row)?),
            delivery_status: status,
            review_score: review_score(review)?,
            days_difference: extract_f64(&self.days_difference, row)?
                .context("null 'days_difference'")?,
            order_purchase_timestamp: required_ts(
                &self.order_purchase_timestamp,
                "order_purchase_timestamp",
            )?,
            order_estimated_delivery_date: required_ts(
                &self.order_estimated_delivery_date,
                "order_estimated_delivery_date",
            )?,
            order_delivered_customer_date: extract_timestamp(
                &self.order_delivered_customer_date,
                row,
            )
            .context("reading 'order_delivered_customer_date'")?,
            purchase_month: non_empty(extract_string(&self.purchase_month, row)?),
        })
    }
}

// -- Arrow helpers --

fn extract_string(col: &Arc<dyn Array>, row: usize) -> Result<Option<String>> {
    if col.is_null(row) {
        return Ok(None);
    }
    let value = match col.data_type() {
        DataType::Utf8 => col.as_string::<i32>().value(row).to_string(),
        DataType::LargeUtf8 => col.as_string::<i64>().value(row).to_string(),
        other => bail!("Expected a string column, got {other:?}"),
    };
    Ok(Some(value))
}

fn extract_f64(col: &Arc<dyn Array>, row: usize) -> Result<Option<f64>> {
    if col.is_null(row) {
        return Ok(None);
    }
    let value = match col.data_type() {
        DataType::Float64 => col.as_primitive::<Float64Type>().value(row),
        DataType::Float32 => col.as_primitive::<Float32Type>().value(row) as f64,
        DataType::Int64 => col.as_primitive::<Int64Type>().value(row) as f64,
        DataType::Int32 => col.as_primitive::<Int32Type>().value(row) as f64,
        DataType::Int16 => col.as_primitive::<Int16Type>().value(row) as f64,
        DataType::Int8 => col.as_primitive::<Int8Type>().value(row) as f64,
        DataType::UInt64 => col.as_primitive::<UInt64Type>().value(row) as f64,
        DataType::UInt32 => col.as_primitive::<UInt32Type>().value(row) as f64,
        DataType::UInt16 => col.as_primitive::<UInt16Type>().value(row) as f64,
        DataType::UInt8 => col.as_primitive::<UInt8Type>().value(row) as f64,
        other => bail!("Expected a numeric column, got {other:?}"),
    };
    Ok(Some(value))
}

fn extract_timestamp(col: &Arc<dyn Array>, row: usize) -> Result<Option<NaiveDateTime>> {
    if col.is_null(row) {
        return Ok(None);
    }
    let converted = match col.data_type() {
        DataType::Timestamp(TimeUnit::Second, _) => {
            timestamp_s_to_datetime(col.as_primitive::<TimestampSecondType>().value(row))
        }
        DataType::Timestamp(TimeUnit::Millisecond, _) => {
            timestamp_ms_to_datetime(col.as_primitive::<TimestampMillisecondType>().value(row))
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            timestamp_us_to_datetime(col.as_primitive::<TimestampMicrosecondType>().value(row))
        }
        DataType::Timestamp(TimeUnit::Nanosecond, _) => {
            timestamp_ns_to_datetime(col.as_primitive::<TimestampNanosecondType>().value(row))
        }
        DataType::Date32 => {
            date32_to_datetime(col.as_primitive::<arrow::datatypes::Date32Type>().value(row))
        }
        DataType::Utf8 | DataType::LargeUtf8 => {
            return parse_optional_timestamp(extract_string(col, row)?.as_deref());
        }
        other => bail!("Expected a timestamp column, got {other:?}"),
    };
    converted.map(Some).context("timestamp out of range")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use arrow::array::{Float64Array, Int64Array, StringArray, TimestampMicrosecondArray};
    use arrow::datatypes::{Field, Schema};
    use parquet::arrow::ArrowWriter;

    use super::*;

    const HEADER: &str = "order_id,customer_state,product_category_en,delivery_status,review_score,\
days_difference,order_purchase_timestamp,order_estimated_delivery_date,\
order_delivered_customer_date,purchase_month,freight_value";

    fn write_csv(dir: &tempfile::TempDir, rows: &[&str]) -> PathBuf {
        let path = dir.path().join("orders.csv");
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text.push('\n');
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn parses_pandas_timestamp_layouts() {
        let full = parse_timestamp("2017-10-02 10:56:33").unwrap();
        assert_eq!(full.to_string(), "2017-10-02 10:56:33");
        let iso = parse_timestamp("2017-10-02T10:56:33.250").unwrap();
        assert_eq!(iso.format("%H:%M:%S").to_string(), "10:56:33");
        let date = parse_timestamp("2017-10-18").unwrap();
        assert_eq!(date.to_string(), "2017-10-18 00:00:00");
        assert!(parse_timestamp("18/10/2017").is_err());
    }

    #[test]
    fn csv_rows_become_typed_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            &[
                "a1,SP,toys,On Time,5,-7.0,2017-10-02 10:56:33,2017-10-18 00:00:00,2017-10-10 21:25:13,2017-10,8.72",
                "a2,RJ,,Super Late,1,12.5,2018-07-24 20:41:37,2018-08-13 00:00:00,,2018-07,22.76",
            ],
        );

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 2);

        let first = &ds.records[0];
        assert_eq!(first.order_id, "a1");
        assert_eq!(first.product_category_en.as_deref(), Some("toys"));
        assert_eq!(first.delivery_status, DeliveryStatus::OnTime);
        assert_eq!(first.review_score, 5);
        assert!(first.order_delivered_customer_date.is_some());

        let second = &ds.records[1];
        assert_eq!(second.product_category_en, None);
        assert_eq!(second.delivery_status, DeliveryStatus::SuperLate);
        assert_eq!(second.days_difference, 12.5);
        assert_eq!(second.order_delivered_customer_date, None);
        assert_eq!(second.purchase_month.as_deref(), Some("2018-07"));
    }

    #[test]
    fn csv_integral_float_review_score_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            &["a1,SP,toys,Late,4.0,2.0,2017-10-02 10:56:33,2017-10-18,2017-10-20,2017-10,1.0"],
        );
        let ds = load_file(&path).unwrap();
        assert_eq!(ds.records[0].review_score, 4);
    }

    #[test]
    fn csv_fractional_or_out_of_range_review_score_fails() {
        for score in ["4.5", "0", "6.0"] {
            let dir = tempfile::tempdir().unwrap();
            let row = format!(
                "a1,SP,toys,Late,{score},2.0,2017-10-02 10:56:33,2017-10-18,2017-10-20,2017-10,1.0"
            );
            let path = write_csv(&dir, &[row.as_str()]);
            let err = load_file(&path).unwrap_err();
            assert!(format!("{err:#}").contains("review_score"), "{score}: {err:#}");
        }
    }

    #[test]
    fn shared_loader_reads_the_fixed_path() {
        assert_eq!(SHARED.path(), Path::new(DEFAULT_DATASET_PATH));
    }

    #[test]
    fn unknown_status_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            &["a1,SP,toys,Early,5,-7.0,2017-10-02 10:56:33,2017-10-18,2017-10-10,2017-10,1.0"],
        );
        let err = load_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("CSV row 0"));
    }

    #[test]
    fn bad_timestamp_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            &["a1,SP,toys,Late,3,2.0,yesterday,2017-10-18,2017-10-20,2017-10,1.0"],
        );
        let err = load_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("order_purchase_timestamp"));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = load_file(Path::new("orders.xlsx")).unwrap_err();
        assert!(err.to_string().contains(".xlsx"));
    }

    #[test]
    fn missing_file_is_absent_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::new(dir.path().join("nope.csv"));
        assert!(cache.get().unwrap().is_none());
    }

    #[test]
    fn cache_reads_storage_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            &["a1,SP,toys,Late,3,2.0,2017-10-02 10:56:33,2017-10-18,2017-10-20,2017-10,1.0"],
        );
        let cache = DatasetCache::new(&path);
        let first = cache.get().unwrap().unwrap() as *const OrderDataset;

        fs::remove_file(&path).unwrap();
        let second = cache.get().unwrap().expect("memoized dataset") as *const OrderDataset;
        assert_eq!(first, second);
    }

    #[test]
    fn absent_outcome_is_memoized_too() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.csv");
        let cache = DatasetCache::new(&path);
        assert!(cache.get().unwrap().is_none());

        write_csv(&dir, &[]);
        fs::rename(dir.path().join("orders.csv"), &path).unwrap();
        assert!(cache.get().unwrap().is_none());
    }

    #[test]
    fn parquet_file_loads_like_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.parquet");

        let ts = |s: &str| parse_timestamp(s).unwrap().and_utc().timestamp_micros();
        let schema = Arc::new(Schema::new(vec![
            Field::new("order_id", DataType::Utf8, false),
            Field::new("customer_state", DataType::Utf8, false),
            Field::new("product_category_en", DataType::Utf8, true),
            Field::new("delivery_status", DataType::Utf8, false),
            Field::new("review_score", DataType::Int64, false),
            Field::new("days_difference", DataType::Float64, false),
            Field::new(
                "order_purchase_timestamp",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            ),
            Field::new("order_estimated_delivery_date", DataType::Utf8, false),
            Field::new(
                "order_delivered_customer_date",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                true,
            ),
            Field::new("purchase_month", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["p1", "p2"])),
                Arc::new(StringArray::from(vec!["MG", "BA"])),
                Arc::new(StringArray::from(vec![Some("garden_tools"), None])),
                Arc::new(StringArray::from(vec!["Late", "On Time"])),
                Arc::new(Int64Array::from(vec![2, 4])),
                Arc::new(Float64Array::from(vec![3.0, -9.0])),
                Arc::new(TimestampMicrosecondArray::from(vec![
                    ts("2018-01-05 09:00:00"),
                    ts("2018-02-11 17:30:00"),
                ])),
                Arc::new(StringArray::from(vec!["2018-01-20 00:00:00", "2018-03-01"])),
                Arc::new(TimestampMicrosecondArray::from(vec![
                    Some(ts("2018-01-23 12:00:00")),
                    None,
                ])),
                Arc::new(StringArray::from(vec![Some("2018-01"), Some("2018-02")])),
            ],
        )
        .unwrap();

        let file = fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].delivery_status, DeliveryStatus::Late);
        assert_eq!(ds.records[0].review_score, 2);
        assert_eq!(
            ds.records[0].order_purchase_timestamp.to_string(),
            "2018-01-05 09:00:00"
        );
        assert_eq!(ds.records[1].product_category_en, None);
        assert_eq!(ds.records[1].order_delivered_customer_date, None);
        assert_eq!(
            ds.records[1].order_estimated_delivery_date.to_string(),
            "2018-03-01 00:00:00"
        );
        assert_eq!(ds.categories.iter().collect::<Vec<_>>(), ["garden_tools"]);
    }
}
