use std::path::Path;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit, TimestampMillisecondType};
use calamine::{Data, Reader, open_workbook_auto};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, SignalTable};

/// Extensions accepted by [`load_file`], for the open dialog.
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["xlsx", "xlsm", "xls", "ods", "csv", "json", "parquet", "pq"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a signal table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.xlsx` / `.xlsm` / `.xls` / `.ods` – first worksheet, header in row 1
/// * `.csv`     – header row, cell types guessed per cell
/// * `.json`    – `[{ "col": value, ... }, ...]`
/// * `.parquet` – any flat schema of strings, numbers, bools, dates
pub fn load_file(path: &Path) -> Result<SignalTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "xlsx" | "xlsm" | "xls" | "ods" => load_workbook(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        "csv" => load_csv(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    if table.column_names.is_empty() {
        bail!("{} contains no columns", path.display());
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

/// Reads the first worksheet. Row 1 holds the column names; empty header
/// cells are named `column_N` (1-based).
fn load_workbook(path: &Path) -> Result<SignalTable> {
    let mut workbook = open_workbook_auto(path).context("opening workbook")?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("workbook has no worksheets")?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("reading worksheet '{sheet}'"))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(SignalTable::from_rows(Vec::new(), Vec::new()));
    };
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| header_name(i, cell))
        .collect();

    let data: Vec<Vec<CellValue>> = rows
        .filter(|r| r.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|r| r.iter().map(spreadsheet_cell).collect())
        .collect();

    Ok(SignalTable::from_rows(columns, data))
}

/// Name of header cell `i` (0-based); blank headers become `column_N`.
fn header_name(i: usize, cell: &Data) -> String {
    match spreadsheet_cell(cell) {
        CellValue::Null => format!("column_{}", i + 1),
        other => other.to_string(),
    }
}

fn spreadsheet_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) if s.trim().is_empty() => CellValue::Null,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Float(dt.as_f64())),
        Data::DateTimeIso(s) => parse_datetime(s)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) | Data::Empty => CellValue::Null,
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Date": "2024-01-02", "Symbol": "ES", "R": 1.5 },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<SignalTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut columns: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(|rec| rec.as_object())
        .map(|obj| {
            columns
                .iter()
                .map(|col| obj.get(col).map(json_to_cell).unwrap_or(CellValue::Null))
                .collect()
        })
        .collect();

    Ok(SignalTable::from_rows(columns, rows))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => parse_datetime(s)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one signal per record.
fn load_csv(path: &Path) -> Result<SignalTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(record.iter().map(guess_cell_type).collect());
    }

    Ok(SignalTable::from_rows(headers, rows))
}

fn guess_cell_type(s: &str) -> CellValue {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return CellValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    if s == "true" || s == "false" {
        return CellValue::Bool(s == "true");
    }
    if let Some(dt) = parse_datetime(s) {
        return CellValue::DateTime(dt);
    }
    CellValue::Text(s.to_string())
}

/// ISO-8601 date or datetime, with or without the `T` separator.
fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    let s = s.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with a flat schema.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<SignalTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows: Vec<Vec<CellValue>> = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let n_rows = batch.num_rows();

        let cells_by_column: Vec<Vec<CellValue>> = batch
            .columns()
            .iter()
            .zip(&columns)
            .map(|(col, name)| {
                arrow_column_cells(col)
                    .with_context(|| format!("reading parquet column '{name}'"))
            })
            .collect::<Result<_>>()?;

        for row in 0..n_rows {
            rows.push(cells_by_column.iter().map(|c| c[row].clone()).collect());
        }
    }

    Ok(SignalTable::from_rows(columns, rows))
}

// -- Parquet / Arrow helpers --

/// Convert one Arrow column into cells, normalising through `cast`.
fn arrow_column_cells(col: &ArrayRef) -> Result<Vec<CellValue>> {
    let len = col.len();
    let cells = match col.data_type() {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => {
            let ints = cast(col.as_ref(), &DataType::Int64)?;
            let ints = ints.as_primitive::<Int64Type>();
            (0..len)
                .map(|i| {
                    if ints.is_null(i) {
                        CellValue::Null
                    } else {
                        CellValue::Integer(ints.value(i))
                    }
                })
                .collect()
        }
        DataType::Float16 | DataType::Float32 | DataType::Float64 | DataType::Decimal128(_, _) => {
            let floats = cast(col.as_ref(), &DataType::Float64)?;
            let floats = floats.as_primitive::<Float64Type>();
            (0..len)
                .map(|i| {
                    if floats.is_null(i) {
                        CellValue::Null
                    } else {
                        CellValue::Float(floats.value(i))
                    }
                })
                .collect()
        }
        DataType::Boolean => {
            let bools = col.as_boolean();
            (0..len)
                .map(|i| {
                    if bools.is_null(i) {
                        CellValue::Null
                    } else {
                        CellValue::Bool(bools.value(i))
                    }
                })
                .collect()
        }
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
            let stamps = cast(
                col.as_ref(),
                &DataType::Timestamp(TimeUnit::Millisecond, None),
            )?;
            let stamps = stamps.as_primitive::<TimestampMillisecondType>();
            (0..len)
                .map(|i| {
                    if stamps.is_null(i) {
                        return CellValue::Null;
                    }
                    DateTime::from_timestamp_millis(stamps.value(i))
                        .map(|dt| CellValue::DateTime(dt.naive_utc()))
                        .unwrap_or(CellValue::Null)
                })
                .collect()
        }
        _ => {
            let text = cast(col.as_ref(), &DataType::Utf8)?;
            let text = text.as_string::<i32>();
            (0..len)
                .map(|i| {
                    if text.is_null(i) {
                        CellValue::Null
                    } else {
                        CellValue::Text(text.value(i).to_string())
                    }
                })
                .collect()
        }
    };
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use arrow::array::{Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    use super::*;
    use crate::data::model::ColumnKind;

    fn write_temp(ext: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(ext)
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn spreadsheet_cells_map_to_cell_values() {
        use calamine::{ExcelDateTime, ExcelDateTimeType};

        let noon = ExcelDateTime::new(45292.5, ExcelDateTimeType::DateTime, false);
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(spreadsheet_cell(&Data::DateTime(noon)), CellValue::DateTime(expected));
        assert_eq!(spreadsheet_cell(&Data::Float(1.25)), CellValue::Float(1.25));
        assert_eq!(spreadsheet_cell(&Data::Int(3)), CellValue::Integer(3));
        assert_eq!(spreadsheet_cell(&Data::String("  ".into())), CellValue::Null);
        assert_eq!(spreadsheet_cell(&Data::String("ES".into())), CellValue::Text("ES".into()));
        assert_eq!(spreadsheet_cell(&Data::Empty), CellValue::Null);
    }

    #[test]
    fn blank_spreadsheet_headers_are_numbered() {
        assert_eq!(header_name(0, &Data::String("R".into())), "R");
        assert_eq!(header_name(1, &Data::Empty), "column_2");
        assert_eq!(header_name(4, &Data::String(" ".into())), "column_5");
    }

    #[test]
    fn csv_cells_are_typed_per_column() {
        let file = write_temp(
            ".csv",
            "Date,Symbol,R,Won\n2024-01-02,ES,1.5,true\n2024-01-03,NQ,-1,false\n2024-01-04,ES,,true\n",
        );
        let table = load_file(file.path()).unwrap();
        assert_eq!(table.column_names, vec!["Date", "Symbol", "R", "Won"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.kind("Date"), Some(ColumnKind::DateTime));
        assert_eq!(table.kind("Symbol"), Some(ColumnKind::Categorical));
        assert_eq!(table.kind("R"), Some(ColumnKind::Numeric));
        assert_eq!(table.rows[2][2], CellValue::Null);
    }

    #[test]
    fn json_keeps_first_appearance_column_order() {
        let file = write_temp(
            ".json",
            r#"[{"Symbol": "ES", "R": 2}, {"R": -0.5, "Symbol": "NQ", "Note": null}]"#,
        );
        let table = load_file(file.path()).unwrap();
        assert_eq!(table.column_names, vec!["Symbol", "R", "Note"]);
        assert_eq!(table.rows[0][2], CellValue::Null);
        assert_eq!(table.numeric_range("R"), Some((-0.5, 2.0)));
    }

    #[test]
    fn parquet_columns_are_converted() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("Symbol", DataType::Utf8, false),
            Field::new("Bars", DataType::Int32, true),
            Field::new("R", DataType::Float64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["ES", "NQ"])),
                Arc::new(Int32Array::from(vec![Some(4), None])),
                Arc::new(Float64Array::from(vec![1.25, -1.0])),
            ],
        )
        .unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_file(file.path()).unwrap();
        assert_eq!(table.column_names, vec!["Symbol", "Bars", "R"]);
        assert_eq!(table.rows[0][1], CellValue::Integer(4));
        assert_eq!(table.rows[1][1], CellValue::Null);
        assert_eq!(table.rows[1][2], CellValue::Float(-1.0));
        assert_eq!(table.kind("Symbol"), Some(ColumnKind::Categorical));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = write_temp(".txt", "a,b\n1,2\n");
        let err = load_file(file.path()).unwrap_err();
        assert!(err.to_string().contains(".txt"));
    }

    #[test]
    fn datetime_strings_parse_with_and_without_time() {
        assert!(parse_datetime("2024-03-01").is_some());
        assert!(parse_datetime("2024-03-01 09:30:00").is_some());
        assert!(parse_datetime("2024-03-01T09:30:00").is_some());
        assert!(parse_datetime("ES").is_none());
    }
}
