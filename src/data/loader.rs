//! CSV Data Loader Module
//! Handles loading of the raw and cleaned accident datasets using Polars.

use polars::prelude::*;
use std::path::Path;
use thiserror::Error;

use super::cleaner::CleanedRecord;

/// Columns the raw export must carry. Anything else is ignored.
pub const RAW_COLUMNS: [&str; 9] = [
    "date",
    "type",
    "registration",
    "operator",
    "fatalities",
    "location",
    "country",
    "cat",
    "year",
];

/// Columns the cleaned dataset must carry (`date` is optional, see the
/// conditional date drop in the cleaner).
pub const CLEANED_COLUMNS: [&str; 5] = ["type", "fatalities", "country", "cat", "year"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to read CSV: {0}")]
    Csv(#[from] PolarsError),
    #[error("Input is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Load the raw accident CSV.
///
/// Every column is read as a string; the cleaner does all parsing
/// explicitly so that sentinel values like `"unknown"` or compound
/// fatality counts like `"1+2"` never get mangled by schema inference.
pub fn load_raw_csv(path: &Path) -> Result<DataFrame, LoaderError> {
    let df = read_all_utf8(path)?;
    check_columns(&df, &RAW_COLUMNS)?;
    Ok(df)
}

/// Load a cleaned dataset back into normalized records.
///
/// The cleaner finishes and closes its output before this runs; the
/// aggregator never shares a handle with it.
pub fn load_cleaned_csv(path: &Path) -> Result<Vec<CleanedRecord>, LoaderError> {
    let df = read_all_utf8(path)?;
    check_columns(&df, &CLEANED_COLUMNS)?;
    records_from_cleaned(&df)
}

fn read_all_utf8(path: &Path) -> Result<DataFrame, LoaderError> {
    // infer_schema_length(0) keeps every column Utf8
    let df = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(0))
        .with_ignore_errors(true)
        .finish()?
        .collect()?;
    Ok(df)
}

fn check_columns(df: &DataFrame, required: &[&str]) -> Result<(), LoaderError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| df.column(name).is_err())
        .map(|name| (*name).to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LoaderError::MissingColumns(missing))
    }
}

/// Extract a string column as owned optional values.
pub(crate) fn utf8_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, LoaderError> {
    let col = df.column(name)?.str()?;
    Ok(col.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Rebuild normalized records from a cleaned DataFrame. All fields were
/// written by the cleaner, so any value that fails to parse here simply
/// stays absent.
pub(crate) fn records_from_cleaned(df: &DataFrame) -> Result<Vec<CleanedRecord>, LoaderError> {
    let height = df.height();
    let date = if df.column("date").is_ok() {
        Some(utf8_column(df, "date")?)
    } else {
        None
    };
    let aircraft_type = utf8_column(df, "type")?;
    let fatalities = utf8_column(df, "fatalities")?;
    let country = utf8_column(df, "country")?;
    let category = utf8_column(df, "cat")?;
    let year = utf8_column(df, "year")?;

    let mut records = Vec::with_capacity(height);
    for i in 0..height {
        records.push(CleanedRecord {
            date: date.as_ref().and_then(|col| col[i].clone()),
            year: year[i].as_deref().and_then(|s| s.trim().parse().ok()),
            aircraft_type: aircraft_type[i].clone(),
            country: country[i].clone(),
            fatalities: fatalities[i].as_deref().and_then(|s| s.trim().parse().ok()),
            category: category[i].clone(),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_is_structural_error() {
        let df = df!("date" => ["4-APR-1919"], "year" => ["1919"]).unwrap();
        let err = check_columns(&df, &RAW_COLUMNS).unwrap_err();
        match err {
            LoaderError::MissingColumns(cols) => {
                assert!(cols.contains(&"fatalities".to_string()));
                assert!(!cols.contains(&"year".to_string()));
            }
            other => panic!("expected MissingColumns, got {other}"),
        }
    }

    #[test]
    fn cleaned_records_parse_numeric_fields() {
        let df = df!(
            "type" => [Some("Zeppelin L-59"), None],
            "fatalities" => [Some("23"), None],
            "country" => [Some("Germany"), None],
            "cat" => [Some("A1"), Some("U1")],
            "year" => [Some("1917"), None],
        )
        .unwrap();

        let records = records_from_cleaned(&df).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].year, Some(1917));
        assert_eq!(records[0].fatalities, Some(23));
        assert_eq!(records[0].date, None);
        assert_eq!(records[1].year, None);
        assert_eq!(records[1].fatalities, None);
        assert_eq!(records[1].category.as_deref(), Some("U1"));
    }
}
