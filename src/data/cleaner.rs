//! Data Cleaner Module
//! Normalizes the raw accident dataset: deduplication, column drops,
//! sentinel replacement and fatality parsing.

use polars::prelude::*;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

use super::loader::{self, LoaderError};

/// Sentinel used in the raw `year` column for unknown years.
pub const UNKNOWN_YEAR: &str = "unknown";
/// Sentinels used in the raw `country` column.
pub const UNKNOWN_COUNTRY: [&str; 2] = ["?", "Unknown country"];
/// Literal carried by the raw `date` column when only the year is known.
pub const DATE_UNKNOWN: &str = "date unk.";

#[derive(Error, Debug)]
pub enum CleanerError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error("Failed to write cleaned CSV: {0}")]
    Io(#[from] std::io::Error),
}

/// One accident record after cleaning. Every field that can be unknown
/// carries an explicit `Option`; no sentinel string survives cleaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedRecord {
    /// Retained only when some record's date is the sole evidence of its
    /// year (see the conditional date drop).
    pub date: Option<String>,
    pub year: Option<i32>,
    pub aircraft_type: Option<String>,
    pub country: Option<String>,
    pub fatalities: Option<i64>,
    /// Raw taxonomy code (`A1`, `H2`, `U1`, ...). Category collapsing
    /// happens per-analysis in the aggregator, never here.
    pub category: Option<String>,
}

/// Result of a cleaning run.
pub struct CleanedData {
    pub records: Vec<CleanedRecord>,
    /// Whether the `date` column was retained dataset-wide.
    pub keep_date: bool,
    /// Exact duplicate rows removed in step 1.
    pub duplicates_removed: usize,
}

/// Transforms the raw record set into the normalized one.
///
/// Six ordered steps, each total: deduplicate, drop unused columns,
/// conditionally drop `date`, normalize `year`, normalize `country`,
/// parse `fatalities`. Malformed fields degrade to absent; only a
/// structurally broken input fails.
pub struct Cleaner;

impl Cleaner {
    pub fn clean(df: &DataFrame) -> Result<CleanedData, CleanerError> {
        let date = loader::utf8_column(df, "date")?;
        let aircraft_type = loader::utf8_column(df, "type")?;
        let registration = loader::utf8_column(df, "registration")?;
        let operator = loader::utf8_column(df, "operator")?;
        let fatalities = loader::utf8_column(df, "fatalities")?;
        let location = loader::utf8_column(df, "location")?;
        let country = loader::utf8_column(df, "country")?;
        let category = loader::utf8_column(df, "cat")?;
        let year = loader::utf8_column(df, "year")?;

        // Step 1: drop exact duplicates, first occurrence wins, order stable.
        // Equality is over the full raw row, including columns dropped below.
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let row = (
                &date[i],
                &aircraft_type[i],
                &registration[i],
                &operator[i],
                &fatalities[i],
                &location[i],
                &country[i],
                &category[i],
                &year[i],
            );
            if seen.insert(row) {
                kept.push(i);
            }
        }
        let duplicates_removed = df.height() - kept.len();

        // Step 2 (drop location/registration/operator) happens implicitly:
        // those columns are never carried into the normalized records.

        // Step 3: keep `date` only if some record's date is the sole
        // evidence of its year. Checked once for the whole dataset,
        // all-or-nothing; the raw `year` cell is judged before sentinel
        // normalization, so a literal "unknown" still counts as present.
        let keep_date = kept
            .iter()
            .any(|&i| year[i].is_none() && date[i].as_deref() != Some(DATE_UNKNOWN));

        // Steps 4-6: per-field normalization.
        let records = kept
            .iter()
            .map(|&i| CleanedRecord {
                date: if keep_date { date[i].clone() } else { None },
                year: year[i].as_deref().and_then(Self::parse_year),
                aircraft_type: aircraft_type[i].clone(),
                country: country[i].clone().and_then(Self::normalize_country),
                fatalities: fatalities[i].as_deref().and_then(Self::parse_fatalities),
                category: category[i].clone(),
            })
            .collect();

        Ok(CleanedData {
            records,
            keep_date,
            duplicates_removed,
        })
    }

    /// Step 4: the `"unknown"` sentinel becomes absent; anything else is
    /// parsed, with parse failure degrading to absent.
    pub fn parse_year(raw: &str) -> Option<i32> {
        if raw == UNKNOWN_YEAR {
            return None;
        }
        raw.trim().parse().ok()
    }

    /// Step 5: `"?"` and `"Unknown country"` become absent.
    pub fn normalize_country(raw: String) -> Option<String> {
        if UNKNOWN_COUNTRY.contains(&raw.as_str()) {
            None
        } else {
            Some(raw)
        }
    }

    /// Step 6: split on `+` and sum. Every part must be a valid
    /// non-negative integer, otherwise the whole field is absent:
    /// `"1+2"` -> 3, `"5"` -> 5, `""` and `"1+x"` -> absent.
    pub fn parse_fatalities(raw: &str) -> Option<i64> {
        if raw.trim().is_empty() {
            return None;
        }
        let mut total: i64 = 0;
        for part in raw.split('+') {
            let n: i64 = part.trim().parse().ok()?;
            if n < 0 {
                return None;
            }
            total = total.checked_add(n)?;
        }
        Some(total)
    }

    /// Materialize the normalized records as a DataFrame, in the raw
    /// column order minus the dropped columns.
    pub fn to_dataframe(data: &CleanedData) -> Result<DataFrame, CleanerError> {
        let records = &data.records;
        let mut columns = Vec::with_capacity(6);
        if data.keep_date {
            let dates: Vec<Option<String>> = records.iter().map(|r| r.date.clone()).collect();
            columns.push(Column::new("date".into(), dates));
        }
        let types: Vec<Option<String>> = records.iter().map(|r| r.aircraft_type.clone()).collect();
        let fatalities: Vec<Option<i64>> = records.iter().map(|r| r.fatalities).collect();
        let countries: Vec<Option<String>> = records.iter().map(|r| r.country.clone()).collect();
        let categories: Vec<Option<String>> = records.iter().map(|r| r.category.clone()).collect();
        let years: Vec<Option<i32>> = records.iter().map(|r| r.year).collect();

        columns.push(Column::new("type".into(), types));
        columns.push(Column::new("fatalities".into(), fatalities));
        columns.push(Column::new("country".into(), countries));
        columns.push(Column::new("cat".into(), categories));
        columns.push(Column::new("year".into(), years));

        Ok(DataFrame::new(columns)?)
    }

    /// Write the normalized set as CSV. Rows stay in original order minus
    /// removed duplicates, so the output is reproducible byte for byte.
    pub fn write_csv(data: &CleanedData, path: &Path) -> Result<(), CleanerError> {
        let mut df = Self::to_dataframe(data)?;
        let mut file = std::fs::File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)?;
        Ok(())
    }

    /// Head preview for operator sanity-checking; not part of the data
    /// contract.
    pub fn preview(records: &[CleanedRecord], n: usize) -> String {
        let mut out = String::from("year  fatalities  cat  country\n");
        for r in records.iter().take(n) {
            let _ = writeln!(
                out,
                "{:<5} {:<11} {:<4} {}",
                opt(&r.year.map(|y| y.to_string())),
                opt(&r.fatalities.map(|f| f.to_string())),
                opt(&r.category),
                opt(&r.country),
            );
        }
        out
    }
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_df(rows: &[[Option<&str>; 9]]) -> DataFrame {
        let col = |idx: usize| -> Vec<Option<String>> {
            rows.iter()
                .map(|row| row[idx].map(str::to_string))
                .collect()
        };
        DataFrame::new(vec![
            Column::new("date".into(), col(0)),
            Column::new("type".into(), col(1)),
            Column::new("registration".into(), col(2)),
            Column::new("operator".into(), col(3)),
            Column::new("fatalities".into(), col(4)),
            Column::new("location".into(), col(5)),
            Column::new("country".into(), col(6)),
            Column::new("cat".into(), col(7)),
            Column::new("year".into(), col(8)),
        ])
        .unwrap()
    }

    fn row<'a>(
        date: Option<&'a str>,
        fatalities: Option<&'a str>,
        country: Option<&'a str>,
        cat: Option<&'a str>,
        year: Option<&'a str>,
    ) -> [Option<&'a str>; 9] {
        [
            date,
            Some("Douglas C-47"),
            Some("N123"),
            Some("USAAF"),
            fatalities,
            Some("near field"),
            country,
            cat,
            year,
        ]
    }

    #[test]
    fn exact_duplicates_collapse_to_one() {
        let r = row(Some("4-APR-1944"), Some("3"), Some("UK"), Some("A1"), Some("1944"));
        let df = raw_df(&[r, r, row(None, Some("1"), Some("UK"), Some("A1"), Some("1944"))]);
        let cleaned = Cleaner::clean(&df).unwrap();
        assert_eq!(cleaned.records.len(), 2);
        assert_eq!(cleaned.duplicates_removed, 1);
    }

    #[test]
    fn near_duplicates_are_kept() {
        let a = row(Some("4-APR-1944"), Some("3"), Some("UK"), Some("A1"), Some("1944"));
        let b = row(Some("4-APR-1944"), Some("4"), Some("UK"), Some("A1"), Some("1944"));
        let cleaned = Cleaner::clean(&raw_df(&[a, b])).unwrap();
        assert_eq!(cleaned.records.len(), 2);
        assert_eq!(cleaned.duplicates_removed, 0);
    }

    #[test]
    fn date_dropped_when_year_always_covers_it() {
        let df = raw_df(&[
            row(Some("4-APR-1944"), None, None, None, Some("1944")),
            // year missing but date is the "date unk." literal: still droppable
            row(Some(DATE_UNKNOWN), None, None, None, None),
        ]);
        let cleaned = Cleaner::clean(&df).unwrap();
        assert!(!cleaned.keep_date);
        assert!(cleaned.records.iter().all(|r| r.date.is_none()));
    }

    #[test]
    fn date_kept_for_all_records_when_any_date_carries_year_evidence() {
        let df = raw_df(&[
            row(Some("4-APR-1944"), None, None, None, Some("1944")),
            // year absent and a real date: date is the only evidence
            row(Some("12-MAY-1951"), None, None, None, None),
        ]);
        let cleaned = Cleaner::clean(&df).unwrap();
        assert!(cleaned.keep_date);
        assert_eq!(cleaned.records[0].date.as_deref(), Some("4-APR-1944"));
        assert_eq!(cleaned.records[1].date.as_deref(), Some("12-MAY-1951"));
    }

    #[test]
    fn unknown_year_literal_counts_as_present_for_date_drop() {
        // The date-drop precondition is checked on raw values, before the
        // "unknown" sentinel is normalized away.
        let df = raw_df(&[row(Some("date in 1923"), None, None, None, Some(UNKNOWN_YEAR))]);
        let cleaned = Cleaner::clean(&df).unwrap();
        assert!(!cleaned.keep_date);
        assert_eq!(cleaned.records[0].year, None);
    }

    #[test]
    fn year_sentinel_and_garbage_become_absent() {
        assert_eq!(Cleaner::parse_year(UNKNOWN_YEAR), None);
        assert_eq!(Cleaner::parse_year("1944"), Some(1944));
        assert_eq!(Cleaner::parse_year(" 2001 "), Some(2001));
        assert_eq!(Cleaner::parse_year("194x"), None);
    }

    #[test]
    fn country_sentinels_become_absent() {
        assert_eq!(Cleaner::normalize_country("?".into()), None);
        assert_eq!(Cleaner::normalize_country("Unknown country".into()), None);
        assert_eq!(
            Cleaner::normalize_country("Brazil".into()).as_deref(),
            Some("Brazil")
        );
    }

    #[test]
    fn fatalities_parsing() {
        assert_eq!(Cleaner::parse_fatalities("1+2"), Some(3));
        assert_eq!(Cleaner::parse_fatalities("5"), Some(5));
        assert_eq!(Cleaner::parse_fatalities("0"), Some(0));
        assert_eq!(Cleaner::parse_fatalities("10+0+7"), Some(17));
        assert_eq!(Cleaner::parse_fatalities(""), None);
        assert_eq!(Cleaner::parse_fatalities("  "), None);
        // any invalid part poisons the whole field, never a partial sum
        assert_eq!(Cleaner::parse_fatalities("1+x"), None);
        assert_eq!(Cleaner::parse_fatalities("-3"), None);
        assert_eq!(Cleaner::parse_fatalities("1+-2"), None);
        // a sum that would overflow degrades to absent, it never wraps
        let huge = format!("{}+{}", i64::MAX, 1);
        assert_eq!(Cleaner::parse_fatalities(&huge), None);
    }

    #[test]
    fn cleaning_is_idempotent_through_the_csv_contract() {
        let df = raw_df(&[
            row(Some(DATE_UNKNOWN), Some("1+2"), Some("?"), Some("H1"), None),
            row(Some("1-JAN-1970"), Some("x"), Some("France"), Some("O2"), Some("1970")),
            row(Some("2-FEB-1980"), None, Some("Unknown country"), None, Some(UNKNOWN_YEAR)),
        ]);
        let cleaned = Cleaner::clean(&df).unwrap();
        assert_eq!(cleaned.records[0].fatalities, Some(3));
        assert_eq!(cleaned.records[0].country, None);
        assert_eq!(cleaned.records[1].fatalities, None);
        assert_eq!(cleaned.records[2].year, None);

        // Re-reading the materialized output yields the same records.
        let out = Cleaner::to_dataframe(&cleaned).unwrap();
        let reloaded = loader::records_from_cleaned(&out).unwrap();
        assert_eq!(reloaded, cleaned.records);
    }

    #[test]
    fn preview_shows_head_only() {
        let df = raw_df(&[
            row(None, Some("3"), Some("UK"), Some("A1"), Some("1944")),
            row(None, Some("4"), Some("UK"), Some("A1"), Some("1945")),
        ]);
        let cleaned = Cleaner::clean(&df).unwrap();
        let text = Cleaner::preview(&cleaned.records, 1);
        assert!(text.contains("1944"));
        assert!(!text.contains("1945"));
    }
}
