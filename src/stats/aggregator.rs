//! Aggregator Module
//! Derives the per-year / per-decade tables every chart consumes:
//! counts, fatality sums, category shares, severity scores and OLS
//! trend lines.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::data::CleanedRecord;

/// Collapse map from raw taxonomy codes to parent categories. Pure data;
/// codes without an entry pass through unchanged.
pub const CATEGORY_COLLAPSE: [(&str, &str); 11] = [
    ("A1", "A"),
    ("A2", "A"),
    ("O1", "O"),
    ("O2", "O"),
    ("H1", "H"),
    ("H2", "H"),
    ("C1", "C"),
    ("C2", "C"),
    ("I1", "I"),
    ("I2", "I"),
    ("U1", "U"),
];

/// Parent categories in chart stacking order.
pub const PARENT_CATEGORIES: [&str; 6] = ["A", "O", "H", "C", "I", "U"];

/// First year of the unlawful-interference analysis window.
pub const HIJACK_ERA_START: i32 = 1980;

/// Year range of the wartime aircraft-type breakdown.
pub const WARTIME_YEARS: (i32, i32) = (1939, 1945);

/// Group key -> collapsed category -> percentage of the group's records.
pub type ShareTable = BTreeMap<i32, BTreeMap<String, f64>>;

/// Ordinary least-squares line `value = slope * year + intercept`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
}

impl TrendLine {
    pub fn predict(&self, year: i32) -> f64 {
        self.slope * f64::from(year) + self.intercept
    }
}

/// Per-year share of category H among accidents and among fatalities,
/// restricted to years >= [`HIJACK_ERA_START`].
#[derive(Debug, Default, Serialize)]
pub struct HijackShare {
    pub accident_share: BTreeMap<i32, f64>,
    pub fatality_share: BTreeMap<i32, f64>,
}

/// Trend fits over the configured year range. `None` means fewer than
/// two valid points fell in the range; reported, never fitted.
#[derive(Debug, Serialize)]
pub struct TrendReport {
    pub from: i32,
    pub to: i32,
    pub accidents: Option<TrendLine>,
    pub fatalities: Option<TrendLine>,
    pub severity: Option<TrendLine>,
}

/// Every derived table, recomputed in full on each run.
#[derive(Debug, Serialize)]
pub struct AggregateReport {
    pub accidents_per_year: BTreeMap<i32, u32>,
    pub fatalities_per_year: BTreeMap<i32, i64>,
    pub severity_score: BTreeMap<i32, f64>,
    pub category_share_per_year: ShareTable,
    pub category_share_per_decade: ShareTable,
    pub hijack: HijackShare,
    pub top_accident_years: Vec<(i32, u32)>,
    pub top_fatality_years: Vec<(i32, i64)>,
    /// Aircraft-type shares over the 1939-1945 window.
    pub wartime_aircraft: Vec<(String, f64)>,
    /// Year with the most accidents, and where they happened.
    pub peak_year: Option<i32>,
    pub peak_year_countries: Vec<(String, f64)>,
    pub trends: TrendReport,
}

/// Metric a trend can be fitted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Accidents,
    Fatalities,
    Severity,
}

impl Metric {
    pub fn label(self) -> &'static str {
        match self {
            Metric::Accidents => "Accidents",
            Metric::Fatalities => "Fatalities",
            Metric::Severity => "Severity score",
        }
    }

    /// The per-year series this metric is fitted against.
    pub fn series(self, report: &AggregateReport) -> BTreeMap<i32, f64> {
        match self {
            Metric::Accidents => counts_f64(&report.accidents_per_year),
            Metric::Fatalities => sums_f64(&report.fatalities_per_year),
            Metric::Severity => report.severity_score.clone(),
        }
    }

    pub fn fit(self, report: &AggregateReport) -> Option<TrendLine> {
        match self {
            Metric::Accidents => report.trends.accidents,
            Metric::Fatalities => report.trends.fatalities,
            Metric::Severity => report.trends.severity,
        }
    }
}

fn counts_f64(table: &BTreeMap<i32, u32>) -> BTreeMap<i32, f64> {
    table.iter().map(|(&y, &v)| (y, f64::from(v))).collect()
}

fn sums_f64(table: &BTreeMap<i32, i64>) -> BTreeMap<i32, f64> {
    table.iter().map(|(&y, &v)| (y, v as f64)).collect()
}

fn decade(year: i32) -> i32 {
    year.div_euclid(10) * 10
}

/// Computes the derived tables from a normalized record set. Records with
/// an absent year are excluded from every year-keyed aggregate.
pub struct Aggregator;

impl Aggregator {
    pub fn collapse_category(code: &str) -> &str {
        CATEGORY_COLLAPSE
            .iter()
            .find(|(raw, _)| *raw == code)
            .map_or(code, |(_, parent)| parent)
    }

    pub fn accidents_per_year(records: &[CleanedRecord]) -> BTreeMap<i32, u32> {
        let mut table = BTreeMap::new();
        for record in records {
            if let Some(year) = record.year {
                *table.entry(year).or_default() += 1;
            }
        }
        table
    }

    /// Absent fatality counts are excluded from the sums; a year whose
    /// records all lack a count still appears, with a sum of 0.
    pub fn fatalities_per_year(records: &[CleanedRecord]) -> BTreeMap<i32, i64> {
        let mut table = BTreeMap::new();
        for record in records {
            if let Some(year) = record.year {
                *table.entry(year).or_default() += record.fatalities.unwrap_or(0);
            }
        }
        table
    }

    pub fn category_share_per_year(records: &[CleanedRecord]) -> ShareTable {
        Self::share_by(records, |year| year)
    }

    pub fn category_share_per_decade(records: &[CleanedRecord]) -> ShareTable {
        Self::share_by(records, decade)
    }

    /// Share of each collapsed category among the group's categorized
    /// records. Shares of a non-empty group sum to 100.
    fn share_by(records: &[CleanedRecord], group_key: impl Fn(i32) -> i32) -> ShareTable {
        let mut counts: BTreeMap<i32, BTreeMap<String, u32>> = BTreeMap::new();
        for record in records {
            let (Some(year), Some(code)) = (record.year, record.category.as_deref()) else {
                continue;
            };
            let parent = Self::collapse_category(code).to_string();
            *counts
                .entry(group_key(year))
                .or_default()
                .entry(parent)
                .or_default() += 1;
        }

        counts
            .into_iter()
            .map(|(group, cats)| {
                let total: u32 = cats.values().sum();
                let shares = cats
                    .into_iter()
                    .map(|(cat, n)| (cat, f64::from(n) / f64::from(total) * 100.0))
                    .collect();
                (group, shares)
            })
            .collect()
    }

    /// Share lookup with the zero-denominator contract: a group or
    /// category with no records has share 0, never NaN.
    pub fn share(table: &ShareTable, group: i32, category: &str) -> f64 {
        table
            .get(&group)
            .and_then(|cats| cats.get(category))
            .copied()
            .unwrap_or(0.0)
    }

    /// Fatalities per accident per year, rescaled so the maximum over all
    /// years is exactly 100. Zero-accident years cannot contribute (the
    /// ratio is only defined where accidents > 0).
    pub fn severity_scores(
        accidents: &BTreeMap<i32, u32>,
        fatalities: &BTreeMap<i32, i64>,
    ) -> BTreeMap<i32, f64> {
        let mut scores: BTreeMap<i32, f64> = accidents
            .iter()
            .filter(|(_, &count)| count > 0)
            .map(|(&year, &count)| {
                let fat = fatalities.get(&year).copied().unwrap_or(0) as f64;
                (year, fat / f64::from(count))
            })
            .collect();

        let max = scores.values().copied().fold(f64::NEG_INFINITY, f64::max);
        if max > 0.0 {
            for score in scores.values_mut() {
                *score = *score / max * 100.0;
            }
        }
        scores
    }

    /// OLS fit over the points of `series` whose year falls in
    /// `[from, to]`. Undefined (`None`) with fewer than two points; an
    /// inverted range holds no points at all.
    pub fn fit_trend(series: &BTreeMap<i32, f64>, from: i32, to: i32) -> Option<TrendLine> {
        if from > to {
            return None;
        }
        let points: Vec<(f64, f64)> = series
            .range(from..=to)
            .map(|(&year, &value)| (f64::from(year), value))
            .collect();
        if points.len() < 2 {
            return None;
        }

        let n = points.len() as f64;
        let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
        let sxx: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
        let sxy: f64 = points
            .iter()
            .map(|(x, y)| (x - mean_x) * (y - mean_y))
            .sum();
        if sxx == 0.0 {
            return None;
        }

        let slope = sxy / sxx;
        Some(TrendLine {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    /// Category-H participation per year from 1980 on: share of accident
    /// count and share of total fatalities, after H1/H2 collapsing. A
    /// year whose fatality total is zero gets share 0.
    pub fn hijack_share(records: &[CleanedRecord]) -> HijackShare {
        let mut totals: BTreeMap<i32, (u32, i64)> = BTreeMap::new();
        let mut hijack: BTreeMap<i32, (u32, i64)> = BTreeMap::new();

        for record in records {
            let Some(year) = record.year else { continue };
            if year < HIJACK_ERA_START {
                continue;
            }
            let fat = record.fatalities.unwrap_or(0);
            let total = totals.entry(year).or_default();
            total.0 += 1;
            total.1 += fat;
            let is_hijack = record
                .category
                .as_deref()
                .map(Self::collapse_category)
                == Some("H");
            if is_hijack {
                let h = hijack.entry(year).or_default();
                h.0 += 1;
                h.1 += fat;
            }
        }

        let mut share = HijackShare::default();
        for (&year, &(count, fat_total)) in &totals {
            let (h_count, h_fat) = hijack.get(&year).copied().unwrap_or((0, 0));
            share
                .accident_share
                .insert(year, f64::from(h_count) / f64::from(count) * 100.0);
            let fat_share = if fat_total > 0 {
                h_fat as f64 / fat_total as f64 * 100.0
            } else {
                0.0
            };
            share.fatality_share.insert(year, fat_share);
        }
        share
    }

    /// Top-n years by value, descending, earliest year first on ties.
    pub fn top_years<V: Copy + Ord>(table: &BTreeMap<i32, V>, n: usize) -> Vec<(i32, V)> {
        let mut entries: Vec<(i32, V)> = table.iter().map(|(&y, &v)| (y, v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }

    /// Top-n aircraft types by share (%) among records in `[from, to]`
    /// that carry a type.
    pub fn top_aircraft_types(
        records: &[CleanedRecord],
        from: i32,
        to: i32,
        n: usize,
    ) -> Vec<(String, f64)> {
        top_shares(
            records
                .iter()
                .filter(|r| r.year.is_some_and(|y| y >= from && y <= to))
                .filter_map(|r| r.aircraft_type.as_deref()),
            n,
        )
    }

    /// Top-n countries by share (%) among a single year's records that
    /// carry a country.
    pub fn top_countries_in_year(
        records: &[CleanedRecord],
        year: i32,
        n: usize,
    ) -> Vec<(String, f64)> {
        top_shares(
            records
                .iter()
                .filter(|r| r.year == Some(year))
                .filter_map(|r| r.country.as_deref()),
            n,
        )
    }

    /// Compute every derived table in one pass over the record set.
    pub fn build_report(records: &[CleanedRecord], from: i32, to: i32) -> AggregateReport {
        let accidents_per_year = Self::accidents_per_year(records);
        let fatalities_per_year = Self::fatalities_per_year(records);
        let severity_score = Self::severity_scores(&accidents_per_year, &fatalities_per_year);

        let peak_year = accidents_per_year
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(&year, _)| year);
        let peak_year_countries = peak_year
            .map(|year| Self::top_countries_in_year(records, year, 5))
            .unwrap_or_default();

        let trends = TrendReport {
            from,
            to,
            accidents: Self::fit_trend(&counts_f64(&accidents_per_year), from, to),
            fatalities: Self::fit_trend(&sums_f64(&fatalities_per_year), from, to),
            severity: Self::fit_trend(&severity_score, from, to),
        };

        AggregateReport {
            top_accident_years: Self::top_years(&accidents_per_year, 5),
            top_fatality_years: Self::top_years(&fatalities_per_year, 5),
            wartime_aircraft: Self::top_aircraft_types(
                records,
                WARTIME_YEARS.0,
                WARTIME_YEARS.1,
                5,
            ),
            category_share_per_year: Self::category_share_per_year(records),
            category_share_per_decade: Self::category_share_per_decade(records),
            hijack: Self::hijack_share(records),
            accidents_per_year,
            fatalities_per_year,
            severity_score,
            peak_year,
            peak_year_countries,
            trends,
        }
    }
}

/// Share (%) of each distinct value among all yielded values, descending,
/// name order on ties.
fn top_shares<'a>(values: impl Iterator<Item = &'a str>, n: usize) -> Vec<(String, f64)> {
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    let total: u32 = counts.values().sum();
    if total == 0 {
        return Vec::new();
    }
    let mut entries: Vec<(&str, u32)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    entries
        .into_iter()
        .take(n)
        .map(|(name, count)| {
            (
                name.to_string(),
                f64::from(count) / f64::from(total) * 100.0,
            )
        })
        .collect()
}
