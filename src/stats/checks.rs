//! Reliability Checks Module
//! Sanity checks run over the cleaned dataset before anything is
//! charted: extreme fatality values, coverage gaps, missing-value
//! concentration and H1/H2 coherence.

use std::collections::BTreeMap;
use std::fmt;

use crate::data::CleanedRecord;

use super::aggregator::Aggregator;

/// Summary of the dataset checks; rendered through `Display` and logged.
#[derive(Debug, Default)]
pub struct ReliabilityReport {
    /// Highest fatality counts with their category, worst first.
    pub deadliest: Vec<(i64, Option<String>)>,
    /// Records that explicitly report zero fatalities.
    pub zero_fatality_records: usize,
    /// Records carrying an H1/H2 code, with their year span.
    pub hijack_records: usize,
    pub hijack_year_span: Option<(i32, i32)>,
    /// Years inside the observed span with no record at all.
    pub gap_years: usize,
    /// Years with the most absent fatality counts, worst first.
    pub missing_fatalities_by_year: Vec<(i32, usize)>,
}

impl ReliabilityReport {
    pub fn build(records: &[CleanedRecord]) -> Self {
        let mut deadliest: Vec<(i64, Option<String>)> = records
            .iter()
            .filter_map(|r| r.fatalities.map(|f| (f, r.category.clone())))
            .collect();
        deadliest.sort_by(|a, b| b.0.cmp(&a.0));
        deadliest.truncate(5);

        let zero_fatality_records = records
            .iter()
            .filter(|r| r.fatalities == Some(0))
            .count();

        let hijack_years: Vec<i32> = records
            .iter()
            .filter(|r| {
                r.category.as_deref().map(Aggregator::collapse_category) == Some("H")
            })
            .filter_map(|r| r.year)
            .collect();
        let hijack_year_span = match (hijack_years.iter().min(), hijack_years.iter().max()) {
            (Some(&min), Some(&max)) => Some((min, max)),
            _ => None,
        };
        let hijack_records = records
            .iter()
            .filter(|r| {
                r.category.as_deref().map(Aggregator::collapse_category) == Some("H")
            })
            .count();

        let accidents = Aggregator::accidents_per_year(records);
        let gap_years = match (accidents.keys().next(), accidents.keys().next_back()) {
            (Some(&first), Some(&last)) => ((first..=last).count()) - accidents.len(),
            _ => 0,
        };

        let mut missing: BTreeMap<i32, usize> = BTreeMap::new();
        for record in records {
            if let (Some(year), None) = (record.year, record.fatalities) {
                *missing.entry(year).or_default() += 1;
            }
        }
        let mut missing_fatalities_by_year: Vec<(i32, usize)> = missing.into_iter().collect();
        missing_fatalities_by_year.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        missing_fatalities_by_year.truncate(10);

        ReliabilityReport {
            deadliest,
            zero_fatality_records,
            hijack_records,
            hijack_year_span,
            gap_years,
            missing_fatalities_by_year,
        }
    }
}

impl fmt::Display for ReliabilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "reliability checks")?;
        writeln!(f, "  deadliest records (fatalities, cat):")?;
        for (fatalities, cat) in &self.deadliest {
            writeln!(f, "    {fatalities} {}", cat.as_deref().unwrap_or("-"))?;
        }
        writeln!(f, "  zero-fatality records: {}", self.zero_fatality_records)?;
        match self.hijack_year_span {
            Some((from, to)) => writeln!(
                f,
                "  H records: {} ({from}-{to})",
                self.hijack_records
            )?,
            None => writeln!(f, "  H records: {}", self.hijack_records)?,
        }
        writeln!(f, "  years with no accidents in span: {}", self.gap_years)?;
        writeln!(f, "  most absent fatality counts (year, records):")?;
        for (year, count) in &self.missing_fatalities_by_year {
            writeln!(f, "    {year} {count}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(year: Option<i32>, fatalities: Option<i64>, cat: Option<&str>) -> CleanedRecord {
        CleanedRecord {
            date: None,
            year,
            aircraft_type: None,
            country: None,
            fatalities,
            category: cat.map(str::to_string),
        }
    }

    #[test]
    fn report_counts_extremes_and_gaps() {
        let records = vec![
            rec(Some(2001), Some(2996), Some("H2")),
            rec(Some(1985), Some(520), Some("A1")),
            rec(Some(1985), Some(0), Some("I1")),
            rec(Some(1983), None, Some("H1")),
            rec(None, None, Some("A1")),
        ];
        let report = ReliabilityReport::build(&records);
        assert_eq!(report.deadliest[0].0, 2996);
        assert_eq!(report.zero_fatality_records, 1);
        assert_eq!(report.hijack_records, 2);
        assert_eq!(report.hijack_year_span, Some((1983, 2001)));
        // span 1983..=2001 holds 19 years, 3 of them populated
        assert_eq!(report.gap_years, 16);
        assert_eq!(report.missing_fatalities_by_year, vec![(1983, 1)]);
        let text = report.to_string();
        assert!(text.contains("zero-fatality records: 1"));
    }

    #[test]
    fn empty_input_yields_an_empty_report() {
        let report = ReliabilityReport::build(&[]);
        assert!(report.deadliest.is_empty());
        assert_eq!(report.gap_years, 0);
        assert_eq!(report.hijack_year_span, None);
    }
}
