//! Chart Plotter Module
//! Renders the derived tables as static PNG charts with plotters. Thin
//! consumer of the aggregate report; no aggregation semantics live here.

use anyhow::{Context, Result};
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::stats::{
    AggregateReport, HijackShare, Metric, ShareTable, TrendLine, HIJACK_ERA_START,
    PARENT_CATEGORIES, WARTIME_YEARS,
};

const CHART_SIZE: (u32, u32) = (1000, 800);
const SERIES_COLOR: RGBColor = RGBColor(0, 139, 139); // darkcyan
const TREND_COLOR: RGBColor = RGBColor(220, 53, 69);

/// Stacking colors and legend names for the parent categories, in
/// [`PARENT_CATEGORIES`] order.
const CATEGORY_STYLE: [(RGBColor, &str); 6] = [
    (RGBColor(31, 119, 180), "Accidents (A)"),
    (RGBColor(255, 127, 14), "Operational (O)"),
    (RGBColor(214, 39, 40), "Unlawful Interference (H)"),
    (RGBColor(148, 103, 189), "Criminal Acts (C)"),
    (RGBColor(44, 160, 44), "Incidents (I)"),
    (RGBColor(127, 127, 127), "Unknown (U)"),
];

/// Restrict a year-keyed series to `[from, to]`; an inverted range is
/// empty.
fn restrict(series: &BTreeMap<i32, f64>, from: i32, to: i32) -> BTreeMap<i32, f64> {
    if from > to {
        return BTreeMap::new();
    }
    series
        .range(from..=to)
        .map(|(&year, &value)| (year, value))
        .collect()
}

/// Padded y-axis ceiling for a set of values; always positive so the
/// coordinate range stays valid for all-zero series.
fn y_ceiling<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    let max = values.copied().fold(0.0, f64::max);
    if max > 0.0 {
        max * 1.05
    } else {
        1.0
    }
}

/// Stacked (bottom, top) band per parent category for each decade.
fn stack_bands(shares: &ShareTable) -> BTreeMap<i32, [(f64, f64); 6]> {
    shares
        .iter()
        .map(|(&decade, cats)| {
            let mut bands = [(0.0, 0.0); 6];
            let mut bottom = 0.0;
            for (idx, cat) in PARENT_CATEGORIES.iter().enumerate() {
                let value = cats.get(*cat).copied().unwrap_or(0.0);
                bands[idx] = (bottom, bottom + value);
                bottom += value;
            }
            (decade, bands)
        })
        .collect()
}

pub struct ChartPlotter;

impl ChartPlotter {
    /// Render every chart of the analysis into `out_dir`, returning the
    /// files written. Charts whose series is empty are skipped.
    pub fn render_all(report: &AggregateReport, out_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("creating chart directory {}", out_dir.display()))?;
        let mut written = Vec::new();

        let per_year: [(&str, &str, Metric); 2] = [
            ("accidents_per_year.png", "Accidents Per Year", Metric::Accidents),
            ("fatalities_per_year.png", "Fatalities Per Year", Metric::Fatalities),
        ];
        for (file, title, metric) in per_year {
            let series = metric.series(report);
            if series.is_empty() {
                continue;
            }
            let path = out_dir.join(file);
            Self::line_chart(&path, title, metric.label(), &series, None)?;
            written.push(path);
        }

        if !report.severity_score.is_empty() {
            let path = out_dir.join("severity_score.png");
            Self::line_chart(
                &path,
                "Severity Score Over the Years",
                Metric::Severity.label(),
                &report.severity_score,
                None,
            )?;
            written.push(path);
        }

        // Trend charts over the configured range, dashed fit on top.
        let (from, to) = (report.trends.from, report.trends.to);
        let trend_files: [(&str, Metric); 3] = [
            ("accidents_trend.png", Metric::Accidents),
            ("fatalities_trend.png", Metric::Fatalities),
            ("severity_trend.png", Metric::Severity),
        ];
        for (file, metric) in trend_files {
            let Some(fit) = metric.fit(report) else {
                continue;
            };
            let series = restrict(&metric.series(report), from, to);
            if series.is_empty() {
                continue;
            }
            let path = out_dir.join(file);
            Self::line_chart(
                &path,
                &format!("{} Tendency ({from} - {to})", metric.label()),
                metric.label(),
                &series,
                Some(fit),
            )?;
            written.push(path);
        }

        let year_bars = |table: Vec<(i32, f64)>| -> Vec<(String, f64)> {
            table
                .into_iter()
                .map(|(year, value)| (year.to_string(), value))
                .collect()
        };
        if !report.top_accident_years.is_empty() {
            let path = out_dir.join("top_accident_years.png");
            let bars = year_bars(
                report
                    .top_accident_years
                    .iter()
                    .map(|&(y, v)| (y, f64::from(v)))
                    .collect(),
            );
            Self::bar_chart(&path, "Top 5 Years With Most Accidents", "Year", "Accidents", &bars)?;
            written.push(path);
        }
        if !report.top_fatality_years.is_empty() {
            let path = out_dir.join("top_fatality_years.png");
            let bars = year_bars(
                report
                    .top_fatality_years
                    .iter()
                    .map(|&(y, v)| (y, v as f64))
                    .collect(),
            );
            Self::bar_chart(&path, "Top 5 Years With Most Fatalities", "Year", "Fatalities", &bars)?;
            written.push(path);
        }

        if !report.wartime_aircraft.is_empty() {
            let path = out_dir.join("wartime_aircraft.png");
            Self::bar_chart(
                &path,
                &format!(
                    "Top Aircraft Models in Accidents ({} - {}) (%)",
                    WARTIME_YEARS.0, WARTIME_YEARS.1
                ),
                "Aircraft model",
                "Frequency (%)",
                &report.wartime_aircraft,
            )?;
            written.push(path);
        }

        if let Some(peak_year) = report.peak_year {
            if !report.peak_year_countries.is_empty() {
                let path = out_dir.join("peak_year_countries.png");
                Self::bar_chart(
                    &path,
                    &format!("Accident Locations in the Peak Year ({peak_year}) (%)"),
                    "Country",
                    "Accidents frequency (%)",
                    &report.peak_year_countries,
                )?;
                written.push(path);
            }
        }

        if !report.hijack.accident_share.is_empty() {
            let path = out_dir.join("hijack_share.png");
            Self::hijack_chart(&path, &report.hijack)?;
            written.push(path);
        }

        if !report.category_share_per_decade.is_empty() {
            let path = out_dir.join("category_share_by_decade.png");
            Self::stacked_decade_chart(&path, &report.category_share_per_decade)?;
            written.push(path);
        }

        Ok(written)
    }

    fn line_chart(
        path: &Path,
        title: &str,
        y_desc: &str,
        series: &BTreeMap<i32, f64>,
        trend: Option<TrendLine>,
    ) -> Result<()> {
        let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let (Some(&x0), Some(&x1)) = (series.keys().next(), series.keys().next_back()) else {
            return Ok(());
        };
        let y_max = y_ceiling(series.values());

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 28))
            .margin(12)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(x0..x1 + 1, 0.0..y_max)?;
        chart
            .configure_mesh()
            .x_desc("Year")
            .y_desc(y_desc)
            .draw()?;

        chart
            .draw_series(LineSeries::new(
                series.iter().map(|(&x, &y)| (x, y)),
                SERIES_COLOR.stroke_width(2),
            ))?
            .label(y_desc.to_string())
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], SERIES_COLOR));

        if let Some(fit) = trend {
            chart
                .draw_series(DashedLineSeries::new(
                    (x0..=x1).map(|year| (year, fit.predict(year))),
                    6,
                    4,
                    TREND_COLOR.stroke_width(2),
                ))?
                .label(format!("y = {:.1}x + {:.1}", fit.slope, fit.intercept))
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], TREND_COLOR));
        }

        chart
            .configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.8))
            .draw()?;
        root.present()?;
        Ok(())
    }

    fn bar_chart(
        path: &Path,
        title: &str,
        x_desc: &str,
        y_desc: &str,
        bars: &[(String, f64)],
    ) -> Result<()> {
        let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let labels: Vec<String> = bars.iter().map(|(name, _)| name.clone()).collect();
        let y_max = y_ceiling(bars.iter().map(|(_, v)| v));

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 28))
            .margin(12)
            .x_label_area_size(70)
            .y_label_area_size(60)
            .build_cartesian_2d((0..bars.len()).into_segmented(), 0.0..y_max)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_label_formatter(&|segment| match segment {
                SegmentValue::CenterOf(idx) => labels.get(*idx).cloned().unwrap_or_default(),
                _ => String::new(),
            })
            .x_desc(x_desc)
            .y_desc(y_desc)
            .draw()?;

        chart.draw_series(bars.iter().enumerate().map(|(idx, (_, value))| {
            let mut bar = Rectangle::new(
                [
                    (SegmentValue::Exact(idx), 0.0),
                    (SegmentValue::Exact(idx + 1), *value),
                ],
                SERIES_COLOR.filled(),
            );
            bar.set_margin(0, 0, 12, 12);
            bar
        }))?;

        root.present()?;
        Ok(())
    }

    /// Two stacked panels: H share of accidents, H share of fatalities.
    fn hijack_chart(path: &Path, hijack: &HijackShare) -> Result<()> {
        let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;
        let panels = root.split_evenly((2, 1));

        let panel_specs = [
            (
                &panels[0],
                &hijack.accident_share,
                "H Accidents Among All Accidents per Year (%)",
            ),
            (
                &panels[1],
                &hijack.fatality_share,
                "H Fatalities Among Total Fatalities per Year (%)",
            ),
        ];

        for (panel, series, title) in panel_specs {
            let last_year = series.keys().next_back().copied().unwrap_or(HIJACK_ERA_START);
            let y_max = y_ceiling(series.values());

            let mut chart = ChartBuilder::on(panel)
                .caption(title, ("sans-serif", 20))
                .margin(10)
                .x_label_area_size(40)
                .y_label_area_size(55)
                .build_cartesian_2d(HIJACK_ERA_START..last_year + 1, 0.0..y_max)?;
            chart
                .configure_mesh()
                .x_desc("Year")
                .y_desc("Share (%)")
                .draw()?;

            chart.draw_series(series.iter().map(|(&year, &value)| {
                let mut bar =
                    Rectangle::new([(year, 0.0), (year + 1, value)], SERIES_COLOR.filled());
                bar.set_margin(0, 0, 1, 1);
                bar
            }))?;
        }

        root.present()?;
        Ok(())
    }

    /// Stacked decade bars, one band per parent category.
    fn stacked_decade_chart(path: &Path, shares: &ShareTable) -> Result<()> {
        let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let bands = stack_bands(shares);
        let (Some(&first), Some(&last)) = (bands.keys().next(), bands.keys().next_back()) else {
            return Ok(());
        };

        let mut chart = ChartBuilder::on(&root)
            .caption(
                "Distribution of Accident Types by Decade",
                ("sans-serif", 28),
            )
            .margin(12)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(first..last + 10, 0.0..105.0)?;
        chart
            .configure_mesh()
            .x_desc("Decade")
            .y_desc("Proportion of Accidents (%)")
            .draw()?;

        for (idx, &(color, label)) in CATEGORY_STYLE.iter().enumerate() {
            chart
                .draw_series(bands.iter().map(|(&decade, band)| {
                    let (bottom, top) = band[idx];
                    let mut bar = Rectangle::new(
                        [(decade, bottom), (decade + 10, top)],
                        color.filled(),
                    );
                    bar.set_margin(0, 0, 4, 4);
                    bar
                }))?
                .label(label)
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
                });
        }

        chart
            .configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.8))
            .draw()?;
        root.present()?;
        Ok(())
    }
}
