//! Stats module - aggregate tables and dataset checks

mod aggregator;
mod checks;

pub use aggregator::{
    AggregateReport, Aggregator, HijackShare, Metric, ShareTable, TrendLine, TrendReport,
    HIJACK_ERA_START, PARENT_CATEGORIES, WARTIME_YEARS,
};
pub use checks::ReliabilityReport;
