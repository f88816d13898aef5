//! Data module - CSV loading and cleaning

mod cleaner;
mod loader;

pub use cleaner::{CleanedData, CleanedRecord, Cleaner, CleanerError};
pub use loader::{load_cleaned_csv, load_raw_csv, LoaderError};
