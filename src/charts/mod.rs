//! Charts module - static chart rendering

mod plotter;

pub use plotter::ChartPlotter;
