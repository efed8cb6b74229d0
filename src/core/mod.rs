//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod details;
pub mod instrument;
pub mod log;
pub mod planner;
pub mod price;
pub mod report;
pub mod returns;
pub mod table;

// Re-export main types for cleaner imports
pub use details::{QuoteSnapshot, SnapshotProvider};
pub use instrument::{InstrumentType, TypeClassifier};
pub use price::{FetchWindow, PriceObservation, PriceSeries, QuoteSource};
pub use returns::ReturnPeriod;
pub use table::HistoricalTable;
