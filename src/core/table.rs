//! The wide price table: one row per date, one column per symbol.

use crate::core::price::{PriceObservation, PriceSeries};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Daily closes for a set of symbols.
///
/// Rows are keyed by date, so dates are always unique and ascending. Every row
/// holds at least one present cell; a cell of `None` means "no observation",
/// which is distinct from a real price of zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalTable {
    symbols: Vec<String>,
    rows: BTreeMap<NaiveDate, Vec<Option<f64>>>,
}

impl HistoricalTable {
    /// Creates an empty table with the given column order. Repeated symbols keep their first position.
    pub fn new<S: AsRef<str>>(symbols: &[S]) -> Self {
        let mut columns: Vec<String> = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let symbol = symbol.as_ref();
            if !columns.iter().any(|s| s == symbol) {
                columns.push(symbol.to_string());
            }
        }
        Self {
            symbols: columns,
            rows: BTreeMap::new(),
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Number of dated rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = (NaiveDate, &[Option<f64>])> + '_ {
        self.rows.iter().map(|(date, cells)| (*date, cells.as_slice()))
    }

    fn column(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    fn ensure_column(&mut self, symbol: &str) -> usize {
        if let Some(idx) = self.column(symbol) {
            return idx;
        }
        self.symbols.push(symbol.to_string());
        for cells in self.rows.values_mut() {
            cells.push(None);
        }
        self.symbols.len() - 1
    }

    pub fn get(&self, date: NaiveDate, symbol: &str) -> Option<f64> {
        let idx = self.column(symbol)?;
        self.rows.get(&date).and_then(|cells| cells[idx])
    }

    /// Stores a present price. Unknown symbols gain a new trailing column.
    pub fn insert(&mut self, date: NaiveDate, symbol: &str, price: f64) {
        let idx = self.ensure_column(symbol);
        let width = self.symbols.len();
        let cells = self.rows.entry(date).or_insert_with(|| vec![None; width]);
        cells[idx] = Some(price);
    }

    /// Adds every present observation of `series` under `symbol`.
    /// The column is created even when the series has no present prices.
    pub fn insert_series(&mut self, symbol: &str, series: &PriceSeries) {
        self.ensure_column(symbol);
        for (date, price) in series.observed() {
            self.insert(date, symbol, price);
        }
    }

    /// The column for `symbol` as a series over the table's dates.
    /// Dates where the symbol has no observation are carried as missing.
    pub fn series(&self, symbol: &str) -> PriceSeries {
        let Some(idx) = self.column(symbol) else {
            return PriceSeries::default();
        };
        PriceSeries::from_observations(
            self.rows
                .iter()
                .map(|(date, cells)| PriceObservation::new(*date, cells[idx]))
                .collect(),
        )
    }

    /// Latest date holding a present price for `symbol`.
    pub fn last_observed(&self, symbol: &str) -> Option<NaiveDate> {
        let idx = self.column(symbol)?;
        self.rows
            .iter()
            .rev()
            .find(|(_, cells)| cells[idx].is_some())
            .map(|(date, _)| *date)
    }

    /// Projects the table onto `symbols`, in that order. Columns absent from
    /// the table come back entirely missing; rows left without any present
    /// cell are dropped.
    pub fn reindex<S: AsRef<str>>(&self, symbols: &[S]) -> Self {
        let mut out = Self::new(symbols);
        let mapping: Vec<Option<usize>> = out.symbols.iter().map(|s| self.column(s)).collect();
        for (date, cells) in &self.rows {
            let projected: Vec<Option<f64>> = mapping
                .iter()
                .map(|idx| idx.and_then(|i| cells[i]))
                .collect();
            if projected.iter().any(Option::is_some) {
                out.rows.insert(*date, projected);
            }
        }
        out
    }
}

/// Resolves one cell: a fresh observation wins, otherwise the cached one is kept.
pub fn merge_cell(incoming: Option<f64>, existing: Option<f64>) -> Option<f64> {
    incoming.or(existing)
}

/// Merges freshly fetched data into the cached table.
///
/// The result covers the union of both tables' dates, is laid out in `symbols`
/// order and resolves every cell with [`merge_cell`]. Symbols missing from both
/// inputs become entirely missing columns and rows without any observation are
/// dropped.
pub fn merge<S: AsRef<str>>(
    existing: &HistoricalTable,
    incoming: &HistoricalTable,
    symbols: &[S],
) -> HistoricalTable {
    let mut merged = HistoricalTable::new(symbols);
    let dates: BTreeSet<NaiveDate> = existing.dates().chain(incoming.dates()).collect();

    for date in dates {
        let cells: Vec<Option<f64>> = merged
            .symbols
            .iter()
            .map(|symbol| merge_cell(incoming.get(date, symbol), existing.get(date, symbol)))
            .collect();
        if cells.iter().any(Option::is_some) {
            merged.rows.insert(date, cells);
        }
    }

    merged
}
