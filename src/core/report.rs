//! Assembles per-symbol trailing returns from the cached table.

use crate::core::instrument::TypeClassifier;
use crate::core::returns::{ReturnPeriod, period_return};
use crate::core::table::HistoricalTable;
use chrono::NaiveDate;
use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Returns for one symbol. A `None` entry means "not available".
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnRecord {
    pub symbol: String,
    pub returns: BTreeMap<ReturnPeriod, Option<f64>>,
    pub inception: Option<NaiveDate>,
}

impl ReturnRecord {
    fn unavailable(symbol: &str, periods: &[ReturnPeriod]) -> Self {
        Self {
            symbol: symbol.to_string(),
            returns: periods.iter().map(|p| (*p, None)).collect(),
            inception: None,
        }
    }

    pub fn get(&self, period: ReturnPeriod) -> Option<f64> {
        self.returns.get(&period).copied().flatten()
    }

    /// Inception date as `M/D/YYYY`, or "N/A".
    pub fn inception_display(&self) -> String {
        self.inception
            .map_or_else(|| "N/A".to_string(), |d| d.format("%-m/%-d/%Y").to_string())
    }
}

/// One record per requested symbol, in request order.
///
/// Symbols that are exempt from history tracking, absent from the table, or
/// without enough history still get a row, with every field unavailable.
/// A failed classification does not exclude a symbol.
pub async fn build_report(
    symbols: &[String],
    periods: &[ReturnPeriod],
    table: &HistoricalTable,
    classifier: &dyn TypeClassifier,
) -> Vec<ReturnRecord> {
    let classifications = join_all(symbols.iter().map(|s| classifier.classify(s))).await;

    symbols
        .iter()
        .zip(classifications)
        .map(|(symbol, classification)| {
            match classification {
                Ok(instrument) if instrument.is_history_exempt() => {
                    debug!(symbol = %symbol, %instrument, "Exempt from returns");
                    return ReturnRecord::unavailable(symbol, periods);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Classification failed, reporting from cache");
                }
            }

            let series = table.series(symbol);
            ReturnRecord {
                symbol: symbol.clone(),
                returns: periods
                    .iter()
                    .map(|p| (*p, period_return(&series, *p)))
                    .collect(),
                inception: series.inception(),
            }
        })
        .collect()
}
