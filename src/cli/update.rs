use super::ui;
use crate::core::config::AppConfig;
use crate::core::instrument::{InstrumentType, TypeClassifier};
use crate::core::planner::{SkipReason, UpdateAction, UpdatePlanner};
use crate::core::price::{FetchWindow, QuoteSource};
use crate::core::table::{HistoricalTable, merge};
use crate::store::HistoryStore;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::{Cell, Color};
use futures::future::join_all;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Excluded(InstrumentType),
    Skipped(SkipReason),
    Updated {
        window: FetchWindow,
        observations: usize,
    },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolUpdate {
    pub symbol: String,
    pub outcome: UpdateOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSummary {
    pub symbols: Vec<SymbolUpdate>,
    /// Whether the history file was rewritten.
    pub saved: bool,
}

pub async fn run(
    config: &AppConfig,
    store: &dyn HistoryStore,
    quotes: &dyn QuoteSource,
    classifier: &dyn TypeClassifier,
    today: NaiveDate,
    force: bool,
) -> Result<()> {
    info!(symbols = config.symbols.len(), force, "Updating price history...");

    if config.symbols.is_empty() {
        println!("No symbols configured.");
        return Ok(());
    }

    let planner = UpdatePlanner::new(config.history_start.clone());
    let summary =
        update_history(&config.symbols, store, quotes, classifier, &planner, today, force).await?;
    display_summary(&summary);
    Ok(())
}

/// One update run: plan, fetch every planned window concurrently, merge and
/// persist once. A symbol whose fetch fails keeps its cached history and is
/// retried on the next run. Only the final save can fail the run.
pub async fn update_history(
    symbols: &[String],
    store: &dyn HistoryStore,
    quotes: &dyn QuoteSource,
    classifier: &dyn TypeClassifier,
    planner: &UpdatePlanner,
    today: NaiveDate,
    force: bool,
) -> Result<UpdateSummary> {
    let existing = store.load(symbols);
    let plan = planner.plan(symbols, &existing, classifier, today, force).await;

    let fetches: Vec<(&str, &FetchWindow)> = plan.fetches().collect();
    let pb = ui::new_progress_bar(fetches.len() as u64, true);
    pb.set_message("Fetching closes");

    let futures = fetches.iter().map(|(symbol, window)| {
        let pb_clone = pb.clone();
        async move {
            let result = quotes.fetch_closes(symbol, window).await;
            pb_clone.inc(1);
            (*symbol, *window, result)
        }
    });
    let fetched = join_all(futures).await;
    pb.finish_and_clear();

    let mut incoming = HistoricalTable::default();
    let mut fetch_outcomes: HashMap<&str, UpdateOutcome> = HashMap::new();
    for (symbol, window, result) in fetched {
        let outcome = match result {
            Ok(series) => {
                let series = series.restrict_to(window);
                let observations = series.observed().count();
                if observations > 0 {
                    incoming.insert_series(symbol, &series);
                }
                UpdateOutcome::Updated {
                    window: *window,
                    observations,
                }
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Fetch failed, keeping cached history");
                UpdateOutcome::Failed(e.to_string())
            }
        };
        fetch_outcomes.insert(symbol, outcome);
    }

    let results = plan
        .entries
        .iter()
        .map(|entry| {
            let outcome = match &entry.action {
                UpdateAction::Exclude(instrument) => UpdateOutcome::Excluded(*instrument),
                UpdateAction::Skip(reason) => UpdateOutcome::Skipped(reason.clone()),
                UpdateAction::Fetch(window) => fetch_outcomes
                    .remove(entry.symbol.as_str())
                    .unwrap_or_else(|| UpdateOutcome::Updated {
                        window: *window,
                        observations: 0,
                    }),
            };
            SymbolUpdate {
                symbol: entry.symbol.clone(),
                outcome,
            }
        })
        .collect();

    let saved = if incoming.is_empty() {
        info!("No new data fetched for any symbol. Skipping save.");
        false
    } else {
        let merged = merge(&existing, &incoming, &plan.tracked_symbols());
        store.save(&merged).context("Failed to persist price history")?;
        true
    };

    Ok(UpdateSummary {
        symbols: results,
        saved,
    })
}

fn display_summary(summary: &UpdateSummary) {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Action"),
        ui::header_cell("Detail"),
    ]);

    for update in &summary.symbols {
        let (action, detail) = match &update.outcome {
            UpdateOutcome::Excluded(instrument) => (
                Cell::new("excluded").fg(Color::DarkGrey),
                format!("{instrument} is not tracked"),
            ),
            UpdateOutcome::Skipped(reason) => {
                (Cell::new("skipped").fg(Color::DarkGrey), reason.to_string())
            }
            UpdateOutcome::Updated {
                window,
                observations: 0,
            } => (Cell::new("updated"), format!("no new data for {window}")),
            UpdateOutcome::Updated {
                window,
                observations,
            } => (
                Cell::new("updated").fg(Color::Green),
                format!("{observations} closes for {window}"),
            ),
            UpdateOutcome::Failed(e) => (Cell::new("failed").fg(Color::Red), e.clone()),
        };
        table.add_row(vec![Cell::new(&update.symbol), action, Cell::new(detail)]);
    }

    println!("{table}");
    if !summary.saved {
        println!(
            "{}",
            ui::style_text("History file unchanged.", ui::StyleType::Subtle)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::price::{PriceObservation, PriceSeries};
    use crate::store::MemoryHistoryStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    struct MockClassifier(HashMap<String, InstrumentType>);

    #[async_trait]
    impl TypeClassifier for MockClassifier {
        async fn classify(&self, symbol: &str) -> Result<InstrumentType> {
            Ok(self.0.get(symbol).copied().unwrap_or(InstrumentType::Etf))
        }
    }

    /// Serves a fixed daily series per symbol and records every request.
    struct MockQuotes {
        closes: HashMap<String, Vec<(NaiveDate, f64)>>,
        requests: Mutex<Vec<(String, FetchWindow)>>,
    }

    impl MockQuotes {
        fn new(closes: &[(&str, Vec<(NaiveDate, f64)>)]) -> Self {
            Self {
                closes: closes
                    .iter()
                    .map(|(s, c)| (s.to_string(), c.clone()))
                    .collect(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<(String, FetchWindow)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QuoteSource for MockQuotes {
        async fn fetch_closes(&self, symbol: &str, window: &FetchWindow) -> Result<PriceSeries> {
            self.requests
                .lock()
                .unwrap()
                .push((symbol.to_string(), *window));
            let closes = self
                .closes
                .get(symbol)
                .ok_or_else(|| anyhow!("Request error for symbol: {}", symbol))?;
            // Deliberately ignores the window, like a source that returns too much
            Ok(PriceSeries::from_observations(
                closes
                    .iter()
                    .map(|(date, p)| PriceObservation::new(*date, Some(*p)))
                    .collect(),
            ))
        }
    }

    #[tokio::test]
    async fn first_run_fetches_everything_and_skips_exempt() {
        let store = MemoryHistoryStore::new();
        let quotes = MockQuotes::new(&[
            ("VTI", vec![(d(2024, 5, 13), 250.0), (d(2024, 5, 14), 251.0), (d(2024, 5, 15), 252.0)]),
            ("BND", vec![(d(2024, 5, 14), 72.0)]),
        ]);
        let classifier = MockClassifier(HashMap::from([(
            "VMFXX".to_string(),
            InstrumentType::MoneyMarket,
        )]));

        let summary = update_history(
            &symbols(&["VTI", "VMFXX", "BND"]),
            &store,
            &quotes,
            &classifier,
            &UpdatePlanner::default(),
            d(2024, 5, 15),
            false,
        )
        .await
        .unwrap();

        assert!(summary.saved);
        assert_eq!(summary.symbols[1].outcome, UpdateOutcome::Excluded(InstrumentType::MoneyMarket));
        assert_eq!(
            summary.symbols[0].outcome,
            UpdateOutcome::Updated {
                window: FetchWindow::full_history(d(2024, 5, 14)),
                observations: 2,
            }
        );

        let requested: Vec<String> = quotes.requests().into_iter().map(|(s, _)| s).collect();
        assert!(!requested.contains(&"VMFXX".to_string()));

        let saved = store.snapshot().unwrap();
        assert_eq!(saved.symbols(), ["VTI", "BND"]);
        // Today's close never reaches the cache
        assert_eq!(saved.last_observed("VTI"), Some(d(2024, 5, 14)));
        assert_eq!(saved.get(d(2024, 5, 14), "BND"), Some(72.0));
    }

    #[tokio::test]
    async fn incremental_run_merges_and_keeps_failed_symbols() {
        let mut cached = HistoricalTable::new(&["VTI", "VEA"]);
        cached.insert(d(2024, 5, 1), "VTI", 240.0);
        cached.insert(d(2024, 5, 1), "VEA", 48.0);
        let store = MemoryHistoryStore::with_table(cached);

        let quotes = MockQuotes::new(&[("VTI", vec![(d(2024, 5, 1), 999.0), (d(2024, 5, 2), 241.0)])]);
        let classifier = MockClassifier(HashMap::new());

        let summary = update_history(
            &symbols(&["VTI", "VEA"]),
            &store,
            &quotes,
            &classifier,
            &UpdatePlanner::default(),
            d(2024, 5, 3),
            false,
        )
        .await
        .unwrap();

        assert_eq!(
            quotes.requests(),
            vec![
                ("VTI".to_string(), FetchWindow::range(d(2024, 5, 2), d(2024, 5, 2))),
                ("VEA".to_string(), FetchWindow::range(d(2024, 5, 2), d(2024, 5, 2))),
            ]
        );
        assert!(matches!(summary.symbols[1].outcome, UpdateOutcome::Failed(_)));

        let saved = store.snapshot().unwrap();
        // Out-of-window data from the source does not overwrite the cache
        assert_eq!(saved.get(d(2024, 5, 1), "VTI"), Some(240.0));
        assert_eq!(saved.get(d(2024, 5, 2), "VTI"), Some(241.0));
        assert_eq!(saved.get(d(2024, 5, 1), "VEA"), Some(48.0));
    }

    #[tokio::test]
    async fn fresh_cache_is_left_untouched() {
        let mut cached = HistoricalTable::new(&["VTI"]);
        cached.insert(d(2024, 5, 14), "VTI", 251.0);
        let store = MemoryHistoryStore::with_table(cached);
        let quotes = MockQuotes::new(&[]);

        let summary = update_history(
            &symbols(&["VTI"]),
            &store,
            &quotes,
            &MockClassifier(HashMap::new()),
            &UpdatePlanner::default(),
            d(2024, 5, 15),
            false,
        )
        .await
        .unwrap();

        assert!(!summary.saved);
        assert_eq!(store.save_count(), 0);
        assert!(quotes.requests().is_empty());
        assert_eq!(
            summary.symbols[0].outcome,
            UpdateOutcome::Skipped(SkipReason::UpToDate { last: d(2024, 5, 14) })
        );
    }
}
