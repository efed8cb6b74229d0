//! Decides, per symbol, whether the cache needs new data and which dates to ask for.

use crate::core::instrument::{InstrumentType, TypeClassifier};
use crate::core::price::FetchWindow;
use crate::core::table::HistoricalTable;
use chrono::{Duration, NaiveDate};
use futures::future::join_all;
use std::collections::HashMap;
use std::fmt::Display;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Last cached close is today or yesterday.
    UpToDate { last: NaiveDate },
    /// The day after the last cached close is not a completed day yet.
    NoCompletedDay { last: NaiveDate },
    ClassificationFailed(String),
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UpToDate { last } => write!(f, "up to date ({last})"),
            SkipReason::NoCompletedDay { last } => {
                write!(f, "no completed day after {last}")
            }
            SkipReason::ClassificationFailed(e) => write!(f, "classification failed: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// Exempt from history tracking; the symbol is dropped from the cache.
    Exclude(InstrumentType),
    Skip(SkipReason),
    Fetch(FetchWindow),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    pub symbol: String,
    pub action: UpdateAction,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePlan {
    pub entries: Vec<PlanEntry>,
}

impl UpdatePlan {
    pub fn fetches(&self) -> impl Iterator<Item = (&str, &FetchWindow)> + '_ {
        self.entries.iter().filter_map(|entry| match &entry.action {
            UpdateAction::Fetch(window) => Some((entry.symbol.as_str(), window)),
            _ => None,
        })
    }

    /// Symbols whose history is kept in the cache, in request order.
    pub fn tracked_symbols(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| !matches!(entry.action, UpdateAction::Exclude(_)))
            .map(|entry| entry.symbol.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePlanner {
    history_start: HashMap<InstrumentType, NaiveDate>,
}

impl UpdatePlanner {
    /// `history_start` pins the earliest date of a full-history fetch for
    /// instrument types whose authoritative history is shorter than what the
    /// quote source serves.
    pub fn new(history_start: HashMap<InstrumentType, NaiveDate>) -> Self {
        Self { history_start }
    }

    /// Classifies every symbol concurrently and plans one action per symbol, in request order.
    pub async fn plan(
        &self,
        symbols: &[String],
        table: &HistoricalTable,
        classifier: &dyn TypeClassifier,
        today: NaiveDate,
        force: bool,
    ) -> UpdatePlan {
        let classifications = join_all(symbols.iter().map(|s| classifier.classify(s))).await;

        let entries = symbols
            .iter()
            .zip(classifications)
            .map(|(symbol, classification)| {
                let action = match classification {
                    Ok(instrument) => {
                        self.action_for(instrument, table.last_observed(symbol), today, force)
                    }
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "Classification failed, skipping");
                        UpdateAction::Skip(SkipReason::ClassificationFailed(e.to_string()))
                    }
                };
                debug!(symbol = %symbol, ?action, "Planned update");
                PlanEntry {
                    symbol: symbol.clone(),
                    action,
                }
            })
            .collect();

        UpdatePlan { entries }
    }

    /// The action for one classified symbol whose latest cached close is `last_observed`.
    ///
    /// The current day is never requested: its close may not be final.
    /// `force` only bypasses the staleness check.
    pub fn action_for(
        &self,
        instrument: InstrumentType,
        last_observed: Option<NaiveDate>,
        today: NaiveDate,
        force: bool,
    ) -> UpdateAction {
        if instrument.is_history_exempt() {
            return UpdateAction::Exclude(instrument);
        }

        let yesterday = today - Duration::days(1);
        let Some(last) = last_observed else {
            return UpdateAction::Fetch(FetchWindow {
                start: self.history_start.get(&instrument).copied(),
                end: yesterday,
            });
        };

        if !force && (today - last).num_days() <= 1 {
            return UpdateAction::Skip(SkipReason::UpToDate { last });
        }

        let start = last + Duration::days(1);
        if start > yesterday {
            return UpdateAction::Skip(SkipReason::NoCompletedDay { last });
        }
        UpdateAction::Fetch(FetchWindow::range(start, yesterday))
    }
}
