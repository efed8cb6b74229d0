//! Price series abstractions and the quote source seam

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt::Display;

/// A single daily close for one symbol. `price` is `None` when no trade was recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub price: Option<f64>,
}

impl PriceObservation {
    pub fn new(date: NaiveDate, price: Option<f64>) -> Self {
        Self { date, price }
    }
}

/// Daily closes for one symbol, strictly ascending by date with unique dates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    observations: Vec<PriceObservation>,
}

impl PriceSeries {
    /// Builds a series from observations in any order. When a date repeats,
    /// the later observation with a price wins.
    pub fn from_observations(mut observations: Vec<PriceObservation>) -> Self {
        observations.sort_by_key(|obs| obs.date);
        let mut deduped: Vec<PriceObservation> = Vec::with_capacity(observations.len());
        for obs in observations {
            match deduped.last_mut() {
                Some(last) if last.date == obs.date => {
                    last.price = obs.price.or(last.price);
                }
                _ => deduped.push(obs),
            }
        }
        Self {
            observations: deduped,
        }
    }

    pub fn observations(&self) -> &[PriceObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observations that carry a real price, in date order.
    pub fn observed(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.observations
            .iter()
            .filter_map(|obs| obs.price.map(|p| (obs.date, p)))
    }

    /// Earliest date with a genuine (present, non-zero) close.
    pub fn inception(&self) -> Option<NaiveDate> {
        self.observed()
            .find(|(_, price)| *price != 0.0)
            .map(|(date, _)| date)
    }

    /// Latest date with a present close.
    pub fn last_observed_date(&self) -> Option<NaiveDate> {
        self.observed().last().map(|(date, _)| date)
    }

    /// Keeps only observations inside `window`.
    pub fn restrict_to(self, window: &FetchWindow) -> Self {
        Self {
            observations: self
                .observations
                .into_iter()
                .filter(|obs| window.contains(obs.date))
                .collect(),
        }
    }
}

/// Date range requested from a [`QuoteSource`]. Both ends are inclusive;
/// `start = None` asks for the maximum history the source holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
}

impl FetchWindow {
    pub fn full_history(end: NaiveDate) -> Self {
        Self { start: None, end }
    }

    pub fn range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date <= self.end && self.start.is_none_or(|start| date >= start)
    }
}

impl Display for FetchWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.start {
            Some(start) => write!(f, "{start}..={}", self.end),
            None => write!(f, "max..={}", self.end),
        }
    }
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Daily closes for `symbol` within `window`, ascending. An empty series is not an error.
    async fn fetch_closes(&self, symbol: &str, window: &FetchWindow) -> Result<PriceSeries>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn from_observations_sorts_and_dedups() {
        let series = PriceSeries::from_observations(vec![
            PriceObservation::new(d(2024, 1, 3), Some(3.0)),
            PriceObservation::new(d(2024, 1, 2), Some(2.0)),
            PriceObservation::new(d(2024, 1, 3), None),
            PriceObservation::new(d(2024, 1, 2), Some(2.5)),
        ]);

        assert_eq!(series.len(), 2);
        assert_eq!(series.observations()[0], PriceObservation::new(d(2024, 1, 2), Some(2.5)));
        // A missing close never overwrites a real one
        assert_eq!(series.observations()[1], PriceObservation::new(d(2024, 1, 3), Some(3.0)));
    }

    #[test]
    fn inception_skips_missing_and_zero() {
        let series = PriceSeries::from_observations(vec![
            PriceObservation::new(d(2020, 1, 2), None),
            PriceObservation::new(d(2020, 1, 3), Some(0.0)),
            PriceObservation::new(d(2020, 1, 6), Some(50.0)),
            PriceObservation::new(d(2020, 1, 7), None),
        ]);

        assert_eq!(series.inception(), Some(d(2020, 1, 6)));
        assert_eq!(series.last_observed_date(), Some(d(2020, 1, 6)));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = FetchWindow::range(d(2024, 1, 2), d(2024, 1, 5));
        assert!(window.contains(d(2024, 1, 2)));
        assert!(window.contains(d(2024, 1, 5)));
        assert!(!window.contains(d(2024, 1, 6)));
        assert!(!window.contains(d(2024, 1, 1)));

        let max = FetchWindow::full_history(d(2024, 1, 5));
        assert!(max.contains(d(1990, 1, 1)));
        assert!(!max.contains(d(2024, 1, 6)));
        assert_eq!(max.to_string(), "max..=2024-01-05");
    }
}
