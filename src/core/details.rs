//! Point-in-time quote details for a fund, enriched from the local cache.

use crate::core::instrument::InstrumentType;
use crate::core::price::PriceSeries;
use anyhow::Result;
use async_trait::async_trait;

/// Latest quote fields as served by the quote source.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteSnapshot {
    pub symbol: String,
    pub short_name: Option<String>,
    pub instrument_type: InstrumentType,
    pub currency: Option<String>,
    pub price: f64,
    pub previous_close: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    /// Fund category, e.g. "Large Blend".
    pub category: Option<String>,
    /// Trailing distribution yield as a fraction.
    pub dividend_yield: Option<f64>,
    /// Annual expense ratio as a fraction.
    pub expense_ratio: Option<f64>,
}

#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<QuoteSnapshot>;
}

/// Value reported for every price field of a history-exempt instrument.
pub const FIXED_UNIT_PRICE: f64 = 1.0;

/// Expense ratio reported for money market funds, whose quotes carry none.
pub const MONEY_MARKET_EXPENSE_RATIO: f64 = 0.011;

#[derive(Debug, Clone, PartialEq)]
pub struct FundDetails {
    pub symbol: String,
    pub name: Option<String>,
    pub instrument_type: InstrumentType,
    pub currency: Option<String>,
    pub price: f64,
    pub previous_close: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub fifty_day_average: Option<f64>,
    pub two_hundred_day_average: Option<f64>,
    pub category: Option<String>,
    pub dividend_yield: Option<f64>,
    pub expense_ratio: Option<f64>,
}

impl FundDetails {
    /// Combines a snapshot with the cached history of the same symbol.
    ///
    /// Only funds report an expense ratio. Indices report neither yield nor
    /// expense ratio.
    pub fn from_snapshot(snapshot: QuoteSnapshot, history: &PriceSeries) -> Self {
        let (dividend_yield, expense_ratio) = match snapshot.instrument_type {
            InstrumentType::Etf | InstrumentType::MutualFund => {
                (snapshot.dividend_yield, snapshot.expense_ratio)
            }
            InstrumentType::MoneyMarket => {
                (snapshot.dividend_yield, Some(MONEY_MARKET_EXPENSE_RATIO))
            }
            InstrumentType::Index => (None, None),
            _ => (snapshot.dividend_yield, None),
        };

        if snapshot.instrument_type.is_history_exempt() {
            let fixed = Some(FIXED_UNIT_PRICE);
            return Self {
                symbol: snapshot.symbol,
                name: snapshot.short_name,
                instrument_type: snapshot.instrument_type,
                currency: snapshot.currency,
                price: FIXED_UNIT_PRICE,
                previous_close: fixed,
                fifty_two_week_high: fixed,
                fifty_two_week_low: fixed,
                fifty_day_average: fixed,
                two_hundred_day_average: fixed,
                category: snapshot.category,
                dividend_yield,
                expense_ratio,
            };
        }

        Self {
            symbol: snapshot.symbol,
            name: snapshot.short_name,
            instrument_type: snapshot.instrument_type,
            currency: snapshot.currency,
            price: snapshot.price,
            previous_close: snapshot.previous_close,
            fifty_two_week_high: snapshot.fifty_two_week_high,
            fifty_two_week_low: snapshot.fifty_two_week_low,
            fifty_day_average: trailing_average(history, 50),
            two_hundred_day_average: trailing_average(history, 200),
            category: snapshot.category,
            dividend_yield,
            expense_ratio,
        }
    }

    pub fn day_change(&self) -> Option<f64> {
        self.previous_close.map(|prev| self.price - prev)
    }

    /// Fractional change against the previous close, unavailable when that close is not positive.
    pub fn day_change_ratio(&self) -> Option<f64> {
        self.previous_close
            .filter(|prev| *prev > 0.0)
            .map(|prev| self.price / prev - 1.0)
    }
}

/// Mean of the last `window` present closes, `None` with fewer observations.
pub fn trailing_average(history: &PriceSeries, window: usize) -> Option<f64> {
    let closes: Vec<f64> = history.observed().map(|(_, p)| p).collect();
    if window == 0 || closes.len() < window {
        return None;
    }
    let tail = &closes[closes.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}
