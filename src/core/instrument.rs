//! Instrument classification

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Instrument type as reported by the quote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum InstrumentType {
    #[serde(rename = "EQUITY")]
    Equity,
    #[serde(rename = "ETF")]
    Etf,
    #[serde(rename = "MUTUALFUND")]
    MutualFund,
    #[serde(rename = "MONEYMARKET")]
    MoneyMarket,
    #[serde(rename = "INDEX")]
    Index,
    #[serde(rename = "CRYPTOCURRENCY")]
    Cryptocurrency,
    #[serde(rename = "CURRENCY")]
    Currency,
    #[serde(rename = "FUTURE")]
    Future,
    #[serde(rename = "OPTION")]
    Option,
    #[serde(rename = "BOND")]
    Bond,
    #[serde(rename = "UNKNOWN")]
    #[serde(other)]
    Unknown,
}

impl InstrumentType {
    /// Maps a quote source tag (e.g. `MUTUALFUND`) to a type. Unrecognised tags are `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_uppercase().as_str() {
            "EQUITY" => InstrumentType::Equity,
            "ETF" => InstrumentType::Etf,
            "MUTUALFUND" | "MUTUAL FUND" => InstrumentType::MutualFund,
            "MONEYMARKET" | "MONEY MARKET" => InstrumentType::MoneyMarket,
            "INDEX" => InstrumentType::Index,
            "CRYPTOCURRENCY" | "CRYPTO" => InstrumentType::Cryptocurrency,
            "CURRENCY" => InstrumentType::Currency,
            "FUTURE" | "FUTURES" => InstrumentType::Future,
            "OPTION" => InstrumentType::Option,
            "BOND" => InstrumentType::Bond,
            _ => InstrumentType::Unknown,
        }
    }

    /// Fixed-value instruments whose history is not worth tracking.
    pub fn is_history_exempt(&self) -> bool {
        match self {
            InstrumentType::MoneyMarket => true,
            InstrumentType::Equity
            | InstrumentType::Etf
            | InstrumentType::MutualFund
            | InstrumentType::Index
            | InstrumentType::Cryptocurrency
            | InstrumentType::Currency
            | InstrumentType::Future
            | InstrumentType::Option
            | InstrumentType::Bond
            | InstrumentType::Unknown => false,
        }
    }
}

impl Display for InstrumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                InstrumentType::Equity => "EQUITY",
                InstrumentType::Etf => "ETF",
                InstrumentType::MutualFund => "MUTUALFUND",
                InstrumentType::MoneyMarket => "MONEYMARKET",
                InstrumentType::Index => "INDEX",
                InstrumentType::Cryptocurrency => "CRYPTOCURRENCY",
                InstrumentType::Currency => "CURRENCY",
                InstrumentType::Future => "FUTURE",
                InstrumentType::Option => "OPTION",
                InstrumentType::Bond => "BOND",
                InstrumentType::Unknown => "UNKNOWN",
            }
        )
    }
}

#[async_trait]
pub trait TypeClassifier: Send + Sync {
    async fn classify(&self, symbol: &str) -> Result<InstrumentType>;
}
