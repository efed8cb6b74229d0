//! Trailing-period returns anchored at the latest observation of a series.

use crate::core::price::PriceSeries;
use anyhow::Result;
use chrono::{Datelike, Duration, Months, NaiveDate};
use std::fmt::Display;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum ReturnPeriod {
    OneWeek,
    OneMonth,
    ThreeMonths,
    SixMonths,
    YearToDate,
    OneYear,
    TwoYears,
    ThreeYears,
    FiveYears,
    TenYears,
    Max,
}

/// How a period locates its base observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookback {
    Weeks(i64),
    Months(u32),
    YearToDate,
    FullHistory,
}

impl ReturnPeriod {
    /// Every period, in report column order.
    pub const ALL: [ReturnPeriod; 11] = [
        ReturnPeriod::OneWeek,
        ReturnPeriod::OneMonth,
        ReturnPeriod::ThreeMonths,
        ReturnPeriod::SixMonths,
        ReturnPeriod::YearToDate,
        ReturnPeriod::OneYear,
        ReturnPeriod::TwoYears,
        ReturnPeriod::ThreeYears,
        ReturnPeriod::FiveYears,
        ReturnPeriod::TenYears,
        ReturnPeriod::Max,
    ];

    fn lookback(&self) -> Lookback {
        match self {
            ReturnPeriod::OneWeek => Lookback::Weeks(1),
            ReturnPeriod::OneMonth => Lookback::Months(1),
            ReturnPeriod::ThreeMonths => Lookback::Months(3),
            ReturnPeriod::SixMonths => Lookback::Months(6),
            ReturnPeriod::YearToDate => Lookback::YearToDate,
            ReturnPeriod::OneYear => Lookback::Months(12),
            ReturnPeriod::TwoYears => Lookback::Months(24),
            ReturnPeriod::ThreeYears => Lookback::Months(36),
            ReturnPeriod::FiveYears => Lookback::Months(60),
            ReturnPeriod::TenYears => Lookback::Months(120),
            ReturnPeriod::Max => Lookback::FullHistory,
        }
    }

    /// Start of the calendar lookback ending at `anchor`, or `None` for
    /// periods that are not a plain calendar offset. Month arithmetic clamps
    /// to the end of shorter months (Mar 31 - 1M = Feb 28/29).
    pub fn offset_from(&self, anchor: NaiveDate) -> Option<NaiveDate> {
        match self.lookback() {
            Lookback::Weeks(n) => anchor.checked_sub_signed(Duration::weeks(n)),
            Lookback::Months(n) => anchor.checked_sub_months(Months::new(n)),
            Lookback::YearToDate | Lookback::FullHistory => None,
        }
    }
}

impl Display for ReturnPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ReturnPeriod::OneWeek => "1W",
                ReturnPeriod::OneMonth => "1M",
                ReturnPeriod::ThreeMonths => "3M",
                ReturnPeriod::SixMonths => "6M",
                ReturnPeriod::YearToDate => "YTD",
                ReturnPeriod::OneYear => "1Y",
                ReturnPeriod::TwoYears => "2Y",
                ReturnPeriod::ThreeYears => "3Y",
                ReturnPeriod::FiveYears => "5Y",
                ReturnPeriod::TenYears => "10Y",
                ReturnPeriod::Max => "Max",
            }
        )
    }
}

impl FromStr for ReturnPeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "1W" | "1WK" => Ok(ReturnPeriod::OneWeek),
            "1M" | "1MO" => Ok(ReturnPeriod::OneMonth),
            "3M" | "3MO" => Ok(ReturnPeriod::ThreeMonths),
            "6M" | "6MO" => Ok(ReturnPeriod::SixMonths),
            "YTD" => Ok(ReturnPeriod::YearToDate),
            "1Y" => Ok(ReturnPeriod::OneYear),
            "2Y" => Ok(ReturnPeriod::TwoYears),
            "3Y" => Ok(ReturnPeriod::ThreeYears),
            "5Y" => Ok(ReturnPeriod::FiveYears),
            "10Y" => Ok(ReturnPeriod::TenYears),
            "MAX" => Ok(ReturnPeriod::Max),
            _ => Err(anyhow::anyhow!("Invalid return period: {}", s)),
        }
    }
}

/// Fractional return of `series` over `period` (0.0667 means +6.67%).
///
/// Missing observations are ignored. The end of every period is the latest
/// observation. `None` means the return is not available: too little
/// history, or a base price that is zero or negative.
pub fn period_return(series: &PriceSeries, period: ReturnPeriod) -> Option<f64> {
    let observed: Vec<(NaiveDate, f64)> = series.observed().collect();
    let &(anchor, end_price) = observed.last()?;

    let base = match period.lookback() {
        Lookback::FullHistory => observed.iter().find(|(_, p)| *p != 0.0).map(|(_, p)| *p),
        Lookback::YearToDate => year_to_date_base(&observed, anchor),
        Lookback::Weeks(_) | Lookback::Months(_) => {
            let target = period.offset_from(anchor)?;
            calendar_base(&observed, target)
        }
    }?;

    if base <= 0.0 {
        debug!(%period, base, "Base price not usable");
        return None;
    }
    Some(end_price / base - 1.0)
}

/// Last close of the previous year, else the first close of the anchor's year.
fn year_to_date_base(observed: &[(NaiveDate, f64)], anchor: NaiveDate) -> Option<f64> {
    let year_start = NaiveDate::from_ymd_opt(anchor.year(), 1, 1)?;
    let first_in_year = observed.partition_point(|(date, _)| *date < year_start);
    if first_in_year > 0 {
        Some(observed[first_in_year - 1].1)
    } else {
        observed.get(first_in_year).map(|(_, p)| *p)
    }
}

/// Locates the last observation on or before `target`, then steps back one
/// more observation unless it is already the first one in the series.
fn calendar_base(observed: &[(NaiveDate, f64)], target: NaiveDate) -> Option<f64> {
    let after_target = observed.partition_point(|(date, _)| *date <= target);
    let boundary = after_target.checked_sub(1)?;
    let base = boundary.saturating_sub(1);
    Some(observed[base].1)
}
