use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime};
use reqwest::{StatusCode, Url, header::COOKIE, header::SET_COOKIE};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::util::{RETRY_DELAY_MS, with_retry};
use crate::core::cache::Cache;
use crate::core::config::DEFAULT_YAHOO_COOKIE_URL;
use crate::core::details::{QuoteSnapshot, SnapshotProvider};
use crate::core::instrument::{InstrumentType, TypeClassifier};
use crate::core::price::{FetchWindow, PriceObservation, PriceSeries, QuoteSource};

/// Lower bound sent for "maximum available" history requests.
fn earliest_history() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default()
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Converts bar timestamps to exchange-local trading dates and pairs them with closes.
fn extract_series(item: &ChartItem) -> PriceSeries {
    let (Some(timestamps), Some(closes)) = (
        item.timestamp.as_ref(),
        item.indicators
            .as_ref()
            .and_then(|inds| inds.quote.first())
            .and_then(|q| q.close.as_ref()),
    ) else {
        return PriceSeries::default();
    };

    let offset = item.meta.gmtoffset.unwrap_or(0);
    PriceSeries::from_observations(
        timestamps
            .iter()
            .zip(closes)
            .filter_map(|(ts, close)| {
                DateTime::from_timestamp(ts + offset, 0)
                    .map(|dt| PriceObservation::new(dt.date_naive(), *close))
            })
            .collect(),
    )
}

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    currency: Option<String>,
    instrument_type: Option<String>,
    gmtoffset: Option<i64>,
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
    fifty_two_week_high: Option<f64>,
    fifty_two_week_low: Option<f64>,
    short_name: Option<String>,
    long_name: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummary,
}

#[derive(Deserialize, Debug)]
struct QuoteSummary {
    result: Option<Vec<QuoteSummaryItem>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryItem {
    summary_detail: Option<SummaryDetail>,
    default_key_statistics: Option<KeyStatistics>,
    fund_profile: Option<FundProfileModule>,
}

/// Formatted Yahoo number; `raw` is absent when the field has no value.
#[derive(Deserialize, Debug)]
struct RawValue {
    raw: Option<f64>,
}

fn raw(value: &Option<RawValue>) -> Option<f64> {
    value.as_ref().and_then(|v| v.raw)
}

#[derive(Deserialize, Debug)]
struct SummaryDetail {
    #[serde(rename = "yield")]
    yield_value: Option<RawValue>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    category: Option<String>,
    #[serde(rename = "yield")]
    yield_value: Option<RawValue>,
    annual_report_expense_ratio: Option<RawValue>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FundProfileModule {
    category_name: Option<String>,
    fees_expenses_investment: Option<FeesExpenses>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FeesExpenses {
    annual_report_expense_ratio: Option<RawValue>,
}

const PROFILE_MODULES: &str = "summaryDetail,defaultKeyStatistics,fundProfile";

/// Fund fields missing from the chart meta.
#[derive(Debug, Default, PartialEq)]
struct FundProfile {
    category: Option<String>,
    dividend_yield: Option<f64>,
    expense_ratio: Option<f64>,
}

impl From<QuoteSummaryItem> for FundProfile {
    fn from(item: QuoteSummaryItem) -> Self {
        let stats = item.default_key_statistics;
        let fund = item.fund_profile;
        FundProfile {
            category: fund
                .as_ref()
                .and_then(|f| f.category_name.clone())
                .or_else(|| stats.as_ref().and_then(|s| s.category.clone())),
            dividend_yield: item
                .summary_detail
                .as_ref()
                .and_then(|d| raw(&d.yield_value))
                .or_else(|| stats.as_ref().and_then(|s| raw(&s.yield_value))),
            expense_ratio: fund
                .as_ref()
                .and_then(|f| f.fees_expenses_investment.as_ref())
                .and_then(|f| raw(&f.annual_report_expense_ratio))
                .or_else(|| stats.as_ref().and_then(|s| raw(&s.annual_report_expense_ratio))),
        }
    }
}

/// Session cookie and the crumb token Yahoo pairs with it.
#[derive(Debug, Clone)]
struct Crumb {
    cookie: String,
    token: String,
}

/// Yahoo Finance client. Serves daily closes, instrument types and quote
/// snapshots from the chart API, and fund profiles from the quote summary API.
pub struct YahooFinanceProvider {
    base_url: String,
    cookie_url: String,
    client: reqwest::Client,
    retries: usize,
    snapshots: Arc<Cache<String, QuoteSnapshot>>,
    crumb: Mutex<Option<Crumb>>,
}

impl YahooFinanceProvider {
    pub fn new(
        base_url: &str,
        retries: usize,
        snapshots: Arc<Cache<String, QuoteSnapshot>>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("fundhist/0.1")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie_url: DEFAULT_YAHOO_COOKIE_URL.to_string(),
            client,
            retries,
            snapshots,
            crumb: Mutex::new(None),
        })
    }

    pub fn with_cookie_url(mut self, cookie_url: &str) -> Self {
        self.cookie_url = cookie_url.to_string();
        self
    }

    fn history_url(&self, symbol: &str, window: &FetchWindow) -> String {
        let start = window.start.unwrap_or_else(earliest_history);
        // period2 is exclusive: midnight after the last requested day
        let end = window.end + Duration::days(1);
        format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=history",
            self.base_url,
            symbol,
            unix_midnight(start),
            unix_midnight(end)
        )
    }

    async fn fetch_chart(&self, symbol: &str, url: &str) -> Result<ChartItem> {
        debug!("Requesting chart data from {}", url);
        let response = with_retry(
            || async { self.client.get(url).send().await?.error_for_status() },
            self.retries,
            RETRY_DELAY_MS,
        )
        .await
        .with_context(|| format!("Chart request failed for symbol: {symbol}"))?;

        let text = response.text().await?;
        let data: ChartResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse chart response for {}: {}", symbol, e))?;

        if let Some(err) = data.chart.error {
            bail!(
                "Yahoo error for {}: {} {}",
                symbol,
                err.code,
                err.description.unwrap_or_default()
            );
        }

        data.chart
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| anyhow!("No chart data found for symbol: {}", symbol))
    }

    async fn load_snapshot(&self, symbol: &str) -> Result<QuoteSnapshot> {
        let url = format!(
            "{}/v8/finance/chart/{}?range=1d&interval=1d",
            self.base_url, symbol
        );
        let meta = self.fetch_chart(symbol, &url).await?.meta;

        let price = meta
            .regular_market_price
            .ok_or_else(|| anyhow!("No market price for symbol: {}", symbol))?;

        Ok(QuoteSnapshot {
            symbol: symbol.to_string(),
            short_name: meta.short_name.or(meta.long_name),
            instrument_type: meta
                .instrument_type
                .as_deref()
                .map_or(InstrumentType::Unknown, InstrumentType::from_tag),
            currency: meta.currency,
            price,
            previous_close: meta.previous_close.or(meta.chart_previous_close),
            fifty_two_week_high: meta.fifty_two_week_high,
            fifty_two_week_low: meta.fifty_two_week_low,
            category: None,
            dividend_yield: None,
            expense_ratio: None,
        })
    }

    /// Chart snapshot, requested at most once per symbol.
    async fn cached_snapshot(&self, symbol: &str) -> Result<QuoteSnapshot> {
        self.snapshots
            .get_or_try_insert_with(symbol.to_string(), || self.load_snapshot(symbol))
            .await
    }

    /// Returns the session crumb, requesting one on first use.
    async fn ensure_crumb(&self) -> Result<Crumb> {
        let mut guard = self.crumb.lock().await;
        if let Some(crumb) = guard.as_ref() {
            return Ok(crumb.clone());
        }
        let crumb = self.fetch_crumb().await?;
        *guard = Some(crumb.clone());
        Ok(crumb)
    }

    async fn fetch_crumb(&self) -> Result<Crumb> {
        debug!("Requesting session cookie from {}", self.cookie_url);
        // The cookie endpoint sets the cookie on an error status, so the status is not checked
        let response = with_retry(
            || self.client.get(&self.cookie_url).send(),
            self.retries,
            RETRY_DELAY_MS,
        )
        .await
        .context("Cookie request failed")?;

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(';').next())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Failed to parse Yahoo cookie"))?;

        let url = format!("{}/v1/test/getcrumb", self.base_url);
        let token = with_retry(
            || async {
                self.client
                    .get(&url)
                    .header(COOKIE, &cookie)
                    .send()
                    .await?
                    .error_for_status()
            },
            self.retries,
            RETRY_DELAY_MS,
        )
        .await
        .context("Crumb request failed")?
        .text()
        .await
        .context("Failed to read crumb")?;

        let token = token.trim().to_string();
        if token.is_empty() {
            bail!("Yahoo returned an empty crumb");
        }
        Ok(Crumb { cookie, token })
    }

    async fn fetch_fund_profile(&self, symbol: &str) -> Result<FundProfile> {
        let crumb = self.ensure_crumb().await?;
        let url = Url::parse_with_params(
            &format!("{}/v10/finance/quoteSummary/{}", self.base_url, symbol),
            &[("modules", PROFILE_MODULES), ("crumb", crumb.token.as_str())],
        )
        .context("Invalid quote summary URL")?;

        debug!("Requesting fund profile from {}", url);
        let response = with_retry(
            || {
                self.client
                    .get(url.clone())
                    .header(COOKIE, &crumb.cookie)
                    .send()
            },
            self.retries,
            RETRY_DELAY_MS,
        )
        .await
        .with_context(|| format!("Fund profile request failed for symbol: {symbol}"))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            *self.crumb.lock().await = None;
            bail!("Yahoo session expired while fetching {}", symbol);
        }
        let response = response
            .error_for_status()
            .with_context(|| format!("Fund profile request failed for symbol: {symbol}"))?;

        let text = response.text().await?;
        let data: QuoteSummaryResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse fund profile for {}: {}", symbol, e))?;

        if let Some(err) = data.quote_summary.error {
            bail!(
                "Yahoo error for {}: {} {}",
                symbol,
                err.code,
                err.description.unwrap_or_default()
            );
        }

        data.quote_summary
            .result
            .and_then(|items| items.into_iter().next())
            .map(FundProfile::from)
            .ok_or_else(|| anyhow!("No fund profile found for symbol: {}", symbol))
    }
}

#[async_trait]
impl QuoteSource for YahooFinanceProvider {
    #[instrument(
        name = "YahooHistoryFetch",
        skip(self),
        fields(symbol = %symbol, window = %window)
    )]
    async fn fetch_closes(&self, symbol: &str, window: &FetchWindow) -> Result<PriceSeries> {
        let url = self.history_url(symbol, window);
        let item = self.fetch_chart(symbol, &url).await?;
        let series = extract_series(&item).restrict_to(window);
        debug!(observations = series.len(), "Received daily closes");
        Ok(series)
    }
}

#[async_trait]
impl SnapshotProvider for YahooFinanceProvider {
    #[instrument(name = "YahooSnapshotFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_snapshot(&self, symbol: &str) -> Result<QuoteSnapshot> {
        let mut snapshot = self.cached_snapshot(symbol).await?;
        match self.fetch_fund_profile(symbol).await {
            Ok(profile) => {
                snapshot.category = profile.category;
                snapshot.dividend_yield = profile.dividend_yield;
                snapshot.expense_ratio = profile.expense_ratio;
            }
            Err(e) => warn!(symbol = %symbol, error = %e, "Fund profile unavailable"),
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl TypeClassifier for YahooFinanceProvider {
    async fn classify(&self, symbol: &str) -> Result<InstrumentType> {
        Ok(self.cached_snapshot(symbol).await?.instrument_type)
    }
}
