use super::ui;
use crate::core::details::{FundDetails, SnapshotProvider};
use crate::core::table::HistoricalTable;
use crate::store::HistoryStore;
use anyhow::Result;
use comfy_table::{Cell, Table};
use futures::future::join_all;
use tracing::{info, warn};

/// A details row, or the reason the quote could not be fetched.
struct DetailsRow {
    symbol: String,
    details: Result<FundDetails, String>,
}

pub async fn run(
    symbols: &[String],
    store: &dyn HistoryStore,
    snapshots: &dyn SnapshotProvider,
) -> Result<()> {
    info!("Fetching fund details...");

    if symbols.is_empty() {
        println!("No symbols configured.");
        return Ok(());
    }

    let history = store.load(symbols);
    let rows = collect_details(symbols, &history, snapshots).await;
    println!("{}", render_details(&rows));
    Ok(())
}

/// One row per requested symbol, in request order.
async fn collect_details(
    symbols: &[String],
    history: &HistoricalTable,
    snapshots: &dyn SnapshotProvider,
) -> Vec<DetailsRow> {
    let pb = ui::new_progress_bar(symbols.len() as u64, false);
    let futures = symbols.iter().map(|symbol| {
        let pb_clone = pb.clone();
        async move {
            let result = snapshots.fetch_snapshot(symbol).await;
            pb_clone.inc(1);
            result
        }
    });
    let fetched = join_all(futures).await;
    pb.finish_and_clear();

    symbols
        .iter()
        .zip(fetched)
        .map(|(symbol, result)| DetailsRow {
            symbol: symbol.clone(),
            details: result
                .map(|snapshot| FundDetails::from_snapshot(snapshot, &history.series(symbol)))
                .map_err(|e| {
                    warn!(symbol = %symbol, error = %e, "Quote unavailable");
                    e.to_string()
                }),
        })
        .collect()
}

fn price(value: f64) -> String {
    format!("{value:.2}")
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

const COLUMNS: [&str; 14] = [
    "Symbol", "Name", "Category", "Type", "Price", "P Close", "D Ch", "D Ch%", "52W High",
    "52W Low", "50 Day", "200 Day", "Yield", "ER",
];

fn render_details(rows: &[DetailsRow]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(COLUMNS.iter().map(|c| ui::header_cell(c)).collect::<Vec<_>>());

    for row in rows {
        match &row.details {
            Ok(d) => {
                let name = d.name.as_deref().unwrap_or(&d.symbol);
                table.add_row(vec![
                    Cell::new(&d.symbol),
                    Cell::new(name),
                    Cell::new(d.category.as_deref().unwrap_or("")),
                    Cell::new(d.instrument_type.to_string()),
                    ui::format_optional_cell(Some(d.price), price),
                    ui::format_optional_cell(d.previous_close, price),
                    ui::format_optional_cell(d.day_change(), |v| format!("{v:+.2}")),
                    ui::optional_change_cell(d.day_change_ratio()),
                    ui::format_optional_cell(d.fifty_two_week_high, price),
                    ui::format_optional_cell(d.fifty_two_week_low, price),
                    ui::format_optional_cell(d.fifty_day_average, price),
                    ui::format_optional_cell(d.two_hundred_day_average, price),
                    ui::format_optional_cell(d.dividend_yield, percent),
                    ui::format_optional_cell(d.expense_ratio, percent),
                ]);
            }
            Err(e) => {
                let mut cells = vec![
                    Cell::new(&row.symbol),
                    Cell::new(ui::style_text(e, ui::StyleType::Error)),
                ];
                cells.extend((cells.len()..COLUMNS.len()).map(|_| ui::na_cell(true)));
                table.add_row(cells);
            }
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::Cache;
    use crate::core::details::{MONEY_MARKET_EXPENSE_RATIO, QuoteSnapshot};
    use crate::core::instrument::InstrumentType;
    use crate::core::price::PriceSeries;
    use crate::providers::YahooFinanceProvider;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn snapshot(symbol: &str, instrument_type: InstrumentType) -> QuoteSnapshot {
        QuoteSnapshot {
            symbol: symbol.to_string(),
            short_name: Some(format!("{symbol} Fund")),
            instrument_type,
            currency: Some("USD".to_string()),
            price: 102.0,
            previous_close: Some(100.0),
            fifty_two_week_high: Some(110.0),
            fifty_two_week_low: Some(90.0),
            category: Some("Large Blend".to_string()),
            dividend_yield: Some(0.0128),
            expense_ratio: Some(0.0003),
        }
    }

    async fn mount(server: &MockServer, url_path: String, body: String) {
        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn mount_fund(server: &MockServer, symbol: &str, instrument_type: &str, price: f64) {
        let chart = format!(
            r#"{{"chart": {{"result": [{{"meta": {{
                "instrumentType": "{instrument_type}",
                "regularMarketPrice": {price},
                "previousClose": 100.0,
                "fiftyTwoWeekHigh": 120.0,
                "fiftyTwoWeekLow": 80.0,
                "shortName": "{symbol} Fund"
            }}}}], "error": null}}}}"#
        );
        let summary = r#"{"quoteSummary": {"result": [{
            "summaryDetail": {"yield": {"raw": 0.0128}},
            "fundProfile": {"categoryName": "Large Blend", "feesExpensesInvestment": {"annualReportExpenseRatio": {"raw": 0.0003}}}
        }], "error": null}}"#;
        mount(server, format!("/v8/finance/chart/{symbol}"), chart).await;
        mount(server, format!("/v10/finance/quoteSummary/{symbol}"), summary.to_string()).await;
    }

    #[tokio::test]
    async fn collects_fund_fields_by_instrument_type() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cookie"))
            .respond_with(
                ResponseTemplate::new(404).insert_header("set-cookie", "A3=d=abc; Path=/"),
            )
            .mount(&mock_server)
            .await;
        mount(&mock_server, "/v1/test/getcrumb".to_string(), "crumb".to_string()).await;
        mount_fund(&mock_server, "VTI", "ETF", 102.0).await;
        mount_fund(&mock_server, "VMFXX", "MONEYMARKET", 1.0).await;
        mount_fund(&mock_server, "SPX", "INDEX", 5000.0).await;

        let uri = mock_server.uri();
        let provider = YahooFinanceProvider::new(&uri, 0, Arc::new(Cache::new()))
            .unwrap()
            .with_cookie_url(&format!("{uri}/cookie"));
        let symbols: Vec<String> = ["VTI", "VMFXX", "SPX", "NOPE"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut history = HistoricalTable::new(symbols.as_slice());
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for day in 0..50 {
            history.insert(start + chrono::Duration::days(day), "VTI", 100.0 + day as f64);
        }

        let rows = collect_details(&symbols, &history, &provider).await;
        assert_eq!(rows.len(), 4);

        let etf = rows[0].details.as_ref().unwrap();
        assert_eq!(etf.category.as_deref(), Some("Large Blend"));
        assert_eq!(etf.dividend_yield, Some(0.0128));
        assert_eq!(etf.expense_ratio, Some(0.0003));
        assert_eq!(etf.fifty_day_average, Some(124.5));
        assert_eq!(etf.two_hundred_day_average, None);

        let mmf = rows[1].details.as_ref().unwrap();
        assert_eq!(mmf.price, 1.0);
        assert_eq!(mmf.fifty_two_week_high, Some(1.0));
        assert_eq!(mmf.dividend_yield, Some(0.0128));
        assert_eq!(mmf.expense_ratio, Some(MONEY_MARKET_EXPENSE_RATIO));

        let index = rows[2].details.as_ref().unwrap();
        assert_eq!(index.price, 5000.0);
        assert_eq!(index.dividend_yield, None);
        assert_eq!(index.expense_ratio, None);

        assert_eq!(rows[3].symbol, "NOPE");
        assert!(rows[3].details.is_err());

        let rendered = render_details(&rows).to_string();
        assert!(rendered.contains("Large Blend"));
        assert!(rendered.contains("0.03%"));
        assert!(rendered.contains("1.10%"));
    }

    #[test]
    fn renders_quotes_and_failures() {
        let rows = vec![
            DetailsRow {
                symbol: "VTI".to_string(),
                details: Ok(FundDetails::from_snapshot(
                    snapshot("VTI", InstrumentType::Etf),
                    &PriceSeries::default(),
                )),
            },
            DetailsRow {
                symbol: "NOPE".to_string(),
                details: Err("Request error for symbol: NOPE".to_string()),
            },
        ];

        let table = render_details(&rows);
        let rendered = table.to_string();
        assert!(rendered.contains("VTI Fund"));
        assert!(rendered.contains("+2.00"));
        assert!(rendered.contains("1.28%"));
        assert!(rendered.contains("NOPE"));
        assert!(rendered.contains("N/A"));
        assert!(table.row_iter().all(|row| row.cell_count() == COLUMNS.len()));
    }
}
