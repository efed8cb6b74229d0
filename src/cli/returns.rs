use super::ui;
use crate::core::instrument::TypeClassifier;
use crate::core::report::{ReturnRecord, build_report};
use crate::core::returns::ReturnPeriod;
use crate::store::HistoryStore;
use anyhow::Result;
use comfy_table::{Cell, CellAlignment, Table};
use tracing::info;

/// `periods` restricts the report to those columns; empty means every period.
pub async fn run(
    symbols: &[String],
    periods: &[ReturnPeriod],
    store: &dyn HistoryStore,
    classifier: &dyn TypeClassifier,
) -> Result<()> {
    info!("Calculating returns from cached history...");

    if symbols.is_empty() {
        println!("No symbols configured.");
        return Ok(());
    }

    let table = store.load(symbols);
    if table.is_empty() {
        println!(
            "{}",
            ui::style_text(
                "No cached history found. Run `fundhist update` first.",
                ui::StyleType::Subtle
            )
        );
    }

    let periods = selected_periods(periods);
    let records = build_report(symbols, &periods, &table, classifier).await;
    println!("{}", render_returns(&records, &periods));
    Ok(())
}

/// Requested periods in column order, without repeats.
fn selected_periods(requested: &[ReturnPeriod]) -> Vec<ReturnPeriod> {
    if requested.is_empty() {
        return ReturnPeriod::ALL.to_vec();
    }
    let mut periods = requested.to_vec();
    periods.sort();
    periods.dedup();
    periods
}

fn render_returns(records: &[ReturnRecord], periods: &[ReturnPeriod]) -> Table {
    let mut table = ui::new_styled_table();

    let mut header = vec![ui::header_cell("Symbol")];
    header.extend(periods.iter().map(|p| ui::header_cell(&p.to_string())));
    header.push(ui::header_cell("Inception"));
    table.set_header(header);

    for record in records {
        let mut row = vec![Cell::new(&record.symbol)];
        row.extend(periods.iter().map(|p| ui::optional_change_cell(record.get(*p))));
        row.push(Cell::new(record.inception_display()).set_alignment(CellAlignment::Right));
        table.add_row(row);
    }

    table
}
