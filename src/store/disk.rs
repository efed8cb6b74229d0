use super::HistoryStore;
use crate::core::table::HistoricalTable;
use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DATE_HEADER: &str = "Date";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wide CSV file: a `Date` column followed by one column per symbol.
/// An empty cell means "no observation".
pub struct CsvHistoryStore {
    path: PathBuf,
}

impl CsvHistoryStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self, symbols: &[String]) -> Result<HistoricalTable> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            bail!("Missing header row");
        }

        let columns: Vec<(&String, usize)> = symbols
            .iter()
            .filter_map(|symbol| {
                headers
                    .iter()
                    .skip(1)
                    .position(|h| h == symbol)
                    .map(|i| (symbol, i + 1))
            })
            .collect();

        let mut table = HistoricalTable::new(symbols);
        for record in reader.records() {
            let record = record?;
            let Some(date) = record.get(0).and_then(parse_date) else {
                debug!(row = ?record.position(), "Skipping row with unparseable date");
                continue;
            };
            for (symbol, idx) in &columns {
                if let Some(price) = record.get(*idx).and_then(parse_price) {
                    table.insert(date, symbol, price);
                }
            }
        }
        Ok(table)
    }

    fn write_table(&self, table: &HistoricalTable) -> Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = Vec::with_capacity(table.symbols().len() + 1);
        header.push(DATE_HEADER);
        header.extend(table.symbols().iter().map(String::as_str));
        writer.write_record(&header)?;

        for (date, cells) in table.rows() {
            let mut record = Vec::with_capacity(cells.len() + 1);
            record.push(date.format(DATE_FORMAT).to_string());
            record.extend(cells.iter().map(|c| c.map(|p| p.to_string()).unwrap_or_default()));
            writer.write_record(&record)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush CSV buffer: {}", e.error()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(&self.path, bytes)
            .with_context(|| format!("Failed to write history file: {}", self.path.display()))
    }
}

fn parse_date(field: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(field, DATE_FORMAT)
        .ok()
        // Timestamps such as "2024-01-02 00:00:00" keep only their date part
        .or_else(|| field.get(..10).and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok()))
}

fn parse_price(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|p| p.is_finite())
}

impl HistoryStore for CsvHistoryStore {
    fn load(&self, symbols: &[String]) -> HistoricalTable {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No history file yet");
            return HistoricalTable::new(symbols);
        }
        match self.read_table(symbols) {
            Ok(table) => {
                debug!(rows = table.len(), "Loaded history");
                table
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable history file, treating as empty");
                HistoricalTable::new(symbols)
            }
        }
    }

    fn save(&self, table: &HistoricalTable) -> Result<()> {
        self.write_table(table)?;
        info!(path = %self.path.display(), rows = table.len(), "Saved history");
        Ok(())
    }
}
