pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::cache::Cache;
use crate::core::config::AppConfig;
use crate::core::returns::ReturnPeriod;
use crate::providers::YahooFinanceProvider;
use crate::store::CsvHistoryStore;
use anyhow::Result;
use chrono::Local;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Refresh the cached closes; `force` ignores the staleness check.
    Update { force: bool },
    /// Report trailing returns; an empty list reports every period.
    Returns { periods: Vec<ReturnPeriod> },
    Details,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fundhist starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    // One snapshot per symbol per run, shared by classification and details
    let snapshot_cache = Arc::new(Cache::new());
    let yahoo = &config.providers.yahoo;
    let provider = YahooFinanceProvider::new(&yahoo.base_url, yahoo.retries, snapshot_cache)?
        .with_cookie_url(&yahoo.cookie_url);
    let store = CsvHistoryStore::new(config.history_file_path()?);
    let today = Local::now().date_naive();

    match command {
        AppCommand::Update { force } => {
            cli::update::run(&config, &store, &provider, &provider, today, force).await
        }
        AppCommand::Returns { periods } => {
            cli::returns::run(&config.symbols, &periods, &store, &provider).await
        }
        AppCommand::Details => cli::details::run(&config.symbols, &store, &provider).await,
    }
}
