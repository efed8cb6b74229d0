use super::HistoryStore;
use crate::core::table::HistoricalTable;
use anyhow::{Result, anyhow};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// In-memory history store for dry runs and tests.
#[derive(Default)]
pub struct MemoryHistoryStore {
    table: Mutex<HistoricalTable>,
    saves: AtomicUsize,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with an existing table.
    pub fn with_table(table: HistoricalTable) -> Self {
        Self {
            table: Mutex::new(table),
            saves: AtomicUsize::new(0),
        }
    }

    /// Snapshot of the stored table with all of its columns.
    pub fn snapshot(&self) -> Result<HistoricalTable> {
        self.table
            .lock()
            .map(|t| t.clone())
            .map_err(|_| anyhow!("History store lock poisoned"))
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self, symbols: &[String]) -> HistoricalTable {
        match self.table.lock() {
            Ok(table) => table.reindex(symbols),
            Err(_) => {
                debug!("History store lock poisoned, treating as empty");
                HistoricalTable::new(symbols)
            }
        }
    }

    fn save(&self, table: &HistoricalTable) -> Result<()> {
        let mut stored = self
            .table
            .lock()
            .map_err(|_| anyhow!("History store lock poisoned"))?;
        *stored = table.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        debug!(rows = table.len(), "Saved history in memory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_load_reindexes_saved_table() {
        let store = MemoryHistoryStore::new();
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        let mut table = HistoricalTable::new(&["VTI", "BND"]);
        table.insert(date, "VTI", 230.0);
        store.save(&table).unwrap();

        let loaded = store.load(&["BND".to_string(), "VTI".to_string()]);
        assert_eq!(loaded.symbols(), ["BND", "VTI"]);
        assert_eq!(loaded.get(date, "VTI"), Some(230.0));
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.snapshot().unwrap(), table);
    }

    #[test]
    fn test_empty_store_loads_empty_table() {
        let store = MemoryHistoryStore::new();
        assert!(store.load(&["VTI".to_string()]).is_empty());
        assert_eq!(store.save_count(), 0);
    }
}
