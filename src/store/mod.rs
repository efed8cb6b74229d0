//! Persistence of the cached price table.

pub mod disk;
pub mod memory;

use crate::core::table::HistoricalTable;
use anyhow::Result;

pub use disk::CsvHistoryStore;
pub use memory::MemoryHistoryStore;

pub trait HistoryStore: Send + Sync {
    /// Reads the cached table restricted to `symbols`, in that column order.
    ///
    /// Never fails: a missing or unreadable cache is an empty table, which the
    /// planner answers with a full resync.
    fn load(&self, symbols: &[String]) -> HistoricalTable;

    /// Replaces the stored table wholesale.
    fn save(&self, table: &HistoricalTable) -> Result<()>;
}
