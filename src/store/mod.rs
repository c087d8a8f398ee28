//! Column-store driver contract.
//!
//! The engine only needs per-row reads and writes with a sorted column
//! space: every row holds the versions of one entity, each column is keyed by
//! a [`Version`]. Drivers provide per-row atomicity and read-your-writes on a
//! single row; nothing here assumes cross-row transactions.

pub mod codec;
pub mod memory;
pub mod row_key;

pub use memory::{Fault, FaultKind, MemoryColumnStore, StoreOp};
pub use row_key::RowKey;

use crate::error::EngineError;
use crate::version::Version;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    EntityLog,
    EntityVersionData,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::EntityLog => "entity_log",
            Table::EntityVersionData => "entity_version_data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub column: Version,
    pub value: Vec<u8>,
}

#[async_trait]
pub trait ColumnStore: Send + Sync + 'static {
    /// Writes one column. `ttl` marks the cell as expiring.
    async fn put(
        &self,
        table: Table,
        row: &RowKey,
        column: Version,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), EngineError>;

    async fn get(
        &self,
        table: Table,
        row: &RowKey,
        column: Version,
    ) -> Result<Option<Vec<u8>>, EngineError>;

    /// Columns `<= max`, newest first, at most `limit`.
    async fn scan_descending(
        &self,
        table: Table,
        row: &RowKey,
        max: Version,
        limit: usize,
    ) -> Result<Vec<Cell>, EngineError>;

    /// Columns `>= min`, oldest first, at most `limit`.
    async fn scan_ascending(
        &self,
        table: Table,
        row: &RowKey,
        min: Version,
        limit: usize,
    ) -> Result<Vec<Cell>, EngineError>;

    async fn delete(&self, table: Table, row: &RowKey, column: Version) -> Result<(), EngineError>;

    async fn ping(&self) -> Result<(), EngineError>;
}
