use crate::error::EngineError;
use crate::store::{Cell, ColumnStore, RowKey, Table};
use crate::version::Version;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Put,
    Get,
    Scan,
    Delete,
    Ping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Unavailable,
    /// Stall the call; paired with the engine's store timeout this produces
    /// `StoreTimeout`.
    Delay(Duration),
}

/// Injected failure, matched against every call in registration order.
#[derive(Debug, Clone)]
pub struct Fault {
    kind: FaultKind,
    table: Option<Table>,
    op: Option<StoreOp>,
    skip: usize,
    remaining: usize,
}

impl Fault {
    pub fn unavailable() -> Self {
        Self::new(FaultKind::Unavailable)
    }

    pub fn delay(duration: Duration) -> Self {
        Self::new(FaultKind::Delay(duration))
    }

    fn new(kind: FaultKind) -> Self {
        Self {
            kind,
            table: None,
            op: None,
            skip: 0,
            remaining: 1,
        }
    }

    pub fn on_table(mut self, table: Table) -> Self {
        self.table = Some(table);
        self
    }

    pub fn on_op(mut self, op: StoreOp) -> Self {
        self.op = Some(op);
        self
    }

    /// Let the first `calls` matching calls through.
    pub fn after(mut self, calls: usize) -> Self {
        self.skip = calls;
        self
    }

    pub fn times(mut self, calls: usize) -> Self {
        self.remaining = calls;
        self
    }

    pub fn always(self) -> Self {
        self.times(usize::MAX)
    }

    fn matches(&self, table: Option<Table>, op: StoreOp) -> bool {
        let table_matches = match (self.table, table) {
            (None, _) => true,
            (Some(expected), Some(actual)) => expected == actual,
            (Some(_), None) => false,
        };
        table_matches && self.op.is_none_or(|expected| expected == op)
    }
}

#[derive(Debug, Clone)]
struct StoredCell {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredCell {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

type Columns = BTreeMap<Version, StoredCell>;

/// In-process column store with expiring cells and fault injection.
///
/// Reference driver for tests and embedded use; row maps sit behind a lock
/// that is never held across an await point.
#[derive(Debug, Default)]
pub struct MemoryColumnStore {
    rows: RwLock<HashMap<(Table, RowKey), Columns>>,
    faults: Mutex<Vec<Fault>>,
}

impl MemoryColumnStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&self, fault: Fault) {
        self.faults.lock().push(fault);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Live cells currently stored in `table`, across all rows.
    pub fn cell_count(&self, table: Table) -> usize {
        let now = Instant::now();
        self.rows
            .read()
            .iter()
            .filter(|((t, _), _)| *t == table)
            .map(|(_, columns)| columns.values().filter(|c| c.is_live(now)).count())
            .sum()
    }

    async fn check_faults(&self, table: Option<Table>, op: StoreOp) -> Result<(), EngineError> {
        let triggered = {
            let mut faults = self.faults.lock();
            let mut triggered = None;
            for fault in faults.iter_mut() {
                if !fault.matches(table, op) {
                    continue;
                }
                if fault.skip > 0 {
                    fault.skip -= 1;
                    continue;
                }
                if fault.remaining > 0 {
                    fault.remaining = fault.remaining.saturating_sub(1);
                    triggered = Some(fault.kind);
                    break;
                }
            }
            faults.retain(|f| f.remaining > 0);
            triggered
        };
        match triggered {
            Some(FaultKind::Unavailable) => Err(EngineError::StoreUnavailable {
                message: format!(
                    "injected fault on {:?} {}",
                    op,
                    table.map(Table::name).unwrap_or("store")
                ),
            }),
            Some(FaultKind::Delay(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ColumnStore for MemoryColumnStore {
    async fn put(
        &self,
        table: Table,
        row: &RowKey,
        column: Version,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), EngineError> {
        self.check_faults(Some(table), StoreOp::Put).await?;
        let cell = StoredCell {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.rows
            .write()
            .entry((table, row.clone()))
            .or_default()
            .insert(column, cell);
        Ok(())
    }

    async fn get(
        &self,
        table: Table,
        row: &RowKey,
        column: Version,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        self.check_faults(Some(table), StoreOp::Get).await?;
        let now = Instant::now();
        let rows = self.rows.read();
        Ok(rows
            .get(&(table, row.clone()))
            .and_then(|columns| columns.get(&column))
            .filter(|cell| cell.is_live(now))
            .map(|cell| cell.value.clone()))
    }

    async fn scan_descending(
        &self,
        table: Table,
        row: &RowKey,
        max: Version,
        limit: usize,
    ) -> Result<Vec<Cell>, EngineError> {
        self.check_faults(Some(table), StoreOp::Scan).await?;
        let now = Instant::now();
        let rows = self.rows.read();
        let Some(columns) = rows.get(&(table, row.clone())) else {
            return Ok(Vec::new());
        };
        Ok(columns
            .range((Bound::Unbounded, Bound::Included(max)))
            .rev()
            .filter(|(_, cell)| cell.is_live(now))
            .take(limit)
            .map(|(column, cell)| Cell {
                column: *column,
                value: cell.value.clone(),
            })
            .collect())
    }

    async fn scan_ascending(
        &self,
        table: Table,
        row: &RowKey,
        min: Version,
        limit: usize,
    ) -> Result<Vec<Cell>, EngineError> {
        self.check_faults(Some(table), StoreOp::Scan).await?;
        let now = Instant::now();
        let rows = self.rows.read();
        let Some(columns) = rows.get(&(table, row.clone())) else {
            return Ok(Vec::new());
        };
        Ok(columns
            .range((Bound::Included(min), Bound::Unbounded))
            .filter(|(_, cell)| cell.is_live(now))
            .take(limit)
            .map(|(column, cell)| Cell {
                column: *column,
                value: cell.value.clone(),
            })
            .collect())
    }

    async fn delete(&self, table: Table, row: &RowKey, column: Version) -> Result<(), EngineError> {
        self.check_faults(Some(table), StoreOp::Delete).await?;
        let mut rows = self.rows.write();
        let key = (table, row.clone());
        if let Some(columns) = rows.get_mut(&key) {
            columns.remove(&column);
            if columns.is_empty() {
                rows.remove(&key);
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), EngineError> {
        self.check_faults(None, StoreOp::Ping).await
    }
}

#[cfg(test)]
mod tests {
    use super::{Fault, MemoryColumnStore, StoreOp};
    use crate::store::{ColumnStore, RowKey, Table};
    use crate::version::Version;
    use std::time::Duration;

    fn v(micros: u64) -> Version {
        Version::new(micros, 0, 0)
    }

    #[tokio::test]
    async fn scans_respect_bounds_order_and_limit() {
        let store = MemoryColumnStore::new();
        let row = RowKey::from_bytes(b"row".to_vec());
        for micros in 1..=5 {
            store
                .put(Table::EntityLog, &row, v(micros), vec![micros as u8], None)
                .await
                .expect("put");
        }
        let desc = store
            .scan_descending(Table::EntityLog, &row, v(4), 2)
            .await
            .expect("desc");
        assert_eq!(
            desc.iter().map(|c| c.column).collect::<Vec<_>>(),
            vec![v(4), v(3)]
        );
        let asc = store
            .scan_ascending(Table::EntityLog, &row, v(2), 10)
            .await
            .expect("asc");
        assert_eq!(
            asc.iter().map(|c| c.column).collect::<Vec<_>>(),
            vec![v(2), v(3), v(4), v(5)]
        );
        let other_table = store
            .scan_descending(Table::EntityVersionData, &row, Version::MAX, 10)
            .await
            .expect("other");
        assert!(other_table.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expiring_cells_disappear() {
        let store = MemoryColumnStore::new();
        let row = RowKey::from_bytes(b"row".to_vec());
        store
            .put(
                Table::EntityLog,
                &row,
                v(1),
                vec![1],
                Some(Duration::from_secs(10)),
            )
            .await
            .expect("put");
        assert_eq!(store.cell_count(Table::EntityLog), 1);
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.cell_count(Table::EntityLog), 0);
        assert!(
            store
                .get(Table::EntityLog, &row, v(1))
                .await
                .expect("get")
                .is_none()
        );
    }

    #[tokio::test]
    async fn faults_skip_then_fire_then_clear() {
        let store = MemoryColumnStore::new();
        let row = RowKey::from_bytes(b"row".to_vec());
        store.inject(
            Fault::unavailable()
                .on_table(Table::EntityLog)
                .on_op(StoreOp::Put)
                .after(1),
        );
        store
            .put(Table::EntityLog, &row, v(1), vec![1], None)
            .await
            .expect("first put passes");
        store
            .put(Table::EntityVersionData, &row, v(1), vec![1], None)
            .await
            .expect("other table unaffected");
        let err = store
            .put(Table::EntityLog, &row, v(2), vec![2], None)
            .await
            .expect_err("second put fails");
        assert_eq!(err.code_str(), "store_unavailable");
        store
            .put(Table::EntityLog, &row, v(3), vec![3], None)
            .await
            .expect("fault exhausted");
        assert_eq!(store.cell_count(Table::EntityLog), 2);
    }
}
