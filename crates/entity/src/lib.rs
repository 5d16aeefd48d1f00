//! Entity runtime: per-column stores behind a buffer pool, a monotone
//! tuple-id watermark, and scoped read/write transactions.
//!
//! Tuple ids start at 1 and are assigned in insertion order; they are
//! never reused. A read transaction takes the entity gate in shared mode,
//! so any number of scans (including the parallel sub-scans of a kNN
//! task) proceed concurrently; a write transaction is exclusive. Page
//! accesses serialise only on the pager mutex, held per slot access.


use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use buffer::{FilePager, Pager};
use catalog::{ColumnMeta, EntityMeta};
use common::{ColumnDef, Config, DbError, DbResult, PageId, TupleId};
use expr::Predicate;
use parking_lot::{Mutex, RwLock};
use storage::{Page, StoreHeader, slots};
use types::Value;

/// A physical table: one column store per column.
pub struct Entity {
    schema: String,
    name: String,
    columns: Vec<ColumnMeta>,
    page_size: usize,
    gate: RwLock<()>,
    pager: Mutex<FilePager>,
    row_count: AtomicU64,
}

impl Entity {
    /// Opens (or initialises) the entity's column stores under
    /// `data_dir/schema/entity`.
    pub fn open(
        schema: &str,
        meta: &EntityMeta,
        data_dir: &Path,
        config: &Config,
    ) -> DbResult<Self> {
        let dir = data_dir.join(schema).join(&meta.name);
        std::fs::create_dir_all(&dir)?;
        let mut pager = FilePager::new(&dir, config);

        let mut row_count: Option<u64> = None;
        for column in meta.columns() {
            let count = init_store(&mut pager, column, config.page_size)?;
            match row_count {
                None => row_count = Some(count),
                Some(existing) if existing == count => {}
                Some(existing) => {
                    return Err(DbError::Storage(format!(
                        "column stores of '{schema}.{}' disagree on row count ({existing} vs {count})",
                        meta.name
                    )));
                }
            }
        }

        let row_count = row_count.unwrap_or(0);
        tracing::debug!(
            entity = %format!("{schema}.{}", meta.name),
            rows = row_count,
            "entity opened"
        );
        Ok(Self {
            schema: schema.to_string(),
            name: meta.name.clone(),
            columns: meta.columns().to_vec(),
            page_size: config.page_size,
            gate: RwLock::new(()),
            pager: Mutex::new(pager),
            row_count: AtomicU64::new(row_count),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Number of stored rows; also the highest assigned tuple id.
    pub fn max_tuple_id(&self) -> u64 {
        self.row_count.load(Ordering::Acquire)
    }

    /// Runs `f` inside a write transaction (exclusive with every other
    /// transaction). The transaction is released on all exit paths.
    pub fn write<R>(&self, f: impl FnOnce(&WriteTx<'_>) -> DbResult<R>) -> DbResult<R> {
        let _guard = self.gate.write();
        f(&WriteTx { entity: self })
    }

    /// Runs `f` inside a read transaction projected onto `columns`.
    /// Concurrent read transactions are permitted; the transaction is
    /// released on all exit paths.
    pub fn scan<R>(
        &self,
        columns: &[&str],
        f: impl FnOnce(&ScanTx<'_>) -> DbResult<R>,
    ) -> DbResult<R> {
        let _guard = self.gate.read();
        let projected = self.resolve(columns)?;
        f(&ScanTx {
            entity: self,
            columns: projected,
        })
    }

    fn resolve(&self, columns: &[&str]) -> DbResult<Vec<ColumnMeta>> {
        columns
            .iter()
            .map(|name| {
                self.columns
                    .iter()
                    .find(|c| c.def.name.simple() == *name)
                    .cloned()
                    .ok_or_else(|| {
                        DbError::Bind(format!(
                            "unknown column '{name}' on entity '{}.{}'",
                            self.schema, self.name
                        ))
                    })
            })
            .collect()
    }

    /// Reads one column value of one tuple. The caller holds the gate.
    fn read_slot(&self, column: &ColumnMeta, tuple_id: u64) -> DbResult<Value> {
        let (data_page, offset) = slots::locate(
            tuple_id - 1,
            self.page_size,
            &column.def.column_type,
        );
        let mut pager = self.pager.lock();
        let page = pager.read_page(column.id, PageId(1 + data_page))?;
        slots::read_value(page, offset, &column.def.column_type)
    }

    /// Flushes every dirty page to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.pager.lock().flush()
    }
}

/// Creates the store header on first open, or validates it afterwards.
/// Returns the persisted row count.
fn init_store(pager: &mut FilePager, column: &ColumnMeta, page_size: usize) -> DbResult<u64> {
    if pager.num_pages(column.id)? == 0 {
        let header = StoreHeader::new(column.def.column_type, column.def.nullable);
        let pid = pager.allocate_page(column.id)?;
        debug_assert_eq!(pid, PageId(0));
        header.write_to(pager.fetch_page_mut(column.id, pid)?)?;
        pager.flush()?;
        return Ok(0);
    }
    let page = pager.read_page(column.id, PageId(0))?;
    let header = StoreHeader::read_from(page)?;
    if header.column_type != column.def.column_type || header.nullable != column.def.nullable {
        return Err(DbError::Storage(format!(
            "column store for {} does not match its declared type {}",
            column.def.name, column.def.column_type
        )));
    }
    Ok(header.row_count)
}

/// Exclusive transaction: appends rows and maintains store headers.
pub struct WriteTx<'a> {
    entity: &'a Entity,
}

impl WriteTx<'_> {
    /// Appends one row (values in declaration order) and returns its
    /// tuple id. Missing trailing values are filled with the column
    /// defaults.
    pub fn append(&self, mut values: Vec<Value>) -> DbResult<TupleId> {
        let entity = self.entity;
        if values.len() > entity.columns.len() {
            return Err(DbError::Type(format!(
                "row has {} values but entity '{}.{}' has {} columns",
                values.len(),
                entity.schema,
                entity.name,
                entity.columns.len()
            )));
        }
        while values.len() < entity.columns.len() {
            values.push(entity.columns[values.len()].def.default_value());
        }
        for (column, value) in entity.columns.iter().zip(values.iter()) {
            column.def.validate(value)?;
        }

        let row = entity.row_count.load(Ordering::Acquire);
        let tuple_id = TupleId(row + 1);

        let mut pager = entity.pager.lock();
        for (column, value) in entity.columns.iter().zip(values.iter()) {
            write_slot(&mut pager, column, entity.page_size, row, value)?;
            // Header row count tracks the watermark per store.
            let page = pager.fetch_page_mut(column.id, PageId(0))?;
            let mut header = StoreHeader::read_from(page)?;
            header.row_count = row + 1;
            header.write_to(page)?;
        }
        drop(pager);

        entity.row_count.store(row + 1, Ordering::Release);
        Ok(tuple_id)
    }

    /// Flushes every dirty page to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.entity.flush()
    }
}

fn write_slot(
    pager: &mut FilePager,
    column: &ColumnMeta,
    page_size: usize,
    row: u64,
    value: &Value,
) -> DbResult<()> {
    let (data_page, offset) = slots::locate(row, page_size, &column.def.column_type);
    let pid = PageId(1 + data_page);
    // Grow the file up to (and including) the target page.
    while pager.num_pages(column.id)? <= pid.0 {
        pager.allocate_page(column.id)?;
    }
    let page: &mut Page = pager.fetch_page_mut(column.id, pid)?;
    slots::write_value(page, offset, &column.def.column_type, value)
}

/// Read-only cursor over an entity's rows, projected onto a fixed column
/// subset, in ascending tuple-id order.
pub struct ScanTx<'a> {
    entity: &'a Entity,
    columns: Vec<ColumnMeta>,
}

impl ScanTx<'_> {
    /// Projected column definitions, in projection order.
    pub fn columns(&self) -> Vec<ColumnDef> {
        self.columns.iter().map(|c| c.def.clone()).collect()
    }

    pub fn count(&self) -> u64 {
        self.entity.max_tuple_id()
    }

    pub fn max_tuple_id(&self) -> u64 {
        self.entity.max_tuple_id()
    }

    /// Reads the projected values of one tuple.
    pub fn read(&self, tuple_id: TupleId) -> DbResult<Vec<Value>> {
        if tuple_id.0 == 0 || tuple_id.0 > self.entity.max_tuple_id() {
            return Err(DbError::Execution(format!(
                "tuple id {} out of range for entity '{}.{}'",
                tuple_id.0, self.entity.schema, self.entity.name
            )));
        }
        self.columns
            .iter()
            .map(|c| self.entity.read_slot(c, tuple_id.0))
            .collect()
    }

    /// Iterates every row in tuple-id order.
    pub fn for_each(
        &self,
        action: impl FnMut(TupleId, &[Value]) -> DbResult<()>,
    ) -> DbResult<()> {
        self.for_each_range(1, self.entity.max_tuple_id() + 1, action)
    }

    /// Iterates tuple ids in `[lo, hi)`, clamped to the stored range.
    pub fn for_each_range(
        &self,
        lo: u64,
        hi: u64,
        mut action: impl FnMut(TupleId, &[Value]) -> DbResult<()>,
    ) -> DbResult<()> {
        let lo = lo.max(1);
        let hi = hi.min(self.entity.max_tuple_id() + 1);
        let mut values = Vec::with_capacity(self.columns.len());
        for tid in lo..hi {
            values.clear();
            for column in &self.columns {
                values.push(self.entity.read_slot(column, tid)?);
            }
            action(TupleId(tid), &values)?;
        }
        Ok(())
    }

    /// Iterates only rows satisfying `predicate`, which may reference any
    /// projected column.
    pub fn for_each_filtered(
        &self,
        predicate: &Predicate,
        action: impl FnMut(TupleId, &[Value]) -> DbResult<()>,
    ) -> DbResult<()> {
        self.for_each_filtered_range(1, self.entity.max_tuple_id() + 1, predicate, action)
    }

    /// Ranged variant of [`ScanTx::for_each_filtered`].
    pub fn for_each_filtered_range(
        &self,
        lo: u64,
        hi: u64,
        predicate: &Predicate,
        mut action: impl FnMut(TupleId, &[Value]) -> DbResult<()>,
    ) -> DbResult<()> {
        let defs = self.columns();
        self.for_each_range(lo, hi, |tid, values| {
            if predicate.eval(&defs, values)? {
                action(tid, values)?;
            }
            Ok(())
        })
    }
}
