//! k-nearest-neighbour tasks.
//!
//! The scan form owns one bounded heap per query vector and partitions
//! the tuple-id space into contiguous ranges scanned in parallel; each
//! sub-scan shares the task's heaps and takes a heap's mutex only for the
//! O(log k) admission. The record form evaluates an already-materialised
//! input instead.

use common::{ColumnDef, DbError, DbResult, RecordSet, TupleId};
use distance::Distance;
use expr::Predicate;
use knn::BoundedHeap;
use parking_lot::Mutex;
use planner::distance_column;
use protocol::EntityRef;
use rayon::prelude::*;
use types::Value;

use crate::{CANCEL_BATCH, Task, TaskContext, partition_range};

/// Combined scan-kNN(-with-filter) task over an entity.
pub struct ScanKnnTask {
    pub entity: EntityRef,
    /// Scanned columns; the kNN column is first, any predicate columns
    /// follow.
    pub scan_columns: Vec<ColumnDef>,
    pub queries: Vec<Value>,
    pub weights: Option<Vec<Value>>,
    pub k: usize,
    pub distance: Distance,
    pub predicate: Option<Predicate>,
    /// Tuple-id range `[lo, hi)`; `None` scans the whole entity.
    pub range: Option<(u64, u64)>,
    pub parallelism: usize,
    pub cost: f64,
}

impl Task for ScanKnnTask {
    fn id(&self) -> String {
        format!(
            "knn[{}.{}.{}][{:?} k={} m={}]",
            self.entity.schema,
            self.entity.entity,
            self.scan_columns[0].name.simple(),
            self.distance,
            self.k,
            self.queries.len()
        )
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn execute(&self, ctx: &TaskContext<'_>, _input: Option<&RecordSet>) -> DbResult<RecordSet> {
        let entity = ctx.entities.entity(&self.entity)?;
        let heaps: Vec<Mutex<BoundedHeap>> = self
            .queries
            .iter()
            .map(|_| Mutex::new(BoundedHeap::new(self.k)))
            .collect();

        let (lo, hi) = self
            .range
            .unwrap_or_else(|| (1, entity.max_tuple_id() + 1));
        let partitions = partition_range(lo, hi, self.parallelism);
        tracing::debug!(task = %self.id(), partitions = partitions.len(), "knn scan");

        if partitions.len() == 1 {
            self.scan_partition(ctx, &entity, partitions[0], &heaps)?;
        } else {
            // The barrier: collect() joins every sub-scan before the
            // heaps are drained.
            let results: Vec<DbResult<()>> = partitions
                .par_iter()
                .map(|part| self.scan_partition(ctx, &entity, *part, &heaps))
                .collect();
            for result in results {
                result?;
            }
        }

        materialise(&heaps)
    }
}

impl ScanKnnTask {
    fn scan_partition(
        &self,
        ctx: &TaskContext<'_>,
        entity: &entity::Entity,
        (lo, hi): (u64, u64),
        heaps: &[Mutex<BoundedHeap>],
    ) -> DbResult<()> {
        let names: Vec<&str> = self
            .scan_columns
            .iter()
            .map(|c| c.name.simple())
            .collect();
        entity.scan(&names, |tx| {
            let defs = tx.columns();
            let mut batch = 0usize;
            tx.for_each_range(lo, hi, |tid, values| {
                batch += 1;
                if batch % CANCEL_BATCH == 0 {
                    ctx.cancellation.check()?;
                }
                if let Some(predicate) = &self.predicate
                    && !predicate.eval(&defs, values)?
                {
                    return Ok(());
                }
                admit(
                    tid,
                    &values[0],
                    &self.queries,
                    self.weights.as_deref(),
                    self.distance,
                    heaps,
                )
            })
        })
    }
}

/// kNN over the rows of an upstream record set.
pub struct KnnRecordsTask {
    pub column: String,
    pub queries: Vec<Value>,
    pub weights: Option<Vec<Value>>,
    pub k: usize,
    pub distance: Distance,
    pub cost: f64,
}

impl Task for KnnRecordsTask {
    fn id(&self) -> String {
        format!(
            "knn[{}][{:?} k={} m={}]",
            self.column,
            self.distance,
            self.k,
            self.queries.len()
        )
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn execute(&self, ctx: &TaskContext<'_>, input: Option<&RecordSet>) -> DbResult<RecordSet> {
        let input = input.ok_or_else(|| {
            DbError::Execution(format!("task {} requires an input record set", self.id()))
        })?;
        let idx = input.column_index(&self.column).ok_or_else(|| {
            DbError::Execution(format!("input lacks knn column '{}'", self.column))
        })?;

        let heaps: Vec<Mutex<BoundedHeap>> = self
            .queries
            .iter()
            .map(|_| Mutex::new(BoundedHeap::new(self.k)))
            .collect();

        for (i, record) in input.iter().enumerate() {
            if (i + 1) % CANCEL_BATCH == 0 {
                ctx.cancellation.check()?;
            }
            admit(
                record.tuple_id,
                &record.values[idx],
                &self.queries,
                self.weights.as_deref(),
                self.distance,
                &heaps,
            )?;
        }

        materialise(&heaps)
    }
}

/// Evaluates every query against one candidate and offers the pair to the
/// corresponding heap. Null candidates are skipped, never an error.
fn admit(
    tid: TupleId,
    candidate: &Value,
    queries: &[Value],
    weights: Option<&[Value]>,
    distance: Distance,
    heaps: &[Mutex<BoundedHeap>],
) -> DbResult<()> {
    if candidate.is_null() {
        return Ok(());
    }
    for (i, query) in queries.iter().enumerate() {
        let d = match weights {
            Some(w) => distance.compute_weighted(query, candidate, &w[i])?,
            None => distance.compute(query, candidate)?,
        };
        heaps[i].lock().insert(tid, d);
    }
    Ok(())
}

/// Drains the heaps into the result set: one `[distance]` column, `m × k`
/// rows, heap-ascending within each group, groups in query order, tuple
/// ids carried in the record-set lane.
fn materialise(heaps: &[Mutex<BoundedHeap>]) -> DbResult<RecordSet> {
    let mut out = RecordSet::new(vec![distance_column()]);
    for heap in heaps {
        for neighbour in heap.lock().ascending() {
            out.append(neighbour.tuple_id, vec![Value::Double(neighbour.distance)])?;
        }
    }
    Ok(out)
}
