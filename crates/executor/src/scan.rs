//! Scan tasks: full, ranged and sampled entity scans.

use common::{ColumnDef, DbResult, RecordSet};
use protocol::EntityRef;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{CANCEL_BATCH, Task, TaskContext};

fn column_names(columns: &[ColumnDef]) -> Vec<&str> {
    columns.iter().map(|c| c.name.simple()).collect()
}

/// Scans every row of an entity in tuple-id order.
pub struct FullScanTask {
    pub entity: EntityRef,
    pub columns: Vec<ColumnDef>,
    pub cost: f64,
}

impl Task for FullScanTask {
    fn id(&self) -> String {
        format!("scan[{}.{}]", self.entity.schema, self.entity.entity)
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn execute(&self, ctx: &TaskContext<'_>, _input: Option<&RecordSet>) -> DbResult<RecordSet> {
        let entity = ctx.entities.entity(&self.entity)?;
        let names = column_names(&self.columns);
        entity.scan(&names, |tx| {
            let mut out = RecordSet::new(self.columns.clone());
            let mut batch = 0usize;
            tx.for_each(|tid, values| {
                batch += 1;
                if batch % CANCEL_BATCH == 0 {
                    ctx.cancellation.check()?;
                }
                out.append(tid, values.to_vec())
            })?;
            Ok(out)
        })
    }
}

/// Scans tuple ids in `[lo, hi)`.
pub struct RangedScanTask {
    pub entity: EntityRef,
    pub columns: Vec<ColumnDef>,
    pub lo: u64,
    pub hi: u64,
    pub cost: f64,
}

impl Task for RangedScanTask {
    fn id(&self) -> String {
        format!(
            "scan[{}.{}][{}..{}]",
            self.entity.schema, self.entity.entity, self.lo, self.hi
        )
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn execute(&self, ctx: &TaskContext<'_>, _input: Option<&RecordSet>) -> DbResult<RecordSet> {
        let entity = ctx.entities.entity(&self.entity)?;
        let names = column_names(&self.columns);
        entity.scan(&names, |tx| {
            let mut out = RecordSet::new(self.columns.clone());
            let mut batch = 0usize;
            tx.for_each_range(self.lo, self.hi, |tid, values| {
                batch += 1;
                if batch % CANCEL_BATCH == 0 {
                    ctx.cancellation.check()?;
                }
                out.append(tid, values.to_vec())
            })?;
            Ok(out)
        })
    }
}

/// Scans `size` rows drawn without replacement by a seeded PRNG. Replays
/// with the same seed visit the same tuple ids; results are emitted in
/// tuple-id order like every other scan.
pub struct SampledScanTask {
    pub entity: EntityRef,
    pub columns: Vec<ColumnDef>,
    pub size: u64,
    pub seed: u64,
    pub cost: f64,
}

impl Task for SampledScanTask {
    fn id(&self) -> String {
        format!(
            "scan[{}.{}][sample {} seed {}]",
            self.entity.schema, self.entity.entity, self.size, self.seed
        )
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn execute(&self, ctx: &TaskContext<'_>, _input: Option<&RecordSet>) -> DbResult<RecordSet> {
        let entity = ctx.entities.entity(&self.entity)?;
        let names = column_names(&self.columns);
        let max = entity.max_tuple_id();

        let ids = sample_tuple_ids(self.size, self.seed, max);
        entity.scan(&names, |tx| {
            let mut out = RecordSet::new(self.columns.clone());
            for (i, tid) in ids.iter().enumerate() {
                if (i + 1) % CANCEL_BATCH == 0 {
                    ctx.cancellation.check()?;
                }
                let values = tx.read(common::TupleId(*tid))?;
                out.append(common::TupleId(*tid), values)?;
            }
            Ok(out)
        })
    }
}

/// Draws `size` distinct tuple ids from `1..=max`, sorted ascending.
fn sample_tuple_ids(size: u64, seed: u64, max: u64) -> Vec<u64> {
    if max == 0 {
        return Vec::new();
    }
    if size >= max {
        return (1..=max).collect();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut chosen = std::collections::BTreeSet::new();
    while (chosen.len() as u64) < size {
        chosen.insert(rng.gen_range(1..=max));
    }
    chosen.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_is_deterministic_per_seed() {
        let a = sample_tuple_ids(10, 42, 1000);
        let b = sample_tuple_ids(10, 42, 1000);
        let c = sample_tuple_ids(10, 43, 1000);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 10);
    }

    #[test]
    fn sampling_is_without_replacement_and_sorted() {
        let ids = sample_tuple_ids(50, 7, 60);
        let mut dedup = ids.clone();
        dedup.dedup();
        assert_eq!(ids.len(), dedup.len());
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(ids.iter().all(|id| (1..=60).contains(id)));
    }

    #[test]
    fn oversized_sample_degenerates_to_a_full_scan() {
        assert_eq!(sample_tuple_ids(100, 1, 5), vec![1, 2, 3, 4, 5]);
        assert!(sample_tuple_ids(3, 1, 0).is_empty());
    }
}
