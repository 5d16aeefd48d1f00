//! Execution engine: lowers plan trees into stages of tasks and drives
//! them to a record set.
//!
//! A [`Task`] is a stateless unit of work with a stable identity and a
//! cost estimate; a [`Stage`] is a set of tasks that may run in parallel
//! plus a merge rule for their outputs. An [`ExecutionPlan`] lists stages
//! in reverse topological order (leaves first); each stage consumes the
//! merged output of its predecessor.
//!
//! The first task failure cancels its siblings through the shared
//! [`CancellationToken`] and fails the plan. Timeouts are external
//! cancellation with a deadline attached.

#[cfg(test)]
mod tests;

mod fetch;
mod filter;
mod knn_task;
mod limit;
mod lower;
mod project;
mod scan;

pub use lower::lower;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use common::{DbError, DbResult, RecordSet};
use entity::Entity;
use protocol::EntityRef;
use rayon::prelude::*;

/// Rows processed between two cancellation polls.
pub(crate) const CANCEL_BATCH: usize = 1024;

/// Resolves entity references for running tasks.
pub trait EntitySource: Send + Sync {
    fn entity(&self, entity: &EntityRef) -> DbResult<Arc<Entity>>;
}

/// Cooperative cancellation signal, polled at row-batch boundaries. An
/// expired deadline reads as a timeout, an explicit cancel as
/// cancellation.
#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Errs with the appropriate kind once the signal fires.
    pub fn check(&self) -> DbResult<()> {
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            self.cancel();
            return Err(DbError::Timeout("query deadline exceeded".into()));
        }
        if self.flag.load(Ordering::Acquire) {
            return Err(DbError::Cancelled("query was cancelled".into()));
        }
        Ok(())
    }
}

/// Everything a task needs at runtime.
pub struct TaskContext<'a> {
    pub entities: &'a dyn EntitySource,
    pub cancellation: &'a CancellationToken,
}

/// A stateless unit of execution.
pub trait Task: Send + Sync {
    /// Stable identity string for logs and plan displays.
    fn id(&self) -> String;

    /// Cost estimate inherited from the plan node.
    fn cost(&self) -> f64;

    /// Produces this task's record set. `input` is the merged output of
    /// the previous stage, if any.
    fn execute(&self, ctx: &TaskContext<'_>, input: Option<&RecordSet>) -> DbResult<RecordSet>;
}

/// How a stage combines its tasks' outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Merge {
    /// Exactly one task; its output passes through.
    One,
    /// Outputs concatenated in task declaration order, per-task row order
    /// preserved.
    All,
}

/// A set of parallel tasks plus their merge rule.
pub struct Stage {
    pub tasks: Vec<Box<dyn Task>>,
    pub merge: Merge,
}

impl Stage {
    pub fn one(task: Box<dyn Task>) -> Self {
        Self {
            tasks: vec![task],
            merge: Merge::One,
        }
    }

    pub fn all(tasks: Vec<Box<dyn Task>>) -> Self {
        Self {
            tasks,
            merge: Merge::All,
        }
    }
}

/// Stages in reverse topological order: evaluating them front to back
/// satisfies every dependency.
pub struct ExecutionPlan {
    pub stages: Vec<Stage>,
}

impl ExecutionPlan {
    /// Total cost across all tasks.
    pub fn cost(&self) -> f64 {
        self.stages
            .iter()
            .flat_map(|s| s.tasks.iter())
            .map(|t| t.cost())
            .sum()
    }
}

/// Drives an [`ExecutionPlan`] to completion.
pub struct Executor;

impl Executor {
    /// Runs every stage in order; within a stage, tasks run concurrently.
    /// The first failure cancels the remaining tasks and fails the plan.
    pub fn execute(plan: &ExecutionPlan, ctx: &TaskContext<'_>) -> DbResult<RecordSet> {
        let mut current: Option<RecordSet> = None;

        for (index, stage) in plan.stages.iter().enumerate() {
            ctx.cancellation.check()?;
            tracing::debug!(stage = index, tasks = stage.tasks.len(), "executing stage");

            let input = current.as_ref();
            let results: Vec<DbResult<RecordSet>> = if stage.tasks.len() == 1 {
                vec![stage.tasks[0].execute(ctx, input)]
            } else {
                stage
                    .tasks
                    .par_iter()
                    .map(|task| {
                        let result = task.execute(ctx, input);
                        if result.is_err() {
                            // Fail fast: siblings observe the flag at
                            // their next batch boundary.
                            ctx.cancellation.cancel();
                        }
                        result
                    })
                    .collect()
            };

            current = Some(merge_outputs(stage, results)?);
        }

        current.ok_or_else(|| DbError::Execution("empty execution plan".into()))
    }
}

/// Applies the stage's merge rule, surfacing the most meaningful error:
/// the first failure that is not a secondary cancellation, if any.
fn merge_outputs(stage: &Stage, results: Vec<DbResult<RecordSet>>) -> DbResult<RecordSet> {
    if results.iter().any(|r| r.is_err()) {
        let mut first_error = None;
        for result in results {
            if let Err(err) = result {
                if !matches!(err, DbError::Cancelled(_)) {
                    return Err(err);
                }
                first_error.get_or_insert(err);
            }
        }
        return Err(first_error.expect("at least one error"));
    }

    let mut outputs: Vec<RecordSet> = results.into_iter().map(|r| r.unwrap()).collect();
    match stage.merge {
        Merge::One => {
            if outputs.len() != 1 {
                return Err(DbError::Execution(format!(
                    "ONE-merge stage produced {} outputs",
                    outputs.len()
                )));
            }
            Ok(outputs.pop().unwrap())
        }
        Merge::All => {
            let mut merged = outputs.remove(0);
            for output in outputs {
                merged.extend(output)?;
            }
            Ok(merged)
        }
    }
}

/// Splits `[lo, hi)` into `n` contiguous sub-ranges of near-equal width.
pub(crate) fn partition_range(lo: u64, hi: u64, n: usize) -> Vec<(u64, u64)> {
    let n = n.max(1) as u64;
    let width = hi.saturating_sub(lo);
    if width == 0 {
        return vec![(lo, hi)];
    }
    let n = n.min(width);
    let chunk = width / n;
    let remainder = width % n;
    let mut out = Vec::with_capacity(n as usize);
    let mut start = lo;
    for i in 0..n {
        let extra = if i < remainder { 1 } else { 0 };
        let end = start + chunk + extra;
        out.push((start, end));
        start = end;
    }
    out
}
