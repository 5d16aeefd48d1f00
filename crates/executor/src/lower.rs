//! Lowering: turns a logical plan tree into an [`ExecutionPlan`].
//!
//! Each node becomes one stage appended after its input's stages, so the
//! stage list comes out in reverse topological order. A kNN node over a
//! plain scan collapses into a single combined scan-kNN task; a ranged
//! scan with parallelism > 1 fans out into sub-scans merged with `All`.

use common::{DbError, DbResult};
use planner::PlanNode;

use crate::fetch::FetchTask;
use crate::filter::FilterTask;
use crate::knn_task::{KnnRecordsTask, ScanKnnTask};
use crate::limit::LimitTask;
use crate::project::ProjectionTask;
use crate::scan::{FullScanTask, RangedScanTask, SampledScanTask};
use crate::{ExecutionPlan, Stage, partition_range};

pub fn lower(plan: &PlanNode) -> DbResult<ExecutionPlan> {
    let mut stages = Vec::new();
    lower_into(plan, &mut stages)?;
    Ok(ExecutionPlan { stages })
}

fn lower_into(node: &PlanNode, stages: &mut Vec<Stage>) -> DbResult<()> {
    let cost = node.cost().total();
    match node {
        PlanNode::FullScan {
            entity, columns, ..
        } => {
            stages.push(Stage::one(Box::new(FullScanTask {
                entity: entity.clone(),
                columns: columns.clone(),
                cost,
            })));
        }
        PlanNode::RangedScan {
            entity,
            columns,
            start,
            end,
            parallelism,
        } => {
            // Plan-level ranges are inclusive; the runtime works on
            // half-open ranges.
            let (lo, hi) = (*start, *end + 1);
            if *parallelism > 1 {
                let tasks = partition_range(lo, hi, *parallelism)
                    .into_iter()
                    .map(|(lo, hi)| {
                        Box::new(RangedScanTask {
                            entity: entity.clone(),
                            columns: columns.clone(),
                            lo,
                            hi,
                            cost: cost / *parallelism as f64,
                        }) as Box<dyn crate::Task>
                    })
                    .collect();
                stages.push(Stage::all(tasks));
            } else {
                stages.push(Stage::one(Box::new(RangedScanTask {
                    entity: entity.clone(),
                    columns: columns.clone(),
                    lo,
                    hi,
                    cost,
                })));
            }
        }
        PlanNode::SampledScan {
            entity,
            columns,
            size,
            seed,
        } => {
            stages.push(Stage::one(Box::new(SampledScanTask {
                entity: entity.clone(),
                columns: columns.clone(),
                size: *size,
                seed: *seed,
                cost,
            })));
        }
        PlanNode::Filter { input, predicate } => {
            lower_into(input, stages)?;
            stages.push(Stage::one(Box::new(FilterTask {
                predicate: predicate.clone(),
                cost,
            })));
        }
        PlanNode::Knn {
            input,
            column,
            queries,
            weights,
            k,
            distance,
            predicate,
            parallelism,
        } => match input.as_ref() {
            PlanNode::FullScan {
                entity, columns, ..
            } => {
                stages.push(Stage::one(Box::new(ScanKnnTask {
                    entity: entity.clone(),
                    scan_columns: knn_first(columns, column.name.simple())?,
                    queries: queries.clone(),
                    weights: weights.clone(),
                    k: *k,
                    distance: *distance,
                    predicate: predicate.clone(),
                    range: None,
                    parallelism: *parallelism,
                    cost,
                })));
            }
            PlanNode::RangedScan {
                entity,
                columns,
                start,
                end,
                ..
            } => {
                stages.push(Stage::one(Box::new(ScanKnnTask {
                    entity: entity.clone(),
                    scan_columns: knn_first(columns, column.name.simple())?,
                    queries: queries.clone(),
                    weights: weights.clone(),
                    k: *k,
                    distance: *distance,
                    predicate: predicate.clone(),
                    range: Some((*start, *end + 1)),
                    parallelism: *parallelism,
                    cost,
                })));
            }
            other => {
                // Generic form: materialise the input, then rank it.
                lower_into(other, stages)?;
                stages.push(Stage::one(Box::new(KnnRecordsTask {
                    column: column.name.simple().to_string(),
                    queries: queries.clone(),
                    weights: weights.clone(),
                    k: *k,
                    distance: *distance,
                    cost,
                })));
            }
        },
        PlanNode::Fetch {
            input,
            entity,
            columns,
        } => {
            lower_into(input, stages)?;
            stages.push(Stage::one(Box::new(FetchTask {
                entity: entity.clone(),
                columns: columns.clone(),
                cost,
            })));
        }
        PlanNode::Projection { input, op, fields } => {
            lower_into(input, stages)?;
            stages.push(Stage::one(Box::new(ProjectionTask {
                op: *op,
                fields: fields.clone(),
                cost,
            })));
        }
        PlanNode::Limit { input, limit, skip } => {
            lower_into(input, stages)?;
            stages.push(Stage::one(Box::new(LimitTask {
                limit: *limit,
                skip: *skip,
            })));
        }
    }
    Ok(())
}

/// Scan columns with the kNN column moved to the front, where the task
/// expects it.
fn knn_first(
    columns: &[common::ColumnDef],
    knn_column: &str,
) -> DbResult<Vec<common::ColumnDef>> {
    let idx = columns
        .iter()
        .position(|c| c.name.simple() == knn_column)
        .ok_or_else(|| {
            DbError::Execution(format!("scan does not project knn column '{knn_column}'"))
        })?;
    let mut out = columns.to_vec();
    let first = out.remove(idx);
    out.insert(0, first);
    Ok(out)
}
