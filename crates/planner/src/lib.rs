//! Query planner: binds structured query messages to logical plan trees
//! and rewrites them for execution.
//!
//! A plan is an immutable tree of operator nodes. Each node publishes an
//! output-row estimate and a cost triple; rewrite rules are pure
//! `PlanNode -> PlanNode` functions that rebuild the tree rather than
//! mutating it.
//!
//! ```text
//! protocol::Query
//!     ↓  bind (catalogue lookups, validation)
//! PlanNode tree
//!     ↓  optimize (filter-into-knn merge)
//! PlanNode tree
//!     ↓  executor::lower
//! ExecutionPlan (stages of tasks)
//! ```

#[cfg(test)]
mod tests;

mod bind;
mod rules;

pub use bind::Binder;
pub use rules::optimize;

use std::fmt;
use std::ops::Add;

use common::{ColumnDef, ColumnName};
use distance::Distance;
use expr::Predicate;
use protocol::{EntityRef, ProjectionField, ProjectionOp};
use types::{ColumnType, Value};

/// Cost of reading one column value from disk.
pub const DISK_READ_COST: f64 = 1e-4;
/// Cost of touching one value in memory.
pub const MEM_READ_COST: f64 = 1e-6;

/// Cost triple: disk reads, CPU/memory work, materialised bytes.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Cost {
    pub io: f64,
    pub cpu: f64,
    pub bytes: f64,
}

impl Cost {
    pub fn new(io: f64, cpu: f64, bytes: f64) -> Self {
        Self { io, cpu, bytes }
    }

    /// Scalar summary used for comparisons.
    pub fn total(&self) -> f64 {
        self.io + self.cpu
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost {
            io: self.io + rhs.io,
            cpu: self.cpu + rhs.cpu,
            bytes: self.bytes + rhs.bytes,
        }
    }
}

/// A node of the logical plan. Nodes are value types compared
/// structurally; the tree is rebuilt by rewrites, never mutated.
#[derive(Clone, Debug, PartialEq)]
pub enum PlanNode {
    /// Scan every row of an entity, projected onto `columns`.
    FullScan {
        entity: EntityRef,
        columns: Vec<ColumnDef>,
        rows: u64,
    },
    /// Scan tuple ids `start..=end` (`0 < start < end ≤ max tuple id`).
    RangedScan {
        entity: EntityRef,
        columns: Vec<ColumnDef>,
        start: u64,
        end: u64,
        parallelism: usize,
    },
    /// Scan `size` rows drawn by a seeded PRNG; same seed, same rows.
    SampledScan {
        entity: EntityRef,
        columns: Vec<ColumnDef>,
        size: u64,
        seed: u64,
    },
    /// Fetch additional columns of the input's tuple ids from an entity.
    Fetch {
        input: Box<PlanNode>,
        entity: EntityRef,
        columns: Vec<ColumnDef>,
    },
    /// Keep rows satisfying a boolean predicate.
    Filter {
        input: Box<PlanNode>,
        predicate: Predicate,
    },
    /// k-nearest-neighbour selection over a vector column of the input
    /// scan. An embedded predicate makes this the combined
    /// scan-kNN-with-filter operator.
    Knn {
        input: Box<PlanNode>,
        column: ColumnDef,
        queries: Vec<Value>,
        weights: Option<Vec<Value>>,
        k: usize,
        distance: Distance,
        predicate: Option<Predicate>,
        parallelism: usize,
    },
    /// Projection / aggregation over the input.
    Projection {
        input: Box<PlanNode>,
        op: ProjectionOp,
        fields: Vec<ProjectionField>,
    },
    /// Skip then take.
    Limit {
        input: Box<PlanNode>,
        limit: u64,
        skip: u64,
    },
}

impl PlanNode {
    /// Ranged scan over `start..=end`, enforcing
    /// `0 < start < end ≤ max_tuple_id`.
    pub fn ranged_scan(
        entity: EntityRef,
        columns: Vec<ColumnDef>,
        start: u64,
        end: u64,
        parallelism: usize,
        max_tuple_id: u64,
    ) -> common::DbResult<PlanNode> {
        if start == 0 || start >= end || end > max_tuple_id {
            return Err(common::DbError::Syntax(format!(
                "invalid scan range [{start}, {end}] over {max_tuple_id} tuples"
            )));
        }
        Ok(PlanNode::RangedScan {
            entity,
            columns,
            start,
            end,
            parallelism: parallelism.max(1),
        })
    }

    /// Sampled scan of `size` rows from a PRNG seeded with `seed`.
    pub fn sampled_scan(
        entity: EntityRef,
        columns: Vec<ColumnDef>,
        size: u64,
        seed: u64,
    ) -> common::DbResult<PlanNode> {
        if size == 0 {
            return Err(common::DbError::Syntax(
                "sampled scan requires size > 0".into(),
            ));
        }
        Ok(PlanNode::SampledScan {
            entity,
            columns,
            size,
            seed,
        })
    }

    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::FullScan { .. }
            | PlanNode::RangedScan { .. }
            | PlanNode::SampledScan { .. } => Vec::new(),
            PlanNode::Fetch { input, .. }
            | PlanNode::Filter { input, .. }
            | PlanNode::Knn { input, .. }
            | PlanNode::Projection { input, .. }
            | PlanNode::Limit { input, .. } => vec![input],
        }
    }

    /// Estimated output cardinality.
    pub fn output_rows(&self) -> u64 {
        match self {
            PlanNode::FullScan { rows, .. } => *rows,
            PlanNode::RangedScan { start, end, .. } => end - start + 1,
            PlanNode::SampledScan { size, .. } => *size,
            PlanNode::Fetch { input, .. } => input.output_rows(),
            PlanNode::Filter { input, predicate } => {
                (input.output_rows() as f64 * predicate.selectivity()).ceil() as u64
            }
            PlanNode::Knn { queries, k, .. } => (queries.len() * k) as u64,
            PlanNode::Projection { input, op, .. } => match op {
                ProjectionOp::Select => input.output_rows(),
                ProjectionOp::SelectDistinct => input.output_rows(),
                _ => 1,
            },
            PlanNode::Limit { input, limit, skip } => {
                let available = input.output_rows().saturating_sub(*skip);
                available.min(*limit)
            }
        }
    }

    /// Column definitions this node emits, in output order.
    pub fn output_columns(&self) -> Vec<ColumnDef> {
        match self {
            PlanNode::FullScan { columns, .. }
            | PlanNode::RangedScan { columns, .. }
            | PlanNode::SampledScan { columns, .. } => columns.clone(),
            PlanNode::Fetch { input, columns, .. } => {
                let mut out = columns.clone();
                for def in input.output_columns() {
                    if !out.iter().any(|c| c.name.simple() == def.name.simple()) {
                        out.push(def);
                    }
                }
                out
            }
            PlanNode::Filter { input, .. } | PlanNode::Limit { input, .. } => {
                input.output_columns()
            }
            PlanNode::Knn { .. } => vec![distance_column()],
            PlanNode::Projection { input, op, fields } => match op {
                ProjectionOp::Select | ProjectionOp::SelectDistinct => {
                    let inputs = input.output_columns();
                    fields
                        .iter()
                        .filter_map(|f| {
                            inputs
                                .iter()
                                .find(|c| c.name.simple() == f.column)
                                .map(|c| {
                                    let mut def = c.clone();
                                    if let Some(alias) = &f.alias {
                                        def.name = ColumnName::new(
                                            def.name.schema.clone(),
                                            def.name.entity.clone(),
                                            alias.clone(),
                                        );
                                    }
                                    def
                                })
                        })
                        .collect()
                }
                ProjectionOp::Count => vec![synthetic("count", ColumnType::Long)],
                ProjectionOp::Exists => vec![synthetic("exists", ColumnType::Boolean)],
                ProjectionOp::Min | ProjectionOp::Max | ProjectionOp::Sum | ProjectionOp::Mean => {
                    let name = fields
                        .first()
                        .map(|f| f.column.as_str())
                        .unwrap_or("?");
                    let op = match op {
                        ProjectionOp::Min => "min",
                        ProjectionOp::Max => "max",
                        ProjectionOp::Sum => "sum",
                        _ => "mean",
                    };
                    vec![synthetic(format!("{op}({name})"), ColumnType::Double)]
                }
            },
        }
    }

    /// Cost of this node alone.
    pub fn cost(&self) -> Cost {
        let bytes = |rows: u64, columns: &[ColumnDef]| {
            rows as f64
                * columns
                    .iter()
                    .map(|c| c.physical_size() as f64)
                    .sum::<f64>()
        };
        match self {
            PlanNode::FullScan { rows, columns, .. } => Cost::new(
                *rows as f64 * columns.len() as f64 * DISK_READ_COST,
                0.0,
                bytes(*rows, columns),
            ),
            PlanNode::RangedScan { columns, .. } | PlanNode::SampledScan { columns, .. } => {
                let rows = self.output_rows();
                Cost::new(
                    rows as f64 * columns.len() as f64 * DISK_READ_COST,
                    0.0,
                    bytes(rows, columns),
                )
            }
            PlanNode::Fetch { input, columns, .. } => {
                let rows = input.output_rows();
                Cost::new(
                    rows as f64 * columns.len() as f64 * DISK_READ_COST,
                    0.0,
                    bytes(rows, columns),
                )
            }
            PlanNode::Filter { input, .. } => {
                let rows = input.output_rows();
                Cost::new(0.0, rows as f64 * MEM_READ_COST, 0.0)
            }
            PlanNode::Knn {
                input,
                queries,
                distance,
                ..
            } => {
                let rows = input.output_rows();
                Cost::new(
                    0.0,
                    rows as f64 * queries.len() as f64 * distance.cost(),
                    bytes(self.output_rows(), &self.output_columns()),
                )
            }
            PlanNode::Projection { input, fields, .. } => {
                let rows = input.output_rows();
                Cost::new(
                    0.0,
                    rows as f64 * fields.len().max(1) as f64 * MEM_READ_COST,
                    bytes(self.output_rows(), &self.output_columns()),
                )
            }
            PlanNode::Limit { .. } => Cost::default(),
        }
    }

    /// Cost of the whole subtree.
    pub fn total_cost(&self) -> Cost {
        self.children()
            .into_iter()
            .fold(self.cost(), |acc, child| acc + child.total_cost())
    }
}

/// The synthesized distance column kNN operators emit.
pub fn distance_column() -> ColumnDef {
    synthetic("distance", ColumnType::Double)
}

fn synthetic(name: impl Into<String>, column_type: ColumnType) -> ColumnDef {
    ColumnDef::new(ColumnName::synthetic(name), column_type, false)
}

/// Pretty-print a plan for debugging.
pub fn explain(node: &PlanNode) -> String {
    let head = match node {
        PlanNode::FullScan { entity, columns, rows } => format!(
            "FullScan {}.{} cols={} rows={rows}",
            entity.schema,
            entity.entity,
            columns.len()
        ),
        PlanNode::RangedScan {
            entity,
            start,
            end,
            parallelism,
            ..
        } => format!(
            "RangedScan {}.{} [{start}..={end}] parallelism={parallelism}",
            entity.schema, entity.entity
        ),
        PlanNode::SampledScan { entity, size, seed, .. } => format!(
            "SampledScan {}.{} size={size} seed={seed}",
            entity.schema, entity.entity
        ),
        PlanNode::Fetch { columns, .. } => format!("Fetch cols={}", columns.len()),
        PlanNode::Filter { predicate, .. } => format!("Filter [{predicate:?}]"),
        PlanNode::Knn {
            column,
            queries,
            k,
            distance,
            predicate,
            parallelism,
            ..
        } => format!(
            "Knn col={} m={} k={k} distance={distance:?} filtered={} parallelism={parallelism}",
            column.name,
            queries.len(),
            predicate.is_some()
        ),
        PlanNode::Projection { op, fields, .. } => {
            format!("Projection {op:?} fields={:?}", fields.iter().map(|f| &f.column).collect::<Vec<_>>())
        }
        PlanNode::Limit { limit, skip, .. } => format!("Limit limit={limit} skip={skip}"),
    };
    let mut out = head;
    for child in node.children() {
        out.push_str("\n  ");
        out.push_str(&indent(&explain(child)));
    }
    out
}

fn indent(s: &str) -> String {
    s.lines().collect::<Vec<_>>().join("\n  ")
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", explain(self))
    }
}
