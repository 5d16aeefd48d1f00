//! Rewrite rules: pure `PlanNode -> PlanNode` functions.

use crate::PlanNode;

/// A filter is considered non-selective (and worth folding into the kNN
/// scan) above this survivor fraction.
const KNN_MERGE_SELECTIVITY: f64 = 0.2;

/// Applies every rule until the tree stops changing.
pub fn optimize(plan: PlanNode) -> PlanNode {
    let mut current = plan;
    loop {
        let next = merge_filter_into_knn(current.clone());
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Folds a non-selective filter directly beneath a kNN operator into the
/// operator itself, so scan, filter and distance evaluation run as one
/// combined task. Selective filters stay separate: materialising the few
/// surviving rows first is cheaper than the combined pass.
fn merge_filter_into_knn(plan: PlanNode) -> PlanNode {
    match plan {
        PlanNode::Knn {
            input,
            column,
            queries,
            weights,
            k,
            distance,
            predicate: None,
            parallelism,
        } => match *input {
            PlanNode::Filter {
                input: scan,
                predicate,
            } if is_scan(&scan) && predicate.selectivity() >= KNN_MERGE_SELECTIVITY => {
                PlanNode::Knn {
                    input: scan,
                    column,
                    queries,
                    weights,
                    k,
                    distance,
                    predicate: Some(predicate),
                    parallelism,
                }
            }
            other => PlanNode::Knn {
                input: Box::new(merge_filter_into_knn(other)),
                column,
                queries,
                weights,
                k,
                distance,
                predicate: None,
                parallelism,
            },
        },
        PlanNode::Knn {
            input,
            column,
            queries,
            weights,
            k,
            distance,
            predicate,
            parallelism,
        } => PlanNode::Knn {
            input: Box::new(merge_filter_into_knn(*input)),
            column,
            queries,
            weights,
            k,
            distance,
            predicate,
            parallelism,
        },
        PlanNode::Fetch {
            input,
            entity,
            columns,
        } => PlanNode::Fetch {
            input: Box::new(merge_filter_into_knn(*input)),
            entity,
            columns,
        },
        PlanNode::Filter { input, predicate } => PlanNode::Filter {
            input: Box::new(merge_filter_into_knn(*input)),
            predicate,
        },
        PlanNode::Projection { input, op, fields } => PlanNode::Projection {
            input: Box::new(merge_filter_into_knn(*input)),
            op,
            fields,
        },
        PlanNode::Limit { input, limit, skip } => PlanNode::Limit {
            input: Box::new(merge_filter_into_knn(*input)),
            limit,
            skip,
        },
        leaf => leaf,
    }
}

fn is_scan(node: &PlanNode) -> bool {
    matches!(
        node,
        PlanNode::FullScan { .. } | PlanNode::RangedScan { .. } | PlanNode::SampledScan { .. }
    )
}
