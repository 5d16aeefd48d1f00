use super::*;
use catalog::Catalog;
use common::{Config, DbError};
use expr::{CompareOp, Predicate};
use pretty_assertions::assert_eq;
use protocol::{EntityRef, KnnHint, Projection, ProjectionField, ProjectionOp, Query};

fn fixture() -> (Catalog, Config) {
    let mut catalog = Catalog::new();
    catalog.create_schema("warren").unwrap();
    catalog
        .create_entity(
            "warren",
            "vectors",
            vec![
                ("v".into(), ColumnType::DoubleVector { size: 3 }, false),
                ("label".into(), ColumnType::String { size: 16 }, true),
                ("x".into(), ColumnType::Int, false),
            ],
        )
        .unwrap();
    (catalog, Config::default())
}

fn entity_ref() -> EntityRef {
    EntityRef::new("warren", "vectors")
}

fn knn_hint(k: usize) -> KnnHint {
    KnnHint {
        column: "v".into(),
        k,
        distance: Distance::L2,
        queries: vec![Value::DoubleVector(vec![1.0, 0.0, 0.0])],
        weights: None,
    }
}

#[test]
fn binds_a_plain_select() {
    let (catalog, config) = fixture();
    let binder = Binder::new(&catalog, &config);
    let query = Query::new(entity_ref(), Projection::select(&["x", "label"]));

    let plan = binder.bind(&query, 100).unwrap();
    match &plan {
        PlanNode::Projection { input, op, fields } => {
            assert_eq!(*op, ProjectionOp::Select);
            assert_eq!(fields.len(), 2);
            match input.as_ref() {
                PlanNode::FullScan { columns, rows, .. } => {
                    assert_eq!(*rows, 100);
                    assert_eq!(columns.len(), 2);
                }
                other => panic!("expected scan, got {other}"),
            }
        }
        other => panic!("expected projection, got {other}"),
    }
    assert_eq!(plan.output_rows(), 100);
}

#[test]
fn predicate_columns_join_the_scan_projection() {
    let (catalog, config) = fixture();
    let binder = Binder::new(&catalog, &config);
    let mut query = Query::new(entity_ref(), Projection::select(&["label"]));
    query.predicate = Some(Predicate::compare("x", CompareOp::Gt, Value::Int(3)));

    let plan = binder.bind(&query, 10).unwrap();
    let PlanNode::Projection { input, .. } = &plan else {
        panic!("expected projection");
    };
    let PlanNode::Filter { input: scan, .. } = input.as_ref() else {
        panic!("expected filter under projection");
    };
    let PlanNode::FullScan { columns, .. } = scan.as_ref() else {
        panic!("expected scan under filter");
    };
    let names: Vec<&str> = columns.iter().map(|c| c.name.simple()).collect();
    assert_eq!(names, vec!["label", "x"]);
}

#[test]
fn binds_knn_with_fetch_for_projected_columns() {
    let (catalog, config) = fixture();
    let binder = Binder::new(&catalog, &config);
    let mut query = Query::new(entity_ref(), Projection::select(&["label", "distance"]));
    query.knn = Some(knn_hint(2));

    let plan = binder.bind(&query, 50).unwrap();
    let PlanNode::Projection { input, .. } = &plan else {
        panic!("expected projection");
    };
    let PlanNode::Fetch { input: knn, columns, .. } = input.as_ref() else {
        panic!("expected fetch under projection");
    };
    assert_eq!(columns.len(), 1);
    assert_eq!(columns[0].name.simple(), "label");
    let PlanNode::Knn { k, parallelism, .. } = knn.as_ref() else {
        panic!("expected knn under fetch");
    };
    assert_eq!(*k, 2);
    assert_eq!(*parallelism, config.knn_parallelism);
}

#[test]
fn knn_without_entity_projection_skips_the_fetch() {
    let (catalog, config) = fixture();
    let binder = Binder::new(&catalog, &config);
    let mut query = Query::new(entity_ref(), Projection::select(&["distance"]));
    query.knn = Some(knn_hint(2));

    let plan = binder.bind(&query, 50).unwrap();
    let PlanNode::Projection { input, .. } = &plan else {
        panic!("expected projection");
    };
    assert!(matches!(input.as_ref(), PlanNode::Knn { .. }));
}

#[test]
fn optimize_merges_a_non_selective_filter_into_knn() {
    let (catalog, config) = fixture();
    let binder = Binder::new(&catalog, &config);
    let mut query = Query::new(entity_ref(), Projection::select(&["distance"]));
    query.knn = Some(knn_hint(2));
    // Gt has selectivity 0.33: non-selective, so it folds into the scan.
    query.predicate = Some(Predicate::compare("x", CompareOp::Gt, Value::Int(0)));

    let plan = optimize(binder.bind(&query, 50).unwrap());
    let PlanNode::Projection { input, .. } = &plan else {
        panic!("expected projection");
    };
    let PlanNode::Knn { input: scan, predicate, .. } = input.as_ref() else {
        panic!("expected knn");
    };
    assert!(predicate.is_some());
    assert!(matches!(scan.as_ref(), PlanNode::FullScan { .. }));
}

#[test]
fn optimize_keeps_a_selective_filter_separate() {
    let (catalog, config) = fixture();
    let binder = Binder::new(&catalog, &config);
    let mut query = Query::new(entity_ref(), Projection::select(&["distance"]));
    query.knn = Some(knn_hint(2));
    // Eq has selectivity 0.1: the filter stays its own operator.
    query.predicate = Some(Predicate::compare("x", CompareOp::Eq, Value::Int(1)));

    let plan = optimize(binder.bind(&query, 50).unwrap());
    let PlanNode::Projection { input, .. } = &plan else {
        panic!("expected projection");
    };
    let PlanNode::Knn { input, predicate, .. } = input.as_ref() else {
        panic!("expected knn");
    };
    assert!(predicate.is_none());
    assert!(matches!(input.as_ref(), PlanNode::Filter { .. }));
}

#[test]
fn bind_rejects_unknown_names() {
    let (catalog, config) = fixture();
    let binder = Binder::new(&catalog, &config);

    let query = Query::new(EntityRef::new("nope", "vectors"), Projection::count());
    assert!(matches!(binder.bind(&query, 0), Err(DbError::Bind(_))));

    let query = Query::new(entity_ref(), Projection::select(&["nope"]));
    assert!(matches!(binder.bind(&query, 0), Err(DbError::Bind(_))));
}

#[test]
fn bind_rejects_malformed_knn() {
    let (catalog, config) = fixture();
    let binder = Binder::new(&catalog, &config);

    let mut query = Query::new(entity_ref(), Projection::select(&["distance"]));
    query.knn = Some(knn_hint(0));
    assert!(matches!(binder.bind(&query, 0), Err(DbError::Syntax(_))));

    let mut hint = knn_hint(2);
    hint.queries = vec![Value::DoubleVector(vec![1.0, 0.0])];
    query.knn = Some(hint);
    assert!(matches!(binder.bind(&query, 0), Err(DbError::Size(_))));

    let mut hint = knn_hint(2);
    hint.column = "x".into();
    query.knn = Some(hint);
    assert!(matches!(binder.bind(&query, 0), Err(DbError::Bind(_))));

    let mut hint = knn_hint(2);
    hint.weights = Some(vec![]);
    query.knn = Some(hint);
    assert!(matches!(binder.bind(&query, 0), Err(DbError::Syntax(_))));
}

#[test]
fn bind_rejects_aggregates_over_non_numeric_columns() {
    let (catalog, config) = fixture();
    let binder = Binder::new(&catalog, &config);
    let query = Query::new(
        entity_ref(),
        Projection {
            op: ProjectionOp::Max,
            fields: vec![ProjectionField::named("label")],
        },
    );
    assert!(matches!(binder.bind(&query, 0), Err(DbError::Bind(_))));
}

#[test]
fn limit_node_caps_the_estimate() {
    let (catalog, config) = fixture();
    let binder = Binder::new(&catalog, &config);
    let mut query = Query::new(entity_ref(), Projection::select(&["x"]));
    query.limit = Some(2);
    query.skip = Some(1);

    let plan = binder.bind(&query, 4).unwrap();
    assert!(matches!(plan, PlanNode::Limit { limit: 2, skip: 1, .. }));
    assert_eq!(plan.output_rows(), 2);
}

#[test]
fn ranged_scan_invariants() {
    let columns = vec![distance_column()];
    assert!(PlanNode::ranged_scan(entity_ref(), columns.clone(), 1, 5, 2, 10).is_ok());
    // start must be positive, below end, and end within the watermark.
    assert!(PlanNode::ranged_scan(entity_ref(), columns.clone(), 0, 5, 2, 10).is_err());
    assert!(PlanNode::ranged_scan(entity_ref(), columns.clone(), 5, 5, 2, 10).is_err());
    assert!(PlanNode::ranged_scan(entity_ref(), columns.clone(), 1, 11, 2, 10).is_err());
    assert!(PlanNode::sampled_scan(entity_ref(), columns, 0, 42).is_err());
}

#[test]
fn knn_cost_scales_with_rows_queries_and_kernel() {
    let (catalog, config) = fixture();
    let binder = Binder::new(&catalog, &config);
    let mut query = Query::new(entity_ref(), Projection::select(&["distance"]));
    query.knn = Some(knn_hint(2));

    let plan = binder.bind(&query, 1000).unwrap();
    let PlanNode::Projection { input, .. } = &plan else {
        panic!("expected projection");
    };
    let knn = input.as_ref();
    let cost = knn.cost();
    assert_eq!(cost.cpu, 1000.0 * 1.0 * Distance::L2.cost());
    assert_eq!(cost.io, 0.0);

    let PlanNode::Knn { input: scan, .. } = knn else {
        panic!("expected knn");
    };
    let scan_cost = scan.cost();
    // One projected column read from disk per row.
    assert_eq!(scan_cost.io, 1000.0 * 1.0 * DISK_READ_COST);
    assert_eq!(scan_cost.cpu, 0.0);
    assert_eq!(scan_cost.bytes, 1000.0 * 24.0);
}

#[test]
fn knn_output_is_the_distance_column() {
    let (catalog, config) = fixture();
    let binder = Binder::new(&catalog, &config);
    let mut query = Query::new(entity_ref(), Projection::select(&["distance"]));
    query.knn = Some(knn_hint(3));

    let plan = binder.bind(&query, 10).unwrap();
    let columns = plan.output_columns();
    assert_eq!(columns.len(), 1);
    assert_eq!(columns[0].name.simple(), "distance");
    assert_eq!(columns[0].column_type, ColumnType::Double);
    // m × k estimate.
    let PlanNode::Projection { input, .. } = &plan else {
        panic!("expected projection");
    };
    assert_eq!(input.output_rows(), 3);
}
