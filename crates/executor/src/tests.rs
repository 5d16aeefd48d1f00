use super::*;
use catalog::Catalog;
use common::{Config, TupleId};
use distance::Distance;
use expr::{CompareOp, Predicate};
use planner::{Binder, PlanNode, optimize};
use protocol::{KnnHint, Projection, ProjectionField, ProjectionOp, Query};
use std::collections::HashMap;
use tempfile::TempDir;
use types::{ColumnType, Value};

struct Fixture {
    catalog: Catalog,
    config: Config,
    entities: HashMap<(String, String), Arc<Entity>>,
    _dir: TempDir,
}

impl EntitySource for Fixture {
    fn entity(&self, entity: &EntityRef) -> DbResult<Arc<Entity>> {
        self.entities
            .get(&(entity.schema.clone(), entity.entity.clone()))
            .cloned()
            .ok_or_else(|| {
                DbError::Bind(format!(
                    "unknown entity '{}.{}'",
                    entity.schema, entity.entity
                ))
            })
    }
}

impl Fixture {
    fn run(&self, query: &Query) -> DbResult<RecordSet> {
        self.run_with_token(query, &CancellationToken::new())
    }

    fn run_with_token(&self, query: &Query, token: &CancellationToken) -> DbResult<RecordSet> {
        let entity = self.entity(&query.entity)?;
        let binder = Binder::new(&self.catalog, &self.config);
        let plan = optimize(binder.bind(query, entity.max_tuple_id())?);
        let execution = lower(&plan)?;
        let ctx = TaskContext {
            entities: self,
            cancellation: token,
        };
        Executor::execute(&execution, &ctx)
    }

    fn run_plan(&self, plan: &PlanNode) -> DbResult<RecordSet> {
        let execution = lower(plan)?;
        let token = CancellationToken::new();
        let ctx = TaskContext {
            entities: self,
            cancellation: &token,
        };
        Executor::execute(&execution, &ctx)
    }
}

/// Five unit-ish vectors plus a scalar column, per the reference
/// scenarios.
fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::builder().data_dir(dir.path().into()).build();

    let mut catalog = Catalog::new();
    catalog.create_schema("warren").unwrap();
    catalog
        .create_entity(
            "warren",
            "vectors",
            vec![
                ("v".into(), ColumnType::DoubleVector { size: 3 }, false),
                ("label".into(), ColumnType::String { size: 16 }, true),
            ],
        )
        .unwrap();
    catalog
        .create_entity(
            "warren",
            "points",
            vec![("x".into(), ColumnType::Int, false)],
        )
        .unwrap();

    let vectors = Arc::new(
        Entity::open(
            "warren",
            catalog.entity("warren", "vectors").unwrap(),
            dir.path(),
            &config,
        )
        .unwrap(),
    );
    vectors
        .write(|tx| {
            for (v, label) in [
                ([1.0, 0.0, 0.0], "a"),
                ([0.0, 1.0, 0.0], "b"),
                ([0.0, 0.0, 1.0], "c"),
                ([1.0, 1.0, 0.0], "d"),
                ([1.0, 1.0, 1.0], "e"),
            ] {
                tx.append(vec![
                    Value::DoubleVector(v.to_vec()),
                    Value::String(label.into()),
                ])?;
            }
            Ok(())
        })
        .unwrap();

    let points = Arc::new(
        Entity::open(
            "warren",
            catalog.entity("warren", "points").unwrap(),
            dir.path(),
            &config,
        )
        .unwrap(),
    );
    points
        .write(|tx| {
            for x in [3, 7, 2] {
                tx.append(vec![Value::Int(x)])?;
            }
            Ok(())
        })
        .unwrap();

    let mut entities = HashMap::new();
    entities.insert(("warren".to_string(), "vectors".to_string()), vectors);
    entities.insert(("warren".to_string(), "points".to_string()), points);

    Fixture {
        catalog,
        config,
        entities,
        _dir: dir,
    }
}

fn vectors_ref() -> EntityRef {
    EntityRef::new("warren", "vectors")
}

fn knn_query(k: usize, q: Vec<f64>) -> Query {
    let mut query = Query::new(vectors_ref(), Projection::select(&["distance"]));
    query.knn = Some(KnnHint {
        column: "v".into(),
        k,
        distance: Distance::L2,
        queries: vec![Value::DoubleVector(q)],
        weights: None,
    });
    query
}

fn distances(set: &RecordSet) -> Vec<(u64, f64)> {
    set.iter()
        .map(|r| {
            let d = match r.value("distance") {
                Some(Value::Double(d)) => *d,
                other => panic!("unexpected distance value {other:?}"),
            };
            (r.tuple_id.0, d)
        })
        .collect()
}

#[test]
fn knn_top2_l2_over_five_vectors() {
    let fixture = fixture();
    let result = fixture.run(&knn_query(2, vec![1.0, 0.0, 0.0])).unwrap();
    assert_eq!(distances(&result), vec![(1, 0.0), (4, 1.0)]);
}

#[test]
fn count_projection() {
    let fixture = fixture();
    let query = Query::new(vectors_ref(), Projection::count());
    let result = fixture.run(&query).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.get(0).unwrap().values[0], Value::Long(5));
}

#[test]
fn max_aggregate_widens_to_double() {
    let fixture = fixture();
    let query = Query::new(
        EntityRef::new("warren", "points"),
        Projection {
            op: ProjectionOp::Max,
            fields: vec![ProjectionField::named("x")],
        },
    );
    let result = fixture.run(&query).unwrap();
    assert_eq!(result.get(0).unwrap().values[0], Value::Double(7.0));
}

#[test]
fn limit_skips_then_takes() {
    let fixture = fixture();
    let mut query = Query::new(vectors_ref(), Projection::select(&["label"]));
    query.limit = Some(2);
    query.skip = Some(1);
    let result = fixture.run(&query).unwrap();
    let labels: Vec<Value> = result
        .iter()
        .map(|r| r.value("label").cloned().unwrap())
        .collect();
    assert_eq!(
        labels,
        vec![Value::String("b".into()), Value::String("c".into())]
    );
}

#[test]
fn weighted_knn_breaks_ties_by_admission_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::builder().data_dir(dir.path().into()).build();
    let mut catalog = Catalog::new();
    catalog.create_schema("warren").unwrap();
    catalog
        .create_entity(
            "warren",
            "pair",
            vec![("v".into(), ColumnType::DoubleVector { size: 3 }, false)],
        )
        .unwrap();
    let entity = Arc::new(
        Entity::open(
            "warren",
            catalog.entity("warren", "pair").unwrap(),
            dir.path(),
            &config,
        )
        .unwrap(),
    );
    entity
        .write(|tx| {
            tx.append(vec![Value::DoubleVector(vec![1.0, 0.0, 0.0])])?;
            tx.append(vec![Value::DoubleVector(vec![0.0, 1.0, 1.0])])?;
            Ok(())
        })
        .unwrap();
    let mut entities = HashMap::new();
    entities.insert(("warren".to_string(), "pair".to_string()), entity);
    let fixture = Fixture {
        catalog,
        config,
        entities,
        _dir: dir,
    };

    let mut query = Query::new(
        EntityRef::new("warren", "pair"),
        Projection::select(&["distance"]),
    );
    query.knn = Some(KnnHint {
        column: "v".into(),
        k: 1,
        distance: Distance::L2,
        queries: vec![Value::DoubleVector(vec![0.0, 0.0, 0.0])],
        weights: Some(vec![Value::DoubleVector(vec![2.0, 1.0, 1.0])]),
    });

    // Parallel sub-scans would race the tie; a single partition keeps
    // admission order deterministic.
    let mut config = fixture.config.clone();
    config.knn_parallelism = 1;
    let fixture = Fixture { config, ..fixture };

    let result = fixture.run(&query).unwrap();
    let got = distances(&result);
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].0, 1);
    assert!((got[0].1 - 2.0f64.sqrt()).abs() < 1e-12);
}

#[test]
fn multiple_query_vectors_produce_groups_in_query_order() {
    let fixture = fixture();
    let mut query = Query::new(vectors_ref(), Projection::select(&["distance"]));
    query.knn = Some(KnnHint {
        column: "v".into(),
        k: 1,
        distance: Distance::L2,
        queries: vec![
            Value::DoubleVector(vec![1.0, 0.0, 0.0]),
            Value::DoubleVector(vec![0.0, 0.0, 1.0]),
        ],
        weights: None,
    });
    let result = fixture.run(&query).unwrap();
    assert_eq!(distances(&result), vec![(1, 0.0), (3, 0.0)]);
}

#[test]
fn knn_with_combined_filter_excludes_rows_before_ranking() {
    let fixture = fixture();
    let mut query = knn_query(2, vec![1.0, 0.0, 0.0]);
    // Non-selective predicate folds into the scan-kNN task and drops
    // the exact match (tuple 1).
    query.predicate = Some(Predicate::compare(
        "label",
        CompareOp::Ne,
        Value::String("a".into()),
    ));
    let result = fixture.run(&query).unwrap();
    let got = distances(&result);
    assert_eq!(got[0].0, 4);
    assert_eq!(got[0].1, 1.0);
    assert_eq!(got.len(), 2);
}

#[test]
fn knn_fetches_projected_entity_columns() {
    let fixture = fixture();
    let mut query = knn_query(2, vec![1.0, 0.0, 0.0]);
    query.projection = Projection::select(&["label", "distance"]);
    let result = fixture.run(&query).unwrap();
    let first = result.get(0).unwrap();
    assert_eq!(first.value("label"), Some(&Value::String("a".into())));
    assert_eq!(first.value("distance"), Some(&Value::Double(0.0)));
    assert_eq!(result.tuple_ids()[0], TupleId(1));
}

#[test]
fn parallel_ranged_scan_preserves_tuple_order_across_merge() {
    let fixture = fixture();
    let entity = fixture.entity(&vectors_ref()).unwrap();
    let columns = vec![entity.columns()[1].def.clone()];
    let plan = PlanNode::ranged_scan(vectors_ref(), columns, 1, 5, 3, entity.max_tuple_id())
        .unwrap();

    let execution = lower(&plan).unwrap();
    // Three sub-scans merged with ALL.
    assert_eq!(execution.stages.len(), 1);
    assert_eq!(execution.stages[0].tasks.len(), 3);
    assert_eq!(execution.stages[0].merge, Merge::All);

    let result = fixture.run_plan(&plan).unwrap();
    let ids: Vec<u64> = result.tuple_ids().iter().map(|t| t.0).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[test]
fn sampled_scan_replays_identically_for_a_seed() {
    let fixture = fixture();
    let entity = fixture.entity(&vectors_ref()).unwrap();
    let columns = vec![entity.columns()[0].def.clone()];
    let plan =
        PlanNode::sampled_scan(vectors_ref(), columns, 3, 0xC0FFEE).unwrap();

    let a = fixture.run_plan(&plan).unwrap();
    let b = fixture.run_plan(&plan).unwrap();
    assert_eq!(a.len(), 3);
    assert_eq!(a.tuple_ids(), b.tuple_ids());
    let rows_a: Vec<_> = a.iter().map(|r| r.values.to_vec()).collect();
    let rows_b: Vec<_> = b.iter().map(|r| r.values.to_vec()).collect();
    assert_eq!(rows_a, rows_b);
}

#[test]
fn cancelled_token_fails_the_plan() {
    let fixture = fixture();
    let token = CancellationToken::new();
    token.cancel();
    let err = fixture
        .run_with_token(&knn_query(2, vec![1.0, 0.0, 0.0]), &token)
        .unwrap_err();
    assert!(matches!(err, DbError::Cancelled(_)));
}

#[test]
fn expired_deadline_reads_as_timeout() {
    let fixture = fixture();
    let token = CancellationToken::with_deadline(std::time::Duration::ZERO);
    let err = fixture
        .run_with_token(&knn_query(2, vec![1.0, 0.0, 0.0]), &token)
        .unwrap_err();
    assert!(matches!(err, DbError::Timeout(_)));
}

#[test]
fn selective_filter_runs_as_its_own_stage_before_knn() {
    let fixture = fixture();
    let mut query = knn_query(5, vec![1.0, 0.0, 0.0]);
    // Eq is selective (0.1 < merge threshold): filter stage + record-form
    // kNN stage.
    query.predicate = Some(Predicate::compare(
        "label",
        CompareOp::Eq,
        Value::String("e".into()),
    ));
    let result = fixture.run(&query).unwrap();
    let got = distances(&result);
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].0, 5);
    assert!((got[0].1 - 2.0f64.sqrt()).abs() < 1e-12);
}

#[test]
fn exists_and_distinct_projections() {
    let fixture = fixture();
    let query = Query::new(
        vectors_ref(),
        Projection {
            op: ProjectionOp::Exists,
            fields: vec![],
        },
    );
    let result = fixture.run(&query).unwrap();
    assert_eq!(result.get(0).unwrap().values[0], Value::Boolean(true));

    // Two rows share label after truncation? No: all labels distinct, so
    // distinct keeps all five.
    let query = Query::new(
        vectors_ref(),
        Projection {
            op: ProjectionOp::SelectDistinct,
            fields: vec![ProjectionField::named("label")],
        },
    );
    let result = fixture.run(&query).unwrap();
    assert_eq!(result.len(), 5);
}

#[test]
fn partition_range_is_contiguous_and_exhaustive() {
    let parts = partition_range(1, 101, 4);
    assert_eq!(parts.len(), 4);
    assert_eq!(parts[0].0, 1);
    assert_eq!(parts[3].1, 101);
    for pair in parts.windows(2) {
        assert_eq!(pair[0].1, pair[1].0);
    }
    // More partitions than rows degenerate gracefully.
    let parts = partition_range(1, 3, 8);
    assert_eq!(parts, vec![(1, 2), (2, 3)]);
}
