use super::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use types::{ColumnType, Value};

fn col(name: &str, column_type: ColumnType) -> ColumnDef {
    ColumnDef::new(ColumnName::new("test", "rows", name), column_type, false)
}

fn sample_set() -> RecordSet {
    let mut set = RecordSet::new(vec![
        col("id", ColumnType::Long),
        col("label", ColumnType::String { size: 16 }),
    ]);
    for (i, label) in ["a", "b", "c", "d"].iter().enumerate() {
        set.append(
            TupleId(i as u64 + 1),
            vec![Value::Long(i as i64 + 1), Value::String((*label).into())],
        )
        .unwrap();
    }
    set
}

#[test]
fn append_validates_arity_and_types() {
    let mut set = RecordSet::new(vec![col("id", ColumnType::Long)]);
    assert!(set.append(TupleId(1), vec![Value::Long(1)]).is_ok());
    assert!(set.append(TupleId(2), vec![]).is_err());
    assert!(
        set.append(TupleId(3), vec![Value::String("x".into())])
            .is_err()
    );
    assert_eq!(set.len(), 1);
}

#[test]
fn non_nullable_column_rejects_null() {
    let def = col("id", ColumnType::Long);
    assert!(def.validate(&Value::Null).is_err());
    let nullable = ColumnDef::new(def.name.clone(), def.column_type, true);
    assert!(nullable.validate(&Value::Null).is_ok());
}

#[test]
fn vector_size_mismatch_is_a_size_error() {
    let def = col("v", ColumnType::DoubleVector { size: 3 });
    let err = def.validate(&Value::DoubleVector(vec![1.0, 2.0])).unwrap_err();
    assert!(matches!(err, DbError::Size(_)));
    let err = def.validate(&Value::Long(1)).unwrap_err();
    assert!(matches!(err, DbError::Type(_)));
}

#[test]
fn filter_preserves_order_and_tuple_ids() {
    let set = sample_set();
    let odd = set
        .filter(|r| Ok(matches!(r.value("id"), Some(Value::Long(n)) if n % 2 == 1)))
        .unwrap();
    assert_eq!(odd.len(), 2);
    assert_eq!(odd.tuple_ids(), &[TupleId(1), TupleId(3)]);
}

#[test]
fn project_renames_and_reorders() {
    let set = sample_set();
    let projected = set
        .project(&[
            ("label".to_string(), Some("name".to_string())),
            ("id".to_string(), None),
        ])
        .unwrap();
    assert_eq!(projected.columns()[0].name.simple(), "name");
    assert_eq!(projected.columns()[1].name.simple(), "id");
    let first = projected.get(0).unwrap();
    assert_eq!(first.values[0], Value::String("a".into()));
    assert_eq!(first.values[1], Value::Long(1));
}

#[test]
fn project_unknown_column_is_a_bind_error() {
    let err = sample_set()
        .project(&[("nope".to_string(), None)])
        .unwrap_err();
    assert!(matches!(err, DbError::Bind(_)));
}

#[test]
fn project_composes() {
    let set = sample_set();
    let twice = set
        .project(&[
            ("id".to_string(), None),
            ("label".to_string(), None),
        ])
        .unwrap()
        .project(&[("label".to_string(), None)])
        .unwrap();
    let once = set.project(&[("label".to_string(), None)]).unwrap();
    assert_eq!(twice.columns(), once.columns());
    assert_eq!(
        twice.iter().map(|r| r.values.to_vec()).collect::<Vec<_>>(),
        once.iter().map(|r| r.values.to_vec()).collect::<Vec<_>>()
    );
}

#[test]
fn distinct_keeps_first_occurrence() {
    let mut set = RecordSet::new(vec![col("x", ColumnType::Long)]);
    for (tid, v) in [(1, 10), (2, 20), (3, 10), (4, 30), (5, 20)] {
        set.append(TupleId(tid), vec![Value::Long(v)]).unwrap();
    }
    let unique = set.distinct();
    assert_eq!(unique.len(), 3);
    assert_eq!(unique.tuple_ids(), &[TupleId(1), TupleId(2), TupleId(4)]);
    // Idempotent.
    assert_eq!(unique.distinct().len(), 3);
}

#[test]
fn limit_skips_then_takes() {
    let set = sample_set();
    let window = set.limit(2, 1);
    let labels: Vec<_> = window
        .iter()
        .map(|r| r.value("label").cloned().unwrap())
        .collect();
    assert_eq!(
        labels,
        vec![Value::String("b".into()), Value::String("c".into())]
    );
}

#[test]
fn limit_beyond_the_end_is_empty() {
    let set = sample_set();
    assert_eq!(set.limit(10, 99).len(), 0);
    assert_eq!(set.limit(0, 0).len(), 0);
    assert_eq!(set.limit(99, 0).len(), 4);
}

#[test]
fn count_and_exists() {
    let set = sample_set();
    let count = set.count();
    assert_eq!(count.get(0).unwrap().values[0], Value::Long(4));
    assert_eq!(set.exists().get(0).unwrap().values[0], Value::Boolean(true));

    let empty = RecordSet::new(vec![col("id", ColumnType::Long)]);
    assert_eq!(empty.count().get(0).unwrap().values[0], Value::Long(0));
    assert_eq!(
        empty.exists().get(0).unwrap().values[0],
        Value::Boolean(false)
    );
}

#[test]
fn aggregates_widen_to_double() {
    let mut set = RecordSet::new(vec![col("x", ColumnType::Int)]);
    for (tid, v) in [(1, 3), (2, 7), (3, 2)] {
        set.append(TupleId(tid), vec![Value::Int(v)]).unwrap();
    }
    assert_eq!(
        set.max("x").unwrap().get(0).unwrap().values[0],
        Value::Double(7.0)
    );
    assert_eq!(
        set.min("x").unwrap().get(0).unwrap().values[0],
        Value::Double(2.0)
    );
    assert_eq!(
        set.sum("x").unwrap().get(0).unwrap().values[0],
        Value::Double(12.0)
    );
    assert_eq!(
        set.mean("x").unwrap().get(0).unwrap().values[0],
        Value::Double(4.0)
    );
}

#[test]
fn aggregates_over_empty_input() {
    let set = RecordSet::new(vec![col("x", ColumnType::Int)]);
    assert_eq!(
        set.min("x").unwrap().get(0).unwrap().values[0],
        Value::Double(f64::INFINITY)
    );
    assert_eq!(
        set.max("x").unwrap().get(0).unwrap().values[0],
        Value::Double(f64::NEG_INFINITY)
    );
    assert_eq!(
        set.sum("x").unwrap().get(0).unwrap().values[0],
        Value::Double(0.0)
    );
    let mean = set.mean("x").unwrap();
    assert!(matches!(mean.get(0).unwrap().values[0], Value::Double(d) if d.is_nan()));
}

#[test]
fn aggregate_over_non_numeric_column_is_a_bind_error() {
    let set = sample_set();
    assert!(matches!(set.sum("label"), Err(DbError::Bind(_))));
}

proptest! {
    #[test]
    fn limit_cardinality(rows in 0usize..64, n in 0u64..80, s in 0u64..80) {
        let mut set = RecordSet::new(vec![col("x", ColumnType::Long)]);
        for i in 0..rows {
            set.append(TupleId(i as u64), vec![Value::Long(i as i64)]).unwrap();
        }
        let limited = set.limit(n, s);
        let expected = (n as usize).min(rows.saturating_sub(s as usize));
        prop_assert_eq!(limited.len(), expected);
        // Every surviving row appears in the input, in the same order.
        for (i, r) in limited.iter().enumerate() {
            prop_assert_eq!(r.values[0].clone(), Value::Long((s as usize + i) as i64));
        }
    }

    #[test]
    fn distinct_is_order_preserving_and_idempotent(values in prop::collection::vec(0i64..8, 0..64)) {
        let mut set = RecordSet::new(vec![col("x", ColumnType::Long)]);
        for (i, v) in values.iter().enumerate() {
            set.append(TupleId(i as u64), vec![Value::Long(*v)]).unwrap();
        }
        let unique = set.distinct();
        let mut expected = Vec::new();
        for v in &values {
            if !expected.contains(v) {
                expected.push(*v);
            }
        }
        let got: Vec<i64> = unique.iter().map(|r| match r.values[0] {
            Value::Long(v) => v,
            _ => unreachable!(),
        }).collect();
        prop_assert_eq!(got, expected);
        prop_assert_eq!(unique.distinct().len(), unique.len());
    }
}
