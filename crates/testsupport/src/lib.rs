//! Shared fixtures for integration-style tests.

use common::Config;
use database::Database;
use protocol::EntityRef;
use tempfile::TempDir;
use types::{ColumnType, Value};

/// A database rooted in a temporary directory that lives as long as the
/// fixture.
pub struct TestDb {
    pub db: Database,
    pub dir: TempDir,
}

impl TestDb {
    pub fn config(&self) -> Config {
        Config::builder().data_dir(self.dir.path().into()).build()
    }
}

/// An empty database in a fresh temp dir.
pub fn empty_db() -> TestDb {
    let dir = TempDir::new().expect("create temp dir");
    let config = Config::builder().data_dir(dir.path().into()).build();
    let db = Database::open(config).expect("open database");
    TestDb { db, dir }
}

pub fn vectors_ref() -> EntityRef {
    EntityRef::new("warren", "vectors")
}

/// The reference fixture: `warren.vectors` with a 3-dimensional double
/// vector, a nullable label and an int, seeded with five rows.
pub fn vectors_db() -> TestDb {
    let mut fixture = empty_db();
    fixture.db.create_schema("warren").expect("create schema");
    fixture
        .db
        .create_entity(
            "warren",
            "vectors",
            vec![
                ("v".into(), ColumnType::DoubleVector { size: 3 }, false),
                ("label".into(), ColumnType::String { size: 16 }, true),
                ("x".into(), ColumnType::Int, false),
            ],
        )
        .expect("create entity");

    for (v, label, x) in [
        ([1.0, 0.0, 0.0], "a", 3),
        ([0.0, 1.0, 0.0], "b", 7),
        ([0.0, 0.0, 1.0], "c", 2),
        ([1.0, 1.0, 0.0], "d", 9),
        ([1.0, 1.0, 1.0], "e", 5),
    ] {
        fixture
            .db
            .insert(
                &vectors_ref(),
                vec![
                    Value::DoubleVector(v.to_vec()),
                    Value::String(label.into()),
                    Value::Int(x),
                ],
            )
            .expect("insert row");
    }
    fixture
}
