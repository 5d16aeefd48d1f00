//! Database context object: the explicit root of the system.
//!
//! There is no process-wide state — a [`Database`] owns the catalogue and
//! the open entities, and is passed (as an [`executor::EntitySource`])
//! into binding and execution. `open`/`close` bracket its lifecycle;
//! DDL persists the catalogue eagerly so a crash between operations
//! loses nothing but in-flight pages.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use catalog::Catalog;
use common::{Config, DbError, DbResult, RecordSet, TupleId};
use entity::Entity;
use executor::{CancellationToken, EntitySource, Executor, TaskContext, lower};
use parking_lot::RwLock;
use planner::{Binder, optimize};
use protocol::{EntityRef, Query, QueryResponse};
use types::{ColumnType, Value};

pub struct Database {
    config: Config,
    catalog: Catalog,
    entities: RwLock<HashMap<(String, String), Arc<Entity>>>,
}

impl EntitySource for Database {
    fn entity(&self, entity: &EntityRef) -> DbResult<Arc<Entity>> {
        self.entities
            .read()
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

impl Database {
    /// Opens the database under `config.data_dir`, loading the catalogue
    /// and every registered entity.
    pub fn open(config: Config) -> DbResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let catalog = Catalog::load(&Self::catalog_path(&config))?;

        let mut entities = HashMap::new();
        for schema in catalog.schemas() {
            for meta in schema.entities() {
                let entity = Entity::open(&schema.name, meta, &config.data_dir, &config)?;
                entities.insert(
                    (schema.name.clone(), meta.name.clone()),
                    Arc::new(entity),
                );
            }
        }
        tracing::info!(
            data_dir = %config.data_dir.display(),
            entities = entities.len(),
            "database opened"
        );

        Ok(Self {
            config,
            catalog,
            entities: RwLock::new(entities),
        })
    }

    /// Flushes every entity and persists the catalogue.
    pub fn close(self) -> DbResult<()> {
        for entity in self.entities.read().values() {
            entity.flush()?;
        }
        self.catalog.save(&Self::catalog_path(&self.config))?;
        tracing::info!("database closed");
        Ok(())
    }

    fn catalog_path(config: &Config) -> PathBuf {
        config.data_dir.join("catalog.json")
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn create_schema(&mut self, name: &str) -> DbResult<()> {
        self.catalog.create_schema(name)?;
        self.catalog.save(&Self::catalog_path(&self.config))
    }

    pub fn drop_schema(&mut self, name: &str) -> DbResult<()> {
        let entity_names: Vec<String> = self
            .catalog
            .schema(name)?
            .entities()
            .map(|e| e.name.clone())
            .collect();
        for entity in entity_names {
            self.drop_entity(name, &entity)?;
        }
        self.catalog.drop_schema(name)?;
        self.catalog.save(&Self::catalog_path(&self.config))
    }

    /// Registers an entity and opens its (empty) column stores.
    pub fn create_entity(
        &mut self,
        schema: &str,
        name: &str,
        columns: Vec<(String, ColumnType, bool)>,
    ) -> DbResult<()> {
        self.catalog.create_entity(schema, name, columns)?;
        let meta = self.catalog.entity(schema, name)?;
        let entity = Entity::open(schema, meta, &self.config.data_dir, &self.config)?;
        self.entities
            .write()
            .insert((schema.to_string(), name.to_string()), Arc::new(entity));
        self.catalog.save(&Self::catalog_path(&self.config))
    }

    /// Unregisters an entity and deletes its on-disk stores.
    pub fn drop_entity(&mut self, schema: &str, name: &str) -> DbResult<()> {
        self.catalog.drop_entity(schema, name)?;
        self.entities
            .write()
            .remove(&(schema.to_string(), name.to_string()));
        let dir = self.config.data_dir.join(schema).join(name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        self.catalog.save(&Self::catalog_path(&self.config))
    }

    /// Appends one row inside a write transaction.
    pub fn insert(&self, entity: &EntityRef, values: Vec<Value>) -> DbResult<TupleId> {
        let target = EntitySource::entity(self, entity)?;
        target.write(|tx| tx.append(values))
    }

    /// Binds, optimizes, lowers and executes a query.
    pub fn query(&self, query: &Query) -> DbResult<RecordSet> {
        self.execute(query, &CancellationToken::new())
    }

    /// As [`Database::query`], failing with a timeout once `deadline`
    /// elapses.
    pub fn query_with_deadline(
        &self,
        query: &Query,
        deadline: Duration,
    ) -> DbResult<RecordSet> {
        self.execute(query, &CancellationToken::with_deadline(deadline))
    }

    /// Executes and splits the result into paged response messages.
    pub fn query_paged(&self, query: &Query) -> DbResult<Vec<QueryResponse>> {
        let result = self.query(query)?;
        Ok(protocol::paginate(
            query.query_id.as_deref(),
            &result,
            self.config.max_message_size,
        ))
    }

    fn execute(&self, query: &Query, token: &CancellationToken) -> DbResult<RecordSet> {
        let span = tracing::debug_span!("query", id = ?query.query_id);
        let _enter = span.enter();

        let max_tuple_id = EntitySource::entity(self, &query.entity)?.max_tuple_id();

        let binder = Binder::new(&self.catalog, &self.config);
        let plan = binder.bind(query, max_tuple_id)?;
        tracing::trace!(plan = %plan, "bound");

        let plan = optimize(plan);
        let execution = lower(&plan)?;
        tracing::debug!(
            stages = execution.stages.len(),
            cost = execution.cost(),
            "executing"
        );

        let ctx = TaskContext {
            entities: self,
            cancellation: token,
        };
        Executor::execute(&execution, &ctx)
    }
}
