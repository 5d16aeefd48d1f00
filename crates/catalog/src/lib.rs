//! Catalogue: schema → entity → column metadata with JSON persistence.
//!
//! Deliberately thin — the hard machinery lives in the entity runtime and
//! the planner. Lookups return `Bind` errors so a missing name surfaces
//! to the client as an invalid query rather than an internal fault.

use std::{fs, path::Path};

use ahash::RandomState;
use common::{ColumnDef, ColumnId, ColumnName, DbError, DbResult};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use types::ColumnType;

type Map<K, V> = HashMap<K, V, RandomState>;

/// Persistent catalogue of schemas and their entities.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalog {
    schemas: Vec<SchemaMeta>,
    next_column_id: u64,
    #[serde(skip)]
    #[serde(default)]
    schema_index: Map<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            schemas: Vec::new(),
            next_column_id: 1,
            schema_index: Map::default(),
        }
    }

    /// Load from disk, returning an empty catalogue if the file does not
    /// exist yet.
    pub fn load(path: &Path) -> DbResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read_to_string(path)?;
        let mut catalog: Catalog = serde_json::from_str(&data)
            .map_err(|err| DbError::Storage(format!("invalid catalogue file: {err}")))?;
        catalog.rebuild_indexes();
        Ok(catalog)
    }

    /// Persist as pretty JSON.
    pub fn save(&self, path: &Path) -> DbResult<()> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|err| DbError::Storage(format!("serialize catalogue failed: {err}")))?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn create_schema(&mut self, name: &str) -> DbResult<()> {
        if name.is_empty() {
            return Err(DbError::Syntax("schema name must not be empty".into()));
        }
        if self.schema_index.contains_key(name) {
            return Err(DbError::Bind(format!("schema '{name}' already exists")));
        }
        self.schemas.push(SchemaMeta {
            name: name.to_string(),
            entities: Vec::new(),
            entity_index: Map::default(),
        });
        self.rebuild_indexes();
        Ok(())
    }

    pub fn drop_schema(&mut self, name: &str) -> DbResult<()> {
        let idx = self.schema_position(name)?;
        self.schemas.remove(idx);
        self.rebuild_indexes();
        Ok(())
    }

    /// Registers an entity with the given columns, assigning a stable
    /// `ColumnId` to each.
    pub fn create_entity(
        &mut self,
        schema: &str,
        entity: &str,
        columns: Vec<(String, ColumnType, bool)>,
    ) -> DbResult<()> {
        if columns.is_empty() {
            return Err(DbError::Syntax(
                "entity must declare at least one column".into(),
            ));
        }
        let schema_idx = self.schema_position(schema)?;
        if self.schemas[schema_idx].entity_index.contains_key(entity) {
            return Err(DbError::Bind(format!(
                "entity '{schema}.{entity}' already exists"
            )));
        }

        let mut metas = Vec::with_capacity(columns.len());
        for (column, column_type, nullable) in columns {
            if metas
                .iter()
                .any(|m: &ColumnMeta| m.def.name.simple() == column)
            {
                return Err(DbError::Bind(format!(
                    "duplicate column '{column}' on entity '{schema}.{entity}'"
                )));
            }
            let id = ColumnId(self.next_column_id);
            self.next_column_id += 1;
            metas.push(ColumnMeta {
                id,
                def: ColumnDef::new(
                    ColumnName::new(schema, entity, column),
                    column_type,
                    nullable,
                ),
            });
        }

        self.schemas[schema_idx].entities.push(EntityMeta {
            name: entity.to_string(),
            columns: metas,
        });
        self.rebuild_indexes();
        Ok(())
    }

    pub fn drop_entity(&mut self, schema: &str, entity: &str) -> DbResult<()> {
        let schema_idx = self.schema_position(schema)?;
        let s = &mut self.schemas[schema_idx];
        let idx = s.entity_index.get(entity).copied().ok_or_else(|| {
            DbError::Bind(format!("unknown entity '{schema}.{entity}'"))
        })?;
        s.entities.remove(idx);
        self.rebuild_indexes();
        Ok(())
    }

    pub fn schema(&self, name: &str) -> DbResult<&SchemaMeta> {
        let idx = self.schema_position(name)?;
        Ok(&self.schemas[idx])
    }

    pub fn entity(&self, schema: &str, entity: &str) -> DbResult<&EntityMeta> {
        self.schema(schema)?.entity(entity).map_err(|_| {
            DbError::Bind(format!("unknown entity '{schema}.{entity}'"))
        })
    }

    pub fn schemas(&self) -> impl Iterator<Item = &SchemaMeta> {
        self.schemas.iter()
    }

    fn schema_position(&self, name: &str) -> DbResult<usize> {
        self.schema_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::Bind(format!("unknown schema '{name}'")))
    }

    fn rebuild_indexes(&mut self) {
        self.schema_index.clear();
        for (idx, schema) in self.schemas.iter_mut().enumerate() {
            self.schema_index.insert(schema.name.clone(), idx);
            schema.rebuild_index();
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

/// A named group of entities.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaMeta {
    pub name: String,
    entities: Vec<EntityMeta>,
    #[serde(skip)]
    #[serde(default)]
    entity_index: Map<String, usize>,
}

impl SchemaMeta {
    pub fn entity(&self, name: &str) -> DbResult<&EntityMeta> {
        let idx = self
            .entity_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::Bind(format!("unknown entity '{name}'")))?;
        Ok(&self.entities[idx])
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityMeta> {
        self.entities.iter()
    }

    fn rebuild_index(&mut self) {
        self.entity_index.clear();
        for (idx, entity) in self.entities.iter().enumerate() {
            self.entity_index.insert(entity.name.clone(), idx);
        }
    }
}

/// Metadata of one entity: its name and typed columns.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityMeta {
    pub name: String,
    columns: Vec<ColumnMeta>,
}

impl EntityMeta {
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> DbResult<&ColumnMeta> {
        self.columns
            .iter()
            .find(|c| c.def.name.simple() == name)
            .ok_or_else(|| {
                DbError::Bind(format!(
                    "unknown column '{name}' on entity '{}'",
                    self.name
                ))
            })
    }

    /// Column definitions in declaration order.
    pub fn defs(&self) -> Vec<ColumnDef> {
        self.columns.iter().map(|c| c.def.clone()).collect()
    }
}

/// A column definition plus the id naming its on-disk store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub id: ColumnId,
    pub def: ColumnDef,
}
