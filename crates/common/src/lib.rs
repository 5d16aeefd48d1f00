#[cfg(test)]
mod tests;

mod records;

pub use records::{Record, RecordSet};

use std::{fmt, io, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::{ColumnType, Value, ValueError};

/// Stable 64-bit row identifier within an entity. Assigned monotonically,
/// never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TupleId(pub u64);

/// Stable identifier naming one column's on-disk store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnId(pub u64);

/// Logical identifier for a page within a column store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(pub u64);

/// Fully-qualified column name: `schema.entity.column`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnName {
    pub schema: String,
    pub entity: String,
    pub column: String,
}

impl ColumnName {
    pub fn new(
        schema: impl Into<String>,
        entity: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            entity: entity.into(),
            column: column.into(),
        }
    }

    /// Name for a synthesized column that belongs to no entity, e.g. an
    /// aggregate result.
    pub fn synthetic(column: impl Into<String>) -> Self {
        Self::new("", "", column)
    }

    /// The unqualified column part.
    pub fn simple(&self) -> &str {
        &self.column
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.schema.is_empty() && self.entity.is_empty() {
            write!(f, "{}", self.column)
        } else {
            write!(f, "{}.{}.{}", self.schema, self.entity, self.column)
        }
    }
}

/// Column definition: name, logical type (which carries vector sizes) and
/// nullability.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: ColumnName,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl ColumnDef {
    pub fn new(name: ColumnName, column_type: ColumnType, nullable: bool) -> Self {
        Self {
            name,
            column_type,
            nullable,
        }
    }

    pub fn logical_size(&self) -> usize {
        self.column_type.logical_size()
    }

    pub fn physical_size(&self) -> usize {
        self.column_type.physical_size()
    }

    /// Zero/empty of the declared type for non-nullable columns, null
    /// otherwise.
    pub fn default_value(&self) -> Value {
        if self.nullable {
            Value::Null
        } else {
            self.column_type.default_value()
        }
    }

    /// Checks `value` against this definition. A vector of the right kind
    /// but the wrong element count is a size error; anything else that
    /// does not match is a type error.
    pub fn validate(&self, value: &Value) -> DbResult<()> {
        if value.is_null() {
            return if self.nullable {
                Ok(())
            } else {
                Err(DbError::Type(format!(
                    "column {} is not nullable",
                    self.name
                )))
            };
        }
        if self.column_type.validates(value) {
            return Ok(());
        }
        if let Some(vt) = value.column_type()
            && vt.name() == self.column_type.name()
            && self.column_type.is_vector()
        {
            return Err(DbError::Size(format!(
                "column {} expects {} elements, got {}",
                self.name,
                self.column_type.logical_size(),
                value.logical_size()
            )));
        }
        Err(DbError::Type(format!(
            "value of type {} is not valid for column {} of type {}",
            value.column_type().map(|t| t.name()).unwrap_or("NULL"),
            self.name,
            self.column_type
        )))
    }
}

/// Page access violations. Point accesses past the capacity and slice
/// writes that do not fit are distinct kinds so callers can tell a
/// too-large value from a too-long array write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoundsError {
    #[error("offset {offset} plus width {width} exceeds page capacity {capacity}")]
    OutOfRange {
        offset: usize,
        width: usize,
        capacity: usize,
    },
    #[error("slice of {len} bytes does not fit at offset {offset} (capacity {capacity})")]
    Overflow {
        offset: usize,
        len: usize,
        capacity: usize,
    },
}

/// Canonical error type shared across all subsystems.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("bind: {0}")]
    Bind(String),
    #[error("syntax: {0}")]
    Syntax(String),
    #[error("type: {0}")]
    Type(String),
    #[error("size: {0}")]
    Size(String),
    #[error(transparent)]
    Bounds(#[from] BoundsError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("storage: {0}")]
    Storage(String),
    #[error("exec: {0}")]
    Execution(String),
    #[error("cancelled: {0}")]
    Cancelled(String),
    #[error("deadline exceeded: {0}")]
    Timeout(String),
    #[error("unknown: {0}")]
    Unknown(String),
}

impl From<ValueError> for DbError {
    fn from(err: ValueError) -> Self {
        match err {
            ValueError::Type(msg) => DbError::Type(msg),
            ValueError::Size { expected, actual } => {
                DbError::Size(format!("expected {expected} elements, got {actual}"))
            }
        }
    }
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration shared by all components.
///
/// # Example
/// ```
/// use common::Config;
/// use std::path::PathBuf;
///
/// let config = Config::builder()
///     .data_dir(PathBuf::from("./my_db"))
///     .knn_parallelism(4)
///     .build();
/// assert_eq!(config.page_size, 4096);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Directory holding the catalogue file and one subdirectory per
    /// entity.
    #[builder(default = PathBuf::from("./db_data"))]
    pub data_dir: PathBuf,
    /// Fixed page allocation in bytes.
    #[builder(default = 4096)]
    pub page_size: usize,
    /// Number of pages each entity's buffer pool keeps resident.
    #[builder(default = 256)]
    pub buffer_pool_pages: usize,
    /// Number of contiguous tuple-id ranges a kNN task scans in parallel.
    #[builder(default = 2)]
    pub knn_parallelism: usize,
    /// Upper bound for one response frame; drives result paging.
    #[builder(default = 4 * 1024 * 1024)]
    pub max_message_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./db_data"),
            page_size: 4096,
            buffer_pool_pages: 256,
            knn_parallelism: 2,
            max_message_size: 4 * 1024 * 1024,
        }
    }
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{
        ColumnDef, ColumnId, ColumnName, Config, DbError, DbResult, PageId, Record, RecordSet,
        TupleId,
    };
    pub use types::{ColumnType, Value};
}
