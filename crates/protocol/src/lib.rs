//! Wire surface: structured query messages, paged responses, status
//! codes and frame-based serialization.
//!
//! This crate defines messages only — service dispatch lives outside the
//! core. Frames are length-prefixed bincode.


use common::{DbError, DbResult, RecordSet};
use distance::Distance;
use expr::Predicate;
use serde::{Deserialize, Serialize};
use types::Value;

/// Reference to an entity inside a schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub schema: String,
    pub entity: String,
}

impl EntityRef {
    pub fn new(schema: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            entity: entity.into(),
        }
    }
}

/// Projection operation applied to the matched rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionOp {
    Select,
    SelectDistinct,
    Count,
    Exists,
    Min,
    Max,
    Sum,
    Mean,
}

/// One projected column, optionally renamed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionField {
    pub column: String,
    pub alias: Option<String>,
}

impl ProjectionField {
    pub fn named(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            alias: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub op: ProjectionOp,
    pub fields: Vec<ProjectionField>,
}

impl Projection {
    /// `SELECT` over the named columns.
    pub fn select(columns: &[&str]) -> Self {
        Self {
            op: ProjectionOp::Select,
            fields: columns.iter().map(|c| ProjectionField::named(*c)).collect(),
        }
    }

    pub fn count() -> Self {
        Self {
            op: ProjectionOp::Count,
            fields: Vec::new(),
        }
    }
}

/// k-nearest-neighbour predicate: one or more query vectors against a
/// vector column, with an optional weight vector per query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnnHint {
    pub column: String,
    pub k: usize,
    pub distance: Distance,
    pub queries: Vec<Value>,
    pub weights: Option<Vec<Value>>,
}

/// A structured query message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub query_id: Option<String>,
    pub entity: EntityRef,
    pub projection: Projection,
    pub predicate: Option<Predicate>,
    pub knn: Option<KnnHint>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

impl Query {
    pub fn new(entity: EntityRef, projection: Projection) -> Self {
        Self {
            query_id: None,
            entity,
            projection,
            predicate: None,
            knn: None,
            limit: None,
            skip: None,
        }
    }
}

/// One page of a streamed query result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query_id: Option<String>,
    pub page: u32,
    pub page_size: u32,
    pub max_page: u32,
    pub total_hits: u64,
    pub columns: Vec<String>,
    pub tuple_ids: Vec<u64>,
    pub rows: Vec<Vec<Value>>,
}

/// Rows per page so one response frame stays under `max_message_size`,
/// assuming rows the size of the first one (rounded up to a power of
/// two).
pub fn rows_per_page(set: &RecordSet, max_message_size: usize) -> usize {
    let first_row_bytes: usize = match set.get(0) {
        Some(record) => record.values.iter().map(|v| v.physical_size()).sum(),
        None => return 1,
    };
    let rounded = first_row_bytes.max(1).next_power_of_two();
    (max_message_size / rounded).max(1)
}

/// Splits a record set into paged responses. An empty set yields a single
/// empty page so the client always receives an answer.
pub fn paginate(
    query_id: Option<&str>,
    set: &RecordSet,
    max_message_size: usize,
) -> Vec<QueryResponse> {
    let page_size = rows_per_page(set, max_message_size);
    let total = set.len();
    let pages = total.div_ceil(page_size).max(1);
    let columns: Vec<String> = set
        .columns()
        .iter()
        .map(|c| c.name.simple().to_string())
        .collect();

    (0..pages)
        .map(|page| {
            let start = page * page_size;
            let end = (start + page_size).min(total);
            let mut tuple_ids = Vec::with_capacity(end - start);
            let mut rows = Vec::with_capacity(end - start);
            for i in start..end {
                let record = set.get(i).expect("index in range");
                tuple_ids.push(record.tuple_id.0);
                rows.push(record.values.to_vec());
            }
            QueryResponse {
                query_id: query_id.map(str::to_string),
                page: page as u32,
                page_size: page_size as u32,
                max_page: (pages - 1) as u32,
                total_hits: total as u64,
                columns: columns.clone(),
                tuple_ids,
                rows,
            }
        })
        .collect()
}

/// Status codes a query outcome maps onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    Ok,
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    Internal,
    DeadlineExceeded,
    Unknown,
}

/// Status with a human-readable description. No stack traces cross the
/// wire — only the error display string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: String::new(),
        }
    }

    pub fn from_error(err: &DbError) -> Self {
        Self {
            code: StatusCode::from(err),
            message: err.to_string(),
        }
    }
}

impl From<&DbError> for StatusCode {
    fn from(err: &DbError) -> Self {
        match err {
            // Missing schema/entity/column binds report "unknown ..."; any
            // other bind failure is an invalid request.
            DbError::Bind(msg) if msg.starts_with("unknown") => StatusCode::NotFound,
            DbError::Bind(_) | DbError::Syntax(_) => StatusCode::InvalidArgument,
            DbError::Type(_) | DbError::Size(_) => StatusCode::FailedPrecondition,
            DbError::Bounds(_)
            | DbError::Io(_)
            | DbError::Storage(_)
            | DbError::Execution(_)
            | DbError::Cancelled(_) => StatusCode::Internal,
            DbError::Timeout(_) => StatusCode::DeadlineExceeded,
            DbError::Unknown(_) => StatusCode::Unknown,
        }
    }
}

/// Frame codec: `[magic u16][version u8][reserved u8][payload len u32]`
/// header, all little-endian, followed by a bincode payload.
///
/// The frame cap is not a constant of its own — it derives from the same
/// `Config::max_message_size` that sizes response pages, so a response
/// built by [`paginate`] always fits one frame of the codec built from
/// the same config.
pub struct FrameCodec {
    max_frame: usize,
}

/// Distinguishes these frames from stray bytes on the connection.
const FRAME_MAGIC: u16 = 0xC0DB;
const FRAME_VERSION: u8 = 1;
const FRAME_HEADER_BYTES: usize = 8;

impl FrameCodec {
    pub fn new(config: &common::Config) -> Self {
        Self {
            max_frame: config.max_message_size,
        }
    }

    /// Mostly for tests: a codec with an explicit payload cap.
    pub fn with_limit(max_frame: usize) -> Self {
        Self { max_frame }
    }

    /// Serializes `message` into one header-prefixed frame.
    pub fn encode<T: Serialize>(&self, message: &T) -> DbResult<Vec<u8>> {
        let mut buf = vec![0u8; FRAME_HEADER_BYTES];
        let payload = bincode::serde::encode_to_vec(message, bincode::config::standard())
            .map_err(|e| DbError::Execution(format!("frame encode: {e}")))?;
        if payload.len() > self.max_frame {
            return Err(DbError::Execution(format!(
                "frame payload of {} bytes exceeds the configured {} byte cap",
                payload.len(),
                self.max_frame
            )));
        }
        buf[0..2].copy_from_slice(&FRAME_MAGIC.to_le_bytes());
        buf[2] = FRAME_VERSION;
        buf[4..8].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Writes one frame to `writer`.
    pub fn write<W: std::io::Write, T: Serialize>(
        &self,
        writer: &mut W,
        message: &T,
    ) -> DbResult<()> {
        let frame = self.encode(message)?;
        writer.write_all(&frame)?;
        Ok(())
    }

    /// Reads one frame from `reader`, rejecting foreign or oversized
    /// headers before touching the payload and refusing frames whose
    /// payload does not decode exactly (trailing bytes included).
    pub fn read<R: std::io::Read, T: for<'de> Deserialize<'de>>(
        &self,
        reader: &mut R,
    ) -> DbResult<T> {
        let mut header = [0u8; FRAME_HEADER_BYTES];
        reader.read_exact(&mut header)?;

        let magic = u16::from_le_bytes([header[0], header[1]]);
        if magic != FRAME_MAGIC {
            return Err(DbError::Syntax(format!(
                "not a frame header (magic {magic:#06x})"
            )));
        }
        if header[2] != FRAME_VERSION {
            return Err(DbError::Syntax(format!(
                "unsupported frame version {}",
                header[2]
            )));
        }
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if len > self.max_frame {
            return Err(DbError::Syntax(format!(
                "frame payload of {len} bytes exceeds the configured {} byte cap",
                self.max_frame
            )));
        }

        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload)?;

        let (message, consumed) =
            bincode::serde::decode_from_slice(&payload, bincode::config::standard())
                .map_err(|e| DbError::Syntax(format!("frame decode: {e}")))?;
        if consumed != payload.len() {
            return Err(DbError::Syntax(format!(
                "frame payload has {} trailing bytes",
                payload.len() - consumed
            )));
        }
        Ok(message)
    }
}
