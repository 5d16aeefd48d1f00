//! Column-store header, occupying page 0 of every column file.

use common::{DbError, DbResult};
use types::ColumnType;

use crate::Page;

/// Current on-disk format version.
pub const COLUMN_STORE_VERSION: u16 = 1;

const OFF_VERSION: usize = 0;
const OFF_TYPE_TAG: usize = 2;
const OFF_NULLABLE: usize = 3;
const OFF_LOGICAL_SIZE: usize = 4;
const OFF_ROW_COUNT: usize = 8;
const OFF_FREE_LIST: usize = 16;

/// Header fields: format version, column type, nullability, row count and
/// free-list head. Tuple ids are never reused, so the free list stays
/// empty for now; the field is carried for format stability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreHeader {
    pub version: u16,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub row_count: u64,
    pub free_list_head: u64,
}

impl StoreHeader {
    pub fn new(column_type: ColumnType, nullable: bool) -> Self {
        Self {
            version: COLUMN_STORE_VERSION,
            column_type,
            nullable,
            row_count: 0,
            free_list_head: 0,
        }
    }

    pub fn write_to(&self, page: &mut Page) -> DbResult<()> {
        page.put_i16(OFF_VERSION, self.version as i16)?;
        page.put_i8(OFF_TYPE_TAG, type_tag(&self.column_type) as i8)?;
        page.put_i8(OFF_NULLABLE, i8::from(self.nullable))?;
        page.put_i32(OFF_LOGICAL_SIZE, self.column_type.logical_size() as i32)?;
        page.put_i64(OFF_ROW_COUNT, self.row_count as i64)?;
        page.put_i64(OFF_FREE_LIST, self.free_list_head as i64)?;
        Ok(())
    }

    pub fn read_from(page: &Page) -> DbResult<Self> {
        let version = page.get_i16(OFF_VERSION)? as u16;
        if version != COLUMN_STORE_VERSION {
            return Err(DbError::Storage(format!(
                "unsupported column store version {version}"
            )));
        }
        let tag = page.get_i8(OFF_TYPE_TAG)? as u8;
        let nullable = page.get_i8(OFF_NULLABLE)? != 0;
        let logical_size = page.get_i32(OFF_LOGICAL_SIZE)? as usize;
        let column_type = type_from_tag(tag, logical_size)?;
        Ok(Self {
            version,
            column_type,
            nullable,
            row_count: page.get_i64(OFF_ROW_COUNT)? as u64,
            free_list_head: page.get_i64(OFF_FREE_LIST)? as u64,
        })
    }
}

fn type_tag(t: &ColumnType) -> u8 {
    use ColumnType::*;
    match t {
        Boolean => 1,
        Byte => 2,
        Short => 3,
        Int => 4,
        Long => 5,
        Float => 6,
        Double => 7,
        String { .. } => 8,
        Complex32 => 9,
        Complex64 => 10,
        ByteVector { .. } => 11,
        ShortVector { .. } => 12,
        IntVector { .. } => 13,
        LongVector { .. } => 14,
        FloatVector { .. } => 15,
        DoubleVector { .. } => 16,
        Complex32Vector { .. } => 17,
        Complex64Vector { .. } => 18,
    }
}

fn type_from_tag(tag: u8, size: usize) -> DbResult<ColumnType> {
    use ColumnType::*;
    Ok(match tag {
        1 => Boolean,
        2 => Byte,
        3 => Short,
        4 => Int,
        5 => Long,
        6 => Float,
        7 => Double,
        8 => String { size },
        9 => Complex32,
        10 => Complex64,
        11 => ByteVector { size },
        12 => ShortVector { size },
        13 => IntVector { size },
        14 => LongVector { size },
        15 => FloatVector { size },
        16 => DoubleVector { size },
        17 => Complex32Vector { size },
        18 => Complex64Vector { size },
        other => {
            return Err(DbError::Storage(format!(
                "unknown column type tag {other}"
            )));
        }
    })
}
