//! Fixed-width value slots.
//!
//! Every slot is one null byte followed by the column type's physical
//! size, so a tuple id addresses its slot without indirection:
//! `page = 1 + id / per_page`, `offset = (id % per_page) * slot_size`.
//! Variable-length payloads (strings) are framed as `length:i32` + bytes
//! inside a region sized by the column's declared maximum.

use common::{DbError, DbResult};
use num_complex::Complex;
use types::{ColumnType, Value};

use crate::Page;

/// Bytes one value occupies on disk, null byte included.
pub fn slot_size(column_type: &ColumnType) -> usize {
    1 + column_type.physical_size()
}

/// Number of value slots a data page holds.
pub fn slots_per_page(page_size: usize, column_type: &ColumnType) -> usize {
    page_size / slot_size(column_type)
}

/// Data page index (0-based, header page excluded) and in-page offset of
/// a tuple's slot.
pub fn locate(tuple_id: u64, page_size: usize, column_type: &ColumnType) -> (u64, usize) {
    let per_page = slots_per_page(page_size, column_type) as u64;
    let page = tuple_id / per_page;
    let slot = (tuple_id % per_page) as usize;
    (page, slot * slot_size(column_type))
}

/// Writes `value` into its slot. The value must already have been
/// validated against the column definition.
pub fn write_value(
    page: &mut Page,
    offset: usize,
    column_type: &ColumnType,
    value: &Value,
) -> DbResult<()> {
    if value.is_null() {
        page.put_i8(offset, 0)?;
        // Slot payload is left as-is; the null byte governs.
        return Ok(());
    }
    page.put_i8(offset, 1)?;
    let payload = offset + 1;
    match (column_type, value) {
        (ColumnType::Boolean, Value::Boolean(v)) => page.put_i8(payload, i8::from(*v)),
        (ColumnType::Byte, Value::Byte(v)) => page.put_i8(payload, *v),
        (ColumnType::Short, Value::Short(v)) => page.put_i16(payload, *v),
        (ColumnType::Int, Value::Int(v)) => page.put_i32(payload, *v),
        (ColumnType::Long, Value::Long(v)) => page.put_i64(payload, *v),
        (ColumnType::Float, Value::Float(v)) => page.put_f32(payload, *v),
        (ColumnType::Double, Value::Double(v)) => page.put_f64(payload, *v),
        (ColumnType::String { size }, Value::String(s)) => {
            if s.len() > *size {
                return Err(DbError::Size(format!(
                    "string of {} bytes exceeds declared maximum {}",
                    s.len(),
                    size
                )));
            }
            page.put_i32(payload, s.len() as i32)?;
            page.put_bytes(payload + 4, s.as_bytes())
        }
        (ColumnType::Complex32, Value::Complex32(c)) => {
            page.put_f32(payload, c.re)?;
            page.put_f32(payload + 4, c.im)
        }
        (ColumnType::Complex64, Value::Complex64(c)) => {
            page.put_f64(payload, c.re)?;
            page.put_f64(payload + 8, c.im)
        }
        (ColumnType::ByteVector { .. }, Value::ByteVector(v)) => {
            for (i, e) in v.iter().enumerate() {
                page.put_i8(payload + i, *e)?;
            }
            Ok(())
        }
        (ColumnType::ShortVector { .. }, Value::ShortVector(v)) => {
            for (i, e) in v.iter().enumerate() {
                page.put_i16(payload + 2 * i, *e)?;
            }
            Ok(())
        }
        (ColumnType::IntVector { .. }, Value::IntVector(v)) => {
            for (i, e) in v.iter().enumerate() {
                page.put_i32(payload + 4 * i, *e)?;
            }
            Ok(())
        }
        (ColumnType::LongVector { .. }, Value::LongVector(v)) => {
            for (i, e) in v.iter().enumerate() {
                page.put_i64(payload + 8 * i, *e)?;
            }
            Ok(())
        }
        (ColumnType::FloatVector { .. }, Value::FloatVector(v)) => {
            for (i, e) in v.iter().enumerate() {
                page.put_f32(payload + 4 * i, *e)?;
            }
            Ok(())
        }
        (ColumnType::DoubleVector { .. }, Value::DoubleVector(v)) => {
            for (i, e) in v.iter().enumerate() {
                page.put_f64(payload + 8 * i, *e)?;
            }
            Ok(())
        }
        (ColumnType::Complex32Vector { .. }, Value::Complex32Vector(v)) => {
            for (i, c) in v.iter().enumerate() {
                page.put_f32(payload + 8 * i, c.re)?;
                page.put_f32(payload + 8 * i + 4, c.im)?;
            }
            Ok(())
        }
        (ColumnType::Complex64Vector { .. }, Value::Complex64Vector(v)) => {
            for (i, c) in v.iter().enumerate() {
                page.put_f64(payload + 16 * i, c.re)?;
                page.put_f64(payload + 16 * i + 8, c.im)?;
            }
            Ok(())
        }
        (t, v) => Err(DbError::Type(format!(
            "cannot store {} value in {t} slot",
            v.column_type().map(|t| t.name()).unwrap_or("NULL")
        ))),
    }
}

/// Reads the value stored in a slot.
pub fn read_value(page: &Page, offset: usize, column_type: &ColumnType) -> DbResult<Value> {
    if page.get_i8(offset)? == 0 {
        return Ok(Value::Null);
    }
    let payload = offset + 1;
    Ok(match column_type {
        ColumnType::Boolean => Value::Boolean(page.get_i8(payload)? != 0),
        ColumnType::Byte => Value::Byte(page.get_i8(payload)?),
        ColumnType::Short => Value::Short(page.get_i16(payload)?),
        ColumnType::Int => Value::Int(page.get_i32(payload)?),
        ColumnType::Long => Value::Long(page.get_i64(payload)?),
        ColumnType::Float => Value::Float(page.get_f32(payload)?),
        ColumnType::Double => Value::Double(page.get_f64(payload)?),
        ColumnType::String { size } => {
            let len = page.get_i32(payload)?;
            if len < 0 || len as usize > *size {
                return Err(DbError::Storage(format!(
                    "corrupt string slot: length {len} out of range"
                )));
            }
            let bytes = page.get_bytes(payload + 4, len as usize)?;
            Value::String(std::str::from_utf8(bytes).map_err(|e| {
                DbError::Storage(format!("corrupt string slot: {e}"))
            })?.to_string())
        }
        ColumnType::Complex32 => {
            Value::Complex32(Complex::new(page.get_f32(payload)?, page.get_f32(payload + 4)?))
        }
        ColumnType::Complex64 => {
            Value::Complex64(Complex::new(page.get_f64(payload)?, page.get_f64(payload + 8)?))
        }
        ColumnType::ByteVector { size } => {
            let mut v = Vec::with_capacity(*size);
            for i in 0..*size {
                v.push(page.get_i8(payload + i)?);
            }
            Value::ByteVector(v)
        }
        ColumnType::ShortVector { size } => {
            let mut v = Vec::with_capacity(*size);
            for i in 0..*size {
                v.push(page.get_i16(payload + 2 * i)?);
            }
            Value::ShortVector(v)
        }
        ColumnType::IntVector { size } => {
            let mut v = Vec::with_capacity(*size);
            for i in 0..*size {
                v.push(page.get_i32(payload + 4 * i)?);
            }
            Value::IntVector(v)
        }
        ColumnType::LongVector { size } => {
            let mut v = Vec::with_capacity(*size);
            for i in 0..*size {
                v.push(page.get_i64(payload + 8 * i)?);
            }
            Value::LongVector(v)
        }
        ColumnType::FloatVector { size } => {
            let mut v = Vec::with_capacity(*size);
            for i in 0..*size {
                v.push(page.get_f32(payload + 4 * i)?);
            }
            Value::FloatVector(v)
        }
        ColumnType::DoubleVector { size } => {
            let mut v = Vec::with_capacity(*size);
            for i in 0..*size {
                v.push(page.get_f64(payload + 8 * i)?);
            }
            Value::DoubleVector(v)
        }
        ColumnType::Complex32Vector { size } => {
            let mut v = Vec::with_capacity(*size);
            for i in 0..*size {
                v.push(Complex::new(
                    page.get_f32(payload + 8 * i)?,
                    page.get_f32(payload + 8 * i + 4)?,
                ));
            }
            Value::Complex32Vector(v)
        }
        ColumnType::Complex64Vector { size } => {
            let mut v = Vec::with_capacity(*size);
            for i in 0..*size {
                v.push(Complex::new(
                    page.get_f64(payload + 16 * i)?,
                    page.get_f64(payload + 16 * i + 8)?,
                ));
            }
            Value::Complex64Vector(v)
        }
    })
}
