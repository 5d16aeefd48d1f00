//! Paged storage primitives.
//!
//! A [`Page`] is the fixed-size unit of disk I/O: a byte region with
//! bounds-checked little-endian accessors for every numeric width. Page 0
//! of a column store holds its [`StoreHeader`]; data pages hold
//! fixed-width value slots addressed directly by tuple id (see [`slots`]).


mod header;
pub mod slots;

pub use header::{COLUMN_STORE_VERSION, StoreHeader};

use common::{BoundsError, DbResult};

/// Default page allocation, shared with `common::Config`.
pub const PAGE_SIZE: usize = 4096;

/// A fixed-capacity byte page.
///
/// Accessor offsets are byte offsets from the start of the page. Any point
/// access whose `offset + width` exceeds the capacity fails with
/// `BoundsError::OutOfRange`; a slice write that does not fit fails with
/// `BoundsError::Overflow` and leaves the page unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    data: Vec<u8>,
}

impl Page {
    /// A zeroed page of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
        }
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn check(&self, offset: usize, width: usize) -> Result<(), BoundsError> {
        if offset.checked_add(width).is_none_or(|end| end > self.data.len()) {
            return Err(BoundsError::OutOfRange {
                offset,
                width,
                capacity: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn get_i8(&self, offset: usize) -> DbResult<i8> {
        self.check(offset, 1)?;
        Ok(self.data[offset] as i8)
    }

    pub fn put_i8(&mut self, offset: usize, value: i8) -> DbResult<()> {
        self.check(offset, 1)?;
        self.data[offset] = value as u8;
        Ok(())
    }

    pub fn get_i16(&self, offset: usize) -> DbResult<i16> {
        self.check(offset, 2)?;
        Ok(i16::from_le_bytes(
            self.data[offset..offset + 2].try_into().unwrap(),
        ))
    }

    pub fn put_i16(&mut self, offset: usize, value: i16) -> DbResult<()> {
        self.check(offset, 2)?;
        self.data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn get_i32(&self, offset: usize) -> DbResult<i32> {
        self.check(offset, 4)?;
        Ok(i32::from_le_bytes(
            self.data[offset..offset + 4].try_into().unwrap(),
        ))
    }

    pub fn put_i32(&mut self, offset: usize, value: i32) -> DbResult<()> {
        self.check(offset, 4)?;
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn get_i64(&self, offset: usize) -> DbResult<i64> {
        self.check(offset, 8)?;
        Ok(i64::from_le_bytes(
            self.data[offset..offset + 8].try_into().unwrap(),
        ))
    }

    pub fn put_i64(&mut self, offset: usize, value: i64) -> DbResult<()> {
        self.check(offset, 8)?;
        self.data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn get_f32(&self, offset: usize) -> DbResult<f32> {
        Ok(f32::from_bits(self.get_i32(offset)? as u32))
    }

    pub fn put_f32(&mut self, offset: usize, value: f32) -> DbResult<()> {
        self.put_i32(offset, value.to_bits() as i32)
    }

    pub fn get_f64(&self, offset: usize) -> DbResult<f64> {
        Ok(f64::from_bits(self.get_i64(offset)? as u64))
    }

    pub fn put_f64(&mut self, offset: usize, value: f64) -> DbResult<()> {
        self.put_i64(offset, value.to_bits() as i64)
    }

    pub fn get_bytes(&self, offset: usize, len: usize) -> DbResult<&[u8]> {
        self.check(offset, len)?;
        Ok(&self.data[offset..offset + len])
    }

    /// Writes `bytes` at `offset`. A slice longer than the remaining
    /// capacity is an overflow, distinct from a point access past the end.
    pub fn put_bytes(&mut self, offset: usize, bytes: &[u8]) -> DbResult<()> {
        if offset
            .checked_add(bytes.len())
            .is_none_or(|end| end > self.data.len())
        {
            return Err(BoundsError::Overflow {
                offset,
                len: bytes.len(),
                capacity: self.data.len(),
            }
            .into());
        }
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}
