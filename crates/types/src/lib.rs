use std::cmp::Ordering;
use std::fmt;

use num_complex::Complex;
use serde::{Deserialize, Serialize};
use thiserror::Error;


mod arith;
mod vector;

pub use arith::ArithOp;

/// Errors raised by value-level operations.
///
/// Type and size violations are kept separate so callers can map them to
/// distinct status codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("type: {0}")]
    Type(String),
    #[error("size: expected {expected} elements, got {actual}")]
    Size { expected: usize, actual: usize },
}

pub type ValueResult<T> = Result<T, ValueError>;

/// Logical column types. Vector types carry their element count; string
/// columns carry their maximum byte length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String { size: usize },
    Complex32,
    Complex64,
    ByteVector { size: usize },
    ShortVector { size: usize },
    IntVector { size: usize },
    LongVector { size: usize },
    FloatVector { size: usize },
    DoubleVector { size: usize },
    Complex32Vector { size: usize },
    Complex64Vector { size: usize },
}

impl ColumnType {
    /// Logical size: 1 for scalars, the element count for vectors, the
    /// maximum byte length for strings.
    pub fn logical_size(&self) -> usize {
        use ColumnType::*;
        match self {
            Boolean | Byte | Short | Int | Long | Float | Double | Complex32 | Complex64 => 1,
            String { size }
            | ByteVector { size }
            | ShortVector { size }
            | IntVector { size }
            | LongVector { size }
            | FloatVector { size }
            | DoubleVector { size }
            | Complex32Vector { size }
            | Complex64Vector { size } => *size,
        }
    }

    /// On-disk payload size in bytes.
    pub fn physical_size(&self) -> usize {
        use ColumnType::*;
        match self {
            Boolean | Byte => 1,
            Short => 2,
            Int | Float => 4,
            Long | Double | Complex32 => 8,
            Complex64 => 16,
            String { size } => 4 + size,
            ByteVector { size } => *size,
            ShortVector { size } => 2 * size,
            IntVector { size } | FloatVector { size } => 4 * size,
            LongVector { size } | DoubleVector { size } | Complex32Vector { size } => 8 * size,
            Complex64Vector { size } => 16 * size,
        }
    }

    pub fn is_vector(&self) -> bool {
        use ColumnType::*;
        matches!(
            self,
            ByteVector { .. }
                | ShortVector { .. }
                | IntVector { .. }
                | LongVector { .. }
                | FloatVector { .. }
                | DoubleVector { .. }
                | Complex32Vector { .. }
                | Complex64Vector { .. }
        )
    }

    pub fn is_numeric(&self) -> bool {
        use ColumnType::*;
        matches!(
            self,
            Byte | Short | Int | Long | Float | Double | Complex32 | Complex64
        ) || self.is_vector()
    }

    pub fn is_complex(&self) -> bool {
        use ColumnType::*;
        matches!(
            self,
            Complex32 | Complex64 | Complex32Vector { .. } | Complex64Vector { .. }
        )
    }

    /// Whether `value` may be stored in a column of this type. Vector
    /// values must match the declared element count exactly; strings must
    /// fit the declared maximum. `Null` is never valid here — nullability
    /// is decided by the column definition.
    pub fn validates(&self, value: &Value) -> bool {
        use ColumnType::*;
        match (self, value) {
            (Boolean, Value::Boolean(_)) => true,
            (Byte, Value::Byte(_)) => true,
            (Short, Value::Short(_)) => true,
            (Int, Value::Int(_)) => true,
            (Long, Value::Long(_)) => true,
            (Float, Value::Float(_)) => true,
            (Double, Value::Double(_)) => true,
            (String { size }, Value::String(s)) => s.len() <= *size,
            (Complex32, Value::Complex32(_)) => true,
            (Complex64, Value::Complex64(_)) => true,
            (ByteVector { size }, Value::ByteVector(v)) => v.len() == *size,
            (ShortVector { size }, Value::ShortVector(v)) => v.len() == *size,
            (IntVector { size }, Value::IntVector(v)) => v.len() == *size,
            (LongVector { size }, Value::LongVector(v)) => v.len() == *size,
            (FloatVector { size }, Value::FloatVector(v)) => v.len() == *size,
            (DoubleVector { size }, Value::DoubleVector(v)) => v.len() == *size,
            (Complex32Vector { size }, Value::Complex32Vector(v)) => v.len() == *size,
            (Complex64Vector { size }, Value::Complex64Vector(v)) => v.len() == *size,
            _ => false,
        }
    }

    /// Zero/empty value of this type.
    pub fn default_value(&self) -> Value {
        use ColumnType::*;
        match self {
            Boolean => Value::Boolean(false),
            Byte => Value::Byte(0),
            Short => Value::Short(0),
            Int => Value::Int(0),
            Long => Value::Long(0),
            Float => Value::Float(0.0),
            Double => Value::Double(0.0),
            String { .. } => Value::String(std::string::String::new()),
            Complex32 => Value::Complex32(Complex::new(0.0, 0.0)),
            Complex64 => Value::Complex64(Complex::new(0.0, 0.0)),
            ByteVector { size } => Value::ByteVector(vec![0; *size]),
            ShortVector { size } => Value::ShortVector(vec![0; *size]),
            IntVector { size } => Value::IntVector(vec![0; *size]),
            LongVector { size } => Value::LongVector(vec![0; *size]),
            FloatVector { size } => Value::FloatVector(vec![0.0; *size]),
            DoubleVector { size } => Value::DoubleVector(vec![0.0; *size]),
            Complex32Vector { size } => {
                Value::Complex32Vector(vec![Complex::new(0.0, 0.0); *size])
            }
            Complex64Vector { size } => {
                Value::Complex64Vector(vec![Complex::new(0.0, 0.0); *size])
            }
        }
    }

    pub fn name(&self) -> &'static str {
        use ColumnType::*;
        match self {
            Boolean => "BOOLEAN",
            Byte => "BYTE",
            Short => "SHORT",
            Int => "INT",
            Long => "LONG",
            Float => "FLOAT",
            Double => "DOUBLE",
            String { .. } => "STRING",
            Complex32 => "COMPLEX32",
            Complex64 => "COMPLEX64",
            ByteVector { .. } => "BYTE_VECTOR",
            ShortVector { .. } => "SHORT_VECTOR",
            IntVector { .. } => "INT_VECTOR",
            LongVector { .. } => "LONG_VECTOR",
            FloatVector { .. } => "FLOAT_VECTOR",
            DoubleVector { .. } => "DOUBLE_VECTOR",
            Complex32Vector { .. } => "COMPLEX32_VECTOR",
            Complex64Vector { .. } => "COMPLEX64_VECTOR",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_vector() || matches!(self, ColumnType::String { .. }) {
            write!(f, "{}[{}]", self.name(), self.logical_size())
        } else {
            write!(f, "{}", self.name())
        }
    }
}

/// A single database value: scalar, string, complex or vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Complex32(Complex<f32>),
    Complex64(Complex<f64>),
    ByteVector(Vec<i8>),
    ShortVector(Vec<i16>),
    IntVector(Vec<i32>),
    LongVector(Vec<i64>),
    FloatVector(Vec<f32>),
    DoubleVector(Vec<f64>),
    Complex32Vector(Vec<Complex<f32>>),
    Complex64Vector(Vec<Complex<f64>>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The column type this value inhabits, or `None` for `Null`.
    pub fn column_type(&self) -> Option<ColumnType> {
        use Value::*;
        Some(match self {
            Null => return None,
            Boolean(_) => ColumnType::Boolean,
            Byte(_) => ColumnType::Byte,
            Short(_) => ColumnType::Short,
            Int(_) => ColumnType::Int,
            Long(_) => ColumnType::Long,
            Float(_) => ColumnType::Float,
            Double(_) => ColumnType::Double,
            String(s) => ColumnType::String { size: s.len() },
            Complex32(_) => ColumnType::Complex32,
            Complex64(_) => ColumnType::Complex64,
            ByteVector(v) => ColumnType::ByteVector { size: v.len() },
            ShortVector(v) => ColumnType::ShortVector { size: v.len() },
            IntVector(v) => ColumnType::IntVector { size: v.len() },
            LongVector(v) => ColumnType::LongVector { size: v.len() },
            FloatVector(v) => ColumnType::FloatVector { size: v.len() },
            DoubleVector(v) => ColumnType::DoubleVector { size: v.len() },
            Complex32Vector(v) => ColumnType::Complex32Vector { size: v.len() },
            Complex64Vector(v) => ColumnType::Complex64Vector { size: v.len() },
        })
    }

    /// Logical size: element count for vectors, 1 for everything else
    /// (a complex vector of n elements reports n).
    pub fn logical_size(&self) -> usize {
        use Value::*;
        match self {
            ByteVector(v) => v.len(),
            ShortVector(v) => v.len(),
            IntVector(v) => v.len(),
            LongVector(v) => v.len(),
            FloatVector(v) => v.len(),
            DoubleVector(v) => v.len(),
            Complex32Vector(v) => v.len(),
            Complex64Vector(v) => v.len(),
            _ => 1,
        }
    }

    /// Size of the value's payload in bytes.
    pub fn physical_size(&self) -> usize {
        use Value::*;
        match self {
            Null => 0,
            Boolean(_) | Byte(_) => 1,
            Short(_) => 2,
            Int(_) | Float(_) => 4,
            Long(_) | Double(_) | Complex32(_) => 8,
            Complex64(_) => 16,
            String(s) => 4 + s.len(),
            ByteVector(v) => v.len(),
            ShortVector(v) => 2 * v.len(),
            IntVector(v) => 4 * v.len(),
            LongVector(v) => 8 * v.len(),
            FloatVector(v) => 4 * v.len(),
            DoubleVector(v) => 8 * v.len(),
            Complex32Vector(v) => 8 * v.len(),
            Complex64Vector(v) => 16 * v.len(),
        }
    }

    pub fn is_vector(&self) -> bool {
        self.column_type().is_some_and(|t| t.is_vector())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Widening view of a numeric scalar.
    pub fn as_f64(&self) -> Option<f64> {
        use Value::*;
        match self {
            Byte(v) => Some(f64::from(*v)),
            Short(v) => Some(f64::from(*v)),
            Int(v) => Some(f64::from(*v)),
            Long(v) => Some(*v as f64),
            Float(v) => Some(f64::from(*v)),
            Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Widening view of a numeric or complex scalar.
    pub fn as_complex64(&self) -> Option<Complex<f64>> {
        match self {
            Value::Complex32(c) => Some(Complex::new(f64::from(c.re), f64::from(c.im))),
            Value::Complex64(c) => Some(*c),
            other => other.as_f64().map(|re| Complex::new(re, 0.0)),
        }
    }

    /// Total order between like-typed values. Complex and complex-vector
    /// values only define equality; ordering them is a type error, as is
    /// comparing across types or against `Null`.
    pub fn cmp_same_type(&self, other: &Value) -> ValueResult<Ordering> {
        use Value::*;
        match (self, other) {
            (Boolean(a), Boolean(b)) => Ok(a.cmp(b)),
            (Byte(a), Byte(b)) => Ok(a.cmp(b)),
            (Short(a), Short(b)) => Ok(a.cmp(b)),
            (Int(a), Int(b)) => Ok(a.cmp(b)),
            (Long(a), Long(b)) => Ok(a.cmp(b)),
            (Float(a), Float(b)) => Ok(a.total_cmp(b)),
            (Double(a), Double(b)) => Ok(a.total_cmp(b)),
            (String(a), String(b)) => Ok(a.cmp(b)),
            (ByteVector(a), ByteVector(b)) => Ok(a.cmp(b)),
            (ShortVector(a), ShortVector(b)) => Ok(a.cmp(b)),
            (IntVector(a), IntVector(b)) => Ok(a.cmp(b)),
            (LongVector(a), LongVector(b)) => Ok(a.cmp(b)),
            (FloatVector(a), FloatVector(b)) => Ok(lex_cmp(a, b, f32::total_cmp)),
            (DoubleVector(a), DoubleVector(b)) => Ok(lex_cmp(a, b, f64::total_cmp)),
            (Complex32(_), _)
            | (Complex64(_), _)
            | (Complex32Vector(_), _)
            | (Complex64Vector(_), _)
            | (_, Complex32(_))
            | (_, Complex64(_))
            | (_, Complex32Vector(_))
            | (_, Complex64Vector(_)) => Err(ValueError::Type(
                "complex values are not ordered".into(),
            )),
            (a, b) => Err(ValueError::Type(format!(
                "cannot compare {} against {}",
                type_label(a),
                type_label(b)
            ))),
        }
    }

    /// Equality between like-typed values; `None` across types.
    pub fn eq_same_type(&self, other: &Value) -> Option<bool> {
        match (self.column_type(), other.column_type()) {
            (Some(a), Some(b)) if a.name() == b.name() => Some(self == other),
            _ => None,
        }
    }

    /// Appends a structural key of this value to `buf`: a discriminant tag
    /// followed by little-endian bit patterns. Two values produce the same
    /// key iff they are structurally identical, NaN payloads included.
    pub fn write_key(&self, buf: &mut Vec<u8>) {
        use Value::*;
        match self {
            Null => buf.push(0),
            Boolean(v) => {
                buf.push(1);
                buf.push(u8::from(*v));
            }
            Byte(v) => {
                buf.push(2);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Short(v) => {
                buf.push(3);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Int(v) => {
                buf.push(4);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Long(v) => {
                buf.push(5);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Float(v) => {
                buf.push(6);
                buf.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            Double(v) => {
                buf.push(7);
                buf.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            String(s) => {
                buf.push(8);
                buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
            Complex32(c) => {
                buf.push(9);
                buf.extend_from_slice(&c.re.to_bits().to_le_bytes());
                buf.extend_from_slice(&c.im.to_bits().to_le_bytes());
            }
            Complex64(c) => {
                buf.push(10);
                buf.extend_from_slice(&c.re.to_bits().to_le_bytes());
                buf.extend_from_slice(&c.im.to_bits().to_le_bytes());
            }
            ByteVector(v) => {
                buf.push(11);
                buf.extend_from_slice(&(v.len() as u32).to_le_bytes());
                for e in v {
                    buf.extend_from_slice(&e.to_le_bytes());
                }
            }
            ShortVector(v) => {
                buf.push(12);
                buf.extend_from_slice(&(v.len() as u32).to_le_bytes());
                for e in v {
                    buf.extend_from_slice(&e.to_le_bytes());
                }
            }
            IntVector(v) => {
                buf.push(13);
                buf.extend_from_slice(&(v.len() as u32).to_le_bytes());
                for e in v {
                    buf.extend_from_slice(&e.to_le_bytes());
                }
            }
            LongVector(v) => {
                buf.push(14);
                buf.extend_from_slice(&(v.len() as u32).to_le_bytes());
                for e in v {
                    buf.extend_from_slice(&e.to_le_bytes());
                }
            }
            FloatVector(v) => {
                buf.push(15);
                buf.extend_from_slice(&(v.len() as u32).to_le_bytes());
                for e in v {
                    buf.extend_from_slice(&e.to_bits().to_le_bytes());
                }
            }
            DoubleVector(v) => {
                buf.push(16);
                buf.extend_from_slice(&(v.len() as u32).to_le_bytes());
                for e in v {
                    buf.extend_from_slice(&e.to_bits().to_le_bytes());
                }
            }
            Complex32Vector(v) => {
                buf.push(17);
                buf.extend_from_slice(&(v.len() as u32).to_le_bytes());
                for e in v {
                    buf.extend_from_slice(&e.re.to_bits().to_le_bytes());
                    buf.extend_from_slice(&e.im.to_bits().to_le_bytes());
                }
            }
            Complex64Vector(v) => {
                buf.push(18);
                buf.extend_from_slice(&(v.len() as u32).to_le_bytes());
                for e in v {
                    buf.extend_from_slice(&e.re.to_bits().to_le_bytes());
                    buf.extend_from_slice(&e.im.to_bits().to_le_bytes());
                }
            }
        }
    }
}

fn lex_cmp<T: Copy>(a: &[T], b: &[T], cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match cmp(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

pub(crate) fn type_label(v: &Value) -> &'static str {
    v.column_type().map(|t| t.name()).unwrap_or("NULL")
}
