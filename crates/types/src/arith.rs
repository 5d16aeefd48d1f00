//! Element-wise arithmetic with type widening.
//!
//! Like-typed operands stay in their own type; mixed numeric operands are
//! promoted to double (complex-64 when either side is complex) before the
//! operation. A vector paired with a scalar broadcasts the scalar across
//! every element; two vectors must agree on logical size.

use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::{Value, ValueError, ValueResult, type_label};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Widened representation every numeric value can be lifted into.
enum Promoted {
    Real(f64),
    Complex(Complex<f64>),
    RealVec(Vec<f64>),
    ComplexVec(Vec<Complex<f64>>),
}

fn promote(v: &Value) -> ValueResult<Promoted> {
    use Value::*;
    Ok(match v {
        Byte(x) => Promoted::Real(f64::from(*x)),
        Short(x) => Promoted::Real(f64::from(*x)),
        Int(x) => Promoted::Real(f64::from(*x)),
        Long(x) => Promoted::Real(*x as f64),
        Float(x) => Promoted::Real(f64::from(*x)),
        Double(x) => Promoted::Real(*x),
        Complex32(c) => Promoted::Complex(Complex::new(f64::from(c.re), f64::from(c.im))),
        Complex64(c) => Promoted::Complex(*c),
        ByteVector(v) => Promoted::RealVec(v.iter().map(|x| f64::from(*x)).collect()),
        ShortVector(v) => Promoted::RealVec(v.iter().map(|x| f64::from(*x)).collect()),
        IntVector(v) => Promoted::RealVec(v.iter().map(|x| f64::from(*x)).collect()),
        LongVector(v) => Promoted::RealVec(v.iter().map(|x| *x as f64).collect()),
        FloatVector(v) => Promoted::RealVec(v.iter().map(|x| f64::from(*x)).collect()),
        DoubleVector(v) => Promoted::RealVec(v.clone()),
        Complex32Vector(v) => Promoted::ComplexVec(
            v.iter()
                .map(|c| Complex::new(f64::from(c.re), f64::from(c.im)))
                .collect(),
        ),
        Complex64Vector(v) => Promoted::ComplexVec(v.clone()),
        other => {
            return Err(ValueError::Type(format!(
                "{} does not support arithmetic",
                type_label(other)
            )));
        }
    })
}

fn apply_real(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
    }
}

fn apply_complex(op: ArithOp, a: Complex<f64>, b: Complex<f64>) -> Complex<f64> {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
    }
}

macro_rules! int_arm {
    ($op:expr, $a:expr, $b:expr, $variant:ident) => {{
        match $op {
            ArithOp::Add => Ok(Value::$variant($a.wrapping_add(*$b))),
            ArithOp::Sub => Ok(Value::$variant($a.wrapping_sub(*$b))),
            ArithOp::Mul => Ok(Value::$variant($a.wrapping_mul(*$b))),
            ArithOp::Div => $a
                .checked_div(*$b)
                .map(Value::$variant)
                .ok_or_else(|| ValueError::Type("integer division by zero".into())),
        }
    }};
}

macro_rules! int_vec_arm {
    ($op:expr, $a:expr, $b:expr, $variant:ident) => {{
        check_sizes($a.len(), $b.len())?;
        let mut out = Vec::with_capacity($a.len());
        for (x, y) in $a.iter().zip($b.iter()) {
            out.push(match $op {
                ArithOp::Add => x.wrapping_add(*y),
                ArithOp::Sub => x.wrapping_sub(*y),
                ArithOp::Mul => x.wrapping_mul(*y),
                ArithOp::Div => x
                    .checked_div(*y)
                    .ok_or_else(|| ValueError::Type("integer division by zero".into()))?,
            });
        }
        Ok(Value::$variant(out))
    }};
}

fn check_sizes(a: usize, b: usize) -> ValueResult<()> {
    if a == b {
        Ok(())
    } else {
        Err(ValueError::Size {
            expected: a,
            actual: b,
        })
    }
}

impl Value {
    pub fn add(&self, other: &Value) -> ValueResult<Value> {
        self.arith(other, ArithOp::Add)
    }

    pub fn sub(&self, other: &Value) -> ValueResult<Value> {
        self.arith(other, ArithOp::Sub)
    }

    pub fn mul(&self, other: &Value) -> ValueResult<Value> {
        self.arith(other, ArithOp::Mul)
    }

    pub fn div(&self, other: &Value) -> ValueResult<Value> {
        self.arith(other, ArithOp::Div)
    }

    /// Element-wise arithmetic. Allocates a fresh result; neither operand
    /// is mutated.
    pub fn arith(&self, other: &Value, op: ArithOp) -> ValueResult<Value> {
        use Value::*;
        // Like-typed fast paths keep the operand type.
        match (self, other) {
            (Byte(a), Byte(b)) => return int_arm!(op, a, b, Byte),
            (Short(a), Short(b)) => return int_arm!(op, a, b, Short),
            (Int(a), Int(b)) => return int_arm!(op, a, b, Int),
            (Long(a), Long(b)) => return int_arm!(op, a, b, Long),
            (Float(a), Float(b)) => {
                return Ok(Float(apply_real(op, f64::from(*a), f64::from(*b)) as f32));
            }
            (Double(a), Double(b)) => return Ok(Double(apply_real(op, *a, *b))),
            (ByteVector(a), ByteVector(b)) => return int_vec_arm!(op, a, b, ByteVector),
            (ShortVector(a), ShortVector(b)) => return int_vec_arm!(op, a, b, ShortVector),
            (IntVector(a), IntVector(b)) => return int_vec_arm!(op, a, b, IntVector),
            (LongVector(a), LongVector(b)) => return int_vec_arm!(op, a, b, LongVector),
            (FloatVector(a), FloatVector(b)) => {
                check_sizes(a.len(), b.len())?;
                return Ok(FloatVector(
                    a.iter()
                        .zip(b.iter())
                        .map(|(x, y)| apply_real(op, f64::from(*x), f64::from(*y)) as f32)
                        .collect(),
                ));
            }
            (DoubleVector(a), DoubleVector(b)) => {
                check_sizes(a.len(), b.len())?;
                return Ok(DoubleVector(
                    a.iter()
                        .zip(b.iter())
                        .map(|(x, y)| apply_real(op, *x, *y))
                        .collect(),
                ));
            }
            _ => {}
        }

        // Mixed types widen: double for real operands, complex-64 as soon
        // as either side is complex. Vector/scalar pairs broadcast.
        match (promote(self)?, promote(other)?) {
            (Promoted::Real(a), Promoted::Real(b)) => Ok(Double(apply_real(op, a, b))),
            (Promoted::Complex(a), Promoted::Complex(b)) => {
                Ok(Complex64(apply_complex(op, a, b)))
            }
            (Promoted::Real(a), Promoted::Complex(b)) => {
                Ok(Complex64(apply_complex(op, a.into(), b)))
            }
            (Promoted::Complex(a), Promoted::Real(b)) => {
                Ok(Complex64(apply_complex(op, a, b.into())))
            }
            (Promoted::RealVec(a), Promoted::RealVec(b)) => {
                check_sizes(a.len(), b.len())?;
                Ok(DoubleVector(
                    a.iter().zip(b.iter()).map(|(x, y)| apply_real(op, *x, *y)).collect(),
                ))
            }
            (Promoted::RealVec(a), Promoted::Real(s)) => Ok(DoubleVector(
                a.iter().map(|x| apply_real(op, *x, s)).collect(),
            )),
            (Promoted::Real(s), Promoted::RealVec(b)) => Ok(DoubleVector(
                b.iter().map(|y| apply_real(op, s, *y)).collect(),
            )),
            (Promoted::ComplexVec(a), Promoted::ComplexVec(b)) => {
                check_sizes(a.len(), b.len())?;
                Ok(Complex64Vector(
                    a.iter()
                        .zip(b.iter())
                        .map(|(x, y)| apply_complex(op, *x, *y))
                        .collect(),
                ))
            }
            (Promoted::ComplexVec(a), Promoted::Complex(s)) => Ok(Complex64Vector(
                a.iter().map(|x| apply_complex(op, *x, s)).collect(),
            )),
            (Promoted::Complex(s), Promoted::ComplexVec(b)) => Ok(Complex64Vector(
                b.iter().map(|y| apply_complex(op, s, *y)).collect(),
            )),
            (Promoted::ComplexVec(a), Promoted::Real(s)) => Ok(Complex64Vector(
                a.iter().map(|x| apply_complex(op, *x, s.into())).collect(),
            )),
            (Promoted::Real(s), Promoted::ComplexVec(b)) => Ok(Complex64Vector(
                b.iter()
                    .map(|y| apply_complex(op, s.into(), *y))
                    .collect(),
            )),
            (Promoted::RealVec(a), Promoted::Complex(s)) => Ok(Complex64Vector(
                a.iter()
                    .map(|x| apply_complex(op, (*x).into(), s))
                    .collect(),
            )),
            (Promoted::Complex(s), Promoted::RealVec(b)) => Ok(Complex64Vector(
                b.iter()
                    .map(|y| apply_complex(op, s, (*y).into()))
                    .collect(),
            )),
            (Promoted::RealVec(a), Promoted::ComplexVec(b)) => {
                check_sizes(a.len(), b.len())?;
                Ok(Complex64Vector(
                    a.iter()
                        .zip(b.iter())
                        .map(|(x, y)| apply_complex(op, (*x).into(), *y))
                        .collect(),
                ))
            }
            (Promoted::ComplexVec(a), Promoted::RealVec(b)) => {
                check_sizes(a.len(), b.len())?;
                Ok(Complex64Vector(
                    a.iter()
                        .zip(b.iter())
                        .map(|(x, y)| apply_complex(op, *x, (*y).into()))
                        .collect(),
                ))
            }
        }
    }
}
