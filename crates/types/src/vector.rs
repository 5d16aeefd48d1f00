//! Vector-valued operations: norms, inner products and Minkowski
//! distances.
//!
//! Real vectors produce double-typed results; complex vectors produce
//! complex-64 results except where the contract pins a real scalar
//! (`dot`). Every operation allocates a fresh value.

use num_complex::Complex;

use crate::{Value, ValueError, ValueResult, type_label};

/// Widened element view of a vector value.
enum Elems {
    Real(Vec<f64>),
    Complex(Vec<Complex<f64>>),
}

fn elems(v: &Value) -> ValueResult<Elems> {
    use Value::*;
    Ok(match v {
        ByteVector(v) => Elems::Real(v.iter().map(|x| f64::from(*x)).collect()),
        ShortVector(v) => Elems::Real(v.iter().map(|x| f64::from(*x)).collect()),
        IntVector(v) => Elems::Real(v.iter().map(|x| f64::from(*x)).collect()),
        LongVector(v) => Elems::Real(v.iter().map(|x| *x as f64).collect()),
        FloatVector(v) => Elems::Real(v.iter().map(|x| f64::from(*x)).collect()),
        DoubleVector(v) => Elems::Real(v.clone()),
        Complex32Vector(v) => Elems::Complex(
            v.iter()
                .map(|c| Complex::new(f64::from(c.re), f64::from(c.im)))
                .collect(),
        ),
        Complex64Vector(v) => Elems::Complex(v.clone()),
        other => {
            return Err(ValueError::Type(format!(
                "{} is not a vector",
                type_label(other)
            )));
        }
    })
}

fn paired(a: &Value, b: &Value) -> ValueResult<(Elems, Elems)> {
    let la = a.logical_size();
    let lb = b.logical_size();
    if la != lb {
        return Err(ValueError::Size {
            expected: la,
            actual: lb,
        });
    }
    Ok((elems(a)?, elems(b)?))
}

fn lift(v: Vec<f64>) -> Vec<Complex<f64>> {
    v.into_iter().map(Complex::from).collect()
}

impl Value {
    /// Element-wise magnitude. Preserves the element type for real
    /// vectors; complex elements collapse to their real modulus.
    pub fn abs(&self) -> ValueResult<Value> {
        use Value::*;
        Ok(match self {
            ByteVector(v) => ByteVector(v.iter().map(|x| x.wrapping_abs()).collect()),
            ShortVector(v) => ShortVector(v.iter().map(|x| x.wrapping_abs()).collect()),
            IntVector(v) => IntVector(v.iter().map(|x| x.wrapping_abs()).collect()),
            LongVector(v) => LongVector(v.iter().map(|x| x.wrapping_abs()).collect()),
            FloatVector(v) => FloatVector(v.iter().map(|x| x.abs()).collect()),
            DoubleVector(v) => DoubleVector(v.iter().map(|x| x.abs()).collect()),
            Complex32Vector(v) => FloatVector(v.iter().map(|c| c.norm()).collect()),
            Complex64Vector(v) => DoubleVector(v.iter().map(|c| c.norm()).collect()),
            other => {
                return Err(ValueError::Type(format!(
                    "{} is not a vector",
                    type_label(other)
                )));
            }
        })
    }

    /// Element-wise integer power; double-typed result (complex-64 for
    /// complex input).
    pub fn pow(&self, x: i32) -> ValueResult<Value> {
        Ok(match elems(self)? {
            Elems::Real(v) => Value::DoubleVector(v.iter().map(|e| e.powi(x)).collect()),
            Elems::Complex(v) => Value::Complex64Vector(v.iter().map(|e| e.powi(x)).collect()),
        })
    }

    /// Element-wise square root; double-typed result (complex-64 for
    /// complex input).
    pub fn sqrt(&self) -> ValueResult<Value> {
        Ok(match elems(self)? {
            Elems::Real(v) => Value::DoubleVector(v.iter().map(|e| e.sqrt()).collect()),
            Elems::Complex(v) => Value::Complex64Vector(v.iter().map(|e| e.sqrt()).collect()),
        })
    }

    /// Sum of all elements in the widest representable type of the input:
    /// LONG for integer vectors, DOUBLE for float vectors, COMPLEX64 for
    /// complex vectors.
    pub fn sum(&self) -> ValueResult<Value> {
        use Value::*;
        Ok(match self {
            ByteVector(v) => Long(v.iter().fold(0i64, |s, x| s.wrapping_add(i64::from(*x)))),
            ShortVector(v) => Long(v.iter().fold(0i64, |s, x| s.wrapping_add(i64::from(*x)))),
            IntVector(v) => Long(v.iter().fold(0i64, |s, x| s.wrapping_add(i64::from(*x)))),
            LongVector(v) => Long(v.iter().fold(0i64, |s, x| s.wrapping_add(*x))),
            FloatVector(v) => Double(v.iter().map(|x| f64::from(*x)).sum()),
            DoubleVector(v) => Double(v.iter().sum()),
            Complex32Vector(_) | Complex64Vector(_) => match elems(self)? {
                Elems::Complex(v) => Complex64(v.into_iter().sum()),
                Elems::Real(_) => unreachable!(),
            },
            other => {
                return Err(ValueError::Type(format!(
                    "{} is not a vector",
                    type_label(other)
                )));
            }
        })
    }

    /// Euclidean norm `√(Σ|x_i|²)`; real for real vectors, complex (with
    /// zero imaginary part) for complex vectors.
    pub fn norm2(&self) -> ValueResult<Value> {
        Ok(match elems(self)? {
            Elems::Real(v) => Value::Double(v.iter().map(|x| x * x).sum::<f64>().sqrt()),
            Elems::Complex(v) => Value::Complex64(Complex::from(
                v.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt(),
            )),
        })
    }

    /// Hermitian inner product `Σ conj(this_i)·other_i`, returned as the
    /// real component. Degenerates to the plain dot product for real
    /// inputs.
    pub fn dot(&self, other: &Value) -> ValueResult<Value> {
        Ok(match paired(self, other)? {
            (Elems::Real(a), Elems::Real(b)) => {
                Value::Double(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
            }
            (a, b) => {
                let a = match a {
                    Elems::Real(v) => lift(v),
                    Elems::Complex(v) => v,
                };
                let b = match b {
                    Elems::Real(v) => lift(v),
                    Elems::Complex(v) => v,
                };
                Value::Double(
                    a.iter()
                        .zip(b.iter())
                        .map(|(x, y)| x.conj() * y)
                        .sum::<Complex<f64>>()
                        .re,
                )
            }
        })
    }

    /// Manhattan distance. For complex-vs-complex the real and imaginary
    /// components are accumulated independently and the result is complex.
    pub fn l1(&self, other: &Value) -> ValueResult<Value> {
        Ok(match paired(self, other)? {
            (Elems::Real(a), Elems::Real(b)) => {
                Value::Double(a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum())
            }
            (Elems::Complex(a), Elems::Complex(b)) => Value::Complex64(
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| Complex::new((x.re - y.re).abs(), (x.im - y.im).abs()))
                    .sum(),
            ),
            (a, b) => {
                let a = match a {
                    Elems::Real(v) => lift(v),
                    Elems::Complex(v) => v,
                };
                let b = match b {
                    Elems::Real(v) => lift(v),
                    Elems::Complex(v) => v,
                };
                Value::Complex64(
                    a.iter()
                        .zip(b.iter())
                        .map(|(x, y)| Complex::new((x.re - y.re).abs(), (x.im - y.im).abs()))
                        .sum(),
                )
            }
        })
    }

    /// Euclidean distance; real for real vectors, complex magnitude for
    /// complex vectors.
    pub fn l2(&self, other: &Value) -> ValueResult<Value> {
        Ok(match paired(self, other)? {
            (Elems::Real(a), Elems::Real(b)) => Value::Double(
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f64>()
                    .sqrt(),
            ),
            (a, b) => {
                let a = match a {
                    Elems::Real(v) => lift(v),
                    Elems::Complex(v) => v,
                };
                let b = match b {
                    Elems::Real(v) => lift(v),
                    Elems::Complex(v) => v,
                };
                Value::Complex64(Complex::from(
                    a.iter()
                        .zip(b.iter())
                        .map(|(x, y)| (x - y).norm_sqr())
                        .sum::<f64>()
                        .sqrt(),
                ))
            }
        })
    }

    /// Minkowski distance of order `p ≥ 1`; real for real vectors,
    /// complex magnitude for complex vectors.
    pub fn lp(&self, other: &Value, p: i32) -> ValueResult<Value> {
        if p < 1 {
            return Err(ValueError::Type(format!("invalid Minkowski order {p}")));
        }
        Ok(match paired(self, other)? {
            (Elems::Real(a), Elems::Real(b)) => Value::Double(
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y).abs().powi(p))
                    .sum::<f64>()
                    .powf(1.0 / f64::from(p)),
            ),
            (a, b) => {
                let a = match a {
                    Elems::Real(v) => lift(v),
                    Elems::Complex(v) => v,
                };
                let b = match b {
                    Elems::Real(v) => lift(v),
                    Elems::Complex(v) => v,
                };
                Value::Complex64(Complex::from(
                    a.iter()
                        .zip(b.iter())
                        .map(|(x, y)| (x - y).norm().powi(p))
                        .sum::<f64>()
                        .powf(1.0 / f64::from(p)),
                ))
            }
        })
    }

    /// Element-wise complex conjugate. Real vectors are their own
    /// conjugate.
    pub fn conjugate(&self) -> ValueResult<Value> {
        use Value::*;
        Ok(match self {
            Complex32Vector(v) => Complex32Vector(v.iter().map(|c| c.conj()).collect()),
            Complex64Vector(v) => Complex64Vector(v.iter().map(|c| c.conj()).collect()),
            other if other.is_vector() => other.clone(),
            other => {
                return Err(ValueError::Type(format!(
                    "{} is not a vector",
                    type_label(other)
                )));
            }
        })
    }
}
