//! Distance kernels for nearest-neighbour search.
//!
//! Every kernel is a pure function over two real numeric vectors of equal
//! logical size (optionally with a per-component weight vector) producing
//! a non-negative `f64` where smaller means nearer. Kernels are stateless
//! and safe to invoke concurrently from any number of tasks.

#[cfg(test)]
mod tests;

use common::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use types::Value;

/// Available kernels. `cost()` is a relative CPU multiplier the planner
/// feeds into its cost model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    L1,
    L2,
    Minkowski { p: i32 },
    Cosine,
    InnerProduct,
    Hamming,
    ChiSquared,
}

impl Distance {
    /// Relative cost of one kernel invocation.
    pub fn cost(&self) -> f64 {
        match self {
            Distance::Hamming => 1.0,
            Distance::L1 | Distance::InnerProduct => 2.0,
            Distance::L2 | Distance::ChiSquared => 3.0,
            Distance::Cosine => 4.0,
            Distance::Minkowski { .. } => 5.0,
        }
    }

    /// Distance between `a` and `b`.
    pub fn compute(&self, a: &Value, b: &Value) -> DbResult<f64> {
        let (a, b) = views(a, b)?;
        Ok(match self {
            Distance::L1 => sum(&a, &b, |x, y| (y - x).abs()),
            Distance::L2 => sum(&a, &b, |x, y| (y - x) * (y - x)).sqrt(),
            Distance::Minkowski { p } => {
                let p = check_order(*p)?;
                sum(&a, &b, |x, y| (y - x).abs().powi(p)).powf(1.0 / f64::from(p))
            }
            Distance::Cosine => {
                let dot = sum(&a, &b, |x, y| x * y);
                let na = sum(&a, &a, |x, _| x * x).sqrt();
                let nb = sum(&b, &b, |x, _| x * x).sqrt();
                1.0 - dot / (na * nb)
            }
            Distance::InnerProduct => 1.0 - sum(&a, &b, |x, y| x * y),
            Distance::Hamming => sum(&a, &b, |x, y| if x == y { 0.0 } else { 1.0 }),
            Distance::ChiSquared => sum(&a, &b, |x, y| {
                let d = x + y;
                if d == 0.0 { 0.0 } else { (y - x) * (y - x) / d }
            }),
        })
    }

    /// Distance between `a` and `b` with per-component weights.
    pub fn compute_weighted(&self, a: &Value, b: &Value, weights: &Value) -> DbResult<f64> {
        let (a, b) = views(a, b)?;
        let w = view(weights)?;
        if w.len() != a.len() {
            return Err(DbError::Size(format!(
                "weight vector has {} elements, expected {}",
                w.len(),
                a.len()
            )));
        }
        Ok(match self {
            Distance::L1 => wsum(&a, &b, &w, |x, y, w| w * (y - x).abs()),
            Distance::L2 => wsum(&a, &b, &w, |x, y, w| w * (y - x) * (y - x)).sqrt(),
            Distance::Minkowski { p } => {
                let p = check_order(*p)?;
                wsum(&a, &b, &w, |x, y, w| w * (y - x).abs().powi(p))
                    .powf(1.0 / f64::from(p))
            }
            Distance::Cosine => {
                let dot = wsum(&a, &b, &w, |x, y, w| w * x * y);
                let na = wsum(&a, &a, &w, |x, _, w| w * x * x).sqrt();
                let nb = wsum(&b, &b, &w, |x, _, w| w * x * x).sqrt();
                1.0 - dot / (na * nb)
            }
            Distance::InnerProduct => 1.0 - wsum(&a, &b, &w, |x, y, w| w * x * y),
            Distance::Hamming => wsum(&a, &b, &w, |x, y, w| if x == y { 0.0 } else { w }),
            Distance::ChiSquared => wsum(&a, &b, &w, |x, y, w| {
                let d = x + y;
                if d == 0.0 { 0.0 } else { w * (y - x) * (y - x) / d }
            }),
        })
    }
}

fn check_order(p: i32) -> DbResult<i32> {
    if p >= 1 {
        Ok(p)
    } else {
        Err(DbError::Syntax(format!("invalid Minkowski order {p}")))
    }
}

/// Borrowed view of a real numeric vector; widens lazily so the hot loop
/// never allocates.
enum RealView<'a> {
    I8(&'a [i8]),
    I16(&'a [i16]),
    I32(&'a [i32]),
    I64(&'a [i64]),
    F32(&'a [f32]),
    F64(&'a [f64]),
}

impl RealView<'_> {
    fn len(&self) -> usize {
        match self {
            RealView::I8(v) => v.len(),
            RealView::I16(v) => v.len(),
            RealView::I32(v) => v.len(),
            RealView::I64(v) => v.len(),
            RealView::F32(v) => v.len(),
            RealView::F64(v) => v.len(),
        }
    }

    #[inline]
    fn get(&self, i: usize) -> f64 {
        match self {
            RealView::I8(v) => f64::from(v[i]),
            RealView::I16(v) => f64::from(v[i]),
            RealView::I32(v) => f64::from(v[i]),
            RealView::I64(v) => v[i] as f64,
            RealView::F32(v) => f64::from(v[i]),
            RealView::F64(v) => v[i],
        }
    }
}

fn view(v: &Value) -> DbResult<RealView<'_>> {
    Ok(match v {
        Value::ByteVector(v) => RealView::I8(v),
        Value::ShortVector(v) => RealView::I16(v),
        Value::IntVector(v) => RealView::I32(v),
        Value::LongVector(v) => RealView::I64(v),
        Value::FloatVector(v) => RealView::F32(v),
        Value::DoubleVector(v) => RealView::F64(v),
        other => {
            return Err(DbError::Type(format!(
                "distance kernels require real numeric vectors, got {}",
                other.column_type().map(|t| t.name()).unwrap_or("NULL")
            )));
        }
    })
}

fn views<'a>(a: &'a Value, b: &'a Value) -> DbResult<(RealView<'a>, RealView<'a>)> {
    let va = view(a)?;
    let vb = view(b)?;
    if va.len() != vb.len() {
        return Err(DbError::Size(format!(
            "vectors of {} and {} elements are not comparable",
            va.len(),
            vb.len()
        )));
    }
    Ok((va, vb))
}

#[inline]
fn sum(a: &RealView<'_>, b: &RealView<'_>, term: impl Fn(f64, f64) -> f64) -> f64 {
    let mut acc = 0.0;
    for i in 0..a.len() {
        acc += term(a.get(i), b.get(i));
    }
    acc
}

#[inline]
fn wsum(
    a: &RealView<'_>,
    b: &RealView<'_>,
    w: &RealView<'_>,
    term: impl Fn(f64, f64, f64) -> f64,
) -> f64 {
    let mut acc = 0.0;
    for i in 0..a.len() {
        acc += term(a.get(i), b.get(i), w.get(i));
    }
    acc
}
