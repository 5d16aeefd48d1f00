
use std::cmp::Ordering;
use std::collections::BTreeSet;

use common::{ColumnDef, DbError, DbResult};
use types::Value;

/// Comparison operators available in predicate atoms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    In,
    Between,
    IsNull,
}

/// Boolean predicate tree evaluated row by row.
///
/// Atoms compare a named column against literal values; `And`/`Or`/`Not`
/// combine sub-trees. `NULL` column values satisfy no operator except
/// `IsNull`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        values: Vec<Value>,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Convenience constructor for a single-operand comparison.
    pub fn compare(column: impl Into<String>, op: CompareOp, value: Value) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            values: vec![value],
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::Compare {
            column: column.into(),
            op: CompareOp::IsNull,
            values: Vec::new(),
        }
    }

    /// Structural well-formedness: every atom carries the operand count
    /// its operator requires.
    pub fn validate(&self) -> DbResult<()> {
        match self {
            Predicate::Compare { column, op, values } => {
                let ok = match op {
                    CompareOp::IsNull => values.is_empty(),
                    CompareOp::Between => values.len() == 2,
                    CompareOp::In => !values.is_empty(),
                    _ => values.len() == 1,
                };
                if ok {
                    Ok(())
                } else {
                    Err(DbError::Syntax(format!(
                        "{op:?} on column '{column}' takes a different number of operands, got {}",
                        values.len()
                    )))
                }
            }
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.validate()?;
                r.validate()
            }
            Predicate::Not(inner) => inner.validate(),
        }
    }

    /// Names of all columns the predicate reads, deduplicated.
    pub fn referenced_columns(&self) -> Vec<String> {
        fn collect(p: &Predicate, out: &mut BTreeSet<String>) {
            match p {
                Predicate::Compare { column, .. } => {
                    out.insert(column.clone());
                }
                Predicate::And(l, r) | Predicate::Or(l, r) => {
                    collect(l, out);
                    collect(r, out);
                }
                Predicate::Not(inner) => collect(inner, out),
            }
        }
        let mut set = BTreeSet::new();
        collect(self, &mut set);
        set.into_iter().collect()
    }

    /// Crude selectivity estimate in `(0, 1]`, used for cardinality
    /// guesses only.
    pub fn selectivity(&self) -> f64 {
        match self {
            Predicate::Compare { op, values, .. } => match op {
                CompareOp::Eq | CompareOp::IsNull => 0.1,
                CompareOp::In => (0.1 * values.len() as f64).min(1.0),
                CompareOp::Like => 0.25,
                _ => 0.33,
            },
            Predicate::And(l, r) => l.selectivity() * r.selectivity(),
            Predicate::Or(l, r) => {
                let (a, b) = (l.selectivity(), r.selectivity());
                (a + b - a * b).min(1.0)
            }
            Predicate::Not(inner) => (1.0 - inner.selectivity()).max(0.01),
        }
    }

    /// Evaluate against one row. `columns` and `values` are parallel.
    pub fn eval(&self, columns: &[ColumnDef], values: &[Value]) -> DbResult<bool> {
        match self {
            Predicate::Compare {
                column,
                op,
                values: operands,
            } => {
                let idx = columns
                    .iter()
                    .position(|c| c.name.simple() == column)
                    .ok_or_else(|| {
                        DbError::Bind(format!("unknown column '{column}' in predicate"))
                    })?;
                eval_compare(&values[idx], *op, operands)
            }
            Predicate::And(l, r) => Ok(l.eval(columns, values)? && r.eval(columns, values)?),
            Predicate::Or(l, r) => Ok(l.eval(columns, values)? || r.eval(columns, values)?),
            Predicate::Not(inner) => Ok(!inner.eval(columns, values)?),
        }
    }
}

fn eval_compare(value: &Value, op: CompareOp, operands: &[Value]) -> DbResult<bool> {
    if matches!(op, CompareOp::IsNull) {
        return Ok(value.is_null());
    }
    if value.is_null() {
        return Ok(false);
    }
    match op {
        CompareOp::Eq => eq(value, &operands[0]),
        CompareOp::Ne => Ok(!eq(value, &operands[0])?),
        CompareOp::Lt => Ok(ord(value, &operands[0])? == Ordering::Less),
        CompareOp::Le => Ok(ord(value, &operands[0])? != Ordering::Greater),
        CompareOp::Gt => Ok(ord(value, &operands[0])? == Ordering::Greater),
        CompareOp::Ge => Ok(ord(value, &operands[0])? != Ordering::Less),
        CompareOp::Like => match (value, &operands[0]) {
            (Value::String(s), Value::String(pattern)) => Ok(like_match(pattern, s)),
            (v, p) => Err(DbError::Type(format!(
                "LIKE requires strings, got {:?} and {:?}",
                v, p
            ))),
        },
        CompareOp::In => {
            for candidate in operands {
                if eq(value, candidate)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        CompareOp::Between => Ok(ord(value, &operands[0])? != Ordering::Less
            && ord(value, &operands[1])? != Ordering::Greater),
        CompareOp::IsNull => unreachable!(),
    }
}

fn eq(a: &Value, b: &Value) -> DbResult<bool> {
    a.eq_same_type(b)
        .ok_or_else(|| DbError::Type(format!("incompatible operands {:?} and {:?}", a, b)))
}

fn ord(a: &Value, b: &Value) -> DbResult<Ordering> {
    Ok(a.cmp_same_type(b)?)
}

/// `%` matches any run of characters, `_` exactly one; everything else is
/// literal.
fn like_match(pattern: &str, input: &str) -> bool {
    fn rec(p: &[char], s: &[char]) -> bool {
        match p.split_first() {
            None => s.is_empty(),
            Some(('%', rest)) => {
                (0..=s.len()).any(|skip| rec(rest, &s[skip..]))
            }
            Some(('_', rest)) => !s.is_empty() && rec(rest, &s[1..]),
            Some((c, rest)) => s.first() == Some(c) && rec(rest, &s[1..]),
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let s: Vec<char> = input.chars().collect();
    rec(&p, &s)
}
