//! In-memory intermediate results.
//!
//! A [`RecordSet`] is an ordered sequence of rows sharing a fixed column
//! schema, with a parallel lane of tuple ids. Every operator returns a
//! fresh set; inputs are never mutated.

use std::collections::HashSet;

use types::{ColumnType, Value};

use crate::{ColumnDef, ColumnName, DbError, DbResult, TupleId};

/// One row of a record set: its tuple id plus values in column order.
#[derive(Clone, Copy, Debug)]
pub struct Record<'a> {
    pub tuple_id: TupleId,
    columns: &'a [ColumnDef],
    pub values: &'a [Value],
}

impl<'a> Record<'a> {
    /// Value of the column with the given (unqualified) name.
    pub fn value(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c.name.simple() == column)
            .map(|i| &self.values[i])
    }

    pub fn columns(&self) -> &'a [ColumnDef] {
        self.columns
    }
}

/// Row-addressable intermediate result with a fixed column schema.
#[derive(Clone, Debug, Default)]
pub struct RecordSet {
    columns: Vec<ColumnDef>,
    rows: Vec<Vec<Value>>,
    tuple_ids: Vec<TupleId>,
}

impl RecordSet {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            tuple_ids: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn tuple_ids(&self) -> &[TupleId] {
        &self.tuple_ids
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name.simple() == column)
    }

    /// Appends a row after validating every value against its column def.
    pub fn append(&mut self, tuple_id: TupleId, values: Vec<Value>) -> DbResult<()> {
        if values.len() != self.columns.len() {
            return Err(DbError::Execution(format!(
                "row arity {} does not match schema arity {}",
                values.len(),
                self.columns.len()
            )));
        }
        for (def, value) in self.columns.iter().zip(values.iter()) {
            def.validate(value)?;
        }
        self.tuple_ids.push(tuple_id);
        self.rows.push(values);
        Ok(())
    }

    pub fn get(&self, idx: usize) -> Option<Record<'_>> {
        self.rows.get(idx).map(|values| Record {
            tuple_id: self.tuple_ids[idx],
            columns: &self.columns,
            values,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Record<'_>> {
        (0..self.rows.len()).map(|i| self.get(i).unwrap())
    }

    /// Keeps rows for which `pred` holds; order and tuple ids preserved.
    pub fn filter(&self, mut pred: impl FnMut(Record<'_>) -> DbResult<bool>) -> DbResult<Self> {
        let mut out = Self::new(self.columns.clone());
        for record in self.iter() {
            if pred(record)? {
                out.tuple_ids.push(record.tuple_id);
                out.rows.push(record.values.to_vec());
            }
        }
        Ok(out)
    }

    /// Keeps only the named columns, optionally renaming each; order and
    /// tuple ids preserved.
    pub fn project(&self, fields: &[(String, Option<String>)]) -> DbResult<Self> {
        let mut indices = Vec::with_capacity(fields.len());
        let mut columns = Vec::with_capacity(fields.len());
        for (source, rename) in fields {
            let idx = self.column_index(source).ok_or_else(|| {
                DbError::Bind(format!("unknown column '{source}' in projection"))
            })?;
            let mut def = self.columns[idx].clone();
            if let Some(alias) = rename {
                def.name = ColumnName::new(
                    def.name.schema.clone(),
                    def.name.entity.clone(),
                    alias.clone(),
                );
            }
            indices.push(idx);
            columns.push(def);
        }
        let mut out = Self::new(columns);
        for (tid, row) in self.tuple_ids.iter().zip(self.rows.iter()) {
            out.tuple_ids.push(*tid);
            out.rows.push(indices.iter().map(|i| row[*i].clone()).collect());
        }
        Ok(out)
    }

    /// Removes duplicate rows by structural value equality; the first
    /// occurrence (and its tuple id) wins.
    pub fn distinct(&self) -> Self {
        let mut seen: HashSet<Vec<u8>> = HashSet::with_capacity(self.rows.len());
        let mut out = Self::new(self.columns.clone());
        let mut key = Vec::new();
        for record in self.iter() {
            key.clear();
            for value in record.values {
                value.write_key(&mut key);
            }
            if seen.insert(key.clone()) {
                out.tuple_ids.push(record.tuple_id);
                out.rows.push(record.values.to_vec());
            }
        }
        out
    }

    /// Discards the first `skip` rows, keeps the next up-to-`limit`.
    pub fn limit(&self, limit: u64, skip: u64) -> Self {
        let mut out = Self::new(self.columns.clone());
        let start = (skip as usize).min(self.rows.len());
        let end = start.saturating_add(limit as usize).min(self.rows.len());
        for i in start..end {
            out.tuple_ids.push(self.tuple_ids[i]);
            out.rows.push(self.rows[i].clone());
        }
        out
    }

    /// 1×1 record set holding the row count as a LONG.
    pub fn count(&self) -> Self {
        Self::singleton("count", ColumnType::Long, Value::Long(self.rows.len() as i64))
    }

    /// 1×1 record set holding row existence as a BOOLEAN.
    pub fn exists(&self) -> Self {
        Self::singleton(
            "exists",
            ColumnType::Boolean,
            Value::Boolean(!self.rows.is_empty()),
        )
    }

    /// Minimum of a numeric column, widened to DOUBLE; +∞ for empty input.
    pub fn min(&self, column: &str) -> DbResult<Self> {
        self.fold_numeric(column, "min", f64::INFINITY, f64::min)
    }

    /// Maximum of a numeric column, widened to DOUBLE; −∞ for empty input.
    pub fn max(&self, column: &str) -> DbResult<Self> {
        self.fold_numeric(column, "max", f64::NEG_INFINITY, f64::max)
    }

    /// Sum over a numeric column, widened to DOUBLE; 0 for empty input.
    pub fn sum(&self, column: &str) -> DbResult<Self> {
        self.fold_numeric(column, "sum", 0.0, |acc, v| acc + v)
    }

    /// Arithmetic mean over a numeric column; NaN for empty input.
    pub fn mean(&self, column: &str) -> DbResult<Self> {
        let (total, n) = self.numeric_values(column, "mean")?;
        Ok(Self::singleton(
            format!("mean({column})"),
            ColumnType::Double,
            Value::Double(total.iter().sum::<f64>() / n as f64),
        ))
    }

    fn fold_numeric(
        &self,
        column: &str,
        op: &str,
        init: f64,
        fold: impl Fn(f64, f64) -> f64,
    ) -> DbResult<Self> {
        let (values, _) = self.numeric_values(column, op)?;
        let result = values.into_iter().fold(init, fold);
        Ok(Self::singleton(
            format!("{op}({column})"),
            ColumnType::Double,
            Value::Double(result),
        ))
    }

    /// Collects the non-null values of a numeric column widened to f64,
    /// plus their count.
    fn numeric_values(&self, column: &str, op: &str) -> DbResult<(Vec<f64>, usize)> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| DbError::Bind(format!("unknown column '{column}' in {op}()")))?;
        let def = &self.columns[idx];
        if !def.column_type.is_numeric() || def.column_type.is_vector() || def.column_type.is_complex() {
            return Err(DbError::Bind(format!(
                "{op}() requires a real numeric column, {} is {}",
                def.name, def.column_type
            )));
        }
        let mut out = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            if let Some(v) = row[idx].as_f64() {
                out.push(v);
            }
        }
        let n = out.len();
        Ok((out, n))
    }

    fn singleton(column: impl Into<String>, column_type: ColumnType, value: Value) -> Self {
        let def = ColumnDef::new(ColumnName::synthetic(column), column_type, false);
        Self {
            columns: vec![def],
            rows: vec![vec![value]],
            tuple_ids: vec![TupleId(0)],
        }
    }

    /// Concatenates `other` onto this set; schemas must match.
    pub fn extend(&mut self, other: RecordSet) -> DbResult<()> {
        if self.columns != other.columns {
            return Err(DbError::Execution(
                "cannot concatenate record sets with different schemas".into(),
            ));
        }
        self.tuple_ids.extend(other.tuple_ids);
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Consumes the set into its parallel lanes.
    pub fn into_parts(self) -> (Vec<ColumnDef>, Vec<TupleId>, Vec<Vec<Value>>) {
        (self.columns, self.tuple_ids, self.rows)
    }
}
