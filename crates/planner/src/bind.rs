//! Binding: turn a wire-level query into a validated plan tree.

use catalog::{Catalog, EntityMeta};
use common::{ColumnDef, Config, DbError, DbResult};
use protocol::{KnnHint, ProjectionOp, Query};
use types::Value;

use crate::{PlanNode, distance_column};

/// Resolves a [`Query`] against the catalogue and produces a bound plan.
pub struct Binder<'a> {
    catalog: &'a Catalog,
    config: &'a Config,
}

impl<'a> Binder<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a Config) -> Self {
        Self { catalog, config }
    }

    /// Binds `query`. `max_tuple_id` is the entity's current watermark,
    /// used for cardinality estimates.
    pub fn bind(&self, query: &Query, max_tuple_id: u64) -> DbResult<PlanNode> {
        let meta = self
            .catalog
            .entity(&query.entity.schema, &query.entity.entity)?;

        if let Some(predicate) = &query.predicate {
            predicate.validate()?;
            for column in predicate.referenced_columns() {
                meta.column(&column)?;
            }
        }
        if let Some(knn) = &query.knn {
            self.check_knn(meta, knn)?;
        }
        self.check_projection(meta, query)?;

        let plan = if let Some(knn) = &query.knn {
            self.bind_knn(meta, query, knn, max_tuple_id)?
        } else {
            self.bind_boolean(meta, query, max_tuple_id)?
        };

        let plan = self.apply_projection(query, plan);
        Ok(apply_limit(query, plan))
    }

    /// kNN shape: scan(knn column + filter columns) → [filter] → knn →
    /// [fetch projection columns].
    fn bind_knn(
        &self,
        meta: &EntityMeta,
        query: &Query,
        knn: &KnnHint,
        max_tuple_id: u64,
    ) -> DbResult<PlanNode> {
        let mut scan_columns = vec![meta.column(&knn.column)?.def.clone()];
        if let Some(predicate) = &query.predicate {
            for column in predicate.referenced_columns() {
                let def = meta.column(&column)?.def.clone();
                push_unique(&mut scan_columns, def);
            }
        }

        let scan = PlanNode::FullScan {
            entity: query.entity.clone(),
            columns: scan_columns,
            rows: max_tuple_id,
        };
        let input = match &query.predicate {
            Some(predicate) => PlanNode::Filter {
                input: Box::new(scan),
                predicate: predicate.clone(),
            },
            None => scan,
        };

        let knn_node = PlanNode::Knn {
            input: Box::new(input),
            column: meta.column(&knn.column)?.def.clone(),
            queries: knn.queries.clone(),
            weights: knn.weights.clone(),
            k: knn.k,
            distance: knn.distance,
            predicate: None,
            parallelism: self.config.knn_parallelism.max(1),
        };

        // Fetch whatever entity columns the projection still needs; the
        // distance column rides along from the kNN operator.
        let fetch_columns = self.projection_entity_columns(meta, query)?;
        Ok(if fetch_columns.is_empty() {
            knn_node
        } else {
            PlanNode::Fetch {
                input: Box::new(knn_node),
                entity: query.entity.clone(),
                columns: fetch_columns,
            }
        })
    }

    /// Boolean-only shape: scan(needed columns) → [filter].
    fn bind_boolean(
        &self,
        meta: &EntityMeta,
        query: &Query,
        max_tuple_id: u64,
    ) -> DbResult<PlanNode> {
        let mut columns = self.projection_entity_columns(meta, query)?;
        if let Some(predicate) = &query.predicate {
            for column in predicate.referenced_columns() {
                let def = meta.column(&column)?.def.clone();
                push_unique(&mut columns, def);
            }
        }

        let scan = PlanNode::FullScan {
            entity: query.entity.clone(),
            columns,
            rows: max_tuple_id,
        };
        Ok(match &query.predicate {
            Some(predicate) => PlanNode::Filter {
                input: Box::new(scan),
                predicate: predicate.clone(),
            },
            None => scan,
        })
    }

    fn apply_projection(&self, query: &Query, plan: PlanNode) -> PlanNode {
        PlanNode::Projection {
            input: Box::new(plan),
            op: query.projection.op,
            fields: query.projection.fields.clone(),
        }
    }

    /// Entity columns the projection reads (the synthesized distance
    /// column excluded).
    fn projection_entity_columns(
        &self,
        meta: &EntityMeta,
        query: &Query,
    ) -> DbResult<Vec<ColumnDef>> {
        let mut out: Vec<ColumnDef> = Vec::new();
        for field in &query.projection.fields {
            if query.knn.is_some() && field.column == distance_column().name.simple() {
                continue;
            }
            push_unique(&mut out, meta.column(&field.column)?.def.clone());
        }
        Ok(out)
    }

    fn check_projection(&self, meta: &EntityMeta, query: &Query) -> DbResult<()> {
        let projection = &query.projection;
        match projection.op {
            ProjectionOp::Select | ProjectionOp::SelectDistinct => {
                if projection.fields.is_empty() {
                    return Err(DbError::Syntax(
                        "projection must name at least one column".into(),
                    ));
                }
                Ok(())
            }
            ProjectionOp::Count | ProjectionOp::Exists => Ok(()),
            ProjectionOp::Min | ProjectionOp::Max | ProjectionOp::Sum | ProjectionOp::Mean => {
                if projection.fields.len() != 1 {
                    return Err(DbError::Syntax(format!(
                        "{:?} takes exactly one column",
                        projection.op
                    )));
                }
                let column = &projection.fields[0].column;
                let def = &meta.column(column)?.def;
                let t = def.column_type;
                if !t.is_numeric() || t.is_vector() || t.is_complex() {
                    return Err(DbError::Bind(format!(
                        "{:?} applied to non-numeric column {}",
                        projection.op, def.name
                    )));
                }
                Ok(())
            }
        }
    }

    fn check_knn(&self, meta: &EntityMeta, knn: &KnnHint) -> DbResult<()> {
        if knn.k == 0 {
            return Err(DbError::Syntax("knn requires k >= 1".into()));
        }
        if knn.queries.is_empty() {
            return Err(DbError::Syntax(
                "knn requires at least one query vector".into(),
            ));
        }
        let def = &meta.column(&knn.column)?.def;
        if !def.column_type.is_vector() || def.column_type.is_complex() {
            return Err(DbError::Bind(format!(
                "knn requires a real vector column, {} is {}",
                def.name, def.column_type
            )));
        }
        let expected = def.logical_size();
        for query in &knn.queries {
            check_query_vector(query, expected)?;
        }
        if let Some(weights) = &knn.weights {
            if weights.len() != knn.queries.len() {
                return Err(DbError::Syntax(format!(
                    "{} weight vectors for {} query vectors",
                    weights.len(),
                    knn.queries.len()
                )));
            }
            for weight in weights {
                check_query_vector(weight, expected)?;
            }
        }
        Ok(())
    }
}

fn check_query_vector(value: &Value, expected: usize) -> DbResult<()> {
    let Some(t) = value.column_type() else {
        return Err(DbError::Type("knn vector must not be null".into()));
    };
    if !t.is_vector() || t.is_complex() {
        return Err(DbError::Type(format!(
            "knn vector must be a real numeric vector, got {}",
            t.name()
        )));
    }
    if value.logical_size() != expected {
        return Err(DbError::Size(format!(
            "knn vector has {} elements, column expects {expected}",
            value.logical_size()
        )));
    }
    Ok(())
}

fn apply_limit(query: &Query, plan: PlanNode) -> PlanNode {
    if query.limit.is_none() && query.skip.is_none() {
        return plan;
    }
    PlanNode::Limit {
        input: Box::new(plan),
        limit: query.limit.unwrap_or(u64::MAX),
        skip: query.skip.unwrap_or(0),
    }
}

fn push_unique(columns: &mut Vec<ColumnDef>, def: ColumnDef) {
    if !columns.iter().any(|c| c.name == def.name) {
        columns.push(def);
    }
}
