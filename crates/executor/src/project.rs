//! Projection task: column selection, distinct, and the scalar
//! aggregations.

use common::{DbError, DbResult, RecordSet};
use protocol::{ProjectionField, ProjectionOp};

use crate::{Task, TaskContext};

pub struct ProjectionTask {
    pub op: ProjectionOp,
    pub fields: Vec<ProjectionField>,
    pub cost: f64,
}

impl ProjectionTask {
    fn field_pairs(&self) -> Vec<(String, Option<String>)> {
        self.fields
            .iter()
            .map(|f| (f.column.clone(), f.alias.clone()))
            .collect()
    }

    fn single_field(&self) -> DbResult<&str> {
        self.fields
            .first()
            .map(|f| f.column.as_str())
            .ok_or_else(|| DbError::Syntax(format!("{:?} takes exactly one column", self.op)))
    }
}

impl Task for ProjectionTask {
    fn id(&self) -> String {
        format!("projection[{:?}]", self.op)
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn execute(&self, ctx: &TaskContext<'_>, input: Option<&RecordSet>) -> DbResult<RecordSet> {
        let input = input.ok_or_else(|| {
            DbError::Execution(format!("task {} requires an input record set", self.id()))
        })?;
        ctx.cancellation.check()?;
        match self.op {
            ProjectionOp::Select => input.project(&self.field_pairs()),
            ProjectionOp::SelectDistinct => Ok(input.project(&self.field_pairs())?.distinct()),
            ProjectionOp::Count => Ok(input.count()),
            ProjectionOp::Exists => Ok(input.exists()),
            ProjectionOp::Min => input.min(self.single_field()?),
            ProjectionOp::Max => input.max(self.single_field()?),
            ProjectionOp::Sum => input.sum(self.single_field()?),
            ProjectionOp::Mean => input.mean(self.single_field()?),
        }
    }
}
