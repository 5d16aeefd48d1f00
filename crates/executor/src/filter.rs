//! Filter task: keeps input rows satisfying a boolean predicate.

use common::{DbError, DbResult, RecordSet};
use expr::Predicate;

use crate::{Task, TaskContext};

pub struct FilterTask {
    pub predicate: Predicate,
    pub cost: f64,
}

impl Task for FilterTask {
    fn id(&self) -> String {
        format!("filter[{} cols]", self.predicate.referenced_columns().len())
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn execute(&self, ctx: &TaskContext<'_>, input: Option<&RecordSet>) -> DbResult<RecordSet> {
        let input = input.ok_or_else(|| {
            DbError::Execution(format!("task {} requires an input record set", self.id()))
        })?;
        ctx.cancellation.check()?;
        input.filter(|record| self.predicate.eval(record.columns(), record.values))
    }
}
