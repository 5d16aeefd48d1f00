//! Limit task: skip then take.

use common::{DbError, DbResult, RecordSet};

use crate::{Task, TaskContext};

pub struct LimitTask {
    pub limit: u64,
    pub skip: u64,
}

impl Task for LimitTask {
    fn id(&self) -> String {
        format!("limit[{} skip {}]", self.limit, self.skip)
    }

    fn cost(&self) -> f64 {
        0.0
    }

    fn execute(&self, ctx: &TaskContext<'_>, input: Option<&RecordSet>) -> DbResult<RecordSet> {
        let input = input.ok_or_else(|| {
            DbError::Execution(format!("task {} requires an input record set", self.id()))
        })?;
        ctx.cancellation.check()?;
        Ok(input.limit(self.limit, self.skip))
    }
}
