//! Fetch task: materialises additional entity columns for the tuple ids
//! of an upstream result (typically a kNN task's winners).

use common::{ColumnDef, DbError, DbResult, RecordSet};
use protocol::EntityRef;

use crate::{CANCEL_BATCH, Task, TaskContext};

pub struct FetchTask {
    pub entity: EntityRef,
    pub columns: Vec<ColumnDef>,
    pub cost: f64,
}

impl Task for FetchTask {
    fn id(&self) -> String {
        format!(
            "fetch[{}.{}][{} cols]",
            self.entity.schema,
            self.entity.entity,
            self.columns.len()
        )
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn execute(&self, ctx: &TaskContext<'_>, input: Option<&RecordSet>) -> DbResult<RecordSet> {
        let input = input.ok_or_else(|| {
            DbError::Execution(format!("task {} requires an input record set", self.id()))
        })?;
        let entity = ctx.entities.entity(&self.entity)?;

        // Fetched columns first, then the input columns they do not
        // shadow (e.g. the kNN distance).
        let mut columns = self.columns.clone();
        let mut kept_input: Vec<usize> = Vec::new();
        for (i, def) in input.columns().iter().enumerate() {
            if !columns.iter().any(|c| c.name.simple() == def.name.simple()) {
                columns.push(def.clone());
                kept_input.push(i);
            }
        }

        let names: Vec<&str> = self.columns.iter().map(|c| c.name.simple()).collect();
        entity.scan(&names, |tx| {
            let mut out = RecordSet::new(columns.clone());
            for (i, record) in input.iter().enumerate() {
                if (i + 1) % CANCEL_BATCH == 0 {
                    ctx.cancellation.check()?;
                }
                let mut values = tx.read(record.tuple_id)?;
                for idx in &kept_input {
                    values.push(record.values[*idx].clone());
                }
                out.append(record.tuple_id, values)?;
            }
            Ok(out)
        })
    }
}
