//! Drains a child operator into a table, yielding a single summary
//! tuple holding the number of rows inserted: everything is inserted
//! on the first pull, then the operator reports done.

use std::sync::Arc;

use crate::{
    buffer_pool::BufferPool,
    catalog::Catalog,
    error::SmallError,
    field::{Field, Type},
    transaction_id::TransactionId,
    tuple::{Tuple, TupleDesc},
};

use super::DbIterator;

pub struct Insert {
    buffer_pool: Arc<BufferPool>,
    catalog: Arc<Catalog>,
    tid: TransactionId,
    table_id: i32,
    child: Box<dyn DbIterator>,
    done: bool,
    result: Option<Tuple>,
}

impl Insert {
    pub fn new(
        buffer_pool: Arc<BufferPool>,
        catalog: Arc<Catalog>,
        tid: TransactionId,
        table_id: i32,
        child: Box<dyn DbIterator>,
    ) -> Self {
        Self {
            buffer_pool,
            catalog,
            tid,
            table_id,
            child,
            done: false,
            result: None,
        }
    }
}

impl DbIterator for Insert {
    fn open(&mut self) -> Result<(), SmallError> {
        self.child.open()?;
        self.done = false;
        self.result = None;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, SmallError> {
        if self.result.is_some() {
            return Ok(true);
        }
        if self.done {
            return Ok(false);
        }

        let mut count: i32 = 0;
        while self.child.has_next()? {
            let t = self.child.next()?;
            self.buffer_pool
                .insert_tuple(&self.catalog, self.tid, self.table_id, t)?;
            count += 1;
        }
        self.done = true;

        let mut out = Tuple::new(self.schema());
        out.set_field(0, Field::Int(count));
        self.result = Some(out);
        Ok(true)
    }

    fn next(&mut self) -> Result<Tuple, SmallError> {
        if self.result.is_none() {
            self.has_next()?;
        }
        self.result
            .take()
            .ok_or_else(|| SmallError::no_such_element("next called with no tuple available"))
    }

    fn rewind(&mut self) -> Result<(), SmallError> {
        self.open()
    }

    fn close(&mut self) {
        self.child.close();
        self.result = None;
    }

    fn schema(&self) -> TupleDesc {
        TupleDesc::new(vec![(Type::Int, Some("count".into()))])
    }
}
