//! Full scan of a table's heap file, built atop `HeapFile::iterator`
//! and a `LookAhead` buffer.

use std::sync::Arc;

use crate::{
    buffer_pool::BufferPool,
    catalog::Catalog,
    error::SmallError,
    heap_file::HeapFileIterator,
    transaction_id::TransactionId,
    tuple::TupleDesc,
};

use super::{DbIterator, LookAhead};

pub struct SeqScan {
    buffer_pool: Arc<BufferPool>,
    catalog: Arc<Catalog>,
    tid: TransactionId,
    table_id: i32,
    schema: TupleDesc,
    look_ahead: LookAhead<HeapFileIterator>,
}

impl SeqScan {
    pub fn new(
        buffer_pool: Arc<BufferPool>,
        catalog: Arc<Catalog>,
        tid: TransactionId,
        table_id: i32,
    ) -> Result<Self, SmallError> {
        let schema = catalog
            .get_schema(table_id)
            .ok_or_else(|| SmallError::no_such_element(format!("no table with id {}", table_id)))?;
        Ok(Self {
            buffer_pool,
            catalog,
            tid,
            table_id,
            schema,
            look_ahead: LookAhead::new(),
        })
    }
}

impl DbIterator for SeqScan {
    fn open(&mut self) -> Result<(), SmallError> {
        let heap_file = self
            .catalog
            .get_heap_file(self.table_id)
            .ok_or_else(|| SmallError::no_such_element(format!("no table with id {}", self.table_id)))?;
        let iter = heap_file.iterator(Arc::clone(&self.buffer_pool), Arc::clone(&self.catalog), self.tid);
        self.look_ahead.set_source(iter);
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, SmallError> {
        self.look_ahead.has_next()
    }

    fn next(&mut self) -> Result<crate::tuple::Tuple, SmallError> {
        self.look_ahead.next()
    }

    fn rewind(&mut self) -> Result<(), SmallError> {
        self.close();
        self.open()
    }

    fn close(&mut self) {
        self.look_ahead.clear();
    }

    fn schema(&self) -> TupleDesc {
        self.schema.clone()
    }
}
