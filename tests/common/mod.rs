//! Shared setup for the scenario tests in `spec.md` §8: a throwaway
//! catalog/buffer pool/log manager triple plus a constant-tuple source
//! operator, since the operator tree otherwise only ever reads from a
//! `HeapFile`.

use std::sync::Arc;

use small_db::{
    buffer_pool::BufferPool,
    catalog::Catalog,
    error::SmallError,
    field::Type,
    heap_file::HeapFile,
    log_manager::LogManager,
    operators::DbIterator,
    page::DEFAULT_PAGE_SIZE,
    tuple::{Tuple, TupleDesc},
};
use tempfile::NamedTempFile;

pub fn int_schema(names: &[&str]) -> TupleDesc {
    TupleDesc::new(
        names
            .iter()
            .map(|n| (Type::Int, Some(n.to_string())))
            .collect(),
    )
}

/// Registers a fresh, empty table with the given schema and returns its
/// table id. Leaks the backing temp file for the test's duration.
pub fn new_table(catalog: &Catalog, schema: TupleDesc) -> i32 {
    let file = NamedTempFile::new().unwrap();
    let heap_file = HeapFile::new(file.path(), schema, DEFAULT_PAGE_SIZE).unwrap();
    let table_id = heap_file.table_id();
    catalog.add_table(Arc::new(heap_file), "t", None);
    std::mem::forget(file);
    table_id
}

pub fn new_log() -> LogManager {
    let file = NamedTempFile::new().unwrap();
    let (_f, path) = file.keep().unwrap();
    LogManager::new(path).unwrap()
}

pub fn harness(capacity: usize) -> (Arc<Catalog>, Arc<BufferPool>, LogManager) {
    (
        Arc::new(Catalog::new()),
        Arc::new(BufferPool::new(capacity)),
        new_log(),
    )
}

/// An operator that yields a fixed, pre-built list of tuples. Used in
/// place of a `SeqScan` wherever a test needs literal input rows
/// without first round-tripping them through a heap file.
pub struct ConstIter {
    schema: TupleDesc,
    tuples: Vec<Tuple>,
    idx: usize,
    opened: bool,
}

impl ConstIter {
    pub fn new(schema: TupleDesc, tuples: Vec<Tuple>) -> Self {
        Self {
            schema,
            tuples,
            idx: 0,
            opened: false,
        }
    }
}

impl DbIterator for ConstIter {
    fn open(&mut self) -> Result<(), SmallError> {
        self.idx = 0;
        self.opened = true;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, SmallError> {
        if !self.opened {
            return Err(SmallError::illegal_argument("iterator used before open"));
        }
        Ok(self.idx < self.tuples.len())
    }

    fn next(&mut self) -> Result<Tuple, SmallError> {
        if !self.has_next()? {
            return Err(SmallError::no_such_element("next called with no tuple available"));
        }
        let t = self.tuples[self.idx].clone();
        self.idx += 1;
        Ok(t)
    }

    fn rewind(&mut self) -> Result<(), SmallError> {
        self.idx = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn schema(&self) -> TupleDesc {
        self.schema.clone()
    }
}

/// Drains an operator end to end, returning every tuple it produces.
pub fn drain(op: &mut dyn DbIterator) -> Vec<Tuple> {
    let mut out = Vec::new();
    while op.has_next().unwrap() {
        out.push(op.next().unwrap());
    }
    out
}
