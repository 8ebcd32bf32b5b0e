//! The explicit, shareable handle to one database's storage layer:
//! catalog, buffer pool and log manager bundled together.
//!
//! Every entry point takes `Arc<Database>` explicitly rather than
//! reaching for a process-wide global, since `Catalog`, `BufferPool`
//! and `LockManager` are each internally synchronized already — this
//! just lets two independent databases (e.g. two tests) run in one
//! process without interference.

use std::{
    path::Path,
    sync::Arc,
};

use crate::{
    buffer_pool::BufferPool, catalog::Catalog, error::SmallError, log_manager::LogManager,
    page::DEFAULT_PAGE_SIZE, transaction_id::TransactionId,
};

pub struct Database {
    pub catalog: Catalog,
    pub buffer_pool: BufferPool,
    pub log_manager: LogManager,
}

impl Database {
    pub fn new(catalog: Catalog, buffer_pool_capacity: usize, log_path: impl AsRef<Path>) -> Result<Arc<Self>, SmallError> {
        Ok(Arc::new(Self {
            catalog,
            buffer_pool: BufferPool::new(buffer_pool_capacity),
            log_manager: LogManager::new(log_path)?,
        }))
    }

    /// Convenience constructor for tests: an empty catalog, a fresh
    /// temp-file log, and the given buffer pool capacity.
    #[cfg(test)]
    pub fn for_test(buffer_pool_capacity: usize) -> Result<Arc<Self>, SmallError> {
        let log_file = tempfile::NamedTempFile::new()?;
        let (_file, path) = log_file.keep().map_err(|e| SmallError::io(e.to_string()))?;
        Self::new(Catalog::new(), buffer_pool_capacity, path)
    }

    pub fn page_size(&self) -> usize {
        DEFAULT_PAGE_SIZE
    }

    pub fn transaction_complete(self: &Arc<Self>, tid: TransactionId, commit: bool) -> Result<(), SmallError> {
        self.buffer_pool
            .transaction_complete(&self.catalog, &self.log_manager, tid, commit)
    }
}
