//! Bounded page cache, locking entry point, and transaction
//! commit/abort under a NO-STEAL/FORCE policy.
//!
//! Each cached page is its own `Mutex` behind a capacity-bounded cache
//! monitor: lock acquisition happens outside the monitor (to avoid
//! blocking other threads' cache lookups while a transaction waits on
//! a page lock), and the monitor is entered only for cache inspection
//! and installation. Commit/abort flush or roll back every page a
//! transaction dirtied, then release its locks on every exit path —
//! success or failure.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use log::debug;

use crate::{
    catalog::Catalog,
    error::SmallError,
    lock_manager::LockManager,
    log_manager::LogManager,
    page::HeapPage,
    page_id::HeapPageId,
    permissions::Permissions,
    transaction_id::TransactionId,
};

struct BufferPoolInner {
    pages: HashMap<HeapPageId, Arc<Mutex<HeapPage>>>,
    /// Access ticks per resident page. Maintained for future
    /// frequency-based eviction ordering; eviction today only forbids
    /// evicting a dirty page.
    freq: HashMap<HeapPageId, u64>,
    tick: u64,
}

pub struct BufferPool {
    capacity: usize,
    inner: Mutex<BufferPoolInner>,
    lock_manager: LockManager,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(BufferPoolInner {
                pages: HashMap::new(),
                freq: HashMap::new(),
                tick: 0,
            }),
            lock_manager: LockManager::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: HeapPageId,
        perm: Permissions,
        catalog: &Catalog,
    ) -> Result<Arc<Mutex<HeapPage>>, SmallError> {
        self.lock_manager.acquire_lock(tid, pid, perm.to_lock())?;

        if let Some(page) = self.touch_if_resident(pid) {
            return Ok(page);
        }

        let heap_file = catalog
            .get_heap_file(pid.table_id)
            .ok_or_else(|| SmallError::no_such_element(format!("no table with id {}", pid.table_id)))?;
        let page = heap_file.read_page(pid)?;

        let mut inner = self.inner.lock().unwrap();
        // Another thread may have installed the page while we read from disk.
        if let Some(existing) = inner.pages.get(&pid) {
            let existing = Arc::clone(existing);
            Self::bump(&mut inner, pid);
            return Ok(existing);
        }
        if inner.pages.len() >= self.capacity {
            Self::evict_one(&mut inner)?;
        }
        let page = Arc::new(Mutex::new(page));
        inner.pages.insert(pid, Arc::clone(&page));
        Self::bump(&mut inner, pid);
        debug!("cached page {:?}", pid);
        Ok(page)
    }

    fn touch_if_resident(&self, pid: HeapPageId) -> Option<Arc<Mutex<HeapPage>>> {
        let mut inner = self.inner.lock().unwrap();
        let page = inner.pages.get(&pid).cloned();
        if page.is_some() {
            Self::bump(&mut inner, pid);
        }
        page
    }

    fn bump(inner: &mut BufferPoolInner, pid: HeapPageId) {
        inner.tick += 1;
        let tick = inner.tick;
        inner.freq.insert(pid, tick);
    }

    /// NO STEAL: evicts the first clean page found; fails if every
    /// resident page is dirty.
    fn evict_one(inner: &mut BufferPoolInner) -> Result<(), SmallError> {
        let victim = inner.pages.iter().find_map(|(pid, page)| {
            if page.lock().unwrap().is_dirty().is_none() {
                Some(*pid)
            } else {
                None
            }
        });
        match victim {
            Some(pid) => {
                inner.pages.remove(&pid);
                inner.freq.remove(&pid);
                Ok(())
            }
            None => Err(SmallError::no_clean_victim(
                "every resident page is dirty; cannot evict under NO STEAL",
            )),
        }
    }

    pub fn insert_tuple(
        &self,
        catalog: &Catalog,
        tid: TransactionId,
        table_id: i32,
        t: crate::tuple::Tuple,
    ) -> Result<(), SmallError> {
        let heap_file = catalog
            .get_heap_file(table_id)
            .ok_or_else(|| SmallError::no_such_element(format!("no table with id {}", table_id)))?;
        heap_file.add_tuple(self, catalog, tid, t)?;
        Ok(())
    }

    pub fn delete_tuple(
        &self,
        catalog: &Catalog,
        tid: TransactionId,
        t: &crate::tuple::Tuple,
    ) -> Result<(), SmallError> {
        let table_id = t
            .record_id()
            .ok_or_else(|| SmallError::not_on_page("tuple has no RecordId"))?
            .page_id
            .table_id;
        let heap_file = catalog
            .get_heap_file(table_id)
            .ok_or_else(|| SmallError::no_such_element(format!("no table with id {}", table_id)))?;
        heap_file.delete_tuple(self, catalog, tid, t)?;
        Ok(())
    }

    /// Commits or rolls back every page `tid` dirtied, releasing all
    /// of `tid`'s locks on every exit path.
    pub fn transaction_complete(
        &self,
        catalog: &Catalog,
        log_manager: &LogManager,
        tid: TransactionId,
        commit: bool,
    ) -> Result<(), SmallError> {
        let result = if commit {
            self.commit_dirty_pages(catalog, log_manager, tid)
        } else {
            self.abort_dirty_pages(tid)
        };
        self.lock_manager.release_pages(tid);
        result
    }

    fn dirtied_by(&self, tid: TransactionId) -> Vec<(HeapPageId, Arc<Mutex<HeapPage>>)> {
        let inner = self.inner.lock().unwrap();
        inner
            .pages
            .iter()
            .filter(|(_, page)| page.lock().unwrap().is_dirty() == Some(tid))
            .map(|(pid, page)| (*pid, Arc::clone(page)))
            .collect()
    }

    fn commit_dirty_pages(
        &self,
        catalog: &Catalog,
        log_manager: &LogManager,
        tid: TransactionId,
    ) -> Result<(), SmallError> {
        for (pid, page_ref) in self.dirtied_by(tid) {
            let mut page = page_ref.lock().unwrap();
            let before = page.get_before_image();
            let after = page.get_page_data();
            log_manager.log_write(tid, &before, &after)?;
            log_manager.force()?;

            let heap_file = catalog
                .get_heap_file(pid.table_id)
                .ok_or_else(|| SmallError::no_such_element(format!("no table with id {}", pid.table_id)))?;
            heap_file.write_page(&page)?;
            page.mark_clean();
            page.set_before_image();
        }
        Ok(())
    }

    fn abort_dirty_pages(&self, tid: TransactionId) -> Result<(), SmallError> {
        for (_, page_ref) in self.dirtied_by(tid) {
            page_ref.lock().unwrap().rollback()?;
        }
        Ok(())
    }

    pub fn flush_all_pages(&self, catalog: &Catalog) -> Result<(), SmallError> {
        let pages: Vec<_> = {
            let inner = self.inner.lock().unwrap();
            inner
                .pages
                .iter()
                .map(|(pid, page)| (*pid, Arc::clone(page)))
                .collect()
        };
        for (pid, page_ref) in pages {
            let mut page = page_ref.lock().unwrap();
            if page.is_dirty().is_some() {
                let heap_file = catalog
                    .get_heap_file(pid.table_id)
                    .ok_or_else(|| SmallError::no_such_element(format!("no table with id {}", pid.table_id)))?;
                heap_file.write_page(&page)?;
                page.mark_clean();
                page.set_before_image();
            }
        }
        Ok(())
    }

    pub fn flush_pages(&self, catalog: &Catalog, tid: TransactionId) -> Result<(), SmallError> {
        for (pid, page_ref) in self.dirtied_by(tid) {
            let mut page = page_ref.lock().unwrap();
            let heap_file = catalog
                .get_heap_file(pid.table_id)
                .ok_or_else(|| SmallError::no_such_element(format!("no table with id {}", pid.table_id)))?;
            heap_file.write_page(&page)?;
            page.mark_clean();
            page.set_before_image();
        }
        Ok(())
    }

    pub fn discard_page(&self, pid: HeapPageId) {
        let mut inner = self.inner.lock().unwrap();
        inner.pages.remove(&pid);
        inner.freq.remove(&pid);
    }

    pub fn is_cached(&self, pid: HeapPageId) -> bool {
        self.inner.lock().unwrap().pages.contains_key(&pid)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.pages.clear();
        inner.freq.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field::Type, tuple::TupleDesc};
    use tempfile::NamedTempFile;

    fn setup(capacity: usize) -> (BufferPool, Catalog, TupleDesc, i32) {
        let schema = TupleDesc::new(vec![(Type::Int, Some("a".into()))]);
        let file = NamedTempFile::new().unwrap();
        let heap_file =
            crate::heap_file::HeapFile::new(file.path(), schema.clone(), crate::page::DEFAULT_PAGE_SIZE)
                .unwrap();
        let table_id = heap_file.table_id();
        let catalog = Catalog::new();
        catalog.add_table(Arc::new(heap_file), "t", None);
        std::mem::forget(file); // keep the temp file alive for the test's duration
        (BufferPool::new(capacity), catalog, schema, table_id)
    }

    #[test]
    fn eviction_refuses_to_evict_dirty_pages() {
        let (bp, catalog, schema, table_id) = setup(2);
        let tid = TransactionId::new();

        for v in 0..2 {
            let mut t = crate::tuple::Tuple::new(schema.clone());
            t.set_field(0, crate::field::Field::Int(v));
            bp.insert_tuple(&catalog, tid, table_id, t).unwrap();
        }
        // Force a fresh page allocation so two distinct dirty pages are cached.
        {
            let heap_file = catalog.get_heap_file(table_id).unwrap();
            // both rows landed on page 0; make page 1 dirty directly.
            let pid = HeapPageId::new(table_id, 1);
            heap_file
                .write_page(&HeapPage::empty(pid, schema.clone(), crate::page::DEFAULT_PAGE_SIZE))
                .unwrap();
            let page_ref = bp.get_page(tid, pid, Permissions::ReadWrite, &catalog).unwrap();
            let mut page = page_ref.lock().unwrap();
            let mut t = crate::tuple::Tuple::new(schema.clone());
            t.set_field(0, crate::field::Field::Int(99));
            page.add_tuple(t).unwrap();
            page.mark_dirty(tid);
        }

        let err = bp
            .get_page(tid, HeapPageId::new(table_id, 2), Permissions::ReadOnly, &catalog)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NoCleanVictim);

        let log_path = NamedTempFile::new().unwrap();
        let log = LogManager::new(log_path.path()).unwrap();
        bp.transaction_complete(&catalog, &log, tid, true).unwrap();

        let pid2 = HeapPageId::new(table_id, 2);
        let heap_file = catalog.get_heap_file(table_id).unwrap();
        heap_file
            .write_page(&HeapPage::empty(pid2, schema.clone(), crate::page::DEFAULT_PAGE_SIZE))
            .unwrap();
        assert!(bp.get_page(tid, pid2, Permissions::ReadOnly, &catalog).is_ok());
    }
}
