//! A table stored as an append-only sequence of pages on disk.
//!
//! Every page access routes through the buffer pool: the write lock
//! is acquired inside `BufferPool::get_page`, not inside `add_tuple`
//! itself, so that a transaction's own concurrent scan sees its own
//! writes.

use std::{
    collections::hash_map::DefaultHasher,
    fs::OpenOptions,
    hash::{Hash, Hasher},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use crate::{
    buffer_pool::BufferPool,
    catalog::Catalog,
    error::SmallError,
    page::HeapPage,
    page_id::HeapPageId,
    permissions::Permissions,
    transaction_id::TransactionId,
    tuple::{Tuple, TupleDesc},
};

pub struct HeapFile {
    file: Mutex<std::fs::File>,
    schema: TupleDesc,
    table_id: i32,
    page_size: usize,
    num_pages: AtomicUsize,
}

impl HeapFile {
    pub fn new(
        path: impl AsRef<Path>,
        schema: TupleDesc,
        page_size: usize,
    ) -> Result<Self, SmallError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let len = file.metadata()?.len() as usize;
        let table_id = Self::stable_table_id(path);
        Ok(Self {
            file: Mutex::new(file),
            schema,
            table_id,
            page_size,
            num_pages: AtomicUsize::new(len / page_size),
        })
    }

    /// A table id stable for the life of the file: the hash of its
    /// canonicalized path.
    fn stable_table_id(path: &Path) -> i32 {
        let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut hasher = DefaultHasher::new();
        absolute.hash(&mut hasher);
        hasher.finish() as i32
    }

    pub fn table_id(&self) -> i32 {
        self.table_id
    }

    pub fn schema(&self) -> &TupleDesc {
        &self.schema
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_pages(&self) -> usize {
        self.num_pages.load(Ordering::SeqCst)
    }

    pub fn read_page(&self, pid: HeapPageId) -> Result<HeapPage, SmallError> {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((pid.page_no * self.page_size) as u64))?;
        let mut buf = vec![0u8; self.page_size];
        file.read_exact(&mut buf).map_err(|e| {
            SmallError::io(format!("short read of page {}: {}", pid.page_no, e))
        })?;
        HeapPage::new(pid, self.schema.clone(), self.page_size, &buf)
    }

    pub fn write_page(&self, page: &HeapPage) -> Result<(), SmallError> {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(
            (page.pid().page_no * self.page_size) as u64,
        ))?;
        file.write_all(&page.get_page_data())?;
        Ok(())
    }

    /// Scans existing pages in page-number order for the first with an
    /// empty slot; allocates a new page if none has room. Returns the
    /// id of the single dirtied page.
    pub fn add_tuple(
        &self,
        buffer_pool: &BufferPool,
        catalog: &Catalog,
        tid: TransactionId,
        t: Tuple,
    ) -> Result<HeapPageId, SmallError> {
        for page_no in 0..self.num_pages() {
            let pid = HeapPageId::new(self.table_id, page_no);
            let page_ref = buffer_pool.get_page(tid, pid, Permissions::ReadWrite, catalog)?;
            let mut page = page_ref.lock().unwrap();
            if page.num_empty_slots() > 0 {
                page.add_tuple(t)?;
                page.mark_dirty(tid);
                return Ok(pid);
            }
        }

        let page_no = self.num_pages.fetch_add(1, Ordering::SeqCst);
        let pid = HeapPageId::new(self.table_id, page_no);
        self.write_page(&HeapPage::empty(pid, self.schema.clone(), self.page_size))?;

        let page_ref = buffer_pool.get_page(tid, pid, Permissions::ReadWrite, catalog)?;
        let mut page = page_ref.lock().unwrap();
        page.add_tuple(t)?;
        page.mark_dirty(tid);
        Ok(pid)
    }

    pub fn delete_tuple(
        &self,
        buffer_pool: &BufferPool,
        catalog: &Catalog,
        tid: TransactionId,
        t: &Tuple,
    ) -> Result<HeapPageId, SmallError> {
        let rid = t
            .record_id()
            .ok_or_else(|| SmallError::not_on_page("tuple has no RecordId"))?;
        if rid.page_id.table_id != self.table_id {
            return Err(SmallError::wrong_table(
                "RecordId addresses a different table",
            ));
        }

        let page_ref = buffer_pool.get_page(tid, rid.page_id, Permissions::ReadWrite, catalog)?;
        let mut page = page_ref.lock().unwrap();
        page.delete_tuple(t)?;
        page.mark_dirty(tid);
        Ok(rid.page_id)
    }

    pub fn iterator(
        &self,
        buffer_pool: std::sync::Arc<BufferPool>,
        catalog: std::sync::Arc<Catalog>,
        tid: TransactionId,
    ) -> HeapFileIterator {
        HeapFileIterator {
            buffer_pool,
            catalog,
            tid,
            table_id: self.table_id,
            num_pages: self.num_pages(),
            page_no: 0,
            buffered: std::collections::VecDeque::new(),
        }
    }
}

/// Sequential scan over a heap file's pages, fetched through the
/// buffer pool under READ permission.
pub struct HeapFileIterator {
    buffer_pool: std::sync::Arc<BufferPool>,
    catalog: std::sync::Arc<Catalog>,
    tid: TransactionId,
    table_id: i32,
    num_pages: usize,
    page_no: usize,
    buffered: std::collections::VecDeque<Tuple>,
}

impl Iterator for HeapFileIterator {
    type Item = Result<Tuple, SmallError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(t) = self.buffered.pop_front() {
                return Some(Ok(t));
            }
            if self.page_no >= self.num_pages {
                return None;
            }
            let pid = HeapPageId::new(self.table_id, self.page_no);
            self.page_no += 1;
            match self
                .buffer_pool
                .get_page(self.tid, pid, Permissions::ReadOnly, &self.catalog)
            {
                Ok(page_ref) => {
                    let page = page_ref.lock().unwrap();
                    self.buffered.extend(page.iter().cloned());
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buffer_pool::BufferPool, catalog::Catalog, field::{Field, Type}, tuple::RecordId};
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn int_schema(n: usize) -> TupleDesc {
        TupleDesc::new((0..n).map(|_| (Type::Int, None)).collect())
    }

    fn setup(page_size: usize) -> (Arc<HeapFile>, Arc<BufferPool>, Arc<Catalog>, TransactionId) {
        let schema = int_schema(1);
        let file = NamedTempFile::new().unwrap();
        let heap_file = Arc::new(HeapFile::new(file.path(), schema, page_size).unwrap());
        std::mem::forget(file);
        let catalog = Arc::new(Catalog::new());
        catalog.add_table(Arc::clone(&heap_file), "t", None);
        let buffer_pool = Arc::new(BufferPool::new(16));
        (heap_file, buffer_pool, catalog, TransactionId::new())
    }

    #[test]
    fn add_tuple_spills_to_a_new_page_once_the_first_is_full() {
        let (heap_file, buffer_pool, catalog, tid) = setup(crate::page::DEFAULT_PAGE_SIZE);
        let capacity = HeapPage::num_slots(crate::page::DEFAULT_PAGE_SIZE, heap_file.schema().size());

        for i in 0..capacity {
            let mut t = Tuple::new(heap_file.schema().clone());
            t.set_field(0, Field::Int(i as i32));
            heap_file.add_tuple(&buffer_pool, &catalog, tid, t).unwrap();
        }
        assert_eq!(heap_file.num_pages(), 1);

        let mut overflow = Tuple::new(heap_file.schema().clone());
        overflow.set_field(0, Field::Int(999));
        let pid = heap_file.add_tuple(&buffer_pool, &catalog, tid, overflow).unwrap();
        assert_eq!(heap_file.num_pages(), 2);
        assert_eq!(pid.page_no, 1);
    }

    #[test]
    fn iterator_yields_tuples_in_ascending_page_and_slot_order() {
        let (heap_file, buffer_pool, catalog, tid) = setup(crate::page::DEFAULT_PAGE_SIZE);
        for i in 0..5 {
            let mut t = Tuple::new(heap_file.schema().clone());
            t.set_field(0, Field::Int(i));
            heap_file.add_tuple(&buffer_pool, &catalog, tid, t).unwrap();
        }

        let values: Vec<i32> = heap_file
            .iterator(Arc::clone(&buffer_pool), Arc::clone(&catalog), tid)
            .map(|r| match r.unwrap().get_field(0).unwrap() {
                Field::Int(v) => *v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn delete_with_wrong_table_record_id_fails() {
        let (heap_file, buffer_pool, catalog, tid) = setup(crate::page::DEFAULT_PAGE_SIZE);
        let mut t = Tuple::new(heap_file.schema().clone());
        t.set_field(0, Field::Int(1));
        t.set_record_id(Some(RecordId::new(HeapPageId::new(heap_file.table_id() + 1, 0), 0)));

        let err = heap_file.delete_tuple(&buffer_pool, &catalog, tid, &t).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::WrongTable);
    }
}
