//! Physical page address: the table it belongs to and its page number
//! within that table's file.

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct HeapPageId {
    pub table_id: i32,
    pub page_no: usize,
}

impl HeapPageId {
    pub fn new(table_id: i32, page_no: usize) -> Self {
        Self { table_id, page_no }
    }
}
