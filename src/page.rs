//! Fixed-size page layout: a bitmap header followed by a packed slot
//! array of fixed-width tuples.

use std::io::Cursor;

use bit_vec::BitVec;

use crate::{
    error::SmallError,
    field::Field,
    page_id::HeapPageId,
    transaction_id::TransactionId,
    tuple::{RecordId, Tuple, TupleDesc},
};

pub const DEFAULT_PAGE_SIZE: usize = 4096;

pub struct HeapPage {
    pid: HeapPageId,
    schema: TupleDesc,
    page_size: usize,
    header: BitVec,
    slots: Vec<Option<Tuple>>,
    dirtier: Option<TransactionId>,
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Number of slots a page of `page_size` bytes holds for tuples of
    /// `tuple_size` bytes: one header bit plus the tuple payload per
    /// slot.
    pub fn num_slots(page_size: usize, tuple_size: usize) -> usize {
        (page_size * 8) / (tuple_size * 8 + 1)
    }

    fn header_size(num_slots: usize) -> usize {
        (num_slots + 7) / 8
    }

    /// Parses a page from its on-disk bytes, constructing a tuple
    /// (with a freshly-stamped `RecordId`) for every occupied slot.
    pub fn new(
        pid: HeapPageId,
        schema: TupleDesc,
        page_size: usize,
        bytes: &[u8],
    ) -> Result<Self, SmallError> {
        if bytes.len() != page_size {
            return Err(SmallError::io(format!(
                "expected {} bytes for page, got {}",
                page_size,
                bytes.len()
            )));
        }

        let tuple_size = schema.size();
        let num_slots = Self::num_slots(page_size, tuple_size);
        let header_size = Self::header_size(num_slots);

        let mut header = BitVec::from_bytes(&bytes[..header_size]);
        header.truncate(num_slots);

        let mut slots: Vec<Option<Tuple>> = Vec::with_capacity(num_slots);
        let mut offset = header_size;
        for slot in 0..num_slots {
            let slot_bytes = &bytes[offset..offset + tuple_size];
            offset += tuple_size;

            if !header.get(slot).unwrap_or(false) {
                slots.push(None);
                continue;
            }

            let mut cursor = Cursor::new(slot_bytes);
            let mut tuple = Tuple::new(schema.clone());
            for i in 0..schema.num_fields() {
                let field = Field::read_from(&mut cursor, schema.field_type(i))?;
                tuple.set_field(i, field);
            }
            tuple.set_record_id(Some(RecordId::new(pid, slot)));
            slots.push(Some(tuple));
        }

        let mut page = Self {
            pid,
            schema,
            page_size,
            header,
            slots,
            dirtier: None,
            before_image: bytes.to_vec(),
        };
        page.before_image = page.get_page_data();
        Ok(page)
    }

    /// A freshly allocated, entirely empty page.
    pub fn empty(pid: HeapPageId, schema: TupleDesc, page_size: usize) -> Self {
        let tuple_size = schema.size();
        let num_slots = Self::num_slots(page_size, tuple_size);
        let header = BitVec::from_elem(num_slots, false);
        let mut page = Self {
            pid,
            schema,
            page_size,
            header,
            slots: vec![None; num_slots],
            dirtier: None,
            before_image: Vec::new(),
        };
        page.before_image = page.get_page_data();
        page
    }

    pub fn pid(&self) -> HeapPageId {
        self.pid
    }

    pub fn schema(&self) -> &TupleDesc {
        &self.schema
    }

    /// Tuples currently in occupied slots, in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    pub fn num_empty_slots(&self) -> usize {
        self.header.iter().filter(|b| !b).count()
    }

    pub fn add_tuple(&mut self, mut t: Tuple) -> Result<(), SmallError> {
        if t.schema() != &self.schema {
            return Err(SmallError::schema_mismatch(
                "tuple schema does not match page schema",
            ));
        }

        let slot = self
            .header
            .iter()
            .position(|occupied| !occupied)
            .ok_or_else(|| SmallError::not_enough_space("no empty slot on page"))?;

        t.set_record_id(Some(RecordId::new(self.pid, slot)));
        self.header.set(slot, true);
        self.slots[slot] = Some(t);
        Ok(())
    }

    pub fn delete_tuple(&mut self, t: &Tuple) -> Result<(), SmallError> {
        let rid = t
            .record_id()
            .ok_or_else(|| SmallError::not_on_page("tuple has no RecordId"))?;

        if rid.page_id != self.pid {
            return Err(SmallError::not_on_page(
                "tuple's RecordId does not address this page",
            ));
        }
        if rid.slot_index >= self.slots.len()
            || !self.header.get(rid.slot_index).unwrap_or(false)
        {
            return Err(SmallError::not_on_page("slot is not occupied"));
        }

        self.header.set(rid.slot_index, false);
        self.slots[rid.slot_index] = None;
        Ok(())
    }

    /// Serializes the page back to `page_size` bytes; the inverse of
    /// `new`. Unused slots are emitted as zero bytes.
    pub fn get_page_data(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.page_size);
        let mut header_bytes = self.header.to_bytes();
        let header_size = Self::header_size(self.slots.len());
        header_bytes.resize(header_size, 0);
        bytes.extend_from_slice(&header_bytes);

        let tuple_size = self.schema.size();
        for slot in &self.slots {
            match slot {
                Some(t) => {
                    let mut buf = Vec::with_capacity(tuple_size);
                    for i in 0..self.schema.num_fields() {
                        t.get_field(i)
                            .expect("occupied slot must have every field set")
                            .write_to(&mut buf)
                            .expect("writing to an in-memory buffer cannot fail");
                    }
                    bytes.extend_from_slice(&buf);
                }
                None => bytes.extend(std::iter::repeat(0u8).take(tuple_size)),
            }
        }

        bytes.resize(self.page_size, 0);
        bytes
    }

    /// Marks the page dirtied by `tid`.
    pub fn mark_dirty(&mut self, tid: TransactionId) {
        self.dirtier = Some(tid);
    }

    /// Clears the page's dirty flag.
    pub fn mark_clean(&mut self) {
        self.dirtier = None;
    }

    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtier
    }

    /// Restores this page's slots and header to its before-image,
    /// discarding any uncommitted modifications. Used on abort.
    pub fn rollback(&mut self) -> Result<(), SmallError> {
        let restored = HeapPage::new(
            self.pid,
            self.schema.clone(),
            self.page_size,
            &self.before_image.clone(),
        )?;
        self.header = restored.header;
        self.slots = restored.slots;
        self.dirtier = None;
        Ok(())
    }

    pub fn get_before_image(&self) -> Vec<u8> {
        self.before_image.clone()
    }

    /// Snapshots the page's current bytes as its new before-image.
    /// Called at commit.
    pub fn set_before_image(&mut self) {
        self.before_image = self.get_page_data();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Type;

    fn int_schema(n: usize) -> TupleDesc {
        TupleDesc::new((0..n).map(|_| (Type::Int, None)).collect())
    }

    /// A schema whose `num_slots` is not a multiple of 8, so the header
    /// bitmap carries padding bits past the last real slot once parsed
    /// back from bytes.
    fn string_schema() -> TupleDesc {
        TupleDesc::new(vec![(Type::Str, None)])
    }

    #[test]
    fn header_padding_bits_do_not_count_as_empty_slots_after_round_trip() {
        let schema = string_schema();
        let pid = HeapPageId::new(1, 0);
        let mut page = HeapPage::empty(pid, schema.clone(), DEFAULT_PAGE_SIZE);
        let capacity = page.num_empty_slots();

        for i in 0..capacity {
            let mut t = Tuple::new(schema.clone());
            t.set_field(0, Field::Str(i.to_string()));
            page.add_tuple(t).unwrap();
        }

        let bytes = page.get_page_data();
        let parsed = HeapPage::new(pid, schema.clone(), DEFAULT_PAGE_SIZE, &bytes).unwrap();
        assert_eq!(parsed.num_empty_slots(), 0);

        let mut overflow = Tuple::new(schema);
        overflow.set_field(0, Field::Str("overflow".to_string()));
        let mut parsed = parsed;
        let err = parsed.add_tuple(overflow).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotEnoughSpace);
    }

    #[test]
    fn serialization_round_trips() {
        let schema = int_schema(2);
        let pid = HeapPageId::new(1, 0);
        let mut page = HeapPage::empty(pid, schema.clone(), DEFAULT_PAGE_SIZE);

        let mut t = Tuple::new(schema.clone());
        t.set_field(0, Field::Int(7));
        t.set_field(1, Field::Int(8));
        page.add_tuple(t).unwrap();

        let bytes = page.get_page_data();
        let parsed = HeapPage::new(pid, schema, DEFAULT_PAGE_SIZE, &bytes).unwrap();

        assert_eq!(parsed.iter().count(), 1);
        let t = parsed.iter().next().unwrap();
        assert_eq!(t.get_field(0), Some(&Field::Int(7)));
        assert_eq!(t.get_field(1), Some(&Field::Int(8)));
        assert_eq!(parsed.get_page_data(), bytes);
    }

    #[test]
    fn add_tuple_fills_lowest_empty_slot() {
        let schema = int_schema(1);
        let pid = HeapPageId::new(1, 0);
        let mut page = HeapPage::empty(pid, schema.clone(), DEFAULT_PAGE_SIZE);

        let mut t0 = Tuple::new(schema.clone());
        t0.set_field(0, Field::Int(1));
        page.add_tuple(t0).unwrap();

        let mut t1 = Tuple::new(schema.clone());
        t1.set_field(0, Field::Int(2));
        page.add_tuple(t1).unwrap();

        let rid0 = page.iter().next().unwrap().record_id().unwrap().clone();
        assert_eq!(rid0.slot_index, 0);
    }

    #[test]
    fn add_tuple_fails_on_schema_mismatch() {
        let schema = int_schema(1);
        let other_schema = int_schema(2);
        let pid = HeapPageId::new(1, 0);
        let mut page = HeapPage::empty(pid, schema, DEFAULT_PAGE_SIZE);
        let t = Tuple::new(other_schema);
        let err = page.add_tuple(t).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::SchemaMismatch);
    }

    #[test]
    fn add_tuple_fails_when_page_full() {
        let schema = int_schema(1);
        let pid = HeapPageId::new(1, 0);
        let mut page = HeapPage::empty(pid, schema.clone(), DEFAULT_PAGE_SIZE);
        let capacity = page.num_empty_slots();
        for i in 0..capacity {
            let mut t = Tuple::new(schema.clone());
            t.set_field(0, Field::Int(i as i32));
            page.add_tuple(t).unwrap();
        }
        let mut overflow = Tuple::new(schema);
        overflow.set_field(0, Field::Int(0));
        let err = page.add_tuple(overflow).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotEnoughSpace);
    }

    #[test]
    fn delete_twice_yields_not_on_page() {
        let schema = int_schema(1);
        let pid = HeapPageId::new(1, 0);
        let mut page = HeapPage::empty(pid, schema.clone(), DEFAULT_PAGE_SIZE);
        let mut t = Tuple::new(schema);
        t.set_field(0, Field::Int(42));
        page.add_tuple(t).unwrap();
        let stored = page.iter().next().unwrap().clone();

        page.delete_tuple(&stored).unwrap();
        let err = page.delete_tuple(&stored).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotOnPage);
    }

    #[test]
    fn before_image_is_distinct_until_set() {
        let schema = int_schema(1);
        let pid = HeapPageId::new(1, 0);
        let mut page = HeapPage::empty(pid, schema.clone(), DEFAULT_PAGE_SIZE);
        let before = page.get_before_image();

        let mut t = Tuple::new(schema);
        t.set_field(0, Field::Int(1));
        page.add_tuple(t).unwrap();

        assert_eq!(page.get_before_image(), before);
        page.set_before_image();
        assert_eq!(page.get_before_image(), page.get_page_data());
    }
}
