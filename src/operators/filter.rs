//! Selection over a child operator: yields only the child tuples that
//! satisfy a single-field predicate.

use crate::{error::SmallError, field::Op, tuple::{Tuple, TupleDesc}};

use super::DbIterator;

pub struct Filter {
    child: Box<dyn DbIterator>,
    field_index: usize,
    op: Op,
    value: crate::field::Field,
    buffered: Option<Tuple>,
}

impl Filter {
    pub fn new(
        child: Box<dyn DbIterator>,
        field_index: usize,
        op: Op,
        value: crate::field::Field,
    ) -> Self {
        Self {
            child,
            field_index,
            op,
            value,
            buffered: None,
        }
    }

    fn matches(&self, t: &Tuple) -> Result<bool, SmallError> {
        let field = t
            .get_field(self.field_index)
            .ok_or_else(|| SmallError::illegal_argument("filtered field is unset"))?;
        field.compare(self.op, &self.value)
    }
}

impl DbIterator for Filter {
    fn open(&mut self) -> Result<(), SmallError> {
        self.child.open()
    }

    fn has_next(&mut self) -> Result<bool, SmallError> {
        while self.child.has_next()? {
            let t = self.child.next()?;
            if self.matches(&t)? {
                // Stash the matching tuple back as the child's look-ahead
                // is already consumed; re-expose it by wrapping in a
                // one-shot buffer via a fused next() call below.
                self.buffered = Some(t);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn next(&mut self) -> Result<Tuple, SmallError> {
        if self.buffered.is_none() {
            self.has_next()?;
        }
        self.buffered
            .take()
            .ok_or_else(|| SmallError::no_such_element("next called with no tuple available"))
    }

    fn rewind(&mut self) -> Result<(), SmallError> {
        self.buffered = None;
        self.child.rewind()
    }

    fn close(&mut self) {
        self.buffered = None;
        self.child.close();
    }

    fn schema(&self) -> TupleDesc {
        self.child.schema()
    }
}
