//! Nested-loop equi/theta-join of two child operators: the outer
//! tuple is held directly on the struct rather than behind a
//! look-ahead, since it must survive across many inner rewinds. The
//! inner child rewinds each time the outer tuple advances.

use crate::{
    error::SmallError,
    field::Op,
    tuple::{Tuple, TupleDesc},
};

use super::DbIterator;

pub struct Join {
    left: Box<dyn DbIterator>,
    right: Box<dyn DbIterator>,
    left_field: usize,
    right_field: usize,
    op: Op,
    schema: TupleDesc,
    current_left: Option<Tuple>,
    buffered: Option<Tuple>,
}

impl Join {
    pub fn new(
        left: Box<dyn DbIterator>,
        right: Box<dyn DbIterator>,
        left_field: usize,
        right_field: usize,
        op: Op,
    ) -> Self {
        let schema = TupleDesc::combine(&left.schema(), &right.schema());
        Self {
            left,
            right,
            left_field,
            right_field,
            op,
            schema,
            current_left: None,
            buffered: None,
        }
    }

    fn matches(&self, l: &Tuple, r: &Tuple) -> Result<bool, SmallError> {
        let lf = l
            .get_field(self.left_field)
            .ok_or_else(|| SmallError::illegal_argument("join field is unset on left tuple"))?;
        let rf = r
            .get_field(self.right_field)
            .ok_or_else(|| SmallError::illegal_argument("join field is unset on right tuple"))?;
        lf.compare(self.op, rf)
    }

    fn advance(&mut self) -> Result<bool, SmallError> {
        loop {
            if self.current_left.is_none() {
                if !self.left.has_next()? {
                    return Ok(false);
                }
                self.current_left = Some(self.left.next()?);
                self.right.rewind()?;
            }

            let left_tuple = self.current_left.as_ref().unwrap();
            if self.right.has_next()? {
                let right_tuple = self.right.next()?;
                if self.matches(left_tuple, &right_tuple)? {
                    self.buffered = Some(Tuple::combine(left_tuple, &right_tuple));
                    return Ok(true);
                }
                continue;
            }

            self.current_left = None;
        }
    }
}

impl DbIterator for Join {
    fn open(&mut self) -> Result<(), SmallError> {
        self.left.open()?;
        self.right.open()?;
        self.current_left = None;
        self.buffered = None;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, SmallError> {
        if self.buffered.is_some() {
            return Ok(true);
        }
        self.advance()
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
        self.left.rewind()?;
        self.current_left = None;
        self.buffered = None;
        Ok(())
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.current_left = None;
        self.buffered = None;
    }

    fn schema(&self) -> TupleDesc {
        self.schema.clone()
    }
}
