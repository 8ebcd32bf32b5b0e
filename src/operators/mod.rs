//! Pull-based query operators, sharing the
//! open/has_next/next/rewind/close contract via the `DbIterator`
//! trait. Each concrete operator wraps its own state in a `LookAhead`
//! adapter and implements `DbIterator` by delegating to it.

pub mod aggregate;
pub mod delete;
pub mod filter;
pub mod insert;
pub mod join;
pub mod seq_scan;

use crate::{error::SmallError, tuple::{Tuple, TupleDesc}};

/// The shared operator contract: `open` prepares the operator to
/// produce tuples, `has_next`/`next` pull them one at a time, `rewind`
/// restarts the same scan, `close` releases resources.
/// Calling `next`/`has_next` before `open` (or after `close`) is a
/// logic error in the caller and is reported as `SmallError`, not a
/// panic, matching how every other fallible operation in this crate
/// surfaces failure.
pub trait DbIterator {
    fn open(&mut self) -> Result<(), SmallError>;
    fn has_next(&mut self) -> Result<bool, SmallError>;
    fn next(&mut self) -> Result<Tuple, SmallError>;
    fn rewind(&mut self) -> Result<(), SmallError>;
    fn close(&mut self);
    fn schema(&self) -> TupleDesc;
}

/// One tuple of look-ahead, so repeated `has_next` calls are
/// idempotent and `next` simply drains what `has_next` already fetched.
pub(crate) struct LookAhead<I> {
    source: Option<I>,
    peeked: Option<Tuple>,
}

impl<I> LookAhead<I>
where
    I: Iterator<Item = Result<Tuple, SmallError>>,
{
    pub fn new() -> Self {
        Self {
            source: None,
            peeked: None,
        }
    }

    pub fn set_source(&mut self, source: I) {
        self.source = Some(source);
        self.peeked = None;
    }

    pub fn has_next(&mut self) -> Result<bool, SmallError> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        match self.source.as_mut() {
            Some(source) => match source.next() {
                Some(Ok(t)) => {
                    self.peeked = Some(t);
                    Ok(true)
                }
                Some(Err(e)) => Err(e),
                None => Ok(false),
            },
            None => Err(SmallError::illegal_argument("iterator used before open")),
        }
    }

    pub fn next(&mut self) -> Result<Tuple, SmallError> {
        if self.peeked.is_none() {
            self.has_next()?;
        }
        self.peeked
            .take()
            .ok_or_else(|| SmallError::no_such_element("next called with no tuple available"))
    }

    pub fn clear(&mut self) {
        self.source = None;
        self.peeked = None;
    }
}
