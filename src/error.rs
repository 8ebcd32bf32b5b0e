//! Crate-wide error type.
//!
//! Every fallible operation in the storage and execution layers returns
//! `SmallResult<T>`. The `ErrorKind` values correspond 1:1 to the error
//! kinds a caller needs to branch on (e.g. a transaction that sees
//! `TxnAborted` must tear itself down via `transaction_complete(tid,
//! false)`).

use std::{error::Error, fmt, io};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    SchemaMismatch,
    NotOnPage,
    WrongTable,
    NotEnoughSpace,
    NoCleanVictim,
    TxnAborted,
    NoSuchElement,
    IllegalArgument,
}

#[derive(Debug, Clone)]
pub struct SmallError {
    kind: ErrorKind,
    details: String,
}

impl SmallError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            details: msg.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, msg)
    }

    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaMismatch, msg)
    }

    pub fn not_on_page(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotOnPage, msg)
    }

    pub fn wrong_table(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::WrongTable, msg)
    }

    pub fn not_enough_space(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotEnoughSpace, msg)
    }

    pub fn no_clean_victim(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoCleanVictim, msg)
    }

    pub fn txn_aborted(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::TxnAborted, msg)
    }

    pub fn no_such_element(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoSuchElement, msg)
    }

    pub fn illegal_argument(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::IllegalArgument, msg)
    }
}

impl fmt::Display for SmallError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.details)
    }
}

impl Error for SmallError {}

impl From<io::Error> for SmallError {
    fn from(e: io::Error) -> Self {
        SmallError::io(e.to_string())
    }
}

pub type SmallResult<T = ()> = Result<T, SmallError>;
