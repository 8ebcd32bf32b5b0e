//! Write-ahead log of before/after page images, written under FORCE at
//! commit.
//!
//! Each record is a before/after page-image pair tagged by the
//! transaction that produced it — enough bookkeeping to support
//! abort. Checkpointing and REDO/UNDO recovery are out of scope.

use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
    sync::Mutex,
};

use crate::{error::SmallError, transaction_id::TransactionId};

pub struct LogManager {
    file: Mutex<BufWriter<File>>,
}

impl LogManager {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SmallError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Appends one `(tid, before_image, after_image)` record. Each
    /// image is length-prefixed so `before`/`after` of different sizes
    /// (or pages of different schemas) share one log file.
    pub fn log_write(
        &self,
        tid: TransactionId,
        before: &[u8],
        after: &[u8],
    ) -> Result<(), SmallError> {
        let mut w = self.file.lock().unwrap();
        w.write_all(&tid.id().to_be_bytes())?;
        w.write_all(&(before.len() as u32).to_be_bytes())?;
        w.write_all(before)?;
        w.write_all(&(after.len() as u32).to_be_bytes())?;
        w.write_all(after)?;
        Ok(())
    }

    /// Flushes buffered log records to disk. Called before a commit's
    /// page writes are allowed to proceed, satisfying FORCE.
    pub fn force(&self) -> Result<(), SmallError> {
        let mut w = self.file.lock().unwrap();
        w.flush()?;
        w.get_ref().sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn log_write_then_force_does_not_error() {
        let file = NamedTempFile::new().unwrap();
        let log = LogManager::new(file.path()).unwrap();
        let tid = TransactionId::new();
        log.log_write(tid, &[1, 2, 3], &[4, 5, 6]).unwrap();
        log.force().unwrap();
    }
}
