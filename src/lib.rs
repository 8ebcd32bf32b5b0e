//! A small relational storage and execution engine: paged heap files,
//! a transactional buffer pool, and pull-based query operators.

pub mod aggregator;
pub mod buffer_pool;
pub mod catalog;
pub mod database;
pub mod error;
pub mod field;
pub mod heap_file;
pub mod histogram;
pub mod lock_manager;
pub mod log_manager;
pub mod operators;
pub mod page;
pub mod page_id;
pub mod permissions;
pub mod transaction_id;
pub mod tuple;

pub use database::Database;
pub use error::{ErrorKind, SmallError, SmallResult};
pub use transaction_id::TransactionId;

/// Initializes `env_logger` from the `RUST_LOG` environment variable.
/// Idempotent, so tests across multiple modules can all call it safely.
pub fn init_log() {
    let _ = env_logger::builder().is_test(cfg!(test)).try_init();
}
