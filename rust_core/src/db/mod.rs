//! Database connection pooling and retry helpers.

pub mod pool;
pub mod retry;

pub use pool::{create_pool, DbPoolConfig};
pub use retry::{execute_with_retry, is_retriable_error};
