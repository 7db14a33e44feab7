// Database layer module

pub mod pool;
pub mod schema;

pub use pool::DbPool;
