//! Database module for PostgreSQL persistence.

mod pool;
mod records;
mod settings;

pub use pool::*;
pub use records::*;
pub use settings::*;
