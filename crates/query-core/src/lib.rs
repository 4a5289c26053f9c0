pub mod error;
pub mod query;
pub mod types;

pub use error::{QueryError, Result};
pub use query::{Outcome, QueryBuilder};
pub use types::Value;
