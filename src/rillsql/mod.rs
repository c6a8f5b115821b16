// Continuous SQL dataflow engine
// SQL-side evaluation plus the concurrent stream runtime

pub mod sql;
pub mod stream;

// Re-export main API
pub use sql::error::{SqlError, SqlResult};
pub use sql::execution::types::{FieldValue, StreamData, StreamRecord};
pub use stream::topology::Topology;
