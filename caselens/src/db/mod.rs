pub mod backends;
mod connection;
mod registry;
pub mod traits;

pub use backends::libsql::LibSqlVectorStore;
pub use backends::memory::MemoryVectorStore;
pub use connection::Database;
pub use registry::{CollectionGate, CollectionRegistry, CollectionState, IndexPermit, ResetPermit};
pub use traits::*;
