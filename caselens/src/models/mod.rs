mod analysis;
mod case;
mod common;
mod document;
mod retrieval;

pub use analysis::*;
pub use case::*;
pub use common::*;
pub use document::*;
pub use retrieval::*;
