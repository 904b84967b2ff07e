pub mod associative;
pub mod sequence;
pub mod value;

// Re-export commonly used types
pub use associative::{SharedMap, SharedSet};
pub use sequence::SharedSequence;
pub use value::{ReadTicket, SharedValue, WriteTicket};
