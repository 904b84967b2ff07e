pub mod connector;
pub mod data_type;

// Re-export commonly used types
pub use connector::{ConnectionEvent, Connector, Payload};
pub use data_type::{DataType, Direction};
