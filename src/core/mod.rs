pub mod combiner;
pub mod components;
pub mod conditions;
pub mod connections;
pub mod error;
pub mod execution;
pub mod factory;
pub mod properties;
pub mod shared;
pub mod signal;
pub mod types;
