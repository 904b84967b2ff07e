pub mod condition;
pub mod condition_set;
pub mod flag;

// Re-export commonly used types
pub use condition::Condition;
pub use condition_set::ConditionSet;
pub use flag::Flag;
