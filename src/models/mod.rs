// Core models
pub mod account;
pub mod ladder;
pub mod match_model;
pub mod tournament;

// Re-export commonly used types
pub use account::*;
pub use ladder::*;
pub use match_model::*;
pub use tournament::*;
