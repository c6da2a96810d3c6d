pub mod extraction;
pub mod harmonizer;
pub mod rules;
pub mod types;

pub use types::*;

// Module-level constants
pub const TARGET_ANTIGEN: &str = "antigen";
