// Declare submodules
mod antigen;
mod common;

pub use antigen::{antigen_harmonization_prompt, RESPONSE_FIELDS};
pub use common::*;
