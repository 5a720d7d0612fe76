//! OpenAI-compatible API types

mod legacy;
mod models;
mod openai;

pub use legacy::*;
pub use models::*;
pub use openai::*;
