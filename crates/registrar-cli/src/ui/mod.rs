//! Terminal output and prompts.

mod output;
pub mod prompts;

pub use output::{decision, error, header, info, kv, secret, success, warning};
