//! Cross-cutting infrastructure: errors and logging

pub mod error;
pub mod logger;

pub use error::{CoreError, CoreResult};
