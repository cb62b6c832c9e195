//! Shared types for the Procore SDK workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
