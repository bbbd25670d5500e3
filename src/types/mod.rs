//! Shared types

pub mod error;

pub use error::{LinkupError, Result};
