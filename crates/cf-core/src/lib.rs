//! # cf-core
//!
//! Shared types for cutflow: the common error type and the variable
//! registry (event schema) used by the expression compiler and the event
//! builder.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod variables;

pub use error::{Error, Result};
pub use variables::VariableSet;
