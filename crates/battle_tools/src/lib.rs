//! # Battle Development Tools
//!
//! Command-line tools for development:
//! - Scenario validators
//! - Open position and path queries against a scenario's board
//! - Headless battle runner

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod query;
pub mod validate;

pub use error::{Result, ToolError};
