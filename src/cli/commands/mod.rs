//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod check_template;
pub mod send;
pub mod validate;
