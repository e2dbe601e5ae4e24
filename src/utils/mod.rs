//! Utility functions and helpers.

pub mod arch;
pub mod http;
pub mod log;
pub mod url;
