//! Service layer for the mirror selector.
//!
//! This module contains the business logic for:
//! - Directory tokenizing (`DirectoryTokenizer`)
//! - Site record assembly (`RecordAssembler`)
//! - Criteria filtering (`filter::matches`)
//! - Mirror probing (`Prober`, `LatencyProber`)
//! - sources.list rendering (`SourcesListRenderer`)

pub mod assembler;
pub mod filter;
mod prober;
mod renderer;
mod tokenizer;

pub use assembler::{RecordAssembler, assemble};
pub use prober::{LatencyProber, Prober};
pub use renderer::SourcesListRenderer;
pub use tokenizer::DirectoryTokenizer;
