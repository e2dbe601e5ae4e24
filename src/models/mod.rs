// src/models/mod.rs

//! Domain models for the mirror selector.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod policy;
mod site;
mod token;

// Re-export all public types
pub use config::{Aggregation, Config, LoggingConfig, OutputConfig, ProbeConfig, SourceConfig};
pub use policy::{SelectionPolicy, parse_protocols};
pub use site::{ArchitectureSet, SiteRecord, WORST_SCORE};
pub use token::{Companion, MarkerToken};
