//! Selection pipeline.
//!
//! - `run_selection`: assemble a directory, probe matching sites, rank them
//! - `list_candidates`: assemble and filter without probing
//! - `load_tokens`: read or download the directory and tokenize it
//!
//! Probing is split between a [`Dispatcher`], which creates one bounded
//! probe task per candidate, and an [`Accumulator`], which collects the
//! scored sites and decides when the run is complete.

mod accumulate;
mod channels;
mod dispatch;
mod select;

pub use accumulate::{Accumulator, AccumulatorState};
pub use channels::{AccumulatorInbox, CreationAck, DispatchHandles, channels};
pub use dispatch::{DispatchSummary, Dispatcher};
pub use select::{Selection, list_candidates, load_tokens, run_selection, select_sites};
