// src/pipeline/accumulate.rs

//! Result accumulator.
//!
//! Counts created probe tasks, collects their scored sites into a
//! best-first heap and decides when every outstanding probe has reported.
//!
//! ```text
//! Collecting --no more work--> Draining --last score--> Done
//!      \____________no more work, nothing outstanding____/
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{AppError, Result};
use crate::models::{SiteRecord, WORST_SCORE};
use crate::pipeline::channels::AccumulatorInbox;

/// Accumulator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    /// More work may still be created
    Collecting,
    /// No more work will be created; waiting for outstanding scores
    Draining,
    /// Every created unit of work has been scored
    Done,
}

/// Heap entry; the lowest (score, discovery index) pops first.
struct Ranked(SiteRecord);

impl Ranked {
    fn key(&self) -> (u64, usize) {
        (self.0.score().unwrap_or(WORST_SCORE), self.0.index)
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap yields the best site first
        other.key().cmp(&self.key())
    }
}

/// Best-first collector of scored sites.
pub struct Accumulator {
    outstanding: usize,
    more_expected: bool,
    heap: BinaryHeap<Ranked>,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            outstanding: 0,
            more_expected: true,
            heap: BinaryHeap::new(),
        }
    }

    pub fn state(&self) -> AccumulatorState {
        if self.more_expected {
            AccumulatorState::Collecting
        } else if self.outstanding > 0 {
            AccumulatorState::Draining
        } else {
            AccumulatorState::Done
        }
    }

    pub fn is_done(&self) -> bool {
        self.state() == AccumulatorState::Done
    }

    /// Probe tasks created but not yet scored.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Scored sites collected so far.
    pub fn collected(&self) -> usize {
        self.heap.len()
    }

    /// Count one newly created probe task.
    pub fn on_created(&mut self) {
        debug_assert!(self.more_expected, "creation signalled after no-more-work");
        self.outstanding += 1;
    }

    /// No further probe tasks will be created.
    pub fn on_finished(&mut self) {
        self.more_expected = false;
    }

    /// Fold in one scored site.
    ///
    /// # Panics
    ///
    /// If no probe task is outstanding (accumulator underflow). That only
    /// happens when a score is delivered without a prior creation signal.
    pub fn on_scored(&mut self, site: SiteRecord) {
        assert!(
            self.outstanding > 0,
            "accumulator underflow: score for site #{} ({}) with nothing outstanding",
            site.index,
            site.canonical_host()
        );
        self.outstanding -= 1;
        self.heap.push(Ranked(site));
    }

    /// Collected sites, best score first, discovery order on ties.
    pub fn into_ranked(self) -> Vec<SiteRecord> {
        let mut heap = self.heap;
        let mut ranked = Vec::with_capacity(heap.len());
        while let Some(Ranked(site)) = heap.pop() {
            ranked.push(site);
        }
        ranked
    }

    /// Drive the state machine from the inbox until Done.
    ///
    /// Fails if every sender disappears before the run can complete.
    pub async fn run(mut self, inbox: AccumulatorInbox) -> Result<Vec<SiteRecord>> {
        let AccumulatorInbox {
            mut created,
            mut finished,
            mut scores,
        } = inbox;
        let mut creators_open = true;
        let mut scores_open = true;

        while !self.is_done() {
            tokio::select! {
                ack = created.recv(), if creators_open => match ack {
                    Some(ack) => {
                        self.on_created();
                        // A dropped receiver means the dispatcher is gone;
                        // the finished signal will report it.
                        let _ = ack.send(());
                    }
                    None => creators_open = false,
                },
                signal = &mut finished, if self.more_expected => match signal {
                    Ok(()) => {
                        self.on_finished();
                        log::debug!(
                            "Dispatch finished; waiting on {} outstanding probes",
                            self.outstanding
                        );
                    }
                    Err(_) => {
                        return Err(AppError::pipeline(
                            "accumulator",
                            "dispatcher stopped without signalling completion",
                        ));
                    }
                },
                site = scores.recv(), if scores_open => match site {
                    Some(site) => self.on_scored(site),
                    None => scores_open = false,
                },
                else => {
                    return Err(AppError::pipeline(
                        "accumulator",
                        format!(
                            "all senders closed with {} probes outstanding",
                            self.outstanding
                        ),
                    ));
                }
            }
        }

        Ok(self.into_ranked())
    }
}
