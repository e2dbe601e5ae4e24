// src/pipeline/channels.rs

//! Communication handles between the dispatcher, probe tasks and the
//! accumulator. Built fresh for every run.

use tokio::sync::{mpsc, oneshot};

use crate::models::SiteRecord;

/// Acknowledgement returned by the accumulator once a creation is counted.
pub type CreationAck = oneshot::Sender<()>;

/// Sending side, owned by the dispatcher.
pub struct DispatchHandles {
    /// Creation signal; the dispatcher waits for the acknowledgement
    pub created: mpsc::Sender<CreationAck>,

    /// "No more work" signal, sent once
    pub finished: oneshot::Sender<()>,

    /// Scored sites; cloned into every probe task
    pub scores: mpsc::Sender<SiteRecord>,
}

/// Receiving side, owned by the accumulator.
pub struct AccumulatorInbox {
    pub created: mpsc::Receiver<CreationAck>,
    pub finished: oneshot::Receiver<()>,
    pub scores: mpsc::Receiver<SiteRecord>,
}

/// Create the three signal paths. `score_buffer` bounds the score queue.
pub fn channels(score_buffer: usize) -> (DispatchHandles, AccumulatorInbox) {
    let (created_tx, created_rx) = mpsc::channel(1);
    let (finished_tx, finished_rx) = oneshot::channel();
    let (scores_tx, scores_rx) = mpsc::channel(score_buffer.max(1));

    (
        DispatchHandles {
            created: created_tx,
            finished: finished_tx,
            scores: scores_tx,
        },
        AccumulatorInbox {
            created: created_rx,
            finished: finished_rx,
            scores: scores_rx,
        },
    )
}
