//! Unidirectional FIFO queues
//!
//! A queue is an unbounded in-process channel with exactly one consuming end.
//! To carry a queue across the process boundary, [`spawn_writer`] drains a
//! local queue into a pipe and [`spawn_reader`] refills a local queue on the
//! other side from that pipe.

mod pipe;

pub use pipe::{spawn_reader, spawn_reader_with, spawn_writer};

use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::{Error, Result};

/// Create a new queue; `label` names it in logs and errors
pub fn channel<T>(label: &'static str) -> (QueueTx<T>, QueueRx<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueTx { inner: tx, label }, QueueRx { inner: rx, label })
}

/// Producing end of a queue
#[derive(Debug)]
pub struct QueueTx<T> {
    inner: mpsc::UnboundedSender<T>,
    label: &'static str,
}

impl<T> Clone for QueueTx<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            label: self.label,
        }
    }
}

impl<T> QueueTx<T> {
    /// Append an item; never blocks, fails only once the consumer is gone
    pub fn put(&self, item: T) -> Result<()> {
        self.inner
            .send(item)
            .map_err(|_| Error::QueueUnavailable(format!("{} queue has no consumer", self.label)))
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

/// Consuming end of a queue
#[derive(Debug)]
pub struct QueueRx<T> {
    inner: mpsc::UnboundedReceiver<T>,
    label: &'static str,
}

impl<T> QueueRx<T> {
    /// Whether nothing is queued right now; does not remove anything
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Remove the oldest item if one is queued.
    ///
    /// Returns `Ok(None)` when the queue is momentarily empty and
    /// `Err(QueueUnavailable)` once it is empty and every producer is gone.
    pub fn try_get(&mut self) -> Result<Option<T>> {
        match self.inner.try_recv() {
            Ok(item) => Ok(Some(item)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::QueueUnavailable(format!(
                "{} queue has no producer",
                self.label
            ))),
        }
    }

    /// Wait for the next item; `None` once the queue is drained and closed
    pub async fn get(&mut self) -> Option<T> {
        self.inner.recv().await
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}
