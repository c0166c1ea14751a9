//! Bridges carrying a queue over a byte pipe as JSON lines

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{QueueRx, QueueTx};
use crate::protocol::{decode_line, encode_line};
use crate::{Error, Result};

enum Step<T> {
    Item(T),
    Closed,
    Shutdown,
}

/// Drain `queue` into `writer`, one JSON line per item.
///
/// The task ends when every producer of `queue` is gone, or when `shutdown`
/// fires (or its sender is dropped); in the latter case items already queued
/// are still written. Dropping the writer at the end closes the pipe, which
/// the peer observes as EOF. A write failure ends the task and drops the
/// queue, so later `put`s fail with `QueueUnavailable`.
pub fn spawn_writer<T, W>(
    mut queue: QueueRx<T>,
    mut writer: W,
    mut shutdown: Option<mpsc::Receiver<()>>,
) -> JoinHandle<Result<()>>
where
    T: Serialize + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let label = queue.label();
        let result = async {
            loop {
                let step = tokio::select! {
                    item = queue.get() => match item {
                        Some(item) => Step::Item(item),
                        None => Step::Closed,
                    },
                    _ = wait_for_shutdown(&mut shutdown) => Step::Shutdown,
                };

                match step {
                    Step::Item(item) => {
                        let line = encode_line(&item)?;
                        write_line(&mut writer, line).await?;
                        // Batch flushes while a burst is still queued
                        if queue.is_empty() {
                            writer.flush().await?;
                        }
                    }
                    Step::Closed => {
                        tracing::debug!(queue = label, "Pipe writer drained a closed queue");
                        break;
                    }
                    Step::Shutdown => {
                        tracing::debug!(queue = label, "Pipe writer received shutdown signal");
                        while let Ok(Some(item)) = queue.try_get() {
                            let line = encode_line(&item)?;
                            write_line(&mut writer, line).await?;
                        }
                        break;
                    }
                }
            }

            writer.flush().await?;
            writer.shutdown().await?;
            Ok::<(), crate::Error>(())
        }
        .await;

        if let Err(e) = &result {
            tracing::warn!(queue = label, "Pipe writer stopped: {}", e);
        }
        result
    })
}

/// Read JSON lines from `reader` and append each decoded item to `queue`.
///
/// Lines that fail to decode are logged and skipped. The task ends on EOF,
/// on a read error, or once the queue has no consumer; the queue's producer
/// is dropped with it, which the consumer observes as a closed queue.
pub fn spawn_reader<T, R>(reader: R, queue: QueueTx<T>) -> JoinHandle<Result<()>>
where
    T: DeserializeOwned + Send + 'static,
    R: AsyncRead + Unpin + Send + 'static,
{
    spawn_reader_with(reader, queue, |_: &str, _: &Error| {})
}

/// [`spawn_reader`], also handing every undecodable line to `on_undecodable`
/// after it is logged.
pub fn spawn_reader_with<T, R, F>(reader: R, queue: QueueTx<T>, mut on_undecodable: F) -> JoinHandle<Result<()>>
where
    T: DeserializeOwned + Send + 'static,
    R: AsyncRead + Unpin + Send + 'static,
    F: FnMut(&str, &Error) + Send + 'static,
{
    tokio::spawn(async move {
        let label = queue.label();
        let mut lines = BufReader::new(reader).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match decode_line::<T>(&line) {
                        Ok(item) => {
                            if queue.put(item).is_err() {
                                tracing::debug!(queue = label, "Pipe reader has no consumer left");
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(queue = label, "Skipping undecodable line: {} - {}", e, line);
                            on_undecodable(&line, &e);
                        }
                    }
                }
                Ok(None) => {
                    tracing::info!(queue = label, "Pipe closed (EOF)");
                    break;
                }
                Err(e) => {
                    tracing::error!(queue = label, "Error reading pipe: {}", e);
                    return Err(e.into());
                }
            }
        }

        Ok(())
    })
}

// Takes the encoded line so that no borrow of the item lives across the await
async fn write_line<W>(writer: &mut W, line: String) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    Ok(())
}

async fn wait_for_shutdown(shutdown: &mut Option<mpsc::Receiver<()>>) {
    match shutdown {
        Some(rx) => {
            rx.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}
