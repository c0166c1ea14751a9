use super::{FramePresenter, RendererLoop};
use crate::config::RendererConfig;
use crate::protocol::{query_id_of, RemoteError, RemoteErrorKind, Reply, Response};
use crate::queue::{self, QueueTx};
use crate::target::RenderTarget;
use crate::{Error, Result};

/// Serve a renderer over this process's stdio.
///
/// Commands are read from stdin and query replies are written to stdout, one
/// JSON line each; logs must therefore go to stderr. Returns the target once
/// stdin reaches EOF and every queued command has been applied.
pub async fn serve_stdio<T, P>(target: T, presenter: P, config: &RendererConfig) -> Result<T>
where
    T: RenderTarget,
    P: FramePresenter<T>,
{
    let (command_tx, command_rx) = queue::channel("commands");
    let (result_tx, result_rx) = queue::channel("results");

    let reader = queue::spawn_reader_with(tokio::io::stdin(), command_tx, reject_undecodable(result_tx.clone()));
    let writer = queue::spawn_writer(result_rx, tokio::io::stdout(), None);

    let event_loop = RendererLoop::new(target, presenter, command_rx, result_tx);
    let target = event_loop.run(config.tick_period()).await;

    // The loop dropped its end of the result queue, so the writer finishes
    // once the last replies are out.
    match writer.await {
        Ok(result) => result?,
        Err(e) => tracing::warn!("Result writer task failed: {}", e),
    }
    if let Ok(Err(e)) = reader.await {
        tracing::warn!("Command reader stopped with an error: {}", e);
    }

    Ok(target)
}

/// Answer a query whose line could not be decoded, so its caller fails now
/// rather than at its timeout.
///
/// The reply may overtake replies the loop has not sent yet; the id keeps it
/// matched to its own query.
fn reject_undecodable(results: QueueTx<Response>) -> impl FnMut(&str, &Error) + Send + 'static {
    move |line: &str, error: &Error| {
        let Some(id) = query_id_of(line) else {
            return;
        };
        let remote = RemoteError::new(
            RemoteErrorKind::InvalidArgument,
            format!("undecodable command: {error}"),
        );
        if let Err(e) = results.put(Response::new(Some(id), Reply::Error(remote))) {
            tracing::warn!("Dropping rejection for query {}: {}", id, e);
        }
    }
}
