//! Control-side handle on the command queue

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

use crate::protocol::{Args, Command, Kwargs, Reply, Response, Value};
use crate::queue::{QueueRx, QueueTx};
use crate::{Error, Result};

/// Queries waiting for a reply, keyed by query id.
///
/// Ids are handed out in enqueue order. A caller that gives up removes its
/// own slot, and a reply whose slot is gone is discarded.
#[derive(Default)]
struct PendingQueries {
    next_id: u64,
    slots: HashMap<u64, oneshot::Sender<Reply>>,
    closed: bool,
}

/// Sends commands to the renderer and waits for query results.
///
/// Cheap to clone; all clones share one command queue and one table of
/// outstanding queries.
#[derive(Clone)]
pub struct ControlProxy {
    commands: QueueTx<Command>,
    pending: Arc<Mutex<PendingQueries>>,
    query_timeout: Duration,
}

impl std::fmt::Debug for ControlProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlProxy")
            .field("connected", &self.is_connected())
            .field("outstanding", &self.outstanding())
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

impl ControlProxy {
    /// Wrap the producing end of the command queue and the consuming end of
    /// the result queue. Must be called inside a tokio runtime: a task is
    /// spawned to hand replies to waiting callers.
    pub fn new(commands: QueueTx<Command>, results: QueueRx<Response>, query_timeout: Duration) -> Self {
        let pending = Arc::new(Mutex::new(PendingQueries::default()));
        tokio::spawn(pump_results(results, pending.clone()));

        Self {
            commands,
            pending,
            query_timeout,
        }
    }

    /// Enqueue a fire-and-forget command. Never waits for the renderer.
    pub fn send(&self, name: &str, args: Args, kwargs: Kwargs) -> Result<()> {
        let command = Command::plain(name, args, kwargs)?;

        if self.pending.lock().closed {
            return Err(renderer_gone());
        }

        tracing::debug!(command = name, "Sending command");
        self.commands.put(command)
    }

    /// Enqueue a query and wait for its result, up to the default timeout
    pub async fn call(&self, name: &str, args: Args, kwargs: Kwargs) -> Result<Value> {
        self.call_with_timeout(name, args, kwargs, self.query_timeout)
            .await
    }

    /// Enqueue a query and wait for its result, up to `timeout`
    pub async fn call_with_timeout(
        &self,
        name: &str,
        args: Args,
        kwargs: Kwargs,
        timeout: Duration,
    ) -> Result<Value> {
        let command = Command::query(name, args, kwargs)?;

        // Ids follow queue order even with concurrent callers
        let (id, rx) = {
            let mut pending = self.pending.lock();
            if pending.closed {
                return Err(renderer_gone());
            }
            let id = pending.next_id;
            self.commands.put(command.with_id(id))?;
            pending.next_id += 1;

            let (tx, rx) = oneshot::channel();
            pending.slots.insert(id, tx);
            (id, rx)
        };

        tracing::debug!(command = name, id, "Waiting for query result");
        let reply = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => {
                return Err(Error::QueueUnavailable(format!(
                    "renderer went away before answering '{name}'"
                )))
            }
            Err(_) => {
                self.pending.lock().slots.remove(&id);
                return Err(Error::Timeout {
                    command: name.to_string(),
                    after: timeout,
                });
            }
        };

        reply.into_result(name)
    }

    /// `call` with the result decoded into `R`
    pub async fn call_as<R: DeserializeOwned>(&self, name: &str, args: Args, kwargs: Kwargs) -> Result<R> {
        let value = self.call(name, args, kwargs).await?;
        serde_json::from_value(value).map_err(Error::Json)
    }

    /// Whether both queues still have a live peer
    pub fn is_connected(&self) -> bool {
        !self.commands.is_closed() && !self.pending.lock().closed
    }

    /// Number of queries still waiting for their reply
    pub fn outstanding(&self) -> usize {
        self.pending.lock().slots.len()
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }
}

fn renderer_gone() -> Error {
    Error::QueueUnavailable("renderer result stream is closed".to_string())
}

async fn pump_results(mut results: QueueRx<Response>, pending: Arc<Mutex<PendingQueries>>) {
    while let Some(response) = results.get().await {
        let Some(id) = response.id else {
            tracing::warn!("Discarding reply without a query id: {:?}", response.reply);
            continue;
        };

        let slot = pending.lock().slots.remove(&id);
        match slot {
            Some(tx) => {
                if tx.send(response.reply).is_err() {
                    tracing::debug!(id, "Discarding reply for an abandoned query");
                }
            }
            None => {
                tracing::debug!(id, "Discarding late reply: {:?}", response.reply);
            }
        }
    }

    tracing::info!("Renderer result stream closed");
    let mut pending = pending.lock();
    pending.closed = true;
    // Dropping the senders wakes every waiting caller
    pending.slots.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{RemoteError, RemoteErrorKind};
    use crate::queue::channel;
    use serde_json::json;

    fn proxy(timeout: Duration) -> (ControlProxy, QueueRx<Command>, QueueTx<Response>) {
        let (cmd_tx, cmd_rx) = channel("commands");
        let (res_tx, res_rx) = channel("results");
        (ControlProxy::new(cmd_tx, res_rx, timeout), cmd_rx, res_tx)
    }

    /// Answers every query with its first argument, in order
    fn spawn_echo(mut commands: QueueRx<Command>, results: QueueTx<Response>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(cmd) = commands.get().await {
                if cmd.is_query() {
                    let value = cmd.args().first().cloned().unwrap_or(Value::Null);
                    if results.put(Response::new(cmd.id(), Reply::Ok(value))).is_err() {
                        break;
                    }
                }
            }
        })
    }

    #[tokio::test]
    async fn test_send_enqueues_in_order_without_waiting() {
        let (proxy, mut cmd_rx, _res_tx) = proxy(Duration::from_secs(1));

        proxy.send("forward", vec![json!(5)], Kwargs::new()).unwrap();
        proxy.send("forward", vec![json!(6)], Kwargs::new()).unwrap();
        proxy.send("penup", vec![], Kwargs::new()).unwrap();

        let queued: Vec<(String, Args)> = std::iter::from_fn(|| cmd_rx.try_get().unwrap())
            .map(|c| (c.name().to_string(), c.args().to_vec()))
            .collect();
        assert_eq!(
            queued,
            vec![
                ("forward".to_string(), vec![json!(5)]),
                ("forward".to_string(), vec![json!(6)]),
                ("penup".to_string(), vec![]),
            ]
        );
    }

    #[tokio::test]
    async fn test_send_rejects_query_marker() {
        let (proxy, cmd_rx, _res_tx) = proxy(Duration::from_secs(1));
        assert!(matches!(
            proxy.send("*getpos", vec![], Kwargs::new()),
            Err(Error::InvalidCommand(_))
        ));
        assert!(cmd_rx.is_empty());
    }

    #[tokio::test]
    async fn test_call_returns_matching_results_in_order() {
        let (proxy, cmd_rx, res_tx) = proxy(Duration::from_secs(1));
        spawn_echo(cmd_rx, res_tx);

        for i in 0..20 {
            let value = proxy.call("echo", vec![json!(i)], Kwargs::new()).await.unwrap();
            assert_eq!(value, json!(i));
        }
        assert_eq!(proxy.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_get_their_own_results() {
        let (proxy, cmd_rx, res_tx) = proxy(Duration::from_secs(5));
        spawn_echo(cmd_rx, res_tx);

        let callers: Vec<_> = (0..32)
            .map(|i| {
                let proxy = proxy.clone();
                tokio::spawn(async move {
                    let value = proxy.call("echo", vec![json!(i)], Kwargs::new()).await.unwrap();
                    (i, value)
                })
            })
            .collect();

        for caller in callers {
            let (i, value) = caller.await.unwrap();
            assert_eq!(value, json!(i));
        }
    }

    #[tokio::test]
    async fn test_remote_error_surfaces() {
        let (proxy, mut cmd_rx, res_tx) = proxy(Duration::from_secs(1));
        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.get().await {
                let remote = RemoteError::new(RemoteErrorKind::UnknownCommand, cmd.operation());
                res_tx.put(Response::new(cmd.id(), Reply::Error(remote))).unwrap();
            }
        });

        let err = proxy.call("unknownop", vec![], Kwargs::new()).await.unwrap_err();
        assert!(matches!(err, Error::UnknownCommand(name) if name == "unknownop"));
    }

    #[tokio::test]
    async fn test_late_reply_is_discarded() {
        let (proxy, mut cmd_rx, res_tx) = proxy(Duration::from_millis(20));

        let err = proxy.call("slow", vec![], Kwargs::new()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { ref command, .. } if command == "slow"));
        assert_eq!(proxy.outstanding(), 0);

        let second = tokio::spawn({
            let proxy = proxy.clone();
            async move {
                proxy
                    .call_with_timeout("fast", vec![], Kwargs::new(), Duration::from_secs(1))
                    .await
            }
        });

        // The renderer finally answers the first query, then the second
        let first = cmd_rx.get().await.unwrap();
        assert_eq!(first.name(), "*slow");
        let next = cmd_rx.get().await.unwrap();
        assert_eq!(next.name(), "*fast");
        assert_ne!(first.id(), next.id());

        res_tx.put(Response::new(first.id(), Reply::Ok(json!("late")))).unwrap();
        res_tx.put(Response::new(next.id(), Reply::Ok(json!("fast answer")))).unwrap();

        assert_eq!(second.await.unwrap().unwrap(), json!("fast answer"));
        assert_eq!(proxy.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_query_lost_on_the_wire_does_not_shift_later_replies() {
        use crate::queue::{spawn_reader, spawn_writer};

        // control -> pipe -> renderer echo -> pipe -> control
        let (cmd_tx, cmd_rx) = channel("commands");
        let (res_tx, res_rx) = channel("results");
        let proxy = ControlProxy::new(cmd_tx, res_rx, Duration::from_secs(5));

        let (down_local, down_remote) = tokio::io::duplex(1 << 16);
        let (up_remote, up_local) = tokio::io::duplex(1 << 16);
        let (remote_cmd_tx, remote_cmd_rx) = channel("commands");
        let (remote_res_tx, remote_res_rx) = channel("results");
        spawn_writer(cmd_rx, down_local, None);
        spawn_reader(down_remote, remote_cmd_tx);
        spawn_echo(remote_cmd_rx, remote_res_tx);
        spawn_writer(remote_res_rx, up_remote, None);
        spawn_reader(up_local, res_tx);

        // Serializes fine but is too deeply nested to decode on the far side
        let mut nested = json!(0);
        for _ in 0..200 {
            nested = json!([nested]);
        }
        let err = proxy
            .call_with_timeout("echo", vec![nested], Kwargs::new(), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }), "{err:?}");

        for i in 0..10 {
            let value = proxy.call("echo", vec![json!(i)], Kwargs::new()).await.unwrap();
            assert_eq!(value, json!(i));
        }
        assert_eq!(proxy.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_reply_without_id_is_ignored() {
        let (proxy, mut cmd_rx, res_tx) = proxy(Duration::from_secs(1));

        let waiting = tokio::spawn({
            let proxy = proxy.clone();
            async move { proxy.call("isdown", vec![], Kwargs::new()).await }
        });
        let cmd = cmd_rx.get().await.unwrap();

        res_tx.put(Response::new(None, Reply::Ok(json!("stray")))).unwrap();
        res_tx.put(Response::new(cmd.id(), Reply::Ok(json!(true)))).unwrap();

        assert_eq!(waiting.await.unwrap().unwrap(), json!(true));
    }

    #[tokio::test]
    async fn test_closed_result_stream_fails_fast() {
        let (proxy, _cmd_rx, res_tx) = proxy(Duration::from_secs(10));

        let waiting = tokio::spawn({
            let proxy = proxy.clone();
            async move { proxy.call("getpos", vec![], Kwargs::new()).await }
        });
        while proxy.outstanding() == 0 {
            tokio::task::yield_now().await;
        }
        drop(res_tx);

        assert!(matches!(waiting.await.unwrap(), Err(Error::QueueUnavailable(_))));
        assert!(!proxy.is_connected());
        assert!(matches!(
            proxy.send("forward", vec![json!(1)], Kwargs::new()),
            Err(Error::QueueUnavailable(_))
        ));
        assert!(matches!(
            proxy.call("getpos", vec![], Kwargs::new()).await,
            Err(Error::QueueUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_send_fails_once_consumer_is_gone() {
        let (proxy, cmd_rx, _res_tx) = proxy(Duration::from_secs(1));
        drop(cmd_rx);

        assert!(matches!(
            proxy.send("forward", vec![json!(1)], Kwargs::new()),
            Err(Error::QueueUnavailable(_))
        ));
        assert!(matches!(
            proxy.call("getpos", vec![], Kwargs::new()).await,
            Err(Error::QueueUnavailable(_))
        ));
        assert_eq!(proxy.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_call_as_decodes() {
        let (proxy, cmd_rx, res_tx) = proxy(Duration::from_secs(1));
        spawn_echo(cmd_rx, res_tx);

        let pos: (f64, f64) = proxy
            .call_as("echo", vec![json!([1.5, 2.0])], Kwargs::new())
            .await
            .unwrap();
        assert_eq!(pos, (1.5, 2.0));

        let err = proxy
            .call_as::<bool>("echo", vec![json!("nope")], Kwargs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
