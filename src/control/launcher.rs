//! Ways of bringing up a renderer for a session

use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use super::{ControlProxy, RendererProcess};
use crate::config::Config;
use crate::protocol::{Kwargs, RendererInfo, HANDSHAKE, PROTOCOL_VERSION};
use crate::queue;
use crate::renderer::{HeadlessPresenter, RendererLoop};
use crate::target::RenderTarget;
use crate::{Error, Result};

/// A started renderer: the proxy to talk to it and, for child processes,
/// the process handle.
pub struct Launched {
    pub proxy: ControlProxy,
    pub info: RendererInfo,
    pub process: Option<RendererProcess>,
}

impl Launched {
    /// Close the command queue and wait for the renderer to go away
    pub async fn shutdown(self, grace: Duration) -> Result<()> {
        match self.process {
            Some(process) => process.shutdown(grace).await,
            None => Ok(()),
        }
    }
}

/// Starts a renderer and completes the handshake with it
pub trait Launcher: Send + Sync {
    fn launch(&self, config: &Config, session_id: Uuid) -> impl Future<Output = Result<Launched>> + Send;
}

/// Ask the renderer who it is and check it speaks our protocol
pub async fn handshake(proxy: &ControlProxy, timeout: Duration) -> Result<RendererInfo> {
    let value = proxy
        .call_with_timeout(HANDSHAKE, vec![], Kwargs::new(), timeout)
        .await
        .map_err(|e| Error::Handshake(e.to_string()))?;

    let info: RendererInfo =
        serde_json::from_value(value).map_err(|e| Error::Handshake(format!("Malformed handshake reply: {}", e)))?;

    if info.protocol != PROTOCOL_VERSION {
        return Err(Error::Handshake(format!(
            "Renderer speaks protocol {}, expected {}",
            info.protocol, PROTOCOL_VERSION
        )));
    }
    Ok(info)
}

/// Runs the renderer as a separate `turtle-renderer` process
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    async fn launch(&self, config: &Config, session_id: Uuid) -> Result<Launched> {
        let (process, proxy) = RendererProcess::spawn(config, session_id)?;

        match handshake(&proxy, config.control.handshake_timeout()).await {
            Ok(info) => {
                tracing::info!(pid = info.pid, "Renderer process ready");
                Ok(Launched {
                    proxy,
                    info,
                    process: Some(process),
                })
            }
            Err(e) => {
                tracing::error!("Renderer handshake failed: {}", e);
                process.shutdown(Duration::from_millis(500)).await.ok();
                Err(e)
            }
        }
    }
}

/// Runs the renderer loop as a task inside the current process.
///
/// For embedding and tests; `make_target` builds a fresh target per launch.
pub struct InProcessLauncher<F> {
    make_target: F,
}

impl<F> InProcessLauncher<F> {
    pub fn new(make_target: F) -> Self {
        Self { make_target }
    }
}

impl<F, T> Launcher for InProcessLauncher<F>
where
    F: Fn() -> T + Send + Sync,
    T: RenderTarget + Send + 'static,
{
    async fn launch(&self, config: &Config, session_id: Uuid) -> Result<Launched> {
        let (command_tx, command_rx) = queue::channel("commands");
        let (result_tx, result_rx) = queue::channel("results");

        let event_loop = RendererLoop::new((self.make_target)(), HeadlessPresenter, command_rx, result_tx);
        tokio::spawn(event_loop.run(config.renderer.tick_period()));

        let proxy = ControlProxy::new(command_tx, result_rx, config.control.query_timeout());
        let info = handshake(&proxy, config.control.handshake_timeout()).await?;
        tracing::info!(session = %session_id, "In-process renderer ready");

        Ok(Launched {
            proxy,
            info,
            process: None,
        })
    }
}
