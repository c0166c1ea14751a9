//! Session: owns the single renderer for whoever initializes the system

use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::Instrument;
use uuid::Uuid;

use super::{ControlProxy, Launched, Launcher, ProcessLauncher, TurtleClient};
use crate::config::Config;
use crate::protocol::RendererInfo;
use crate::Result;

/// How long shutdown waits for the renderer before killing it
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Starts the renderer on first use and hands out proxies to it.
///
/// A session never starts a second renderer: concurrent first callers share
/// one launch, and every later call reuses it. A failed launch is reported
/// to the callers that awaited it and retried on the next call.
pub struct Session<L = ProcessLauncher> {
    id: Uuid,
    config: Config,
    launcher: L,
    renderer: OnceCell<Launched>,
}

impl Session<ProcessLauncher> {
    /// Session whose renderer runs as a child process
    pub fn new(config: Config) -> Self {
        Self::with_launcher(config, ProcessLauncher)
    }
}

impl<L: Launcher> Session<L> {
    pub fn with_launcher(config: Config, launcher: L) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            launcher,
            renderer: OnceCell::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.renderer.initialized()
    }

    /// Handshake details of the running renderer, if started
    pub fn renderer_info(&self) -> Option<&RendererInfo> {
        self.renderer.get().map(|launched| &launched.info)
    }

    /// Proxy to the renderer, starting it if this is the first use
    pub async fn proxy(&self) -> Result<&ControlProxy> {
        let launched = self
            .renderer
            .get_or_try_init(|| {
                self.launcher
                    .launch(&self.config, self.id)
                    .instrument(tracing::info_span!("session", id = %self.id))
            })
            .await?;
        Ok(&launched.proxy)
    }

    /// Typed turtle commands over this session's renderer
    pub async fn turtle(&self) -> Result<TurtleClient> {
        Ok(TurtleClient::new(self.proxy().await?.clone()))
    }

    /// Stop the renderer, if one was started
    pub async fn shutdown(self) -> Result<()> {
        match self.renderer.into_inner() {
            Some(launched) => {
                tracing::info!(session = %self.id, "Shutting down renderer");
                launched.shutdown(SHUTDOWN_GRACE).await
            }
            None => Ok(()),
        }
    }
}
