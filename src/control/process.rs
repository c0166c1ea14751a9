//! Renderer process management
//!
//! Spawns the `turtle-renderer` binary and bridges its stdin/stdout to the
//! command and result queues.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::ControlProxy;
use crate::config::{self, Config};
use crate::queue;
use crate::{Error, Result};

/// File name of the renderer binary, without platform suffix
pub const RENDERER_BIN: &str = "turtle-renderer";

/// A running renderer child process
pub struct RendererProcess {
    /// The child process
    child: Child,

    /// Drains the command queue into the child's stdin
    writer: JoinHandle<Result<()>>,

    /// Feeds the child's stdout into the result queue
    reader: JoinHandle<Result<()>>,

    /// Asks the writer to close stdin
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl RendererProcess {
    /// Spawn the renderer and return it with a proxy wired to its queues.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(config: &Config, session_id: Uuid) -> Result<(Self, ControlProxy)> {
        let renderer_path = find_renderer_binary(config.renderer.binary.as_deref())?;

        tracing::info!("Spawning renderer from: {:?}", renderer_path);

        let mut command = tokio::process::Command::new(&renderer_path);
        command
            .env(config::ENV_TICK_HZ, config.renderer.tick_rate_hz.to_string())
            .env(config::ENV_SESSION, session_id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(filter) = &config.renderer.log_filter {
            command.env(config::ENV_LOG, filter);
        }

        let mut child = command
            .spawn()
            .map_err(|e| Error::Spawn(format!("Failed to spawn {}: {}", renderer_path.display(), e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn("Failed to capture renderer stdin".to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn("Failed to capture renderer stdout".to_string()))?;

        let (command_tx, command_rx) = queue::channel("commands");
        let (result_tx, result_rx) = queue::channel("results");
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        let writer = queue::spawn_writer(command_rx, stdin, Some(shutdown_rx));
        let reader = queue::spawn_reader(stdout, result_tx);
        let proxy = ControlProxy::new(command_tx, result_rx, config.control.query_timeout());

        let process = Self {
            child,
            writer,
            reader,
            shutdown_tx: Some(shutdown_tx),
        };

        Ok((process, proxy))
    }

    /// OS process id, while the child has not been reaped
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process is still running
    pub fn is_running(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) => false,
            Err(_) => false,
        }
    }

    /// Close the renderer's stdin and wait for it to exit, killing it if it
    /// does not exit within `grace`.
    pub async fn shutdown(mut self, grace: Duration) -> Result<()> {
        // Queued commands are still written before stdin closes
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        match tokio::time::timeout(grace, &mut self.writer).await {
            Ok(Ok(Err(e))) => tracing::debug!("Command writer ended with: {}", e),
            Ok(Err(e)) => tracing::warn!("Command writer task failed: {}", e),
            Ok(Ok(Ok(()))) => {}
            Err(_) => {
                tracing::warn!("Command writer did not finish, aborting it");
                self.writer.abort();
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(grace) => {
                tracing::warn!("Renderer did not exit gracefully, killing...");
                self.child.kill().await.ok();
            }
            status = self.child.wait() => {
                tracing::info!("Renderer exited with status: {:?}", status);
            }
        }

        // The reader sees EOF once the child is gone
        if tokio::time::timeout(grace, &mut self.reader).await.is_err() {
            self.reader.abort();
        }

        Ok(())
    }
}

/// Find the renderer binary.
///
/// An explicit path must exist. Otherwise looks next to the current
/// executable (and one level up, for test binaries under `deps/`), then in PATH.
pub fn find_renderer_binary(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::Spawn(format!(
            "Renderer binary not found at {}",
            path.display()
        )));
    }

    let file_name = format!("{}{}", RENDERER_BIN, std::env::consts::EXE_SUFFIX);
    if let Ok(exe) = std::env::current_exe() {
        let candidates = exe
            .ancestors()
            .skip(1)
            .take(2)
            .map(|dir| dir.join(&file_name));
        for candidate in candidates {
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    which::which(RENDERER_BIN).map_err(|_| {
        Error::Spawn(format!(
            "{} not found next to the current executable or in PATH",
            RENDERER_BIN
        ))
    })
}
