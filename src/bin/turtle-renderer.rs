//! Renderer process entry point
//!
//! Reads commands from stdin, writes query results to stdout and logs to
//! stderr. Exits once stdin is closed.

use std::process::ExitCode;

use turtle_relay::config::{self, Config};
use turtle_relay::logging::init_logging;
use turtle_relay::renderer::{serve_stdio, HeadlessPresenter};
use turtle_relay::turtle;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            init_logging(None);
            tracing::error!("Invalid renderer configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.renderer.log_filter.as_deref());

    let session = std::env::var(config::ENV_SESSION).unwrap_or_default();
    tracing::info!(
        session = %session,
        pid = std::process::id(),
        tick_rate_hz = config.renderer.tick_rate_hz,
        "Starting renderer"
    );

    match serve_stdio(turtle::render_target(), HeadlessPresenter, &config.renderer).await {
        Ok(target) => {
            tracing::info!(
                segments = target.state().segments().len(),
                "Renderer finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Renderer failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
