//! Control process side
//!
//! This module handles starting the renderer, and sending it commands and
//! queries through a [`ControlProxy`].

mod client;
mod launcher;
mod process;
mod proxy;
mod session;

pub use client::TurtleClient;
pub use launcher::{handshake, InProcessLauncher, Launched, Launcher, ProcessLauncher};
pub use process::{find_renderer_binary, RendererProcess, RENDERER_BIN};
pub use proxy::ControlProxy;
pub use session::Session;
