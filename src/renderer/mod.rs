//! Renderer side of the command queue
//!
//! Runs inside the renderer process. Each tick drains every queued command
//! into the render target, pushes query results onto the result queue, and
//! then presents one frame.

mod clock;
mod event_loop;
mod present;
mod stdio;

pub use clock::{FrameClock, FrameTime};
pub use event_loop::{LoopPhase, RendererLoop, TickReport};
pub use present::{FramePresenter, HeadlessPresenter};
pub use stdio::serve_stdio;
