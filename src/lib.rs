//! turtle-relay - drive an out-of-process turtle renderer
//!
//! The renderer has to own its process's main thread, so it runs as a child
//! process. The control side talks to it through two queues: commands go
//! down to the renderer, which applies them to its render target once per
//! tick, and query results come back up in the order the queries were sent.
//!
//! ```no_run
//! use turtle_relay::{Config, Session};
//!
//! # async fn demo() -> turtle_relay::Result<()> {
//! let session = Session::new(Config::load()?);
//! let turtle = session.turtle().await?;
//! turtle.set_pos(10.0, 20.0)?;
//! assert_eq!(turtle.position().await?, (10.0, 20.0));
//! session.shutdown().await
//! # }
//! ```

pub mod config;
pub mod control;
pub mod logging;
pub mod protocol;
pub mod queue;
pub mod renderer;
pub mod target;
pub mod turtle;

mod error;

pub use config::Config;
pub use control::{ControlProxy, Session, TurtleClient};
pub use error::{Error, Result};
