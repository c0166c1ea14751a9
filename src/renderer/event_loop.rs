use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;

use super::{FrameClock, FramePresenter};
use crate::protocol::{Command, RendererInfo, Reply, Response, Value, HANDSHAKE, PROTOCOL_VERSION};
use crate::queue::{QueueRx, QueueTx};
use crate::target::{RenderTarget, TargetError, TargetResult};

/// Where the loop currently is within a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// Waiting for the next tick
    Idle,
    /// Removing and dispatching queued commands
    Draining,
    /// Presenting the frame
    Rendering,
}

/// What a single tick did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Commands removed from the queue and dispatched
    pub dispatched: usize,
    /// Dispatches that failed (unknown name or target error)
    pub failed: usize,
    /// Replies appended to the result queue
    pub replies: usize,
    /// Index of the frame presented at the end of the tick
    pub frame_index: u64,
}

/// Consumer side of the command queue.
///
/// Exactly one loop owns the command queue's consuming end and the target,
/// so the target is only ever mutated from here.
pub struct RendererLoop<T, P> {
    target: T,
    presenter: P,
    commands: QueueRx<Command>,
    results: QueueTx<Response>,
    clock: FrameClock,
    phase: LoopPhase,
    started_at: DateTime<Utc>,
    disconnected: bool,
}

impl<T, P> RendererLoop<T, P>
where
    T: RenderTarget,
    P: FramePresenter<T>,
{
    pub fn new(target: T, presenter: P, commands: QueueRx<Command>, results: QueueTx<Response>) -> Self {
        Self {
            target,
            presenter,
            commands,
            results,
            clock: FrameClock::new(),
            phase: LoopPhase::Idle,
            started_at: Utc::now(),
            disconnected: false,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// True once the command queue was found empty with no producer left
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Run one tick: drain every queued command in order, then present.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        self.phase = LoopPhase::Draining;
        loop {
            match self.commands.try_get() {
                Ok(Some(command)) => self.consume(command, &mut report),
                Ok(None) => break,
                Err(_) => {
                    if !self.disconnected {
                        tracing::info!("Command queue closed");
                    }
                    self.disconnected = true;
                    break;
                }
            }
        }

        self.phase = LoopPhase::Rendering;
        let frame = self.clock.tick();
        report.frame_index = frame.frame_index;
        self.presenter.present_frame(&self.target, &frame);

        self.phase = LoopPhase::Idle;
        if report.dispatched > 0 {
            tracing::debug!(
                frame = report.frame_index,
                dispatched = report.dispatched,
                failed = report.failed,
                replies = report.replies,
                "Tick drained commands"
            );
        }
        report
    }

    /// Tick every `period` until the command queue closes, then hand back the target.
    pub async fn run(mut self, period: Duration) -> T {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("Renderer loop started ({:?} per tick)", period);
        while !self.disconnected {
            interval.tick().await;
            self.tick();
        }
        tracing::info!("Renderer loop stopped after {} frames", self.clock.frames());

        self.target
    }

    fn consume(&mut self, command: Command, report: &mut TickReport) {
        report.dispatched += 1;
        let operation = command.operation();
        tracing::trace!(command = command.name(), "Dispatching");

        let outcome = if command.is_query() && operation == HANDSHAKE {
            self.handshake()
        } else {
            self.target
                .dispatch(operation, command.args(), command.kwargs())
        };

        match outcome {
            Ok(value) => {
                if command.is_query() {
                    self.reply(&command, Reply::Ok(value.unwrap_or(Value::Null)), report);
                }
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!("Command '{}' failed: {}", operation, e);
                if command.is_query() {
                    self.reply(&command, Reply::Error(e.to_remote()), report);
                }
            }
        }
    }

    fn reply(&mut self, command: &Command, reply: Reply, report: &mut TickReport) {
        if command.id().is_none() {
            tracing::debug!(command = command.name(), "Replying to a query without an id");
        }
        match self.results.put(Response::new(command.id(), reply)) {
            Ok(()) => report.replies += 1,
            Err(e) => tracing::warn!("Dropping reply: {}", e),
        }
    }

    fn handshake(&self) -> TargetResult<Option<Value>> {
        let info = RendererInfo {
            protocol: PROTOCOL_VERSION,
            pid: std::process::id(),
            started_at: self.started_at,
        };
        serde_json::to_value(info)
            .map(Some)
            .map_err(|e| TargetError::Failed(e.to_string()))
    }
}
