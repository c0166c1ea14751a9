use std::time::{Duration, Instant};

/// Longest step a single tick reports, however long the renderer stalled
pub const MAX_FRAME_STEP: Duration = Duration::from_millis(250);

/// Timing of one renderer tick
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameTime {
    /// Counts ticks from 0
    pub frame_index: u64,

    /// Time since the previous tick, capped at the clock's maximum step.
    /// Zero on the first tick.
    pub dt: Duration,

    /// Time since the first tick
    pub elapsed: Duration,
}

/// Produces one [`FrameTime`] per renderer tick
#[derive(Debug, Clone)]
pub struct FrameClock {
    started: Option<Instant>,
    last: Option<Instant>,
    frames: u64,
    max_step: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_max_step(MAX_FRAME_STEP)
    }

    pub fn with_max_step(max_step: Duration) -> Self {
        Self {
            started: None,
            last: None,
            frames: 0,
            max_step,
        }
    }

    /// Number of frames produced so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTime {
        let started = *self.started.get_or_insert(now);
        let dt = self
            .last
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last))
            .min(self.max_step);
        self.last = Some(now);

        let frame = FrameTime {
            frame_index: self.frames,
            dt,
            elapsed: now.saturating_duration_since(started),
        };
        self.frames += 1;
        frame
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
