use super::FrameTime;

/// Hook invoked once per tick, after the command queue has been drained.
///
/// Supplied by whatever owns the window; it repaints from the target's
/// current state.
pub trait FramePresenter<T: ?Sized> {
    fn present_frame(&mut self, target: &T, frame: &FrameTime);
}

impl<T: ?Sized, F> FramePresenter<T> for F
where
    F: FnMut(&T, &FrameTime),
{
    fn present_frame(&mut self, target: &T, frame: &FrameTime) {
        self(target, frame)
    }
}

/// Presenter for renderers without a window
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessPresenter;

impl<T: ?Sized> FramePresenter<T> for HeadlessPresenter {
    fn present_frame(&mut self, _target: &T, frame: &FrameTime) {
        tracing::trace!(frame = frame.frame_index, dt = ?frame.dt, elapsed = ?frame.elapsed, "Presented frame");
    }
}
