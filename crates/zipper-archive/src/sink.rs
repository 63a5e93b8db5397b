//! Progress sink abstraction.

use zipper_entity::Progress;

/// Receives progress snapshots from the executor.
///
/// Delivery is best-effort; a sink that drops snapshots does not affect the
/// archive. Any `FnMut(Progress)` is a sink.
pub trait ProgressSink {
    /// Called once after each file has been written.
    fn report(&mut self, progress: Progress);
}

impl<F> ProgressSink for F
where
    F: FnMut(Progress),
{
    fn report(&mut self, progress: Progress) {
        self(progress)
    }
}
