//! Bookkeeping for the per-surface frame callback cycle.

/// Tracks the single outstanding frame callback of a surface.
///
/// The compositor delivers at most one `done` per requested callback; a
/// callback that fires after it was replaced or stopped is stale and must be
/// ignored.
pub(crate) struct FrameLoop<C: PartialEq> {
    outstanding: Option<C>,
}

impl<C: PartialEq> FrameLoop<C> {
    pub(crate) fn new() -> Self {
        Self { outstanding: None }
    }

    /// Installs a new outstanding callback, returning the replaced one.
    pub(crate) fn arm(&mut self, callback: C) -> Option<C> {
        self.outstanding.replace(callback)
    }

    /// Clears the outstanding callback without arming a new one.
    pub(crate) fn stop(&mut self) -> Option<C> {
        self.outstanding.take()
    }

    /// Consumes a fired callback. Returns `true` when it was the outstanding
    /// one, `false` for stale callbacks.
    pub(crate) fn finish(&mut self, fired: &C) -> bool {
        if self.outstanding.as_ref() == Some(fired) {
            self.outstanding = None;
            true
        } else {
            false
        }
    }

    /// Whether a callback is currently outstanding.
    pub(crate) fn is_framing(&self) -> bool {
        self.outstanding.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::FrameLoop;

    #[test]
    fn arm_replaces_previous_callback() {
        let mut frames = FrameLoop::new();
        assert_eq!(frames.arm(1u32), None);
        assert_eq!(frames.arm(2), Some(1));
        assert!(frames.is_framing());
    }

    #[test]
    fn finish_accepts_only_the_outstanding_callback() {
        let mut frames = FrameLoop::new();
        frames.arm(7u32);
        assert!(!frames.finish(&3));
        assert!(frames.is_framing());
        assert!(frames.finish(&7));
        assert!(!frames.is_framing());
    }

    #[test]
    fn stop_without_outstanding_callback_is_a_noop() {
        let mut frames: FrameLoop<u32> = FrameLoop::new();
        assert_eq!(frames.stop(), None);
        assert!(!frames.is_framing());
    }

    #[test]
    fn stale_callback_after_stop_is_ignored() {
        let mut frames = FrameLoop::new();
        frames.arm(7u32);
        assert_eq!(frames.stop(), Some(7));
        assert!(!frames.finish(&7));
    }

    #[test]
    fn restart_ignores_the_callback_it_replaced() {
        let mut frames = FrameLoop::new();
        frames.arm(1u32);
        frames.arm(2);
        assert!(!frames.finish(&1));
        assert!(frames.finish(&2));
    }
}
