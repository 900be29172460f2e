//! Frame-callback driven render loop.
//!
//! The host (a display refresh, a tokio interval, a test) asks for a
//! [`FrameRequest`] and later fires it. Requests carry the loop generation
//! they were issued under, so a callback that arrives after `stop()` or
//! after a restart does nothing.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    Stopped,
    Running,
}

/// Ticket for one scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest {
    generation: u64,
    sequence: u64,
}

impl FrameRequest {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No live stream.
    NotStreaming,
    /// The stream has not produced a decodable frame yet.
    FrameNotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum TickOutcome {
    Drawn,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LoopStats {
    pub ticks: u64,
    pub drawn: u64,
    pub skipped: u64,
    pub stale: u64,
}

pub type RenderFn<T> = Box<dyn FnMut(&mut T) -> TickOutcome + Send>;

/// At most one render callback chain is live at any time.
pub struct RenderLoop<T> {
    render_fn: Option<RenderFn<T>>,
    generation: u64,
    sequence: u64,
    stats: LoopStats,
}

impl<T> RenderLoop<T> {
    pub fn new() -> Self {
        Self {
            render_fn: None,
            generation: 0,
            sequence: 0,
            stats: LoopStats::default(),
        }
    }

    /// Install `render_fn` and start. A second start while running is a
    /// no-op and the new function is dropped. Returns whether it started.
    pub fn start(&mut self, render_fn: RenderFn<T>) -> bool {
        if self.render_fn.is_some() {
            log::debug!("Render loop already running (generation {})", self.generation);
            return false;
        }
        self.generation += 1;
        self.render_fn = Some(render_fn);
        log::debug!("Render loop started (generation {})", self.generation);
        true
    }

    /// Stop and invalidate every outstanding request. Idempotent.
    pub fn stop(&mut self) -> bool {
        if self.render_fn.take().is_none() {
            return false;
        }
        // Outstanding requests belong to the old generation from here on
        self.generation += 1;
        log::debug!("Render loop stopped after {} ticks", self.stats.ticks);
        true
    }

    pub fn state(&self) -> LoopState {
        if self.render_fn.is_some() {
            LoopState::Running
        } else {
            LoopState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.render_fn.is_some()
    }

    /// Schedule the next callback, or `None` when stopped.
    pub fn next_request(&mut self) -> Option<FrameRequest> {
        if self.render_fn.is_none() {
            return None;
        }
        self.sequence += 1;
        Some(FrameRequest {
            generation: self.generation,
            sequence: self.sequence,
        })
    }

    /// Run the render function for `request`. Stale requests return `None`.
    pub fn fire(&mut self, request: FrameRequest, target: &mut T) -> Option<TickOutcome> {
        let render_fn = match self.render_fn.as_mut() {
            Some(f) if request.generation == self.generation => f,
            _ => {
                self.stats.stale += 1;
                log::trace!("Dropping stale frame request {}", request.sequence);
                return None;
            }
        };

        let outcome = render_fn(target);
        self.stats.ticks += 1;
        match outcome {
            TickOutcome::Drawn => self.stats.drawn += 1,
            TickOutcome::Skipped(_) => self.stats.skipped += 1,
        }
        Some(outcome)
    }

    /// Request and immediately fire one frame.
    pub fn pump(&mut self, target: &mut T) -> Option<TickOutcome> {
        let request = self.next_request()?;
        self.fire(request, target)
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }
}

impl<T> Default for RenderLoop<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for RenderLoop<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("state", &self.state())
            .field("generation", &self.generation)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting() -> RenderFn<u32> {
        Box::new(|draws: &mut u32| {
            *draws += 1;
            TickOutcome::Drawn
        })
    }

    #[test]
    fn test_double_start_draws_once_per_tick() {
        let mut lp = RenderLoop::new();
        let mut draws = 0u32;
        assert!(lp.start(counting()));
        assert!(!lp.start(counting()));

        for _ in 0..5 {
            lp.pump(&mut draws);
        }
        assert_eq!(draws, 5);
        assert_eq!(lp.stats().drawn, 5);
    }

    #[test]
    fn test_stop_invalidates_pending_request() {
        let mut lp = RenderLoop::new();
        let mut draws = 0u32;
        lp.start(counting());
        let pending = lp.next_request().unwrap();

        assert!(lp.stop());
        assert!(!lp.stop());
        assert_eq!(lp.fire(pending, &mut draws), None);
        assert_eq!(draws, 0);
        assert_eq!(lp.stats().stale, 1);
        assert_eq!(lp.next_request(), None);
    }

    #[test]
    fn test_restart_ignores_old_generation() {
        let mut lp = RenderLoop::new();
        let mut draws = 0u32;
        lp.start(counting());
        let old = lp.next_request().unwrap();
        lp.stop();
        lp.start(counting());

        assert_eq!(lp.fire(old, &mut draws), None);
        assert_eq!(lp.pump(&mut draws), Some(TickOutcome::Drawn));
        assert_eq!(draws, 1);
        assert_eq!(lp.state(), LoopState::Running);
    }

    #[test]
    fn test_skips_are_counted() {
        let mut lp: RenderLoop<u32> = RenderLoop::new();
        lp.start(Box::new(|_: &mut u32| {
            TickOutcome::Skipped(SkipReason::FrameNotReady)
        }));
        let mut unused = 0;
        lp.pump(&mut unused);
        lp.pump(&mut unused);
        let stats = lp.stats();
        assert_eq!((stats.ticks, stats.skipped, stats.drawn), (2, 2, 0));
    }
}
