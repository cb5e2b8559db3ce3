use std::time::{Duration, Instant};

/// Delay that lets layout settle before jumping to the tail.
pub const DEFAULT_SCROLL_SETTLE: Duration = Duration::from_millis(200);

/// Scrollable transcript surface provided by the presentation layer.
pub trait Viewport {
    /// Current vertical offset from the top.
    fn offset(&self) -> f32;
    /// Largest reachable offset for the current content height.
    fn max_offset(&self) -> f32;
    fn set_offset(&mut self, offset: f32);
}

/// Schedules deferred scroll-to-bottom requests.
///
/// Requests made while one is pending keep the earlier deadline, so a steady
/// token stream still scrolls once per settle interval.
#[derive(Debug, Clone)]
pub struct ScrollManager {
    settle: Duration,
    due_at: Option<Instant>,
}

impl ScrollManager {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            due_at: None,
        }
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }

    pub fn is_pending(&self) -> bool {
        self.due_at.is_some()
    }

    pub fn due_at(&self) -> Option<Instant> {
        self.due_at
    }

    pub fn request_scroll_to_bottom(&mut self, now: Instant) {
        if self.due_at.is_none() {
            self.due_at = Some(now + self.settle);
        }
    }

    pub fn cancel(&mut self) {
        self.due_at = None;
    }

    /// Performs the pending scroll once its deadline has passed.
    pub fn apply_pending_scroll(&mut self, now: Instant, viewport: &mut dyn Viewport) -> bool {
        match self.due_at {
            Some(due_at) if due_at <= now => {
                self.due_at = None;
                scroll_to_bottom(viewport);
                true
            }
            Some(_) | None => false,
        }
    }
}

impl Default for ScrollManager {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLL_SETTLE)
    }
}

pub fn scroll_to_bottom(viewport: &mut dyn Viewport) {
    let max_offset = viewport.max_offset().max(0.0);
    viewport.set_offset(max_offset);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeViewport {
        offset: f32,
        max_offset: f32,
    }

    impl Viewport for FakeViewport {
        fn offset(&self) -> f32 {
            self.offset
        }

        fn max_offset(&self) -> f32 {
            self.max_offset
        }

        fn set_offset(&mut self, offset: f32) {
            self.offset = offset;
        }
    }

    #[test]
    fn scroll_waits_for_settle_delay() {
        let start = Instant::now();
        let mut manager = ScrollManager::new(Duration::from_millis(200));
        let mut viewport = FakeViewport {
            offset: 0.0,
            max_offset: 480.0,
        };

        manager.request_scroll_to_bottom(start);
        assert!(!manager.apply_pending_scroll(start + Duration::from_millis(100), &mut viewport));
        assert_eq!(viewport.offset(), 0.0);

        assert!(manager.apply_pending_scroll(start + Duration::from_millis(200), &mut viewport));
        assert_eq!(viewport.offset(), 480.0);
        assert!(!manager.is_pending());
    }

    #[test]
    fn repeated_requests_keep_first_deadline() {
        let start = Instant::now();
        let mut manager = ScrollManager::new(Duration::from_millis(200));
        manager.request_scroll_to_bottom(start);
        manager.request_scroll_to_bottom(start + Duration::from_millis(150));
        assert_eq!(manager.due_at(), Some(start + Duration::from_millis(200)));
    }

    #[test]
    fn empty_content_scrolls_to_zero() {
        let mut viewport = FakeViewport {
            offset: 12.0,
            max_offset: -3.0,
        };
        scroll_to_bottom(&mut viewport);
        assert_eq!(viewport.offset(), 0.0);
    }
}
