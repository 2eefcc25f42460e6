use std::time::{Duration, Instant};

/// Wall-clock source for the render loop.
///
/// Elapsed time is measured from the last [`FrameClock::reset`], which the
/// host calls whenever the surface is (re)created.
#[derive(Clone, Debug)]
pub struct FrameClock {
    startup: Instant,
    last_update: Instant,
    delta: Duration,
    frame_index: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        let now = Instant::now();
        Self {
            startup: now,
            last_update: now,
            delta: Duration::ZERO,
            frame_index: 0,
        }
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Called by the host loop once per frame
    pub fn update(&mut self) {
        let now = Instant::now();
        self.delta = now.saturating_duration_since(self.last_update);
        self.last_update = now;
        self.frame_index = self.frame_index.wrapping_add(1);
    }

    /// Returns time in seconds since last frame (e.g., 0.016 for 60fps)
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Milliseconds since the clock started or was last reset.
    pub fn elapsed_millis(&self) -> u64 {
        u64::try_from(self.startup.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_counts_frames() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.frame_index(), 0);

        clock.update();
        clock.update();
        assert_eq!(clock.frame_index(), 2);
        assert!(clock.delta_seconds() >= 0.0);
    }

    #[test]
    fn elapsed_is_monotonic_and_reset_restarts() {
        let mut clock = FrameClock::new();
        let first = clock.elapsed_millis();
        std::thread::sleep(Duration::from_millis(5));
        let second = clock.elapsed_millis();
        assert!(second >= first + 5);

        clock.update();
        clock.reset();
        assert_eq!(clock.frame_index(), 0);
        assert!(clock.elapsed_millis() < second);
    }
}
