//! Time management utilities

/// Fixed-step simulation clock for driving zone heartbeats
///
/// Hosts that already own a frame loop pass their own timestamps to
/// [`ZoneRegistry::heartbeat`](crate::ZoneRegistry::heartbeat); this clock
/// is for headless hosts and tests that need reproducible frame times.
#[derive(Debug, Clone)]
pub struct FrameClock {
    now: f64,
    delta_time: f64,
    frame_count: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(1.0 / 60.0)
    }
}

impl FrameClock {
    /// Create a clock at time zero stepping by `delta_time` seconds
    pub fn new(delta_time: f64) -> Self {
        Self {
            now: 0.0,
            delta_time,
            frame_count: 0,
        }
    }

    /// Advance one frame and return the new timestamp
    pub fn tick(&mut self) -> f64 {
        self.now += self.delta_time;
        self.frame_count += 1;
        self.now
    }

    /// Advance by an arbitrary amount (not counted as a frame)
    pub fn advance(&mut self, seconds: f64) -> f64 {
        self.now += seconds;
        self.now
    }

    /// Current timestamp in seconds
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Time step per frame in seconds
    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    /// Number of frames ticked so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tick_accumulates() {
        let mut clock = FrameClock::new(0.25);
        clock.tick();
        clock.tick();
        clock.advance(0.5);

        assert_relative_eq!(clock.now(), 1.0);
        assert_eq!(clock.frame_count(), 2);
    }
}
