/// Longest frame the accumulator will absorb. Anything beyond is dropped so a
/// stalled process does not spiral into catch-up ticks.
const MAX_FRAME_SECS: f32 = 0.25;

/// Converts variable frame time into a count of fixed physics ticks.
pub struct FixedTimestep {
    tick_rate: u32,
    dt: f32,
    accumulator: f32,
}

impl FixedTimestep {
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            tick_rate,
            dt: 1.0 / tick_rate as f32,
            accumulator: 0.0,
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Adds `delta` seconds and returns how many whole ticks are now due.
    /// The remainder carries over to the next frame.
    pub fn advance(&mut self, delta: f32) -> u32 {
        self.accumulator += delta.clamp(0.0, MAX_FRAME_SECS);
        let due = (self.accumulator / self.dt).floor();
        self.accumulator -= due * self.dt;
        // Float error can leave a hair under zero.
        self.accumulator = self.accumulator.max(0.0);
        due as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_ticks_per_thirtieth_at_sixty() {
        let mut ts = FixedTimestep::new(60);
        assert_eq!(ts.advance(1.0 / 30.0 + 1e-4), 2);
        assert_eq!(ts.advance(0.0), 0);
    }

    #[test]
    fn remainder_carries_over() {
        let mut ts = FixedTimestep::new(10);
        assert_eq!(ts.advance(0.06), 0);
        assert_eq!(ts.advance(0.06), 1);
        assert_eq!(ts.advance(0.03), 0);
    }

    #[test]
    fn long_frames_are_capped() {
        let mut ts = FixedTimestep::new(4);
        assert_eq!(ts.advance(5.0), 1);
        assert_eq!(ts.advance(0.0), 0);
    }

    #[test]
    fn negative_delta_is_ignored() {
        let mut ts = FixedTimestep::new(60);
        assert_eq!(ts.advance(-1.0), 0);
        assert_eq!(ts.tick_rate(), 60);
    }

    #[test]
    fn zero_rate_is_clamped() {
        let ts = FixedTimestep::new(0);
        assert_eq!(ts.tick_rate(), 1);
        assert_eq!(ts.dt(), 1.0);
    }
}
