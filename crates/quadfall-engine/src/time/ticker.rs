/// Fixed-timestep accumulator.
///
/// Decouples the simulation rate from the render rate: the runtime feeds each
/// frame's delta time into [`advance`], runs the returned number of whole
/// ticks, and may use [`partial_tick`] to interpolate rendering between the
/// last two ticks.
///
/// Ticks per frame are capped so a long stall produces a burst of bounded
/// length instead of a catch-up spiral.
///
/// [`advance`]: Ticker::advance
/// [`partial_tick`]: Ticker::partial_tick
#[derive(Debug, Clone)]
pub struct Ticker {
    tick_rate: f32,
    accumulated: f32,
    max_ticks_per_frame: u32,
}

impl Ticker {
    /// Creates a ticker running at `ticks_per_second`.
    pub fn new(ticks_per_second: f32) -> Self {
        debug_assert!(ticks_per_second > 0.0);
        Self {
            tick_rate: ticks_per_second,
            accumulated: 0.0,
            max_ticks_per_frame: 10,
        }
    }

    /// Feeds `dt` seconds into the accumulator and returns the number of
    /// whole ticks now due.
    pub fn advance(&mut self, dt: f32) -> u32 {
        self.accumulated += dt.max(0.0) * self.tick_rate;

        let mut due = self.accumulated.floor() as u32;
        if due > self.max_ticks_per_frame {
            // Drop the excess instead of spiraling.
            due = self.max_ticks_per_frame;
            self.accumulated = 0.0;
        } else {
            self.accumulated -= due as f32;
        }

        due
    }

    /// Fraction of the next tick already elapsed, in `[0, 1)`.
    pub fn partial_tick(&self) -> f32 {
        self.accumulated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_whole_ticks() {
        let mut ticker = Ticker::new(20.0);
        // 0.1s at 20 tps is exactly 2 ticks.
        assert_eq!(ticker.advance(0.1), 2);
        assert!(ticker.partial_tick() < 1e-5);
    }

    #[test]
    fn carries_fractional_remainder() {
        let mut ticker = Ticker::new(20.0);
        assert_eq!(ticker.advance(0.03), 0); // 0.6 ticks
        assert_eq!(ticker.advance(0.03), 1); // 1.2 ticks total
        assert!((ticker.partial_tick() - 0.2).abs() < 1e-4);
    }

    #[test]
    fn caps_catch_up_bursts() {
        let mut ticker = Ticker::new(20.0);
        // A 5-second stall would owe 100 ticks; the cap bounds the burst.
        assert_eq!(ticker.advance(5.0), 10);
        assert_eq!(ticker.advance(0.0), 0);
    }

    #[test]
    fn negative_dt_is_ignored() {
        let mut ticker = Ticker::new(20.0);
        assert_eq!(ticker.advance(-1.0), 0);
        assert_eq!(ticker.partial_tick(), 0.0);
    }
}
