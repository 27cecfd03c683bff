//! 60 Hz tick source for the delay/sound timers and the vblank budget.
//!
//! The host reports elapsed wall-clock time in milliseconds at whatever
//! rate it likes. Time is accumulated in fixed-point sub-tick units
//! rather than floats, so many small deltas add up to exactly the same
//! number of ticks as one large delta covering the same span.
//!
//! One tick (1/60 s) is `UNITS_PER_TICK` units, which makes one
//! millisecond exactly 60,000 units.

pub const TICKS_PER_SECOND: u32 = 60;

/// Length of one tick in milliseconds, for hosts that step a frame at a time.
pub const FRAME_MS: f32 = 1000.0 / TICKS_PER_SECOND as f32;

const UNITS_PER_TICK: u64 = 1_000_000;
const UNITS_PER_MS: f64 = (UNITS_PER_TICK * TICKS_PER_SECOND as u64) as f64 / 1000.0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameClock {
    /// Leftover time below one tick, in sub-tick units.
    pending: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.pending = 0;
    }

    /// Account for `delta_ms` of elapsed time and return how many whole
    /// ticks completed. Negative and NaN deltas count as no time.
    pub fn advance(&mut self, delta_ms: f32) -> u32 {
        let units = (delta_ms as f64 * UNITS_PER_MS).round();
        // Float-to-int casts saturate; NaN becomes 0.
        let units = if units > 0.0 { units as u64 } else { 0 };

        self.pending = self.pending.saturating_add(units);
        let ticks = self.pending / UNITS_PER_TICK;
        self.pending %= UNITS_PER_TICK;
        ticks.min(u32::MAX as u64) as u32
    }

    /// Fraction of the next tick already elapsed, in milliseconds.
    pub fn pending_ms(&self) -> f32 {
        (self.pending as f64 / UNITS_PER_MS) as f32
    }
}
