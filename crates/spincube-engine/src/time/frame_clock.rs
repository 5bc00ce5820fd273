use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time elapsed since the previous frame tick, in seconds.
    pub dt: f32,

    /// Time elapsed since the clock was created. Drives animation.
    pub elapsed: Duration,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Frame clock producing `FrameTime` snapshots.
///
/// One clock per render loop. `elapsed` is measured from creation and is never
/// clamped; only `dt` is clamped, to avoid pathological values after a debugger
/// pause or a minimized window.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    /// Creates a new clock starting now with default clamps.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Creates a clock whose zero point is `start`.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            start,
            last: start,
            frame_index: 0,
            dt_min: Duration::from_micros(100),
            dt_max: Duration::from_millis(250),
        }
    }

    /// Creates a clock with custom delta-time clamps.
    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            dt_min,
            dt_max,
            ..Self::new()
        }
    }

    /// Moves the zero point to now and restarts the frame counter.
    pub fn restart(&mut self) {
        *self = Self {
            dt_min: self.dt_min,
            dt_max: self.dt_max,
            ..Self::new()
        };
    }

    /// Advances the clock and returns a new `FrameTime`.
    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// Advances the clock to `now`.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);

        self.last = now;

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            elapsed: now.saturating_duration_since(self.start),
            now,
            frame_index: self.frame_index,
        };

        self.frame_index = self.frame_index.wrapping_add(1);

        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_tracks_time_since_start() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        let ft = clock.tick_at(start + Duration::from_millis(1000));
        assert_eq!(ft.elapsed, Duration::from_millis(1000));
        assert_eq!(ft.frame_index, 0);
    }

    #[test]
    fn dt_is_clamped_but_elapsed_is_not() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        let ft = clock.tick_at(start + Duration::from_secs(5));
        assert_eq!(ft.dt, 0.25);
        assert_eq!(ft.elapsed, Duration::from_secs(5));

        let ft = clock.tick_at(start + Duration::from_secs(5));
        assert!((ft.dt - 0.0001).abs() < 1e-7);
    }

    #[test]
    fn frame_index_increments_per_tick() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        let a = clock.tick_at(start + Duration::from_millis(16));
        let b = clock.tick_at(start + Duration::from_millis(32));
        assert_eq!((a.frame_index, b.frame_index), (0, 1));
        assert!((b.dt - 0.016).abs() < 1e-6);
    }

    #[test]
    fn restart_zeroes_elapsed_and_keeps_clamps() {
        let mut clock = FrameClock::with_clamps(Duration::from_millis(1), Duration::from_millis(50));
        clock.tick();
        clock.restart();

        let ft = clock.tick_at(Instant::now() + Duration::from_secs(1));
        assert_eq!(ft.frame_index, 0);
        assert!(ft.elapsed >= Duration::from_secs(1));
        assert!(ft.elapsed < Duration::from_secs(2));
        assert_eq!(ft.dt, 0.05);
    }
}
