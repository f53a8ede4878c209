use std::cell::Cell;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Ticks per second of [`HrTime`].
pub const HRTIME_RESOLUTION: u64 = 1_000_000_000;

/// A point on the monotonic high-resolution timeline, in nanosecond ticks.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HrTime(pub u64);

impl HrTime {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Elapsed time since `earlier`, or zero if `earlier` is in the future.
    #[inline]
    pub fn saturating_since(self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for HrTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        Self(self.0.saturating_add(duration_ticks(rhs)))
    }
}

impl AddAssign<Duration> for HrTime {
    #[inline]
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub<Duration> for HrTime {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Duration) -> Self {
        Self(self.0.saturating_sub(duration_ticks(rhs)))
    }
}

impl Sub for HrTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Self) -> Duration {
        self.saturating_since(rhs)
    }
}

impl fmt::Debug for HrTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HrTime({})", self.0)
    }
}

#[inline]
fn duration_ticks(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Duration of one frame at `fps` frames per second.
#[inline]
pub fn frame_duration(fps: u32) -> Duration {
    assert!(fps > 0, "target fps must be positive");
    Duration::from_nanos(HRTIME_RESOLUTION / u64::from(fps))
}

/// Monotonic time source used by the scheduler.
pub trait TimeSource {
    fn now(&self) -> HrTime;

    /// Block the calling thread for roughly `d`.
    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Wall-clock source backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    #[inline]
    fn now(&self) -> HrTime {
        HrTime(duration_ticks(self.origin.elapsed()))
    }
}

/// Deterministic clock for tests and replays.
///
/// Time only moves when advanced explicitly, when slept on, or by a fixed
/// step on every read (which keeps spin-waits finite). Clones share time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
    step_per_read: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `step` on every `now()` call.
    pub fn with_step_per_read(step: Duration) -> Self {
        let clock = Self::new();
        clock.step_per_read.set(duration_ticks(step));
        clock
    }

    #[inline]
    pub fn advance(&self, d: Duration) {
        self.now.set(self.now.get().saturating_add(duration_ticks(d)));
    }

    #[inline]
    pub fn set(&self, t: HrTime) {
        self.now.set(t.0);
    }

    #[inline]
    pub fn peek(&self) -> HrTime {
        HrTime(self.now.get())
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> HrTime {
        let t = self.now.get();
        self.now.set(t.saturating_add(self.step_per_read.get()));
        HrTime(t)
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}
