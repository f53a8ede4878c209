use std::time::Duration;

use log::{info, warn};

use crate::time::{frame_duration, HrTime, HRTIME_RESOLUTION};

/// Number of frames averaged by an [`FpsCounter`].
pub const FPS_WINDOW: usize = 120;

/// Rolling average of per-frame durations.
///
/// Starts out filled with the nominal frame time, so early readings are
/// close to the target rather than wildly off.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    frametimes: [Duration; FPS_WINDOW],
    cursor: usize,
    sum: Duration,

    fps: f64,
    frametime: Duration,
    last_update_time: HrTime,
    updates: u64,
}

impl FpsCounter {
    pub fn new(nominal_fps: u32, now: HrTime) -> Self {
        let mut c = Self {
            frametimes: [Duration::ZERO; FPS_WINDOW],
            cursor: 0,
            sum: Duration::ZERO,
            fps: 0.0,
            frametime: Duration::ZERO,
            last_update_time: now,
            updates: 0,
        };
        c.reset(nominal_fps, now);
        c
    }

    pub fn reset(&mut self, nominal_fps: u32, now: HrTime) {
        let ft = frame_duration(nominal_fps.max(1));
        self.frametimes = [ft; FPS_WINDOW];
        self.cursor = 0;
        self.sum = ft * FPS_WINDOW as u32;
        self.frametime = ft;
        self.fps = HRTIME_RESOLUTION as f64 / ft.as_nanos() as f64;
        self.last_update_time = now;
        self.updates = 0;
    }

    /// Start measuring a new frame without recording one.
    #[inline]
    pub fn mark(&mut self, now: HrTime) {
        self.last_update_time = now;
    }

    /// Record a frame that ended at `now`.
    pub fn update(&mut self, now: HrTime) {
        let ft = now - self.last_update_time;

        self.sum -= self.frametimes[self.cursor];
        self.sum += ft;
        self.frametimes[self.cursor] = ft;
        self.cursor = (self.cursor + 1) % FPS_WINDOW;

        self.frametime = self.sum / FPS_WINDOW as u32;
        let avg_ns = self.sum.as_nanos() as f64 / FPS_WINDOW as f64;
        self.fps = if avg_ns > 0.0 {
            HRTIME_RESOLUTION as f64 / avg_ns
        } else {
            f64::INFINITY
        };

        self.last_update_time = now;
        self.updates += 1;
    }

    #[inline]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    #[inline]
    pub fn frametime(&self) -> Duration {
        self.frametime
    }

    #[inline]
    pub fn last_update_time(&self) -> HrTime {
        self.last_update_time
    }

    /// Frames recorded since the last reset.
    #[inline]
    pub fn updates(&self) -> u64 {
        self.updates
    }
}

/// Logic, render and busy counters, with an optional periodic report.
#[derive(Debug, Clone)]
pub struct Telemetry {
    pub logic: FpsCounter,
    pub render: FpsCounter,
    /// Time actually spent working per superframe (limiter wait excluded).
    pub busy: FpsCounter,

    log_enabled: bool,
    log_period: Duration,
    last_log: HrTime,
}

impl Telemetry {
    pub fn new(nominal_fps: u32, now: HrTime) -> Self {
        Self {
            logic: FpsCounter::new(nominal_fps, now),
            render: FpsCounter::new(nominal_fps, now),
            busy: FpsCounter::new(nominal_fps, now),
            log_enabled: false,
            log_period: Duration::from_secs(1),
            last_log: now,
        }
    }

    /// Periods below 0.25 s are raised to it; unrepresentable ones fall
    /// back to one second.
    pub fn configure_fps_logging(&mut self, enabled: bool, period_sec: f32) {
        self.log_enabled = enabled;
        self.log_period = Duration::try_from_secs_f32(period_sec.max(0.25)).unwrap_or_else(|_| {
            warn!("fps log period {period_sec} out of range, using 1s");
            Duration::from_secs(1)
        });
    }

    pub fn reset(&mut self, nominal_fps: u32, now: HrTime) {
        self.logic.reset(nominal_fps, now);
        self.render.reset(nominal_fps, now);
        self.busy.reset(nominal_fps, now);
        self.last_log = now;
    }

    /// Emit the fps report if the logging period elapsed.
    pub fn maybe_log(&mut self, now: HrTime) {
        if !self.log_enabled || now - self.last_log < self.log_period {
            return;
        }
        self.last_log = now;

        info!(
            "fps logic={:.1} render={:.1} busy_ms={:.2}",
            self.logic.fps(),
            self.render.fps(),
            self.busy.frametime().as_secs_f64() * 1000.0,
        );
    }
}
