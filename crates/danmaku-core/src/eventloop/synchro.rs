use std::time::Duration;

use log::{debug, info};

use super::{EventLoop, Executor, FrameTimes, LogicAction};
use crate::config::{EngineConfig, FrameLimiterConfig};
use crate::error::EngineResult;
use crate::render::Renderer;
use crate::time::{HrTime, TimeSource};

/// Longest single OS sleep while waiting for the next frame.
const SLEEP_QUANTUM: Duration = Duration::from_millis(1);

/// Executor that owns the thread and paces frames itself.
///
/// Each superframe runs logic (with catch-up), renders on the frameskip
/// cadence, then sleeps and finally spins until the next frame is due.
#[derive(Debug, Clone)]
pub struct SyncExecutor {
    limiter: FrameLimiterConfig,
}

impl SyncExecutor {
    pub fn new(limiter: FrameLimiterConfig) -> Self {
        Self { limiter }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg.framelimiter.clone())
    }

    #[inline]
    pub fn limiter(&self) -> &FrameLimiterConfig {
        &self.limiter
    }

    fn max_sleep(&self, target: Duration) -> Duration {
        if self.limiter.sleep > 0 {
            target / self.limiter.sleep
        } else {
            Duration::ZERO
        }
    }

    /// Sleep while more than `max_sleep` remains, then spin.
    fn wait_until(clock: &dyn TimeSource, next: HrTime, max_sleep: Duration) {
        if !max_sleep.is_zero() {
            loop {
                let now = clock.now();
                if now >= next {
                    return;
                }
                let remaining = next - now;
                if remaining <= max_sleep {
                    break;
                }
                clock.sleep((remaining - max_sleep).min(SLEEP_QUANTUM));
            }
        }

        while clock.now() < next {
            std::hint::spin_loop();
        }
    }
}

impl Default for SyncExecutor {
    fn default() -> Self {
        Self::new(FrameLimiterConfig::default())
    }
}

impl Executor for SyncExecutor {
    fn run(&mut self, ev: &mut EventLoop, r: &mut Renderer) -> EngineResult<()> {
        let Some(first) = ev.stack.top() else {
            return Ok(());
        };

        let target = ev.stack.target(first);
        let start = ev.now();
        ev.frame_times = FrameTimes {
            target,
            start,
            next: start + target,
        };

        let compensate = self.limiter.compensate;
        let uncapped = self.limiter.logic_only && !ev.settings.replay_verification;
        let mut frame_num: u32 = 0;

        info!(
            "eventloop: sync executor start (sleep={} compensate={compensate} uncapped={uncapped})",
            self.limiter.sleep
        );

        'main: while let Some(mut frame) = ev.stack.top() {
            ev.frame_times.start = ev.now();

            'superframe: loop {
                let now = ev.now();
                ev.telemetry.busy.mark(now);
                ev.frame_times.target = ev.stack.target(frame);
                frame_num = frame_num.wrapping_add(1);

                if uncapped {
                    let mut logic_frames = 0u32;

                    while ev.frame_times.next < ev.frame_times.start {
                        match ev.handle_logic(frame) {
                            (LogicAction::Stop, _) | (_, None) => continue 'main,
                            (_, Some(top)) => frame = top,
                        }

                        logic_frames += 1;
                        let total = ev.now() - ev.frame_times.start;

                        if total > ev.frame_times.target {
                            ev.frame_times.next = ev.frame_times.start;
                            debug!("eventloop: logic took too long ({total:?}), giving up");
                        } else {
                            ev.frame_times.next += ev.frame_times.target;
                        }
                    }

                    if logic_frames > 1 {
                        debug!(
                            "eventloop: dropped {} logic frame{} in superframe #{frame_num}",
                            logic_frames - 1,
                            if logic_frames > 2 { "s" } else { "" },
                        );
                    }
                } else {
                    match ev.handle_logic(frame) {
                        (LogicAction::Stop, _) | (_, None) => continue 'main,
                        (_, Some(top)) => frame = top,
                    }
                }

                let render_due = uncapped || frame_num % ev.effective_frameskip() == 0;
                if render_due && !ev.settings.replay_verification {
                    ev.run_render_frame(frame, r);
                }

                let now = ev.now();
                ev.telemetry.busy.update(now);
                ev.telemetry.maybe_log(now);

                if uncapped || ev.settings.frameskip_override > 0 || ev.settings.replay_verification
                {
                    continue 'main;
                }

                let target = ev.frame_times.target;
                ev.frame_times.next = ev.frame_times.start + target;

                if compensate {
                    let rt = ev.now();
                    if rt > ev.frame_times.next {
                        // Absorb at most one frame of overrun.
                        let over = (rt - ev.frame_times.next).min(target);
                        ev.frame_times.start = rt - over;
                        continue 'superframe;
                    }
                }

                Self::wait_until(ev.clock(), ev.frame_times.next, self.max_sleep(target));
                continue 'main;
            }
        }

        info!("eventloop: sync executor done after {frame_num} superframes");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventloop::{LogicCtx, LoopHandler, LoopSettings, RenderAction};
    use crate::render::NullBackend;
    use crate::signals::QuitFlag;
    use crate::time::{frame_duration, ManualClock};
    use std::cell::RefCell;
    use std::rc::Rc;

    const READ_STEP: Duration = Duration::from_micros(50);

    /// Stops after `steps` logic steps; records when each step ran and how
    /// many renders preceded it.
    struct Stepper {
        clock: ManualClock,
        steps: u32,
        stalls: Vec<(u32, Duration)>,
        times: Rc<RefCell<Vec<HrTime>>>,
        renders: Rc<RefCell<u32>>,
        renders_before: Rc<RefCell<Vec<u32>>>,
    }

    impl LoopHandler for Stepper {
        fn logic(&mut self, _ctx: &mut LogicCtx<'_>) -> LogicAction {
            let mut times = self.times.borrow_mut();
            times.push(self.clock.peek());
            self.renders_before.borrow_mut().push(*self.renders.borrow());
            let n = times.len() as u32;

            for &(at, d) in &self.stalls {
                if n == at {
                    self.clock.advance(d);
                }
            }

            if n >= self.steps {
                LogicAction::Stop
            } else {
                LogicAction::Wait
            }
        }

        fn render(&mut self, _r: &mut Renderer) -> RenderAction {
            *self.renders.borrow_mut() += 1;
            RenderAction::Swap
        }
    }

    struct Rig {
        clock: ManualClock,
        ev: EventLoop,
        r: Renderer,
        times: Rc<RefCell<Vec<HrTime>>>,
        renders: Rc<RefCell<u32>>,
        renders_before: Rc<RefCell<Vec<u32>>>,
    }

    fn rig(settings: LoopSettings, steps: u32, stalls: &[(u32, Duration)]) -> Rig {
        let clock = ManualClock::with_step_per_read(READ_STEP);
        let mut ev = EventLoop::new(settings, 60, Box::new(clock.clone()), QuitFlag::new());
        let times = Rc::new(RefCell::new(Vec::new()));
        let renders = Rc::new(RefCell::new(0));
        let renders_before = Rc::new(RefCell::new(Vec::new()));
        ev.enter(
            Box::new(Stepper {
                clock: clock.clone(),
                steps,
                stalls: stalls.to_vec(),
                times: times.clone(),
                renders: renders.clone(),
                renders_before: renders_before.clone(),
            }),
            60,
        );
        Rig {
            clock,
            ev,
            r: Renderer::new(Box::new(NullBackend::new())),
            times,
            renders,
            renders_before,
        }
    }

    fn limiter(compensate: bool, logic_only: bool) -> SyncExecutor {
        SyncExecutor::new(FrameLimiterConfig {
            sleep: 3,
            compensate,
            logic_only,
        })
    }

    #[test]
    fn empty_stack_returns_immediately() {
        let clock = ManualClock::new();
        let mut ev = EventLoop::new(
            LoopSettings::default(),
            60,
            Box::new(clock),
            QuitFlag::new(),
        );
        let mut r = Renderer::new(Box::new(NullBackend::new()));
        SyncExecutor::default().run(&mut ev, &mut r).unwrap();
        assert_eq!(r.frames_presented(), 0);
    }

    #[test]
    fn capped_loop_paces_logic_at_target_rate() {
        let mut rig = rig(LoopSettings::default(), 10, &[]);
        limiter(true, false).run(&mut rig.ev, &mut rig.r).unwrap();

        let target = frame_duration(60);
        let times = rig.times.borrow();
        assert_eq!(times.len(), 10);
        for pair in times.windows(2) {
            let dt = pair[1] - pair[0];
            assert!(dt >= target, "step spacing {dt:?} below target");
            assert!(dt < target + Duration::from_millis(1), "step spacing {dt:?} too long");
        }

        // The stopping step is not rendered.
        assert_eq!(*rig.renders.borrow(), 9);
        assert_eq!(rig.r.frames_presented(), 9);
        assert!(rig.ev.stack().is_empty());
    }

    #[test]
    fn frameskip_renders_every_nth_superframe() {
        let settings = LoopSettings {
            frameskip: 3,
            ..LoopSettings::default()
        };
        let mut rig = rig(settings, 10, &[]);
        limiter(true, false).run(&mut rig.ev, &mut rig.r).unwrap();
        assert_eq!(*rig.renders.borrow(), 3);
    }

    #[test]
    fn replay_verification_neither_renders_nor_waits() {
        let settings = LoopSettings {
            replay_verification: true,
            ..LoopSettings::default()
        };
        let mut rig = rig(settings, 10, &[]);
        // logic_only is ignored during verification.
        limiter(true, true).run(&mut rig.ev, &mut rig.r).unwrap();

        assert_eq!(*rig.renders.borrow(), 0);
        assert_eq!(rig.times.borrow().len(), 10);
        assert!(rig.clock.peek() - HrTime::ZERO < frame_duration(60));
    }

    #[test]
    fn frameskip_override_disables_limiter() {
        let settings = LoopSettings {
            frameskip_override: 2,
            ..LoopSettings::default()
        };
        let mut rig = rig(settings, 10, &[]);
        limiter(true, false).run(&mut rig.ev, &mut rig.r).unwrap();

        assert_eq!(*rig.renders.borrow(), 4);
        assert!(rig.clock.peek() - HrTime::ZERO < frame_duration(60));
    }

    #[test]
    fn compensation_catches_up_one_frame_after_a_stall() {
        let target = frame_duration(60);

        let mut with = rig(LoopSettings::default(), 4, &[(1, target * 2)]);
        limiter(true, false).run(&mut with.ev, &mut with.r).unwrap();
        let t = with.times.borrow();
        // Step 3 follows the stall almost at once.
        assert!(t[2] - t[0] < target * 2 + target / 2, "{:?}", t[2] - t[0]);

        let mut without = rig(LoopSettings::default(), 4, &[(1, target * 2)]);
        limiter(false, false).run(&mut without.ev, &mut without.r).unwrap();
        let t = without.times.borrow();
        assert!(t[2] - t[0] >= target * 3, "{:?}", t[2] - t[0]);
    }

    #[test]
    fn uncapped_renders_every_superframe_and_steps_logic_when_due() {
        let mut rig = rig(LoopSettings::default(), 5, &[]);
        limiter(true, true).run(&mut rig.ev, &mut rig.r).unwrap();

        assert_eq!(rig.times.borrow().len(), 5);
        assert!(*rig.renders.borrow() > 5);
        assert_eq!(rig.r.frames_presented(), u64::from(*rig.renders.borrow()));
    }

    #[test]
    fn uncapped_catch_up_gives_up_after_a_slow_step() {
        let target = frame_duration(60);
        // Step 1 leaves the loop five frames behind; step 3 is slow again
        // in the middle of the catch-up burst that follows.
        let mut rig = rig(
            LoopSettings::default(),
            5,
            &[(1, target * 5), (3, target * 5)],
        );
        limiter(true, true).run(&mut rig.ev, &mut rig.r).unwrap();

        let before = rig.renders_before.borrow();
        assert_eq!(before.len(), 5);
        // Steps 2 and 3 catch up within one superframe.
        assert_eq!(before[1], before[2]);
        // After the slow step 3 the burst ends and a render comes first.
        assert!(before[3] > before[2], "{before:?}");
    }

    #[test]
    fn sleep_zero_spins_the_whole_wait() {
        let mut rig = rig(LoopSettings::default(), 3, &[]);
        let mut exec = SyncExecutor::new(FrameLimiterConfig {
            sleep: 0,
            compensate: true,
            logic_only: false,
        });
        exec.run(&mut rig.ev, &mut rig.r).unwrap();
        let t = rig.times.borrow();
        assert!(t[1] - t[0] >= frame_duration(60));
    }
}
