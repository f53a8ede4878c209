//! Nested loop frames and the executors that drive them.
//!
//! A loop frame pairs a logic step with a render step. Frames nest: a logic
//! step may [`enter`](LogicCtx::enter) a sub-loop (menu, dialog, cutscene)
//! which takes over until it leaves, after which the outer frame resumes.
//! Executors decide when logic and render steps run.

mod callback;
mod callchain;
mod stack;
mod synchro;

pub use callback::{CallbackExecutor, HostEvent, HostReply, RefreshHost};
pub use callchain::CallChain;
pub use stack::{FrameId, FrameStack, LeaveHook, FRAME_STACK_CAPACITY};
pub use synchro::SyncExecutor;

use std::time::Duration;

use crate::config::{EngineConfig, GameConfig};
use crate::error::EngineResult;
use crate::fps::Telemetry;
use crate::render::Renderer;
use crate::signals::QuitFlag;
use crate::time::{HrTime, MonotonicClock, TimeSource};

/// What a logic step wants the scheduler to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicAction {
    /// One step this superframe.
    Wait,
    /// Step again immediately, up to the skip-speed budget.
    Skip,
    /// Step again immediately, ignoring the skip-speed budget.
    SkipAlways,
    /// Leave this frame.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderAction {
    /// Present the frame.
    Swap,
    /// Skip presentation.
    Drop,
}

/// Scheduling state of the running executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTimes {
    pub target: Duration,
    pub start: HrTime,
    pub next: HrTime,
}

/// One loop frame's behaviour.
pub trait LoopHandler {
    fn logic(&mut self, ctx: &mut LogicCtx<'_>) -> LogicAction;

    fn render(&mut self, r: &mut Renderer) -> RenderAction;
}

/// What a logic step can see and do.
pub struct LogicCtx<'a> {
    stack: &'a mut FrameStack,
    telemetry: &'a Telemetry,
    quit: &'a QuitFlag,
    frame_times: FrameTimes,
    frame: FrameId,
}

impl LogicCtx<'_> {
    /// Start a nested loop frame. It runs before this frame's next step.
    #[inline]
    pub fn enter(&mut self, handler: Box<dyn LoopHandler>, target_fps: u32) -> FrameId {
        self.stack.enter(handler, target_fps)
    }

    /// Start a nested loop frame that runs `on_leave` once it is left.
    #[inline]
    pub fn enter_with_leave(
        &mut self,
        handler: Box<dyn LoopHandler>,
        target_fps: u32,
        on_leave: impl FnOnce(&mut FrameStack) + 'static,
    ) -> FrameId {
        self.stack.enter_with_leave(handler, target_fps, on_leave)
    }

    /// Leave the top frame. Its `on_leave` runs before this returns.
    #[inline]
    pub fn leave(&mut self) {
        self.stack.leave();
    }

    #[inline]
    pub fn stack(&mut self) -> &mut FrameStack {
        self.stack
    }

    /// The frame whose logic is running.
    #[inline]
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    #[inline]
    pub fn frame_times(&self) -> FrameTimes {
        self.frame_times
    }

    #[inline]
    pub fn telemetry(&self) -> &Telemetry {
        self.telemetry
    }

    #[inline]
    pub fn quit_requested(&self) -> bool {
        self.quit.is_requested()
    }

    #[inline]
    pub fn request_quit(&self) {
        self.quit.request();
    }
}

/// Runtime switches read by the loop every superframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Cap on consecutive `Skip` steps per superframe.
    pub skip_speed: u32,
    /// Configured render cadence divisor.
    pub frameskip: u32,
    /// Takes precedence over `frameskip` when > 0, and disables the limiter.
    pub frameskip_override: u32,
    pub replay_verification: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&GameConfig::default())
    }
}

impl LoopSettings {
    pub fn from_config(game: &GameConfig) -> Self {
        Self {
            skip_speed: game.skip_speed,
            frameskip: game.frameskip,
            frameskip_override: 0,
            replay_verification: false,
        }
    }

    #[inline]
    pub fn effective_frameskip(&self) -> u32 {
        let fs = if self.frameskip_override > 0 {
            self.frameskip_override
        } else {
            self.frameskip
        };
        fs.max(1)
    }
}

/// Drives the frame stack to completion.
pub trait Executor {
    fn run(&mut self, ev: &mut EventLoop, r: &mut Renderer) -> EngineResult<()>;
}

/// The loop frame stack together with its clock, counters and quit flag.
pub struct EventLoop {
    stack: FrameStack,
    telemetry: Telemetry,
    quit: QuitFlag,
    settings: LoopSettings,
    clock: Box<dyn TimeSource>,
    frame_times: FrameTimes,
}

impl EventLoop {
    pub fn new(
        settings: LoopSettings,
        nominal_fps: u32,
        clock: Box<dyn TimeSource>,
        quit: QuitFlag,
    ) -> Self {
        let now = clock.now();
        Self {
            stack: FrameStack::new(),
            telemetry: Telemetry::new(nominal_fps, now),
            quit,
            settings,
            clock,
            frame_times: FrameTimes {
                start: now,
                next: now,
                ..FrameTimes::default()
            },
        }
    }

    /// Wall-clock loop configured from `cfg`.
    pub fn from_config(cfg: &EngineConfig, quit: QuitFlag) -> Self {
        let mut ev = Self::new(
            LoopSettings::from_config(&cfg.game),
            cfg.game.target_fps,
            Box::new(MonotonicClock::new()),
            quit,
        );
        ev.telemetry
            .configure_fps_logging(cfg.telemetry.log_fps, cfg.telemetry.fps_log_period_sec);
        ev
    }

    #[inline]
    pub fn enter(&mut self, handler: Box<dyn LoopHandler>, target_fps: u32) -> FrameId {
        self.stack.enter(handler, target_fps)
    }

    #[inline]
    pub fn enter_with_leave(
        &mut self,
        handler: Box<dyn LoopHandler>,
        target_fps: u32,
        on_leave: impl FnOnce(&mut FrameStack) + 'static,
    ) -> FrameId {
        self.stack.enter_with_leave(handler, target_fps, on_leave)
    }

    #[inline]
    pub fn leave(&mut self) {
        self.stack.leave();
    }

    #[inline]
    pub fn stack(&self) -> &FrameStack {
        &self.stack
    }

    #[inline]
    pub fn stack_mut(&mut self) -> &mut FrameStack {
        &mut self.stack
    }

    #[inline]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    #[inline]
    pub fn telemetry_mut(&mut self) -> &mut Telemetry {
        &mut self.telemetry
    }

    #[inline]
    pub fn quit(&self) -> &QuitFlag {
        &self.quit
    }

    #[inline]
    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    #[inline]
    pub fn settings_mut(&mut self) -> &mut LoopSettings {
        &mut self.settings
    }

    #[inline]
    pub fn frame_times(&self) -> FrameTimes {
        self.frame_times
    }

    #[inline]
    pub fn effective_frameskip(&self) -> u32 {
        self.settings.effective_frameskip()
    }

    #[inline]
    pub fn now(&self) -> HrTime {
        self.clock.now()
    }

    #[inline]
    pub(crate) fn clock(&self) -> &dyn TimeSource {
        self.clock.as_ref()
    }

    /// Run one logic step of `frame`, which must be the top.
    ///
    /// A frame whose last step returned `Stop` is not stepped again.
    pub fn run_logic_frame(&mut self, frame: FrameId) -> LogicAction {
        assert!(
            self.stack.is_top(frame),
            "logic step for {frame:?} which is not the top frame"
        );

        if self.stack.last_action(frame) == Some(LogicAction::Stop) {
            return LogicAction::Stop;
        }

        let mut handler = self.stack.take_handler(frame);
        let mut action = {
            let mut ctx = LogicCtx {
                stack: &mut self.stack,
                telemetry: &self.telemetry,
                quit: &self.quit,
                frame_times: self.frame_times,
                frame,
            };
            handler.logic(&mut ctx)
        };

        // A frame that left itself is gone; its handler is dropped here.
        self.stack.restore_handler(frame, handler);

        if action != LogicAction::SkipAlways {
            let now = self.clock.now();
            self.telemetry.logic.update(now);
        }

        if self.quit.is_requested() {
            action = LogicAction::Stop;
        }

        self.stack.set_last_action(frame, action);
        action
    }

    /// Step logic with catch-up, starting at `frame`.
    ///
    /// Repeats while the step asks to `Skip` and the skip-speed budget
    /// lasts; `SkipAlways` steps repeat without spending the budget and
    /// refill it. If a step changes the top
    /// frame, the new top runs once and the call ends there. On `Stop` the
    /// top frame is left. Returns the last action and the frame now on top.
    pub fn handle_logic(&mut self, mut frame: FrameId) -> (LogicAction, Option<FrameId>) {
        let skip_speed = self.settings.skip_speed;
        let mut cnt = 0u32;

        let action = loop {
            let mut action = self.run_logic_frame(frame);

            let always = action == LogicAction::SkipAlways;
            if always {
                action = LogicAction::Skip;
                cnt = 0;
            }

            let mut taken_over = false;
            loop {
                match self.stack.top() {
                    None => return (LogicAction::Stop, None),
                    Some(top) if top == frame => break,
                    Some(top) => {
                        frame = top;
                        action = self.run_logic_frame(frame);
                        taken_over = true;
                    }
                }
            }

            if taken_over || action != LogicAction::Skip {
                break action;
            }
            if always {
                continue;
            }
            cnt += 1;
            if cnt >= skip_speed {
                break action;
            }
        };

        if action == LogicAction::Stop {
            self.stack.leave();
            return (LogicAction::Stop, self.stack.top());
        }

        (action, Some(frame))
    }

    /// Clear, render `frame`, present on `Swap`.
    pub fn run_render_frame(&mut self, frame: FrameId, r: &mut Renderer) -> RenderAction {
        let top_before = self.stack.top();
        r.clear_framebuffer();

        let mut handler = self.stack.take_handler(frame);
        let action = handler.render(r);
        let restored = self.stack.restore_handler(frame, handler);

        assert!(
            restored && self.stack.top() == top_before,
            "render step changed the loop frame stack"
        );

        if action == RenderAction::Swap {
            r.swap_buffers();
        }

        let now = self.clock.now();
        self.telemetry.render.update(now);
        action
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("stack", &self.stack)
            .field("settings", &self.settings)
            .field("frame_times", &self.frame_times)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::NullBackend;
    use crate::time::ManualClock;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn event_loop(skip_speed: u32) -> EventLoop {
        let settings = LoopSettings {
            skip_speed,
            ..LoopSettings::default()
        };
        EventLoop::new(
            settings,
            60,
            Box::new(ManualClock::with_step_per_read(Duration::from_micros(100))),
            QuitFlag::new(),
        )
    }

    fn renderer() -> Renderer {
        Renderer::new(Box::new(NullBackend::new()))
    }

    /// Returns a fixed action and counts calls.
    struct Fixed {
        action: LogicAction,
        render: RenderAction,
        calls: Rc<Cell<u32>>,
    }

    impl Fixed {
        fn boxed(action: LogicAction, calls: &Rc<Cell<u32>>) -> Box<Self> {
            Box::new(Self {
                action,
                render: RenderAction::Swap,
                calls: calls.clone(),
            })
        }
    }

    impl LoopHandler for Fixed {
        fn logic(&mut self, _ctx: &mut LogicCtx<'_>) -> LogicAction {
            self.calls.set(self.calls.get() + 1);
            self.action
        }

        fn render(&mut self, _r: &mut Renderer) -> RenderAction {
            self.render
        }
    }

    #[test]
    fn effective_frameskip_prefers_override() {
        let mut s = LoopSettings::default();
        s.frameskip = 0;
        assert_eq!(s.effective_frameskip(), 1);
        s.frameskip = 3;
        assert_eq!(s.effective_frameskip(), 3);
        s.frameskip_override = 5;
        assert_eq!(s.effective_frameskip(), 5);
    }

    #[test]
    fn from_config_tolerates_an_unchecked_log_period() {
        let mut cfg = EngineConfig::default();
        cfg.telemetry.fps_log_period_sec = f32::INFINITY;
        assert!(cfg.validate().is_err());
        let ev = EventLoop::from_config(&cfg, QuitFlag::new());
        assert!(ev.stack().is_empty());
    }

    #[test]
    fn skip_is_capped_by_skip_speed() {
        let mut ev = event_loop(4);
        let calls = Rc::new(Cell::new(0));
        let id = ev.enter(Fixed::boxed(LogicAction::Skip, &calls), 60);

        let (action, top) = ev.handle_logic(id);
        assert_eq!(action, LogicAction::Skip);
        assert_eq!(top, Some(id));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn wait_steps_once() {
        let mut ev = event_loop(10);
        let calls = Rc::new(Cell::new(0));
        let id = ev.enter(Fixed::boxed(LogicAction::Wait, &calls), 60);
        ev.handle_logic(id);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn skip_always_ignores_budget_until_it_changes_its_mind() {
        struct Burst(Rc<Cell<u32>>);
        impl LoopHandler for Burst {
            fn logic(&mut self, _ctx: &mut LogicCtx<'_>) -> LogicAction {
                self.0.set(self.0.get() + 1);
                if self.0.get() < 25 {
                    LogicAction::SkipAlways
                } else {
                    LogicAction::Wait
                }
            }
            fn render(&mut self, _r: &mut Renderer) -> RenderAction {
                RenderAction::Drop
            }
        }

        let mut ev = event_loop(1);
        let calls = Rc::new(Cell::new(0));
        let id = ev.enter(Box::new(Burst(calls.clone())), 60);
        let (action, _) = ev.handle_logic(id);
        assert_eq!(action, LogicAction::Wait);
        assert_eq!(calls.get(), 25);
        // SkipAlways steps are not counted by the logic fps counter.
        assert_eq!(ev.telemetry().logic.updates(), 1);
    }

    #[test]
    fn stop_leaves_only_the_stopping_frame() {
        let mut ev = event_loop(10);
        let outer_calls = Rc::new(Cell::new(0));
        let inner_calls = Rc::new(Cell::new(0));
        let outer = ev.enter(Fixed::boxed(LogicAction::Wait, &outer_calls), 60);
        let inner = ev.enter(Fixed::boxed(LogicAction::Stop, &inner_calls), 60);

        let (action, top) = ev.handle_logic(inner);
        assert_eq!(action, LogicAction::Stop);
        assert_eq!(top, Some(outer));
        assert_eq!(inner_calls.get(), 1);
        assert_eq!(outer_calls.get(), 0);
    }

    #[test]
    fn run_logic_frame_after_stop_does_not_call_logic() {
        let mut ev = event_loop(10);
        let calls = Rc::new(Cell::new(0));
        let id = ev.enter(Fixed::boxed(LogicAction::Stop, &calls), 60);

        assert_eq!(ev.run_logic_frame(id), LogicAction::Stop);
        assert_eq!(ev.run_logic_frame(id), LogicAction::Stop);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn quit_flag_forces_stop() {
        let mut ev = event_loop(10);
        let calls = Rc::new(Cell::new(0));
        let id = ev.enter(Fixed::boxed(LogicAction::Wait, &calls), 60);
        ev.quit().request();

        let (action, top) = ev.handle_logic(id);
        assert_eq!(action, LogicAction::Stop);
        assert_eq!(top, None);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn self_leave_runs_on_leave_before_leave_returns() {
        type Log = Rc<RefCell<Vec<String>>>;

        // Leaves its own frame, then enters a replacement in the same step.
        struct Replacer {
            log: Log,
            child_calls: Rc<Cell<u32>>,
        }
        impl LoopHandler for Replacer {
            fn logic(&mut self, ctx: &mut LogicCtx<'_>) -> LogicAction {
                ctx.leave();
                let depth = ctx.stack().depth();
                self.log.borrow_mut().push(format!("after leave: depth={depth}"));
                ctx.enter(Fixed::boxed(LogicAction::Wait, &self.child_calls), 60);
                LogicAction::Wait
            }
            fn render(&mut self, _r: &mut Renderer) -> RenderAction {
                RenderAction::Swap
            }
        }

        let mut ev = event_loop(10);
        let outer_calls = Rc::new(Cell::new(0));
        let child_calls = Rc::new(Cell::new(0));
        let log: Log = Rc::default();
        ev.enter(Fixed::boxed(LogicAction::Wait, &outer_calls), 60);
        let sink = log.clone();
        let inner = ev.enter_with_leave(
            Box::new(Replacer {
                log: log.clone(),
                child_calls: child_calls.clone(),
            }),
            60,
            move |stack: &mut FrameStack| {
                sink.borrow_mut().push(format!("on_leave: depth={}", stack.depth()));
            },
        );

        let (action, top) = ev.handle_logic(inner);
        assert_eq!(*log.borrow(), ["on_leave: depth=1", "after leave: depth=1"]);
        // The replacement took over within the same call.
        assert_eq!(action, LogicAction::Wait);
        assert_eq!(top, ev.stack().top());
        assert_ne!(top, Some(inner));
        assert_eq!(child_calls.get(), 1);
        assert_eq!(outer_calls.get(), 0);
    }

    #[test]
    fn render_swaps_only_on_swap() {
        let mut ev = event_loop(10);
        let mut r = renderer();
        let calls = Rc::new(Cell::new(0));
        let id = ev.enter(
            Box::new(Fixed {
                action: LogicAction::Wait,
                render: RenderAction::Drop,
                calls,
            }),
            60,
        );

        assert_eq!(ev.run_render_frame(id, &mut r), RenderAction::Drop);
        assert_eq!(r.frames_presented(), 0);
        assert_eq!(ev.telemetry().render.updates(), 1);
    }
}
