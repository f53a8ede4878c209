use std::cell::Cell;
use std::rc::Rc;

use danmaku_core::render::{BlendMode, Color, MatrixMode, NullBackend};
use danmaku_core::{
    logsys, CallChain, EngineConfig, EventLoop, Executor, FrameId, FrameStack, LogicAction,
    LogicCtx, LoopHandler, QuitFlag, RenderAction, Renderer,
};
use glam::Vec3;
use log::info;

const STAGE_FRAMES: u32 = 600;
const PAUSE_AT: u32 = 180;
const MENU_FRAMES: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    Resume,
    Quit,
}

/// Pause menu sub-loop. Picks an entry after a while.
struct PauseMenu {
    frames: u32,
    choice: Rc<Cell<MenuChoice>>,
}

impl PauseMenu {
    /// Open the menu on top of `stack`; `chain` receives the choice once it closes.
    fn open(stack: &mut FrameStack, chain: CallChain<MenuChoice>) -> FrameId {
        let choice = Rc::new(Cell::new(MenuChoice::Resume));
        let menu = PauseMenu {
            frames: 0,
            choice: choice.clone(),
        };
        stack.enter_with_leave(Box::new(menu), 60, move |stack: &mut FrameStack| {
            info!("pause menu closed: {:?}", choice.get());
            chain.run(stack, choice.get());
        })
    }
}

impl LoopHandler for PauseMenu {
    fn logic(&mut self, ctx: &mut LogicCtx<'_>) -> LogicAction {
        if ctx.quit_requested() {
            self.choice.set(MenuChoice::Quit);
        }
        self.frames += 1;
        if self.frames >= MENU_FRAMES {
            LogicAction::Stop
        } else {
            LogicAction::Wait
        }
    }

    fn render(&mut self, r: &mut Renderer) -> RenderAction {
        let mut s = r.state_scope();
        s.set_blend_mode(BlendMode::Alpha);
        s.set_color(Color::rgba(0.0, 0.0, 0.0, 0.6));
        s.mat_push();
        s.mat_translate(Vec3::new(400.0, 300.0, 0.0));
        s.mat_scale(Vec3::splat(1.0 + self.frames as f32 / MENU_FRAMES as f32));
        s.mat_pop();
        RenderAction::Swap
    }
}

/// The main stage: spins a pattern, pauses once.
struct Stage {
    frame: u32,
    angle: f32,
    resume: Rc<Cell<Option<MenuChoice>>>,
}

impl LoopHandler for Stage {
    fn logic(&mut self, ctx: &mut LogicCtx<'_>) -> LogicAction {
        if let Some(choice) = self.resume.take() {
            info!("stage resumed at frame {} ({choice:?})", self.frame);
            if choice == MenuChoice::Quit {
                return LogicAction::Stop;
            }
        }

        self.frame += 1;
        self.angle += 0.05;

        if self.frame == PAUSE_AT {
            let sink = self.resume.clone();
            PauseMenu::open(
                ctx.stack(),
                CallChain::new(move |_stack: &mut FrameStack, c: MenuChoice| sink.set(Some(c))),
            );
        }

        if self.frame >= STAGE_FRAMES {
            info!("stage finished after {} frames", self.frame);
            LogicAction::Stop
        } else {
            LogicAction::Wait
        }
    }

    fn render(&mut self, r: &mut Renderer) -> RenderAction {
        r.mat_mode(MatrixMode::Projection);
        r.mat_identity();
        r.mat_ortho(0.0, 800.0, 600.0, 0.0, -100.0, 100.0);
        r.mat_mode(MatrixMode::Modelview);

        for i in 0..8 {
            let mut s = r.state_scope();
            s.set_blend_mode(BlendMode::Add);
            s.set_color(Color::rgb(1.0, i as f32 / 8.0, 0.2));
            s.mat_push();
            s.mat_translate(Vec3::new(400.0, 300.0, 0.0));
            s.mat_rotate(self.angle + i as f32 * std::f32::consts::FRAC_PI_4, Vec3::Z);
            s.mat_translate(Vec3::new(120.0, 0.0, 0.0));
            s.mat_pop();
        }

        RenderAction::Swap
    }
}

fn main() -> anyhow::Result<()> {
    logsys::init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "danmaku.toml".into());
    let mut cfg = EngineConfig::load_or_default(&path)?;
    cfg.apply_env_overrides();

    let quit = QuitFlag::new();
    quit.install_ctrlc()?;

    let mut ev = EventLoop::from_config(&cfg, quit.clone());
    let mut r = Renderer::new(Box::new(NullBackend::new()));
    r.set_vsync(cfg.game.vsync);

    ev.enter(
        Box::new(Stage {
            frame: 0,
            angle: 0.0,
            resume: Rc::new(Cell::new(None)),
        }),
        cfg.game.target_fps,
    );

    let mut exec = executor(&cfg, quit);
    exec.run(&mut ev, &mut r)?;

    info!(
        "done: {} frames presented, logic {:.1} fps",
        r.frames_presented(),
        ev.telemetry().logic.fps()
    );
    Ok(())
}

#[cfg(feature = "winit")]
fn executor(cfg: &EngineConfig, quit: QuitFlag) -> Box<dyn Executor> {
    Box::new(danmaku_platform_winit::callback_executor(cfg, quit))
}

#[cfg(not(feature = "winit"))]
fn executor(cfg: &EngineConfig, _quit: QuitFlag) -> Box<dyn Executor> {
    Box::new(danmaku_core::SyncExecutor::from_config(cfg))
}
