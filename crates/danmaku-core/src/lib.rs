pub mod config;
pub mod error;
pub mod eventloop;
pub mod fps;
pub mod logsys;
pub mod render;
pub mod signals;
pub mod time;

pub use crate::config::EngineConfig;
pub use crate::error::{EngineError, EngineResult};
pub use crate::eventloop::{
    CallChain, CallbackExecutor, EventLoop, Executor, FrameId, FrameStack, LogicAction, LogicCtx,
    LoopHandler, LoopSettings, RenderAction, SyncExecutor,
};
pub use crate::render::Renderer;
pub use crate::signals::QuitFlag;
