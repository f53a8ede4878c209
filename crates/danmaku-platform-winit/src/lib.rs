//! winit host for the callback-driven executor.

mod app;

pub use app::WinitRefreshHost;

use danmaku_core::config::EngineConfig;
use danmaku_core::{CallbackExecutor, QuitFlag};

/// Callback executor driven by a winit window built from `cfg`.
pub fn callback_executor(
    cfg: &EngineConfig,
    quit: QuitFlag,
) -> CallbackExecutor<WinitRefreshHost> {
    CallbackExecutor::new(WinitRefreshHost::new(cfg.window.clone(), quit))
}
