use danmaku_core::config::WindowConfig;
use danmaku_core::eventloop::{HostEvent, HostReply, RefreshHost};
use danmaku_core::{EngineError, EngineResult, QuitFlag};
use log::info;

use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

struct App<'a> {
    config: &'a WindowConfig,
    quit: &'a QuitFlag,
    on_event: &'a mut dyn FnMut(HostEvent) -> HostReply,
    window: Option<Window>,
    error: Option<EngineError>,
}

impl App<'_> {
    #[inline]
    fn request_redraw(&self) {
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    /// Act on the executor's reply.
    ///
    /// winit has no refresh registration to renew: every frame is its own
    /// redraw request, so `Rearm` and `Continue` both just ask for the next one.
    fn reply(&self, event_loop: &ActiveEventLoop, reply: HostReply) {
        match reply {
            HostReply::Continue | HostReply::Rearm => self.request_redraw(),
            HostReply::Done => event_loop.exit(),
        }
    }
}

impl ApplicationHandler for App<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));

        match event_loop.create_window(attrs) {
            Ok(window) => {
                self.window = Some(window);
                // Kick first frame.
                self.request_redraw();
            }
            Err(e) => {
                self.error = Some(EngineError::Platform(format!("window create failed: {e}")));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::RedrawRequested => {
                let reply = (self.on_event)(HostEvent::Refresh);
                self.reply(event_loop, reply);
            }
            WindowEvent::Resized(size) => {
                let reply = (self.on_event)(HostEvent::ViewportChanged {
                    width: size.width,
                    height: size.height,
                });
                self.reply(event_loop, reply);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.window.as_ref().map(Window::inner_size) {
                    let reply = (self.on_event)(HostEvent::ViewportChanged {
                        width: size.width,
                        height: size.height,
                    });
                    self.reply(event_loop, reply);
                }
            }
            WindowEvent::CloseRequested => {
                // Let the frames unwind through their logic steps.
                info!("winit host: close requested");
                self.quit.request();
                self.request_redraw();
            }
            _ => {}
        }
    }
}

/// Refresh host backed by a winit window.
///
/// Every `RedrawRequested` is one refresh; the next redraw is requested
/// only after the executor answers, so the display paces the loop.
#[derive(Debug, Clone)]
pub struct WinitRefreshHost {
    config: WindowConfig,
    quit: QuitFlag,
}

impl WinitRefreshHost {
    pub fn new(config: WindowConfig, quit: QuitFlag) -> Self {
        Self { config, quit }
    }
}

impl RefreshHost for WinitRefreshHost {
    fn drive(&mut self, on_event: &mut dyn FnMut(HostEvent) -> HostReply) -> EngineResult<()> {
        let event_loop = EventLoop::new().map_err(|e| EngineError::Platform(e.to_string()))?;

        let mut app = App {
            config: &self.config,
            quit: &self.quit,
            on_event,
            window: None,
            error: None,
        };

        event_loop
            .run_app(&mut app)
            .map_err(|e| EngineError::Platform(e.to_string()))?;

        match app.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
