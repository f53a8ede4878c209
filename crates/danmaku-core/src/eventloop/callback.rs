use log::{debug, info};

use super::{EventLoop, Executor, LogicAction};
use crate::error::EngineResult;
use crate::render::Renderer;

/// Something the host reports to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The display is ready for a new frame.
    Refresh,
    /// The presentation surface changed size.
    ViewportChanged { width: u32, height: u32 },
}

/// What the executor wants from the host after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostReply {
    /// Keep calling back once per refresh.
    Continue,
    /// Re-register the refresh callback, then keep calling back.
    ///
    /// Sent after a viewport change. Hosts whose refresh callback is not a
    /// registration (one redraw request per frame, as with winit) treat it
    /// like [`Continue`](Self::Continue).
    Rearm,
    /// The loop is over; stop calling back.
    Done,
}

/// A runtime that owns scheduling and calls back once per display refresh.
pub trait RefreshHost {
    /// Pump host events into `on_event` until it replies [`HostReply::Done`]
    /// or the host itself shuts down.
    fn drive(&mut self, on_event: &mut dyn FnMut(HostEvent) -> HostReply) -> EngineResult<()>;
}

/// Executor for hosts that pace frames themselves.
///
/// One logic step and one render step per refresh. There is no catch-up,
/// frameskip or limiter: the host already ticks at a fixed rate.
#[derive(Debug)]
pub struct CallbackExecutor<H> {
    host: H,
}

impl<H: RefreshHost> CallbackExecutor<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    #[inline]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }
}

/// Handle one host refresh.
fn refresh(ev: &mut EventLoop, r: &mut Renderer) -> HostReply {
    let Some(mut frame) = ev.stack.top() else {
        return HostReply::Done;
    };

    let start = ev.now();
    ev.frame_times.target = ev.stack.target(frame);
    ev.frame_times.start = start;
    ev.frame_times.next = start + ev.frame_times.target;
    ev.telemetry.busy.mark(start);

    let mut action = ev.run_logic_frame(frame);

    loop {
        match ev.stack.top() {
            None => return HostReply::Done,
            Some(top) if top == frame => break,
            Some(top) => {
                frame = top;
                action = ev.run_logic_frame(frame);
            }
        }
    }

    ev.run_render_frame(frame, r);

    if action == LogicAction::Stop {
        ev.stack.leave();
    }

    let now = ev.now();
    ev.telemetry.busy.update(now);
    ev.telemetry.maybe_log(now);

    if ev.stack.is_empty() {
        HostReply::Done
    } else {
        HostReply::Continue
    }
}

impl<H: RefreshHost> Executor for CallbackExecutor<H> {
    fn run(&mut self, ev: &mut EventLoop, r: &mut Renderer) -> EngineResult<()> {
        if ev.stack.is_empty() {
            return Ok(());
        }

        info!("eventloop: callback executor start");

        let mut refreshes: u64 = 0;
        self.host.drive(&mut |event| match event {
            HostEvent::Refresh => {
                refreshes += 1;
                refresh(ev, r)
            }
            HostEvent::ViewportChanged { width, height } => {
                r.resize_viewport(width, height);
                debug!("eventloop: viewport {width}x{height}, re-arming refresh callback");
                if ev.stack.is_empty() {
                    HostReply::Done
                } else {
                    HostReply::Rearm
                }
            }
        })?;

        info!("eventloop: callback executor done after {refreshes} refreshes");
        Ok(())
    }
}
