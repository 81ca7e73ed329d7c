use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, unbounded, Sender};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use winit::window::WindowBuilder;

use tracing::{debug, error, warn};

use crate::color::ColorToken;
use crate::error::RenderError;
use crate::host::WindowHost;
use crate::lifecycle::{LifecycleController, LifecyclePhase, TickOutcome};
use crate::media::MediaDescriptor;
use crate::style::StyleEnvironment;
use crate::theme::ThemeMode;
use crate::types::RendererConfig;

const WINDOW_TITLE: &str = "Gradient Map";

#[derive(Debug)]
enum WindowCommand {
    SetMedia(MediaDescriptor),
    SetColors {
        light: Vec<ColorToken>,
        dark: Vec<ColorToken>,
    },
    SetThemeOverride(Option<ThemeMode>),
    SetPassThrough(bool),
    Capture {
        reply: Sender<Result<Vec<u8>, RenderError>>,
    },
    Shutdown,
}

/// A renderer mounted into its own window, driven from a dedicated thread.
///
/// Commands are delivered through the event loop proxy and applied between
/// frames. Style edits made on the shared [`StyleEnvironment`] are picked up
/// by the synchronizer on the next frame without a command.
pub struct WindowRuntime {
    proxy: EventLoopProxy<WindowCommand>,
    join_handle: Option<JoinHandle<Result<()>>>,
}

impl WindowRuntime {
    pub fn spawn(config: RendererConfig, style: Option<Arc<dyn StyleEnvironment>>) -> Result<Self> {
        let (ready_tx, ready_rx) = bounded(1);
        let handle = thread::Builder::new()
            .name("gradmap-window".into())
            .spawn(move || run_window_thread(config, style, ready_tx))
            .context("failed to spawn window thread")?;

        let proxy = ready_rx
            .recv()
            .map_err(|err| anyhow!("window thread failed to initialise: {err}"))??;

        Ok(Self {
            proxy,
            join_handle: Some(handle),
        })
    }

    fn send(&self, command: WindowCommand) -> Result<()> {
        self.proxy
            .send_event(command)
            .map_err(|_| anyhow!("window event loop has exited"))
    }

    pub fn set_media(&self, media: MediaDescriptor) -> Result<()> {
        self.send(WindowCommand::SetMedia(media))
    }

    pub fn set_colors(&self, light: Vec<ColorToken>, dark: Vec<ColorToken>) -> Result<()> {
        self.send(WindowCommand::SetColors { light, dark })
    }

    pub fn set_theme_override(&self, theme: Option<ThemeMode>) -> Result<()> {
        self.send(WindowCommand::SetThemeOverride(theme))
    }

    pub fn set_pass_through(&self, pass_through: bool) -> Result<()> {
        self.send(WindowCommand::SetPassThrough(pass_through))
    }

    /// Renders the latest state and returns it PNG-encoded.
    pub fn capture_snapshot(&self, timeout: Duration) -> Result<Vec<u8>> {
        let (reply, response) = bounded(1);
        self.send(WindowCommand::Capture { reply })?;
        let bytes = response
            .recv_timeout(timeout)
            .map_err(|err| anyhow!("snapshot request not answered: {err}"))??;
        Ok(bytes)
    }

    /// Blocks until the window is closed.
    pub fn wait(mut self) -> Result<()> {
        match self.join_handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|err| anyhow!("window thread panicked: {err:?}"))?,
            None => Ok(()),
        }
    }

    pub fn shutdown(mut self) -> Result<()> {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.proxy.send_event(WindowCommand::Shutdown);
            handle
                .join()
                .map_err(|err| anyhow!("window thread panicked: {err:?}"))??;
        }
        Ok(())
    }
}

impl Drop for WindowRuntime {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.proxy.send_event(WindowCommand::Shutdown);
            let _ = handle.join();
        }
    }
}

fn run_window_thread(
    config: RendererConfig,
    style: Option<Arc<dyn StyleEnvironment>>,
    ready_tx: Sender<Result<EventLoopProxy<WindowCommand>>>,
) -> Result<()> {
    let mut builder = EventLoopBuilder::<WindowCommand>::with_user_event();
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        use winit::platform::wayland::EventLoopBuilderExtWayland;
        EventLoopBuilderExtWayland::with_any_thread(&mut builder, true);
    }

    #[cfg(any(
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    {
        use winit::platform::x11::EventLoopBuilderExtX11;
        EventLoopBuilderExtX11::with_any_thread(&mut builder, true);
    }
    let event_loop = match builder.build() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            let _ = ready_tx.send(Err(anyhow!("failed to create event loop: {err}")));
            return Err(anyhow!("failed to create event loop: {err}"));
        }
    };
    let proxy = event_loop.create_proxy();

    let size = config.surface_size.clamped();
    let window = match WindowBuilder::new()
        .with_title(WINDOW_TITLE)
        .with_inner_size(PhysicalSize::new(size.width, size.height))
        .build(&event_loop)
    {
        Ok(window) => Arc::new(window),
        Err(err) => {
            let _ = ready_tx.send(Err(anyhow!("failed to create window: {err}")));
            return Err(anyhow!("failed to create window: {err}"));
        }
    };
    let window_id = window.id();

    let mut controller = LifecycleController::new(WindowHost::new(window.clone()), config, style);
    controller.set_theme_signal(window.theme().map(ThemeMode::from));
    controller.mount(Instant::now());

    let _ = ready_tx.send(Ok(proxy));

    let (failure_tx, failure_rx) = unbounded();
    let run_result = event_loop.run(move |event, elwt| match event {
        Event::UserEvent(command) => {
            match command {
                WindowCommand::SetMedia(media) => controller.set_media(media),
                WindowCommand::SetColors { light, dark } => controller.set_colors(light, dark),
                WindowCommand::SetThemeOverride(theme) => controller.set_theme_override(theme),
                WindowCommand::SetPassThrough(pass_through) => {
                    controller.set_pass_through(pass_through)
                }
                WindowCommand::Capture { reply } => {
                    let _ = reply.send(controller.capture_snapshot());
                }
                WindowCommand::Shutdown => {
                    controller.dispose();
                    elwt.exit();
                    return;
                }
            }
            window.request_redraw();
        }
        Event::WindowEvent { window_id: id, event } if id == window_id => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                controller.dispose();
                elwt.exit();
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                if controller.phase() == LifecyclePhase::Unmounted && !controller.is_disposed() {
                    debug!("host has a content box again; remounting");
                    controller.mount(Instant::now());
                } else {
                    controller.handle_resize();
                }
            }
            WindowEvent::ThemeChanged(theme) => {
                controller.set_theme_signal(Some(theme.into()));
            }
            WindowEvent::RedrawRequested => match controller.tick(Instant::now()) {
                Ok(TickOutcome::Disposed) => elwt.exit(),
                Ok(TickOutcome::HostUnavailable) => {
                    warn!("window has no drawable area; waiting for a resize");
                }
                Ok(TickOutcome::Rendered | TickOutcome::Waiting | TickOutcome::Idle) => {}
                Err(err) => {
                    error!(error = %err, "renderer failed; closing window");
                    let _ = failure_tx.send(err);
                    controller.dispose();
                    elwt.exit();
                }
            },
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            if controller.is_due(now) {
                window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = controller.next_deadline() {
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))?;
    match failure_rx.try_recv() {
        Ok(err) => Err(anyhow!(err).context("window renderer failed")),
        Err(_) => Ok(()),
    }
}
