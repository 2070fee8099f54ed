//! Window creation and event pumping.
//!
//! The event loop is pumped from the render loop instead of owning it, so
//! the frame loop can poll between frames and block while the window is
//! minimized. Window events land in [`WindowState`], the handler passed to
//! each pump.

use std::time::Duration;

use anyhow::{anyhow, bail};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

/// What the frame loop needs from the windowing layer.
pub trait WindowEvents {
    /// A close request has been received.
    fn should_close(&self) -> bool;

    /// Current framebuffer size in pixels; zero while minimized.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Block until at least one window event has been handled.
    fn wait_events(&mut self);

    /// Return and clear the pending resize notification.
    fn take_resized(&mut self) -> bool;
}

/// Window-side application state updated by event handlers.
struct WindowState {
    title: String,
    size: PhysicalSize<u32>,
    window: Option<Window>,
    close_requested: bool,
    framebuffer_resized: bool,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title(&self.title)
            .with_inner_size(self.size);

        match event_loop.create_window(attributes) {
            Ok(window) => self.window = Some(window),
            Err(e) => {
                error!("Failed to create window: {e}");
                self.close_requested = true;
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                tracing::debug!("Window resized to {}x{}", size.width, size.height);
                self.framebuffer_resized = true;
            }
            _ => {}
        }
    }
}

/// The application window and the event loop that drives it.
pub struct AppWindow {
    event_loop: EventLoop<()>,
    state: WindowState,
}

impl AppWindow {
    /// Create the event loop and a window of the given inner size.
    pub fn new(title: &str, width: u32, height: u32) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new()?;

        let mut window = Self {
            event_loop,
            state: WindowState {
                title: title.to_string(),
                size: PhysicalSize::new(width, height),
                window: None,
                close_requested: false,
                framebuffer_resized: false,
            },
        };

        // The window is created in `resumed`, delivered by the first pumps
        while window.state.window.is_none() {
            if window.pump(Some(Duration::ZERO)) {
                bail!("Event loop exited before the window was created");
            }
        }

        info!("Window created: {width}x{height}");
        Ok(window)
    }

    /// The underlying winit window.
    pub fn window(&self) -> anyhow::Result<&Window> {
        self.state
            .window
            .as_ref()
            .ok_or_else(|| anyhow!("Window has been destroyed"))
    }

    /// Handle all pending events without blocking.
    pub fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    /// Pump the event loop; returns whether it has exited.
    fn pump(&mut self, timeout: Option<Duration>) -> bool {
        match self.event_loop.pump_app_events(timeout, &mut self.state) {
            PumpStatus::Continue => false,
            PumpStatus::Exit(code) => {
                tracing::debug!("Event loop exited with code {code}");
                self.state.close_requested = true;
                true
            }
        }
    }
}

impl WindowEvents for AppWindow {
    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.state
            .window
            .as_ref()
            .map_or((0, 0), |window| {
                let size = window.inner_size();
                (size.width, size.height)
            })
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.state.framebuffer_resized)
    }
}
