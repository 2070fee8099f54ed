//! Application runner and event loop.

use std::thread;
use std::time::{Duration, Instant};

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::frame_loop::{wait_for_drawable_size, FrameBackend, FrameLoop, MAX_FRAMES_IN_FLIGHT};
use crate::renderer::VulkanRenderer;
use crate::window::{AppWindow, WindowEvents};

/// Install the global `tracing` subscriber, honoring `RUST_LOG` and
/// defaulting to `info`. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

/// Run the quad demo until the window is closed.
///
/// Any fatal error is returned after the renderer has waited for the
/// device and torn down its resources.
pub fn run(config: AppConfig) -> anyhow::Result<()> {
    init_tracing();

    info!("{} starting...", config.title);

    let mut window = AppWindow::new(&config.title, config.width, config.height)?;
    if wait_for_drawable_size(&mut window).is_none() {
        info!("Window closed before it could be drawn to");
        return Ok(());
    }
    let mut renderer = VulkanRenderer::new(window.window()?, &config)?;
    info!("GPU: {}", renderer.gpu().capabilities().summary());

    let mut frames = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);
    let mut stats = FrameStats::default();
    let target_frame_time = config.target_fps.and_then(frame_budget);

    let mut last_frame = Instant::now();
    info!("Application ready!");

    while !window.should_close() {
        window.poll_events();
        if window.should_close() {
            break;
        }

        let frame_start = Instant::now();
        frames.draw_frame(&mut renderer, &mut window)?;

        // Frame pacing
        if let Some(target) = target_frame_time {
            let elapsed = frame_start.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }
        }

        let now = Instant::now();
        stats.record(now.duration_since(last_frame));
        last_frame = now;
    }

    renderer.wait_idle()?;
    stats.log(frames.recreate_count());

    info!("Starting cleanup...");
    // Vulkan objects go before the window they present to
    drop(renderer);
    drop(window);
    info!("Cleanup complete");

    Ok(())
}

/// Time allotted to one frame at `fps`, or `None` for unlimited.
fn frame_budget(fps: u32) -> Option<Duration> {
    (fps > 0).then(|| Duration::from_nanos(1_000_000_000 / u64::from(fps)))
}

/// Frame rate statistics reported at shutdown.
#[derive(Debug, Clone, Copy)]
pub struct FrameStats {
    frames: u64,
    min_fps: f64,
    max_fps: f64,
    fps_sum: f64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            frames: 0,
            min_fps: f64::MAX,
            max_fps: 0.0,
            fps_sum: 0.0,
        }
    }
}

impl FrameStats {
    /// Account for one frame that took `dt`.
    pub fn record(&mut self, dt: Duration) {
        self.frames += 1;
        let secs = dt.as_secs_f64();
        if secs > 0.0 {
            let fps = 1.0 / secs;
            self.min_fps = self.min_fps.min(fps);
            self.max_fps = self.max_fps.max(fps);
            self.fps_sum += fps;
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn min_fps(&self) -> Option<f64> {
        (self.fps_sum > 0.0).then_some(self.min_fps)
    }

    pub fn max_fps(&self) -> Option<f64> {
        (self.fps_sum > 0.0).then_some(self.max_fps)
    }

    pub fn avg_fps(&self) -> Option<f64> {
        (self.frames > 0 && self.fps_sum > 0.0).then(|| self.fps_sum / self.frames as f64)
    }

    /// Log the summary at info level.
    pub fn log(&self, swapchain_rebuilds: u64) {
        if let (Some(min), Some(max), Some(avg)) = (self.min_fps(), self.max_fps(), self.avg_fps()) {
            info!("FPS Statistics:");
            info!("  Min: {min:.1}");
            info!("  Max: {max:.1}");
            info!("  Avg: {avg:.1}");
        }
        info!("  Total frames: {}", self.frames);
        info!("  Swapchain rebuilds: {swapchain_rebuilds}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn stats_track_min_max_avg() {
        let mut stats = FrameStats::default();
        stats.record(Duration::from_millis(10));
        stats.record(Duration::from_millis(20));
        stats.record(Duration::from_millis(40));

        assert_eq!(stats.frames(), 3);
        assert_relative_eq!(stats.min_fps().unwrap(), 25.0, epsilon = 1e-9);
        assert_relative_eq!(stats.max_fps().unwrap(), 100.0, epsilon = 1e-9);
        assert_relative_eq!(stats.avg_fps().unwrap(), 175.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_stats_have_no_rates() {
        let stats = FrameStats::default();
        assert_eq!(stats.frames(), 0);
        assert_eq!(stats.min_fps(), None);
        assert_eq!(stats.avg_fps(), None);
    }

    #[test]
    fn frame_budget_from_target_fps() {
        assert_eq!(frame_budget(0), None);
        assert_eq!(frame_budget(50), Some(Duration::from_millis(20)));
        assert_eq!(frame_budget(60), Some(Duration::from_nanos(16_666_666)));
    }
}
