//! The per-frame acquire/record/submit/present state machine.
//!
//! GPU work sits behind [`FrameBackend`] and windowing behind
//! [`WindowEvents`], so the loop's ordering and recreation rules are
//! independent of Vulkan.

use tracing::{debug, info, trace};
use vkquad_gpu::{AcquireOutcome, PresentOutcome};

use crate::window::WindowEvents;

/// Number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// GPU operations the frame loop drives, addressed by frame slot.
pub trait FrameBackend {
    /// Block until the slot's previous submission has completed.
    fn wait_for_slot(&mut self, slot: usize) -> anyhow::Result<()>;

    /// Acquire the next swapchain image, signaling the slot's
    /// image-available semaphore.
    fn acquire_image(&mut self, slot: usize) -> anyhow::Result<AcquireOutcome>;

    /// Unsignal the slot's fence ahead of a new submission.
    fn reset_slot(&mut self, slot: usize) -> anyhow::Result<()>;

    /// Write this frame's transforms into the slot's uniform buffer.
    fn update_uniforms(&mut self, slot: usize) -> anyhow::Result<()>;

    /// Reset and re-record the slot's command buffer for `image_index`.
    fn record(&mut self, slot: usize, image_index: u32) -> anyhow::Result<()>;

    /// Submit the slot's command buffer, signaling its fence.
    fn submit(&mut self, slot: usize) -> anyhow::Result<()>;

    /// Present `image_index` once the slot's rendering has finished.
    fn present(&mut self, slot: usize, image_index: u32) -> anyhow::Result<PresentOutcome>;

    /// Wait for all queued GPU work.
    fn wait_idle(&mut self) -> anyhow::Result<()>;

    /// Destroy and rebuild the swapchain and its framebuffers.
    fn rebuild_swapchain(&mut self, width: u32, height: u32) -> anyhow::Result<()>;
}

/// Where a frame slot is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

/// Result of [`FrameLoop::recreate_swapchain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecreateOutcome {
    /// The swapchain was rebuilt at this framebuffer size.
    Rebuilt { width: u32, height: u32 },
    /// A close request arrived while the window was minimized.
    Aborted,
}

/// Result of [`FrameLoop::draw_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was presented, possibly followed by a recreation.
    Presented {
        image_index: u32,
        recreated: Option<RecreateOutcome>,
    },
    /// Acquire reported out-of-date; nothing was drawn.
    Skipped(RecreateOutcome),
}

/// Frame slot rotation and swapchain recreation policy.
#[derive(Debug)]
pub struct FrameLoop {
    current_frame: usize,
    slots: Vec<SlotState>,
    frame_count: u64,
    recreate_count: u64,
}

impl FrameLoop {
    /// Create a loop cycling through `frames_in_flight` slots.
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            current_frame: 0,
            slots: vec![SlotState::Idle; frames_in_flight.max(1)],
            frame_count: 0,
            recreate_count: 0,
        }
    }

    /// Slot the next frame will use.
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Frames that reached present.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Completed swapchain rebuilds.
    pub fn recreate_count(&self) -> u64 {
        self.recreate_count
    }

    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        self.slots.get(slot).copied()
    }

    fn transition(&mut self, slot: usize, next: SlotState) {
        let prev = std::mem::replace(&mut self.slots[slot], next);
        trace!("frame slot {slot}: {prev:?} -> {next:?}");
    }

    /// Run one acquire/record/submit/present cycle.
    ///
    /// An out-of-date acquire recreates the swapchain and returns without
    /// touching the slot's fence or advancing the frame index. After a
    /// present, a suboptimal or out-of-date result or a pending resize
    /// triggers recreation, and the frame index advances either way.
    pub fn draw_frame<B, W>(&mut self, backend: &mut B, window: &mut W) -> anyhow::Result<FrameOutcome>
    where
        B: FrameBackend,
        W: WindowEvents,
    {
        let slot = self.current_frame;

        self.transition(slot, SlotState::Acquiring);
        backend.wait_for_slot(slot)?;

        let image_index = match backend.acquire_image(slot)? {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    debug!("Acquired suboptimal swapchain image {image_index}");
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                debug!("Swapchain out of date on acquire");
                self.transition(slot, SlotState::Idle);
                // The rebuild picks up the new size, so a pending resize is handled too
                window.take_resized();
                let outcome = self.recreate_swapchain(backend, window)?;
                return Ok(FrameOutcome::Skipped(outcome));
            }
        };

        backend.update_uniforms(slot)?;
        backend.reset_slot(slot)?;

        self.transition(slot, SlotState::Recording);
        backend.record(slot, image_index)?;
        backend.submit(slot)?;
        self.transition(slot, SlotState::Submitted);

        self.transition(slot, SlotState::Presenting);
        let presented = backend.present(slot, image_index)?;
        let resized = window.take_resized();

        let recreated = if presented.needs_recreate() || resized {
            debug!("Recreating after present ({presented:?}, resized: {resized})");
            Some(self.recreate_swapchain(backend, window)?)
        } else {
            None
        };

        self.transition(slot, SlotState::Idle);
        self.current_frame = (self.current_frame + 1) % self.slots.len();
        self.frame_count += 1;

        Ok(FrameOutcome::Presented {
            image_index,
            recreated,
        })
    }

    /// Rebuild the swapchain at the current framebuffer size.
    ///
    /// Blocks in the window's event wait while the framebuffer is zero-area.
    /// A close request during that wait aborts without rebuilding.
    pub fn recreate_swapchain<B, W>(
        &mut self,
        backend: &mut B,
        window: &mut W,
    ) -> anyhow::Result<RecreateOutcome>
    where
        B: FrameBackend,
        W: WindowEvents,
    {
        let Some((width, height)) = wait_for_drawable_size(window) else {
            info!("Close requested while minimized; skipping swapchain rebuild");
            return Ok(RecreateOutcome::Aborted);
        };

        backend.wait_idle()?;
        backend.rebuild_swapchain(width, height)?;
        self.recreate_count += 1;

        info!("Swapchain recreated: {width}x{height}");
        Ok(RecreateOutcome::Rebuilt { width, height })
    }
}

/// Block in the window's event wait until the framebuffer has a non-zero
/// area. Returns `None` if a close request arrives first.
pub fn wait_for_drawable_size<W: WindowEvents>(window: &mut W) -> Option<(u32, u32)> {
    let (mut width, mut height) = window.framebuffer_size();
    while width == 0 || height == 0 {
        if window.should_close() {
            return None;
        }
        window.wait_events();
        (width, height) = window.framebuffer_size();
    }
    Some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        Reset(usize),
        Uniforms(usize),
        Record(usize, u32),
        Submit(usize),
        Present(usize, u32),
        WaitIdle,
        Rebuild(u32, u32),
    }

    /// Backend fake that models fences: a submission signals its slot's
    /// fence immediately, and waiting on an unsignaled fence is a deadlock.
    struct FakeBackend {
        calls: Vec<Call>,
        fence_signaled: Vec<bool>,
        recording: Option<usize>,
        acquires: VecDeque<anyhow::Result<AcquireOutcome>>,
        presents: VecDeque<anyhow::Result<PresentOutcome>>,
        rebuild_error: Option<anyhow::Error>,
        next_image: u32,
        image_count: u32,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                calls: Vec::new(),
                fence_signaled: vec![true; MAX_FRAMES_IN_FLIGHT],
                recording: None,
                acquires: VecDeque::new(),
                presents: VecDeque::new(),
                rebuild_error: None,
                next_image: 0,
                image_count: 3,
            }
        }

        fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls.iter().filter(|c| pred(c)).count()
        }

        fn rebuilds(&self) -> Vec<Call> {
            self.calls
                .iter()
                .filter(|c| matches!(c, Call::Rebuild(..)))
                .cloned()
                .collect()
        }
    }

    impl FrameBackend for FakeBackend {
        fn wait_for_slot(&mut self, slot: usize) -> anyhow::Result<()> {
            assert!(self.fence_signaled[slot], "waiting on unsignaled fence of slot {slot}");
            self.calls.push(Call::Wait(slot));
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize) -> anyhow::Result<AcquireOutcome> {
            self.calls.push(Call::Acquire(slot));
            self.acquires.pop_front().unwrap_or_else(|| {
                let image_index = self.next_image;
                self.next_image = (self.next_image + 1) % self.image_count;
                Ok(AcquireOutcome::Acquired {
                    image_index,
                    suboptimal: false,
                })
            })
        }

        fn reset_slot(&mut self, slot: usize) -> anyhow::Result<()> {
            self.fence_signaled[slot] = false;
            self.calls.push(Call::Reset(slot));
            Ok(())
        }

        fn update_uniforms(&mut self, slot: usize) -> anyhow::Result<()> {
            self.calls.push(Call::Uniforms(slot));
            Ok(())
        }

        fn record(&mut self, slot: usize, image_index: u32) -> anyhow::Result<()> {
            assert_eq!(self.recording, None, "two slots recording at once");
            assert!(!self.fence_signaled[slot], "recording without resetting the fence");
            self.recording = Some(slot);
            self.calls.push(Call::Record(slot, image_index));
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> anyhow::Result<()> {
            assert_eq!(self.recording, Some(slot));
            self.recording = None;
            self.fence_signaled[slot] = true;
            self.calls.push(Call::Submit(slot));
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> anyhow::Result<PresentOutcome> {
            self.calls.push(Call::Present(slot, image_index));
            self.presents
                .pop_front()
                .unwrap_or(Ok(PresentOutcome::Optimal))
        }

        fn wait_idle(&mut self) -> anyhow::Result<()> {
            self.calls.push(Call::WaitIdle);
            Ok(())
        }

        fn rebuild_swapchain(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
            self.calls.push(Call::Rebuild(width, height));
            self.rebuild_error.take().map_or(Ok(()), Err)
        }
    }

    /// Window fake: each `wait_events` pops the next size, and a close
    /// request can be scheduled after a number of waits.
    struct FakeWindow {
        size: (u32, u32),
        sizes_after_wait: VecDeque<(u32, u32)>,
        close_after_waits: Option<usize>,
        waits: usize,
        close: bool,
        resized: bool,
    }

    impl FakeWindow {
        fn new(width: u32, height: u32) -> Self {
            Self {
                size: (width, height),
                sizes_after_wait: VecDeque::new(),
                close_after_waits: None,
                waits: 0,
                close: false,
                resized: false,
            }
        }
    }

    impl WindowEvents for FakeWindow {
        fn should_close(&self) -> bool {
            self.close
        }

        fn framebuffer_size(&self) -> (u32, u32) {
            self.size
        }

        fn wait_events(&mut self) {
            self.waits += 1;
            if let Some(size) = self.sizes_after_wait.pop_front() {
                self.size = size;
            }
            if self.close_after_waits == Some(self.waits) {
                self.close = true;
            }
            assert!(self.waits < 100, "wait_events loop never terminated");
        }

        fn take_resized(&mut self) -> bool {
            std::mem::take(&mut self.resized)
        }
    }

    #[test]
    fn frame_index_alternates_between_slots() {
        let mut frames = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);
        let mut backend = FakeBackend::new();
        let mut window = FakeWindow::new(800, 600);

        let mut slots = Vec::new();
        for _ in 0..5 {
            slots.push(frames.current_frame());
            frames.draw_frame(&mut backend, &mut window).unwrap();
        }

        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
        assert_eq!(frames.frame_count(), 5);
        assert_eq!(frames.recreate_count(), 0);
    }

    #[test]
    fn one_cycle_runs_in_order() {
        let mut frames = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);
        let mut backend = FakeBackend::new();
        let mut window = FakeWindow::new(800, 600);

        let outcome = frames.draw_frame(&mut backend, &mut window).unwrap();

        assert_eq!(
            outcome,
            FrameOutcome::Presented {
                image_index: 0,
                recreated: None
            }
        );
        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Uniforms(0),
                Call::Reset(0),
                Call::Record(0, 0),
                Call::Submit(0),
                Call::Present(0, 0),
            ]
        );
        assert_eq!(frames.slot_state(0), Some(SlotState::Idle));
    }

    #[test]
    fn suboptimal_present_recreates_once_per_occurrence() {
        let mut frames = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);
        let mut backend = FakeBackend::new();
        backend.presents.extend([
            Ok(PresentOutcome::Suboptimal),
            Ok(PresentOutcome::Suboptimal),
        ]);
        let mut window = FakeWindow::new(640, 480);

        let mut slots = Vec::new();
        for _ in 0..4 {
            slots.push(frames.current_frame());
            frames.draw_frame(&mut backend, &mut window).unwrap();
        }

        assert_eq!(slots, vec![0, 1, 0, 1]);
        assert_eq!(backend.rebuilds(), vec![Call::Rebuild(640, 480); 2]);
        assert_eq!(frames.recreate_count(), 2);
        assert_eq!(backend.count(|c| *c == Call::WaitIdle), 2);
    }

    #[test]
    fn out_of_date_present_recreates_and_advances() {
        let mut frames = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);
        let mut backend = FakeBackend::new();
        backend.presents.push_back(Ok(PresentOutcome::OutOfDate));
        let mut window = FakeWindow::new(800, 600);

        let outcome = frames.draw_frame(&mut backend, &mut window).unwrap();

        assert_eq!(
            outcome,
            FrameOutcome::Presented {
                image_index: 0,
                recreated: Some(RecreateOutcome::Rebuilt {
                    width: 800,
                    height: 600
                })
            }
        );
        assert_eq!(frames.current_frame(), 1);
    }

    #[test]
    fn out_of_date_acquire_skips_frame_without_resetting_fence() {
        let mut frames = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);
        let mut backend = FakeBackend::new();
        backend.acquires.push_back(Ok(AcquireOutcome::OutOfDate));
        let mut window = FakeWindow::new(800, 600);
        window.resized = true;

        let outcome = frames.draw_frame(&mut backend, &mut window).unwrap();
        assert_eq!(
            outcome,
            FrameOutcome::Skipped(RecreateOutcome::Rebuilt {
                width: 800,
                height: 600
            })
        );
        assert_eq!(frames.current_frame(), 0);
        assert_eq!(frames.frame_count(), 0);
        assert_eq!(backend.count(|c| matches!(c, Call::Reset(_))), 0);
        assert!(!window.resized);

        // The same slot is usable straight away; the fake panics on a
        // wait for a fence that was reset but never submitted.
        frames.draw_frame(&mut backend, &mut window).unwrap();
        assert_eq!(frames.current_frame(), 1);
        assert_eq!(backend.rebuilds().len(), 1);
    }

    #[test]
    fn suboptimal_acquire_still_renders() {
        let mut frames = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);
        let mut backend = FakeBackend::new();
        backend.acquires.push_back(Ok(AcquireOutcome::Acquired {
            image_index: 2,
            suboptimal: true,
        }));
        let mut window = FakeWindow::new(800, 600);

        let outcome = frames.draw_frame(&mut backend, &mut window).unwrap();

        assert_eq!(
            outcome,
            FrameOutcome::Presented {
                image_index: 2,
                recreated: None
            }
        );
        assert!(backend.calls.contains(&Call::Present(0, 2)));
    }

    #[test]
    fn resize_flag_recreates_after_optimal_present() {
        let mut frames = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);
        let mut backend = FakeBackend::new();
        let mut window = FakeWindow::new(1024, 768);
        window.resized = true;

        frames.draw_frame(&mut backend, &mut window).unwrap();
        frames.draw_frame(&mut backend, &mut window).unwrap();

        assert_eq!(backend.rebuilds(), vec![Call::Rebuild(1024, 768)]);
        assert!(!window.resized);
    }

    #[test]
    fn minimized_window_blocks_until_restored() {
        let mut frames = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);
        let mut backend = FakeBackend::new();
        let mut window = FakeWindow::new(0, 0);
        window
            .sizes_after_wait
            .extend([(0, 0), (0, 0), (1280, 720)]);

        let outcome = frames.recreate_swapchain(&mut backend, &mut window).unwrap();

        assert_eq!(
            outcome,
            RecreateOutcome::Rebuilt {
                width: 1280,
                height: 720
            }
        );
        assert_eq!(window.waits, 3);
        assert_eq!(backend.calls, vec![Call::WaitIdle, Call::Rebuild(1280, 720)]);
    }

    #[test]
    fn zero_width_alone_counts_as_minimized() {
        let mut frames = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);
        let mut backend = FakeBackend::new();
        let mut window = FakeWindow::new(0, 600);
        window.sizes_after_wait.push_back((800, 600));

        frames.recreate_swapchain(&mut backend, &mut window).unwrap();

        assert_eq!(window.waits, 1);
        assert_eq!(backend.rebuilds(), vec![Call::Rebuild(800, 600)]);
    }

    #[test]
    fn close_while_minimized_aborts_rebuild() {
        let mut frames = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);
        let mut backend = FakeBackend::new();
        backend.presents.push_back(Ok(PresentOutcome::OutOfDate));
        let mut window = FakeWindow::new(0, 0);
        window.close_after_waits = Some(2);

        let outcome = frames.draw_frame(&mut backend, &mut window).unwrap();

        assert_eq!(
            outcome,
            FrameOutcome::Presented {
                image_index: 0,
                recreated: Some(RecreateOutcome::Aborted)
            }
        );
        assert_eq!(window.waits, 2);
        assert!(backend.rebuilds().is_empty());
        assert_eq!(backend.count(|c| *c == Call::WaitIdle), 0);
        assert_eq!(frames.recreate_count(), 0);
    }

    #[test]
    fn present_failure_is_fatal() {
        let mut frames = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);
        let mut backend = FakeBackend::new();
        backend
            .presents
            .push_back(Err(anyhow::anyhow!("device lost")));
        let mut window = FakeWindow::new(800, 600);

        let err = frames.draw_frame(&mut backend, &mut window).unwrap_err();

        assert!(err.to_string().contains("device lost"));
        assert!(backend.rebuilds().is_empty());
        assert_eq!(frames.frame_count(), 0);
    }

    #[test]
    fn drawable_size_is_returned_immediately_when_visible() {
        let mut window = FakeWindow::new(800, 600);
        assert_eq!(wait_for_drawable_size(&mut window), Some((800, 600)));
        assert_eq!(window.waits, 0);
    }

    #[test]
    fn drawable_size_waits_out_zero_area_or_gives_up_on_close() {
        let mut window = FakeWindow::new(0, 0);
        window.sizes_after_wait.extend([(640, 0), (640, 480)]);
        assert_eq!(wait_for_drawable_size(&mut window), Some((640, 480)));
        assert_eq!(window.waits, 2);

        let mut window = FakeWindow::new(0, 0);
        window.close_after_waits = Some(1);
        assert_eq!(wait_for_drawable_size(&mut window), None);
    }

    #[test]
    fn acquire_failure_is_fatal() {
        let mut frames = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);
        let mut backend = FakeBackend::new();
        backend
            .acquires
            .push_back(Err(anyhow::anyhow!("surface lost")));
        let mut window = FakeWindow::new(800, 600);

        let err = frames.draw_frame(&mut backend, &mut window).unwrap_err();

        assert!(err.to_string().contains("surface lost"));
        assert_eq!(backend.calls, vec![Call::Wait(0), Call::Acquire(0)]);
        assert!(backend.rebuilds().is_empty());
        assert_eq!(frames.current_frame(), 0);
        assert_eq!(frames.frame_count(), 0);
    }

    #[test]
    fn rebuild_failure_is_fatal() {
        let mut frames = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);
        let mut backend = FakeBackend::new();
        backend.acquires.push_back(Ok(AcquireOutcome::OutOfDate));
        backend.rebuild_error = Some(anyhow::anyhow!("format changed"));
        let mut window = FakeWindow::new(800, 600);

        let err = frames.draw_frame(&mut backend, &mut window).unwrap_err();

        assert!(err.to_string().contains("format changed"));
        assert_eq!(backend.rebuilds(), vec![Call::Rebuild(800, 600)]);
        assert_eq!(frames.recreate_count(), 0);
        assert_eq!(frames.frame_count(), 0);
    }

    #[test]
    fn slots_rotate_over_configured_count() {
        let mut frames = FrameLoop::new(3);
        let mut backend = FakeBackend::new();
        backend.fence_signaled = vec![true; 3];
        let mut window = FakeWindow::new(800, 600);

        let mut slots = Vec::new();
        for _ in 0..6 {
            slots.push(frames.current_frame());
            frames.draw_frame(&mut backend, &mut window).unwrap();
        }

        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(frames.frames_in_flight(), 3);
        assert_eq!(frames.slot_state(3), None);
    }
}
