// The present loop: pull the caller's frame, hand it to the active surface.
//
// Each iteration runs the frame supplier, drains the `FrameBox` and, when a
// frame was waiting, presents it. Window backends drive `PresentLoop::run`;
// the GPU window owns its event loop and calls `PresentLoop::step` from
// its repaint callback instead.
//
// Supplier errors end the loop quietly: they mean the source ran dry or the
// caller wants out. Present errors are returned and the loop does not go on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::frame_box::FrameBox;
use crate::types::Frame;

/// Caller callback run once per iteration, usually ending in `FrameBox::put`.
pub type FrameSupplier = Box<dyn FnMut() -> anyhow::Result<()>>;
/// Runs once when the user quits.
pub type TerminationHandler = Box<dyn FnOnce()>;

/// Input a surface reports between frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// q, Escape or Ctrl-C.
    QuitKey,
    Closed,
    Resized { width: u32, height: u32 },
}

/// A place to show frames. Exactly one is active per viewer run.
pub trait Surface {
    fn present(&mut self, frame: &Frame) -> Result<()>;

    fn resize(&mut self, width: u32, height: u32);

    /// Next pending input event, if any. Never blocks.
    fn poll_event(&mut self) -> Option<SurfaceEvent> {
        None
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    UserQuit,
    WindowClosed,
    /// The supplier returned an error; carries its message.
    SupplierStopped(String),
    /// The watched controlling thread finished.
    ControllerExited,
    /// A [`StopHandle`] asked the loop to end.
    Stopped,
}

/// Outcome of a single iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Presented,
    Idle,
    Terminated(ExitReason),
}

/// Cooperative stop flag, observed at the start of the next iteration.
#[derive(Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Keeps presents at least `interval` apart, measured from the previous call
/// to `wait`. Advisory only; jitter is fine.
pub struct Pacer {
    interval: Duration,
    last: Instant,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: Instant::now() }
    }

    /// Time still to wait before the next iteration may start.
    pub fn residual(&self, now: Instant) -> Duration {
        self.interval.saturating_sub(now.duration_since(self.last))
    }

    pub fn wait(&mut self) {
        let residual = self.residual(Instant::now());
        if !residual.is_zero() {
            thread::sleep(residual);
        }
        self.last = Instant::now();
    }
}

/// Frames presented and idle iterations, reported once per second.
pub struct Throughput {
    label: &'static str,
    frames: u32,
    idle: u32,
    since: Instant,
}

impl Throughput {
    pub fn new(label: &'static str) -> Self {
        Self { label, frames: 0, idle: 0, since: Instant::now() }
    }

    /// Count one iteration; returns the frame rate when a second has elapsed.
    pub fn record(&mut self, presented: bool, now: Instant) -> Option<f32> {
        if presented {
            self.frames += 1;
        } else {
            self.idle += 1;
        }
        let elapsed = now.duration_since(self.since);
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        log::debug!("[{}] FPS: {:.1} (idle {})", self.label, fps, self.idle);
        self.frames = 0;
        self.idle = 0;
        self.since = now;
        Some(fps)
    }
}

pub struct PresentLoop {
    frames: FrameBox,
    supplier: Option<FrameSupplier>,
    on_terminate: Option<TerminationHandler>,
    stop: StopHandle,
    watched: Option<JoinHandle<()>>,
    interval: Duration,
    pacer: Pacer,
    throughput: Throughput,
    finished: Option<ExitReason>,
}

impl PresentLoop {
    pub fn new(frames: FrameBox, interval: Duration, label: &'static str) -> Self {
        Self {
            frames,
            supplier: None,
            on_terminate: None,
            stop: StopHandle::default(),
            watched: None,
            interval,
            pacer: Pacer::new(interval),
            throughput: Throughput::new(label),
            finished: None,
        }
    }

    pub fn with_supplier(mut self, supplier: Option<FrameSupplier>) -> Self {
        self.supplier = supplier;
        self
    }

    pub fn with_termination_handler(mut self, handler: Option<TerminationHandler>) -> Self {
        self.on_terminate = handler;
        self
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_watched_thread(mut self, handle: Option<JoinHandle<()>>) -> Self {
        self.watched = handle;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one iteration against `surface`.
    pub fn step(&mut self, surface: &mut dyn Surface) -> Result<Step> {
        if let Some(reason) = &self.finished {
            return Ok(Step::Terminated(reason.clone()));
        }

        if let Some(reason) = self.check_external_stop() {
            return Ok(self.terminate(reason));
        }

        while let Some(event) = surface.poll_event() {
            match event {
                SurfaceEvent::QuitKey => return Ok(self.terminate(ExitReason::UserQuit)),
                SurfaceEvent::Closed => return Ok(self.terminate(ExitReason::WindowClosed)),
                SurfaceEvent::Resized { width, height } => surface.resize(width, height),
            }
        }

        if let Some(supplier) = self.supplier.as_mut() {
            if let Err(e) = supplier() {
                log::info!("frame supplier stopped: {e:#}");
                return Ok(self.terminate(ExitReason::SupplierStopped(format!("{e:#}"))));
            }
        }

        let Some(frame) = self.frames.take_and_clear() else {
            self.throughput.record(false, Instant::now());
            return Ok(Step::Idle);
        };

        self.pacer.wait();
        if let Err(e) = surface.present(&frame) {
            log::error!(
                "present failed for {}x{} frame ({} bytes): {e}",
                frame.width,
                frame.height,
                frame.data.len()
            );
            return Err(e);
        }
        self.throughput.record(true, Instant::now());
        Ok(Step::Presented)
    }

    /// Drive `surface` until the loop terminates or a present fails.
    pub fn run(&mut self, surface: &mut dyn Surface) -> Result<ExitReason> {
        loop {
            match self.step(surface)? {
                Step::Presented => {}
                Step::Idle => thread::sleep(self.interval),
                Step::Terminated(reason) => return Ok(reason),
            }
        }
    }

    /// End the loop from outside an iteration, e.g. when the host window is
    /// already gone. Returns the reason the loop actually ended with.
    pub fn finish(&mut self, reason: ExitReason) -> ExitReason {
        if let Some(done) = &self.finished {
            return done.clone();
        }
        self.terminate(reason.clone());
        reason
    }

    fn check_external_stop(&self) -> Option<ExitReason> {
        if self.stop.is_stopped() {
            return Some(ExitReason::Stopped);
        }
        match &self.watched {
            Some(handle) if handle.is_finished() => Some(ExitReason::ControllerExited),
            _ => None,
        }
    }

    fn terminate(&mut self, reason: ExitReason) -> Step {
        if matches!(reason, ExitReason::UserQuit | ExitReason::WindowClosed) {
            if let Some(handler) = self.on_terminate.take() {
                log::info!("calling termination handler");
                handler();
            }
        }
        self.finished = Some(reason.clone());
        Step::Terminated(reason)
    }
}
