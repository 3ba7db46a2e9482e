// Caller-facing viewer: configure it, register callbacks, then `run`.

use std::thread::JoinHandle;

use crate::backend::{self, Backend, Environment};
use crate::config::{ConfigOverrides, ViewerConfig};
use crate::cpu_window::CpuWindow;
use crate::error::Result;
use crate::frame_box::FrameBox;
use crate::headless::HeadlessSink;
use crate::present::{
    ExitReason, FrameSupplier, PresentLoop, StopHandle, Surface, TerminationHandler,
};
use crate::types::Frame;

/// Typical use:
///
/// ```no_run
/// use glview::{Frame, Viewer, ViewerConfig};
///
/// let mut viewer = Viewer::new(ViewerConfig::default());
/// let frames = viewer.frame_box();
/// let mut n = 0u8;
/// viewer.set_frame_supplier(move || {
///     n = n.wrapping_add(1);
///     frames.put(Frame::solid(320, 240, [n, 0, 255 - n]));
///     Ok(())
/// });
/// viewer.set_termination_handler(|| println!("bye"));
/// let reason = viewer.run()?;
/// println!("viewer ended: {reason:?}");
/// # Ok::<(), glview::Error>(())
/// ```
pub struct Viewer {
    config: ViewerConfig,
    frames: FrameBox,
    supplier: Option<FrameSupplier>,
    on_terminate: Option<TerminationHandler>,
    stop: StopHandle,
    watched: Option<JoinHandle<()>>,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            frames: FrameBox::new(),
            supplier: None,
            on_terminate: None,
            stop: StopHandle::default(),
            watched: None,
        }
    }

    /// Defaults (or `glview.toml` when `GLVIEW_CONFIG` is set) plus `overrides`.
    pub fn from_env(overrides: &ConfigOverrides) -> Result<Self> {
        Ok(Self::new(ViewerConfig::load()?.with_overrides(overrides)))
    }

    pub fn configure(&mut self, overrides: &ConfigOverrides) {
        self.config.apply(overrides);
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Called with no arguments once per loop iteration, before the frame box
    /// is drained. Returning an error ends the run.
    pub fn set_frame_supplier<F>(&mut self, supplier: F)
    where
        F: FnMut() -> anyhow::Result<()> + 'static,
    {
        self.supplier = Some(Box::new(supplier));
    }

    /// A handle to the frame slot, for suppliers and other threads.
    pub fn frame_box(&self) -> FrameBox {
        self.frames.clone()
    }

    /// Only the last frame set before the next drain is shown.
    pub fn set_frame(&self, frame: Frame) {
        self.frames.put(frame);
    }

    /// Runs once when the user quits (quit key or closing the window).
    pub fn set_termination_handler<F>(&mut self, handler: F)
    where
        F: FnOnce() + 'static,
    {
        self.on_terminate = Some(Box::new(handler));
    }

    /// End the run once `handle`'s thread has finished.
    pub fn watch_thread(&mut self, handle: JoinHandle<()>) {
        self.watched = Some(handle);
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The backend `run` would pick right now.
    pub fn backend(&self) -> Backend {
        backend::select(&Environment::from_env(self.config.cpu))
    }

    /// Apply loop-start overrides, then [`Viewer::run`].
    pub fn run_with(mut self, overrides: &ConfigOverrides) -> Result<ExitReason> {
        self.configure(overrides);
        self.run()
    }

    /// Pick a backend and present until the loop ends. Blocks.
    pub fn run(self) -> Result<ExitReason> {
        let backend = self.backend();
        log::info!("presenting with the {backend} backend");
        match backend {
            #[cfg(feature = "gpu")]
            Backend::GpuWindow => {
                let config = self.config.clone();
                crate::gpu_window::run(&config, self.into_loop(backend.label()))
            }
            #[cfg(not(feature = "gpu"))]
            Backend::GpuWindow => Err(crate::error::Error::GpuInit(
                "built without the `gpu` feature".into(),
            )),
            Backend::CpuWindow => {
                log::warn!("GPU or physical display is not available, using the CPU renderer");
                let mut window = CpuWindow::new(&self.config)?;
                self.into_loop(backend.label()).run(&mut window)
            }
            Backend::HeadlessSink => {
                let mut sink = HeadlessSink::start(&self.config)?;
                let result = self.into_loop(backend.label()).run(&mut sink);
                sink.stop();
                result
            }
        }
    }

    /// Present on a caller-provided surface instead of a selected backend.
    pub fn run_on(self, surface: &mut dyn Surface) -> Result<ExitReason> {
        self.into_loop("custom").run(surface)
    }

    fn into_loop(self, label: &'static str) -> PresentLoop {
        PresentLoop::new(self.frames, self.config.frame_interval(), label)
            .with_supplier(self.supplier)
            .with_termination_handler(self.on_terminate)
            .with_stop_handle(self.stop)
            .with_watched_thread(self.watched)
    }
}
