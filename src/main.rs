// Demo viewer: shows the default camera, or an animated test pattern when no
// camera can be opened.
// • q / ESC / Ctrl-C quits.
// • Set GLVIEW_CONFIG=1 to read (or create) glview.toml for window settings.
// • DEBUG=1 prints the once-per-second FPS line.

#[cfg(any(target_os = "windows", target_os = "macos", target_os = "linux"))]
mod camera;

use std::process::ExitCode;

use glview::config::truthy;
use glview::{ConfigOverrides, Error, ExitReason, Frame, Viewer};

/// Status for a run that ended in an error (present failure, bad config...).
const FAILURE_STATUS: u8 = 9;

fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(reason) => {
            log::info!("viewer ended: {reason:?}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(FAILURE_STATUS)
        }
    }
}

/// RUST_LOG wins; otherwise `info`, or `debug` when DEBUG is truthy.
fn init_logging() {
    let debug = std::env::var("DEBUG").is_ok_and(|v| truthy(&v));
    let default = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn run() -> Result<ExitReason, Error> {
    let mut viewer = Viewer::from_env(&ConfigOverrides::default())?;
    let frames = viewer.frame_box();

    match open_camera() {
        Ok(mut source) => {
            viewer.set_frame_supplier(move || {
                frames.put(source()?);
                Ok(())
            });
        }
        Err(e) => {
            log::warn!("{e}; showing a test pattern instead");
            let mut pattern = TestPattern::new(640, 360);
            viewer.set_frame_supplier(move || {
                frames.put(pattern.next_frame());
                Ok(())
            });
        }
    }

    viewer.set_termination_handler(|| log::info!("quit requested"));
    viewer.run()
}

#[cfg(any(target_os = "windows", target_os = "macos", target_os = "linux"))]
fn open_camera() -> Result<impl FnMut() -> Result<Frame, Error>, Error> {
    let mut cam = camera::CameraCapture::new(0, 640, 480)?;
    let (w, h) = cam.resolution();
    log::info!("camera opened at {w}x{h}");
    Ok(move || cam.next_frame())
}

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
fn open_camera() -> Result<fn() -> Result<Frame, Error>, Error> {
    Err(Error::CameraInit("no camera backend for this platform".into()))
}

/// Diagonal color bands scrolling one pixel per frame.
struct TestPattern {
    width: u32,
    height: u32,
    tick: u32,
}

impl TestPattern {
    fn new(width: u32, height: u32) -> Self {
        Self { width, height, tick: 0 }
    }

    fn next_frame(&mut self) -> Frame {
        self.tick = self.tick.wrapping_add(1);
        let mut data = Vec::with_capacity((self.width * self.height) as usize * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                let t = x.wrapping_add(y).wrapping_add(self.tick);
                data.extend_from_slice(&[
                    (t % 256) as u8,
                    ((x * 255) / self.width.max(1)) as u8,
                    ((y * 255) / self.height.max(1)) as u8,
                ]);
            }
        }
        Frame::new(self.width, self.height, data)
    }
}
