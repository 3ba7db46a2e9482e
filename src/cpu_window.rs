// CPU fallback window: frames are letterboxed into a black software canvas and
// pushed to a minifb window. Used when there is a window system but no usable
// GPU path (remote X display, --cpu).

use std::collections::VecDeque;

use image::imageops::{self, FilterType};
use minifb::{Key, KeyRepeat, ScaleMode, Window, WindowOptions};

use crate::config::ViewerConfig;
use crate::error::{Error, Result};
use crate::fit::fit_pixels;
use crate::present::{Surface, SurfaceEvent};
use crate::types::{Frame, FrameBuffer, pack_rgb};

pub struct CpuWindow {
    window: Window,
    fullscreen: bool,
    width: u32,
    height: u32,
    canvas: FrameBuffer, // window-sized composite, reused every frame
    raw: FrameBuffer,    // fullscreen path: the frame itself, packed
    events: VecDeque<SurfaceEvent>,
    collected: bool,
    pumped: bool,
}

impl CpuWindow {
    /// Open the window at the configured position and size.
    pub fn new(config: &ViewerConfig) -> Result<Self> {
        let options = WindowOptions {
            borderless: config.fullscreen,
            topmost: config.fullscreen,
            resize: true,
            scale_mode: if config.fullscreen {
                ScaleMode::AspectRatioStretch
            } else {
                ScaleMode::UpperLeft
            },
            ..WindowOptions::default()
        };
        let (w, h) = (config.width.max(1), config.height.max(1));
        let mut window = Window::new(&config.window_name, w as usize, h as usize, options)
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        window.set_position(config.x as isize, config.y as isize);
        // pacing is the present loop's job
        window.set_target_fps(0);

        Ok(Self {
            window,
            fullscreen: config.fullscreen,
            width: w,
            height: h,
            canvas: FrameBuffer::new(w as usize, h as usize),
            raw: FrameBuffer::new(0, 0),
            events: VecDeque::new(),
            collected: false,
            pumped: false,
        })
    }

    fn collect_events(&mut self) {
        // Without a present this iteration nobody has pumped the event queue.
        if !self.pumped {
            self.window.update();
        }
        self.pumped = false;

        if !self.window.is_open() {
            self.events.push_back(SurfaceEvent::Closed);
            return;
        }
        if quit_pressed(&self.window) {
            self.events.push_back(SurfaceEvent::QuitKey);
            return;
        }
        let (w, h) = self.window.get_size();
        let (w, h) = (w as u32, h as u32);
        if w > 0 && h > 0 && (w, h) != (self.width, self.height) {
            self.events.push_back(SurfaceEvent::Resized { width: w, height: h });
        }
    }
}

impl Surface for CpuWindow {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        let buffer = if self.fullscreen {
            pack_frame(frame, &mut self.raw)?;
            &self.raw
        } else {
            self.canvas.resize(self.width as usize, self.height as usize);
            composite(frame, &mut self.canvas)?;
            &self.canvas
        };
        self.window
            .update_with_buffer(&buffer.pixels, buffer.width, buffer.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))?;
        self.pumped = true;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        log::debug!("cpu window resized to {width}x{height}");
        self.width = width;
        self.height = height;
    }

    fn poll_event(&mut self) -> Option<SurfaceEvent> {
        if !self.collected {
            self.collect_events();
            self.collected = true;
        }
        let event = self.events.pop_front();
        if event.is_none() {
            self.collected = false;
        }
        event
    }
}

fn quit_pressed(window: &Window) -> bool {
    let ctrl = window.is_key_down(Key::LeftCtrl) || window.is_key_down(Key::RightCtrl);
    window.is_key_pressed(Key::Q, KeyRepeat::No)
        || window.is_key_pressed(Key::Escape, KeyRepeat::No)
        || (ctrl && window.is_key_pressed(Key::C, KeyRepeat::No))
}

/// Clear `canvas` to black and draw `frame` into it, scaled to fit and centered.
pub fn composite(frame: &Frame, canvas: &mut FrameBuffer) -> Result<()> {
    let view = frame.view()?;
    canvas.clear();
    if canvas.width == 0 || canvas.height == 0 {
        return Ok(());
    }
    let place = fit_pixels(
        (frame.width, frame.height),
        (canvas.width as u32, canvas.height as u32),
    );
    let scaled = imageops::resize(&view, place.width, place.height, FilterType::Triangle);

    for (sx, sy, px) in scaled.enumerate_pixels() {
        let idx = (place.y + sy) as usize * canvas.width + (place.x + sx) as usize;
        canvas.pixels[idx] = pack_rgb(px[0], px[1], px[2]);
    }
    Ok(())
}

/// Pack the frame as-is into `out` (no scaling).
pub fn pack_frame(frame: &Frame, out: &mut FrameBuffer) -> Result<()> {
    frame.validate()?;
    out.resize(frame.width as usize, frame.height as usize);
    for (dst, src) in out.pixels.iter_mut().zip(frame.data.chunks_exact(Frame::CHANNELS)) {
        *dst = pack_rgb(src[0], src[1], src[2]);
    }
    Ok(())
}
