// Terminal output for machines with no window system at all.
//
// `HeadlessSink` hands frames to a background renderer thread through a
// one-slot channel. If the renderer is still busy with the previous frame the
// new one is dropped, so the present loop never waits on the terminal.

use std::io::{self, Write};
use std::thread::{self, JoinHandle};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use crossbeam_channel::{Sender, TrySendError};
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};

use crate::config::{TerminalProtocol, ViewerConfig};
use crate::error::{Error, Result};
use crate::present::Surface;
use crate::types::Frame;

const CURSOR_HOME: &str = "\x1b[H";
const CLEAR_SCREEN: &str = "\x1b[2J";
const KITTY_CHUNK: usize = 4096;

/// Background thread that draws frames into a terminal.
pub struct TerminalRenderer {
    tx: Option<Sender<Frame>>,
    worker: Option<JoinHandle<()>>,
}

impl TerminalRenderer {
    /// Spawn the renderer writing to stdout.
    pub fn start(protocol: TerminalProtocol, columns: u32) -> Result<Self> {
        Self::start_with(protocol, columns, io::stdout())
    }

    pub fn start_with<W>(protocol: TerminalProtocol, columns: u32, mut out: W) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded::<Frame>(1);
        let worker = thread::Builder::new()
            .name("glview-terminal".into())
            .spawn(move || {
                if let Err(e) = write!(out, "{CLEAR_SCREEN}") {
                    log::warn!("terminal renderer: {e}");
                    return;
                }
                for frame in rx {
                    if let Err(e) = draw(&mut out, &frame, protocol, columns) {
                        log::warn!("terminal renderer stopped: {e}");
                        return;
                    }
                }
            })?;
        log::debug!("terminal renderer started ({protocol:?}, {columns} columns)");
        Ok(Self { tx: Some(tx), worker: Some(worker) })
    }

    /// Queue a frame. Returns `false` when the slot was busy and it was dropped.
    pub fn offer(&self, frame: Frame) -> Result<bool> {
        let Some(tx) = &self.tx else {
            return Err(Error::Headless("renderer already stopped".into()));
        };
        match tx.try_send(frame) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => {
                Err(Error::Headless("renderer thread exited".into()))
            }
        }
    }

    /// Close the channel and wait for the worker to finish its current frame.
    pub fn stop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("terminal renderer panicked");
            }
        }
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct HeadlessSink {
    renderer: TerminalRenderer,
    dropped: u64,
}

impl HeadlessSink {
    pub fn start(config: &ViewerConfig) -> Result<Self> {
        log::warn!("no display available, rendering frames to the terminal");
        let renderer = TerminalRenderer::start(config.terminal, config.terminal_columns)?;
        Ok(Self { renderer, dropped: 0 })
    }

    pub fn with_renderer(renderer: TerminalRenderer) -> Self {
        Self { renderer, dropped: 0 }
    }

    /// Frames skipped because the renderer was busy.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn stop(&mut self) {
        self.renderer.stop();
    }
}

impl Surface for HeadlessSink {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        frame.validate()?;
        if !self.renderer.offer(frame.clone())? {
            self.dropped += 1;
            log::trace!("terminal busy, dropped frame ({} so far)", self.dropped);
        }
        Ok(())
    }

    fn resize(&mut self, _width: u32, _height: u32) {}
}

fn draw(
    out: &mut impl Write,
    frame: &Frame,
    protocol: TerminalProtocol,
    columns: u32,
) -> Result<()> {
    let encoded = encode(frame, protocol, columns)?;
    out.write_all(encoded.as_bytes())?;
    out.flush()?;
    Ok(())
}

/// Encode one frame as a terminal escape sequence, cursor homed first.
pub fn encode(frame: &Frame, protocol: TerminalProtocol, columns: u32) -> Result<String> {
    match protocol {
        TerminalProtocol::HalfBlock => encode_half_block(frame, columns),
        TerminalProtocol::Iterm2 => encode_iterm2(frame, columns),
        TerminalProtocol::Kitty => encode_kitty(frame, columns),
    }
}

/// Scale the frame to `columns` pixels wide, keeping its aspect.
fn scale_to_columns(frame: &Frame, columns: u32) -> Result<RgbImage> {
    let view = frame.view()?;
    let cols = columns.clamp(1, frame.width.max(1));
    let rows = ((frame.height as u64 * cols as u64) / frame.width as u64).max(1) as u32;
    Ok(imageops::resize(&view, cols, rows, FilterType::Triangle))
}

/// Truecolor ANSI: each text cell is '▀' with the upper pixel as foreground
/// and the lower pixel as background.
pub fn encode_half_block(frame: &Frame, columns: u32) -> Result<String> {
    let img = scale_to_columns(frame, columns)?;
    let (w, h) = img.dimensions();
    let mut out = String::with_capacity((w * h) as usize * 20);
    out.push_str(CURSOR_HOME);
    for y in (0..h).step_by(2) {
        for x in 0..w {
            let top = img.get_pixel(x, y);
            out.push_str(&format!("\x1b[38;2;{};{};{}m", top[0], top[1], top[2]));
            if y + 1 < h {
                let bottom = img.get_pixel(x, y + 1);
                out.push_str(&format!("\x1b[48;2;{};{};{}m", bottom[0], bottom[1], bottom[2]));
            } else {
                out.push_str("\x1b[49m");
            }
            out.push('▀');
        }
        out.push_str("\x1b[0m\r\n");
    }
    Ok(out)
}

fn png_base64(img: &RgbImage) -> Result<String> {
    let mut png = io::Cursor::new(Vec::new());
    img.write_to(&mut png, ImageFormat::Png)
        .map_err(|e| Error::Headless(format!("png encode: {e}")))?;
    Ok(BASE64.encode(png.into_inner()))
}

/// iTerm2 inline image (OSC 1337).
pub fn encode_iterm2(frame: &Frame, columns: u32) -> Result<String> {
    let img = scale_to_columns(frame, columns.saturating_mul(8))?;
    let data = png_base64(&img)?;
    Ok(format!(
        "{CURSOR_HOME}\x1b]1337;File=inline=1;width={columns};preserveAspectRatio=1:{data}\x07"
    ))
}

/// Kitty graphics protocol: transmit-and-display PNG, split into 4096-byte chunks.
pub fn encode_kitty(frame: &Frame, columns: u32) -> Result<String> {
    let img = scale_to_columns(frame, columns.saturating_mul(8))?;
    let data = png_base64(&img)?;
    let chunks: Vec<&[u8]> = data.as_bytes().chunks(KITTY_CHUNK).collect();
    let mut out = String::with_capacity(data.len() + chunks.len() * 32);
    out.push_str(CURSOR_HOME);
    for (i, chunk) in chunks.iter().enumerate() {
        let more = u8::from(i + 1 < chunks.len());
        // chunks of base64 are plain ASCII
        let chunk = std::str::from_utf8(chunk).unwrap_or_default();
        if i == 0 {
            out.push_str(&format!("\x1b_Ga=T,f=100,c={columns},q=2,m={more};{chunk}\x1b\\"));
        } else {
            out.push_str(&format!("\x1b_Gm={more};{chunk}\x1b\\"));
        }
    }
    Ok(out)
}
