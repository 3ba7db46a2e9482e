// Direct GPU presentation: eframe owns the window and GL context, every
// presented frame is re-uploaded in full and drawn as one textured quad,
// scaled to keep its aspect ratio.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use eframe::egui_glow;
use eframe::glow::{self, HasContext};

use crate::config::ViewerConfig;
use crate::error::{Error, Result};
use crate::fit::{QuadExtent, fit_quad};
use crate::present::{ExitReason, PresentLoop, Step, Surface, SurfaceEvent};
use crate::types::Frame;

const VS_330: &str = r#"#version 330 core
layout(location = 0) in vec2 a_pos;
layout(location = 1) in vec2 a_uv;
out vec2 v_uv;
void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_pos, 0.0, 1.0);
}
"#;

const FS_330: &str = r#"#version 330 core
in vec2 v_uv;
uniform sampler2D u_tex;
out vec4 o_color;
void main() {
    o_color = vec4(texture(u_tex, v_uv).rgb, 1.0);
}
"#;

/// A frame waiting to be uploaded on the next paint.
struct Upload {
    width: u32,
    height: u32,
    bytes: Vec<u8>,
}

/// GL objects plus the state the paint callback needs.
pub struct QuadRenderer {
    program: glow::NativeProgram,
    vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
    tex: glow::NativeTexture,
    pending: Option<Upload>,
    image_size: Option<(u32, u32)>,
    window_size: (u32, u32),
    fixed_viewport: Option<[i32; 2]>,
    resize_viewport: bool,
    rgba: bool,
    double_buffer: bool,
}

impl QuadRenderer {
    /// # Safety
    /// `gl` must be the current context.
    pub unsafe fn new(gl: &glow::Context, config: &ViewerConfig) -> Result<Self> {
        unsafe {
            let tex = gl.create_texture().map_err(Error::GpuInit)?;
            gl.bind_texture(glow::TEXTURE_2D, Some(tex));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);

            let program = compile_program(gl, VS_330, FS_330)?;
            gl.use_program(Some(program));
            if let Some(u_tex) = gl.get_uniform_location(program, "u_tex") {
                gl.uniform_1_i32(Some(&u_tex), 0);
            }

            // vec2 pos, vec2 uv; 4 vertices as a triangle strip, rewritten per draw
            let vao = gl.create_vertex_array().map_err(Error::GpuInit)?;
            let vbo = gl.create_buffer().map_err(Error::GpuInit)?;
            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_size(glow::ARRAY_BUFFER, 4 * 4 * 4, glow::DYNAMIC_DRAW);
            let stride = 4 * 4;
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, stride, 2 * 4);
            gl.bind_vertex_array(None);
            gl.use_program(None);

            Ok(Self {
                program,
                vao,
                vbo,
                tex,
                pending: None,
                image_size: None,
                window_size: (config.width.max(1), config.height.max(1)),
                fixed_viewport: None,
                resize_viewport: config.resize_viewport,
                rgba: config.rgba_buffer,
                double_buffer: config.double_buffer,
            })
        }
    }

    fn stage(&mut self, frame: &Frame) {
        self.pending = Some(Upload {
            width: frame.width,
            height: frame.height,
            bytes: upload_bytes(frame, self.rgba),
        });
    }

    fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_size = (width.max(1), height.max(1));
    }

    /// # Safety
    /// Called from an egui_glow paint callback with `gl` current.
    unsafe fn paint(&mut self, gl: &glow::Context, info: &egui::PaintCallbackInfo) {
        unsafe {
            let vp = info.viewport_in_pixels();
            let fixed = *self.fixed_viewport.get_or_insert([vp.width_px, vp.height_px]);
            if self.resize_viewport {
                gl.viewport(vp.left_px, vp.from_bottom_px, vp.width_px, vp.height_px);
            } else {
                gl.viewport(0, 0, fixed[0], fixed[1]);
            }

            gl.clear_color(0.0, 0.0, 0.0, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);

            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(self.tex));
            if let Some(up) = self.pending.take() {
                let format = if self.rgba { glow::RGBA } else { glow::RGB };
                // rows of RGB8 are not 4-byte aligned in general
                gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    format as i32,
                    up.width as i32,
                    up.height as i32,
                    0,
                    format,
                    glow::UNSIGNED_BYTE,
                    glow::PixelUnpackData::Slice(Some(&up.bytes)),
                );
                self.image_size = Some((up.width, up.height));
            }
            let Some(image_size) = self.image_size else {
                return;
            };

            let extent = fit_quad(image_size, self.window_size);
            let verts = quad_vertices(extent);
            gl.use_program(Some(self.program));
            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, 0, bytemuck::cast_slice(&verts));
            gl.disable(glow::BLEND);
            gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
            gl.bind_vertex_array(None);
            gl.use_program(None);

            gl.flush();
            if !self.double_buffer {
                gl.finish();
            }
        }
    }

    /// # Safety
    /// `gl` must be the context the objects were created on.
    unsafe fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_texture(self.tex);
            gl.delete_buffer(self.vbo);
            gl.delete_vertex_array(self.vao);
            gl.delete_program(self.program);
        }
    }
}

/// Texture bytes for one frame: RGB8 as-is, or RGBA8 with opaque alpha.
pub fn upload_bytes(frame: &Frame, rgba: bool) -> Vec<u8> {
    if !rgba {
        return frame.data.clone();
    }
    let mut out = Vec::with_capacity(frame.data.len() / 3 * 4);
    for px in frame.data.chunks_exact(Frame::CHANNELS) {
        out.extend_from_slice(&[px[0], px[1], px[2], 0xFF]);
    }
    out
}

/// Triangle strip (x, y, u, v) for a centered quad; v=0 is the image's top row.
pub fn quad_vertices(extent: QuadExtent) -> [f32; 16] {
    let (x, y) = (extent.x_ratio, extent.y_ratio);
    [
        -x, -y, 0.0, 1.0, //
        x, -y, 1.0, 1.0, //
        -x, y, 0.0, 0.0, //
        x, y, 1.0, 0.0,
    ]
}

unsafe fn compile_program(
    gl: &glow::Context,
    vs_src: &str,
    fs_src: &str,
) -> Result<glow::NativeProgram> {
    unsafe {
        let vs = gl.create_shader(glow::VERTEX_SHADER).map_err(Error::GpuInit)?;
        gl.shader_source(vs, vs_src);
        gl.compile_shader(vs);
        if !gl.get_shader_compile_status(vs) {
            return Err(Error::GpuInit(format!(
                "vertex shader: {}",
                gl.get_shader_info_log(vs)
            )));
        }

        let fs = gl.create_shader(glow::FRAGMENT_SHADER).map_err(Error::GpuInit)?;
        gl.shader_source(fs, fs_src);
        gl.compile_shader(fs);
        if !gl.get_shader_compile_status(fs) {
            return Err(Error::GpuInit(format!(
                "fragment shader: {}",
                gl.get_shader_info_log(fs)
            )));
        }

        let program = gl.create_program().map_err(Error::GpuInit)?;
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);
        if !gl.get_program_link_status(program) {
            return Err(Error::GpuInit(format!(
                "program link: {}",
                gl.get_program_info_log(program)
            )));
        }
        gl.delete_shader(vs);
        gl.delete_shader(fs);
        Ok(program)
    }
}

/// The loop-facing side of the GPU window: stages frames for the next paint.
pub struct GpuSurface {
    renderer: Arc<Mutex<QuadRenderer>>,
    events: VecDeque<SurfaceEvent>,
    size: (u32, u32),
}

impl GpuSurface {
    fn renderer(&self) -> std::sync::MutexGuard<'_, QuadRenderer> {
        self.renderer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Surface for GpuSurface {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        frame.validate()?;
        self.renderer().stage(frame);
        Ok(())
    }

    /// Records the new size for quad scaling. The GL viewport only follows
    /// when `resize_viewport` is set.
    fn resize(&mut self, width: u32, height: u32) {
        log::debug!("gpu window resized to {width}x{height}");
        self.size = (width, height);
        self.renderer().set_window_size(width, height);
    }

    fn poll_event(&mut self) -> Option<SurfaceEvent> {
        self.events.pop_front()
    }
}

type Outcome = Rc<RefCell<Option<Result<ExitReason>>>>;

struct GpuApp {
    present: Rc<RefCell<PresentLoop>>,
    surface: GpuSurface,
    outcome: Outcome,
}

impl GpuApp {
    fn collect_events(&mut self, ctx: &egui::Context) {
        let (close, quit, inner) = ctx.input(|i| {
            let ctrl_c = i.modifiers.ctrl && i.key_pressed(egui::Key::C);
            let quit = i.key_pressed(egui::Key::Q) || i.key_pressed(egui::Key::Escape) || ctrl_c;
            let inner = i.viewport().inner_rect.map(|r| {
                let px = r.size() * i.pixels_per_point;
                (px.x.round() as u32, px.y.round() as u32)
            });
            (i.viewport().close_requested(), quit, inner)
        });
        if close {
            self.surface.events.push_back(SurfaceEvent::Closed);
        } else if quit {
            self.surface.events.push_back(SurfaceEvent::QuitKey);
        }
        if let Some((w, h)) = inner {
            if w > 0 && h > 0 && (w, h) != self.surface.size {
                self.surface.events.push_back(SurfaceEvent::Resized { width: w, height: h });
            }
        }
    }

    fn finish(&mut self, ctx: &egui::Context, outcome: Result<ExitReason>) {
        *self.outcome.borrow_mut() = Some(outcome);
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }
}

impl eframe::App for GpuApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.outcome.borrow().is_some() {
            return;
        }
        self.collect_events(ctx);

        let step = self.present.borrow_mut().step(&mut self.surface);
        match step {
            Ok(Step::Presented) => ctx.request_repaint(),
            Ok(Step::Idle) => {
                let interval = self.present.borrow().interval();
                ctx.request_repaint_after(interval);
            }
            Ok(Step::Terminated(reason)) => self.finish(ctx, Ok(reason)),
            Err(e) => self.finish(ctx, Err(e)),
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let renderer = Arc::clone(&self.surface.renderer);
                let callback = egui_glow::CallbackFn::new(move |info, painter| {
                    let mut r = renderer.lock().unwrap_or_else(PoisonError::into_inner);
                    unsafe { r.paint(painter.gl(), &info) };
                });
                ui.painter().add(egui::PaintCallback {
                    rect: ui.max_rect(),
                    callback: Arc::new(callback),
                });
            });
    }

    fn on_exit(&mut self, gl: Option<&glow::Context>) {
        if let Some(gl) = gl {
            let r = self.surface.renderer();
            unsafe { r.destroy(gl) };
        }
    }
}

/// Open the GPU window and drive `present` from its repaint loop until it ends.
pub fn run(config: &ViewerConfig, present: PresentLoop) -> Result<ExitReason> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(config.window_name.clone())
            .with_inner_size([config.width as f32, config.height as f32])
            .with_position([config.x as f32, config.y as f32])
            .with_fullscreen(config.fullscreen),
        vsync: config.vsync,
        depth_buffer: 24,
        renderer: eframe::Renderer::Glow,
        ..Default::default()
    };

    let present = Rc::new(RefCell::new(present));
    let outcome: Outcome = Rc::new(RefCell::new(None));
    let app_present = Rc::clone(&present);
    let app_outcome = Rc::clone(&outcome);
    let app_config = config.clone();

    eframe::run_native(
        &config.window_name,
        options,
        Box::new(move |cc| {
            let gl = cc
                .gl
                .as_ref()
                .ok_or_else(|| Error::GpuInit("no glow context".into()))?;
            let renderer = unsafe { QuadRenderer::new(gl, &app_config)? };
            log::info!("Use GPU directly");
            Ok(Box::new(GpuApp {
                present: app_present,
                surface: GpuSurface {
                    renderer: Arc::new(Mutex::new(renderer)),
                    events: VecDeque::new(),
                    size: (app_config.width, app_config.height),
                },
                outcome: app_outcome,
            }))
        }),
    )
    .map_err(|e| Error::GpuInit(e.to_string()))?;

    let finished = outcome.borrow_mut().take();
    match finished {
        Some(result) => result,
        // window torn down before the loop saw the close request
        None => Ok(present.borrow_mut().finish(ExitReason::WindowClosed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_upload_is_passthrough() {
        let f = Frame::new(1, 1, vec![1, 2, 3]);
        assert_eq!(upload_bytes(&f, false), vec![1, 2, 3]);
    }

    #[test]
    fn rgba_upload_adds_opaque_alpha() {
        let f = Frame::new(2, 1, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(upload_bytes(&f, true), vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn quad_spans_extent() {
        let v = quad_vertices(QuadExtent { x_ratio: 0.5, y_ratio: 1.0 });
        assert_eq!(&v[0..4], &[-0.5, -1.0, 0.0, 1.0]);
        assert_eq!(&v[12..16], &[0.5, 1.0, 1.0, 0.0]);
    }
}
