// Aspect-preserving placement of a source image inside a fixed destination.
// The wider-destination case scales by height and pillarboxes; otherwise
// scale by width and letterbox. Callers guarantee all dimensions are > 0.

/// Pixel-space placement (CPU path): scaled size plus the centering offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub scale: f64,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Normalized half-extents of the textured quad (GPU path), both in (0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadExtent {
    pub x_ratio: f32,
    pub y_ratio: f32,
}

/// True when the destination is relatively wider than the source.
/// Compared as iw*h < w*ih to stay exact on integers.
#[inline]
fn dest_is_wider(src: (u32, u32), dst: (u32, u32)) -> bool {
    let (iw, ih) = (src.0 as u64, src.1 as u64);
    let (w, h) = (dst.0 as u64, dst.1 as u64);
    w * ih > iw * h
}

pub fn fit_pixels(src: (u32, u32), dst: (u32, u32)) -> Placement {
    let (iw, ih) = src;
    let (w, h) = dst;
    if dest_is_wider(src, dst) {
        // full height, centered horizontally
        let scaled_w = round_div(iw as u64 * h as u64, ih as u64).clamp(1, w as u64) as u32;
        Placement {
            scale: h as f64 / ih as f64,
            x: (w - scaled_w) / 2,
            y: 0,
            width: scaled_w,
            height: h,
        }
    } else {
        // full width, centered vertically
        let scaled_h = round_div(ih as u64 * w as u64, iw as u64).clamp(1, h as u64) as u32;
        Placement {
            scale: w as f64 / iw as f64,
            x: 0,
            y: (h - scaled_h) / 2,
            width: w,
            height: scaled_h,
        }
    }
}

pub fn fit_quad(src: (u32, u32), dst: (u32, u32)) -> QuadExtent {
    let r = dst.0 as f32 / dst.1 as f32;
    let ir = src.0 as f32 / src.1 as f32;
    if dest_is_wider(src, dst) {
        QuadExtent { x_ratio: ir / r, y_ratio: 1.0 }
    } else {
        QuadExtent { x_ratio: 1.0, y_ratio: r / ir }
    }
}

#[inline]
fn round_div(n: u64, d: u64) -> u64 {
    (n + d / 2) / d
}
