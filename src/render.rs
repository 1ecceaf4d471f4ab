// CPU rendering module
// Rasterizes a frame rotated, letterboxed and faded into a window-sized canvas

use crate::geometry;
use crate::media::Frame;

/// Sampling used when rasterizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Fast path while the user is dragging, scaling or rotating
    Nearest,
    /// High-quality path when the overlay is at rest
    Bilinear,
}

/// Transform of one overlay at the moment it is drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    /// Un-rotated content box
    pub content: (u32, u32),
    /// Clockwise rotation in degrees
    pub rotation: f64,
    pub opacity: f64,
    pub filter: Filter,
}

/// Draw `frame` into a `width` x `height` BGRA canvas (premultiplied alpha).
///
/// The content box is centered in the canvas and rotated about its center.
/// The frame is fitted into the content box keeping its own aspect ratio.
/// Everything outside the fitted frame is fully transparent.
pub fn render(frame: &Frame, params: &RenderParams, canvas: &mut [u8], width: u32, height: u32) {
    canvas.fill(0);

    if frame.width == 0 || frame.height == 0 || width == 0 || height == 0 {
        return;
    }

    let (fit_w, fit_h) = geometry::fit_within((frame.width, frame.height), params.content);
    if fit_w <= 0.0 || fit_h <= 0.0 {
        return;
    }

    let scale = fit_w / frame.width as f64;
    let radians = geometry::normalize_degrees(params.rotation).to_radians();
    let (sin, cos) = radians.sin_cos();
    let center_x = width as f64 / 2.0;
    let center_y = height as f64 / 2.0;
    let opacity = params.opacity.clamp(0.0, 1.0);

    for y in 0..height {
        let dy = y as f64 + 0.5 - center_y;
        let row = (y * width * 4) as usize;

        for x in 0..width {
            let dx = x as f64 + 0.5 - center_x;

            // Undo the clockwise rotation to land in content space
            let u = cos * dx + sin * dy;
            let v = -sin * dx + cos * dy;

            let src_x = (u + fit_w / 2.0) / scale;
            let src_y = (v + fit_h / 2.0) / scale;
            if src_x < 0.0
                || src_y < 0.0
                || src_x >= frame.width as f64
                || src_y >= frame.height as f64
            {
                continue;
            }

            let pixel = match params.filter {
                Filter::Nearest => sample_nearest(frame, src_x, src_y),
                Filter::Bilinear => sample_bilinear(frame, src_x, src_y),
            };

            let dst = row + x as usize * 4;
            if dst + 3 < canvas.len() {
                write_premultiplied(&mut canvas[dst..dst + 4], pixel, opacity);
            }
        }
    }
}

fn sample_nearest(frame: &Frame, x: f64, y: f64) -> [f64; 4] {
    let px = (x as u32).min(frame.width - 1);
    let py = (y as u32).min(frame.height - 1);
    pixel_at(frame, px, py)
}

fn sample_bilinear(frame: &Frame, x: f64, y: f64) -> [f64; 4] {
    // Sample around pixel centers
    let x = (x - 0.5).max(0.0);
    let y = (y - 0.5).max(0.0);

    let x0 = (x.floor() as u32).min(frame.width - 1);
    let y0 = (y.floor() as u32).min(frame.height - 1);
    let x1 = (x0 + 1).min(frame.width - 1);
    let y1 = (y0 + 1).min(frame.height - 1);

    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = pixel_at(frame, x0, y0);
    let p10 = pixel_at(frame, x1, y0);
    let p01 = pixel_at(frame, x0, y1);
    let p11 = pixel_at(frame, x1, y1);

    let mut out = [0.0; 4];
    for c in 0..4 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = top * (1.0 - fy) + bottom * fy;
    }
    out
}

fn pixel_at(frame: &Frame, x: u32, y: u32) -> [f64; 4] {
    let idx = ((y * frame.width + x) * 4) as usize;
    match frame.bgra.get(idx..idx + 4) {
        Some(p) => [p[0] as f64, p[1] as f64, p[2] as f64, p[3] as f64],
        None => [0.0; 4],
    }
}

fn write_premultiplied(dst: &mut [u8], pixel: [f64; 4], opacity: f64) {
    let alpha = pixel[3] / 255.0 * opacity;
    dst[0] = (pixel[0] * alpha).round().clamp(0.0, 255.0) as u8;
    dst[1] = (pixel[1] * alpha).round().clamp(0.0, 255.0) as u8;
    dst[2] = (pixel[2] * alpha).round().clamp(0.0, 255.0) as u8;
    dst[3] = (alpha * 255.0).round().clamp(0.0, 255.0) as u8;
}
