// Geometry module
// Sizing policy and rotated bounding boxes for overlay windows

/// Longest side a freshly added overlay may have
pub const MAX_INITIAL_SIDE: u32 = 350;

/// Smallest width an overlay can be scaled down to
pub const MIN_SIDE: u32 = 50;

/// Largest window side the renderer allocates buffers for
pub const MAX_BOUND: u32 = 4096;

/// Wrap an angle in degrees into [0, 360)
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Default on-screen size for media of the given native size.
///
/// Media larger than [`MAX_INITIAL_SIDE`] on either side is scaled down
/// uniformly so its longest side equals the limit; smaller media keeps its
/// native size.
pub fn initial_size(width: u32, height: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= MAX_INITIAL_SIDE {
        return (width, height);
    }

    let scale = MAX_INITIAL_SIDE as f64 / longest as f64;
    let w = (width as f64 * scale).round() as u32;
    let h = (height as f64 * scale).round() as u32;
    (w.max(1), h.max(1))
}

/// Smallest axis-aligned box enclosing a `width` x `height` rectangle
/// rotated by `degrees` about its center
pub fn rotated_bounds(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    let radians = normalize_degrees(degrees).to_radians();
    let cos = radians.cos().abs();
    let sin = radians.sin().abs();
    let (w, h) = (width as f64, height as f64);

    let bound_w = (w * cos + h * sin).round() as u32;
    let bound_h = (w * sin + h * cos).round() as u32;
    (bound_w, bound_h)
}

/// Widest content of the given aspect ratio whose rotated bounding box
/// stays within [`MAX_BOUND`] at every angle
pub fn max_width(aspect_ratio: f64) -> u32 {
    // The bounding box never exceeds the diagonal; keep one pixel for rounding
    let diagonal_per_width = (1.0 + 1.0 / (aspect_ratio * aspect_ratio)).sqrt();
    ((MAX_BOUND - 1) as f64 / diagonal_per_width).floor() as u32
}

/// Fit `inner` into `outer` keeping the inner aspect ratio.
///
/// Returns the fitted size as floats so callers can letterbox precisely.
pub fn fit_within(inner: (u32, u32), outer: (u32, u32)) -> (f64, f64) {
    if inner.0 == 0 || inner.1 == 0 {
        return (0.0, 0.0);
    }
    let scale = (outer.0 as f64 / inner.0 as f64).min(outer.1 as f64 / inner.1 as f64);
    (inner.0 as f64 * scale, inner.1 as f64 * scale)
}
