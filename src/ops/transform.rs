// ============================================================================
// TRANSFORM OPERATIONS: rotate, flip and grid resize
// ============================================================================

use image::{Rgba, RgbaImage, imageops};

use crate::canvas::{Buffer, CanvasState, Pixel, Point, Region, VirtualCanvas};
use crate::components::history::HistoryManager;

/// Opacity of the rotation preview overlay in the display composite.
pub const ROTATION_PREVIEW_OPACITY: f32 = 0.5;

/// Angle step used when rotation snapping is requested.
pub const ROTATION_SNAP_DEGREES: f32 = 45.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FlipAxis {
    /// Mirror left↔right.
    Horizontal,
    /// Mirror top↔bottom.
    Vertical,
}

impl FlipAxis {
    pub fn label(&self) -> &'static str {
        match self {
            FlipAxis::Horizontal => "Flip Horizontal",
            FlipAxis::Vertical => "Flip Vertical",
        }
    }
}

/// Round `angle` to the nearest multiple of 45°.
pub fn snap_angle(angle: f32) -> f32 {
    (angle / ROTATION_SNAP_DEGREES).round() * ROTATION_SNAP_DEGREES
}

/// True for angles that leave the image unchanged.
fn is_identity_angle(angle: f32) -> bool {
    !angle.is_finite() || angle.rem_euclid(360.0).abs() < 1e-4
}

// ---------------------------------------------------------------------------
//  Rotation
// ---------------------------------------------------------------------------

/// Rotate `img` by `angle` degrees (clockwise, screen coordinates) about its
/// centre.  The result is the rotated bounding box, sampled bilinearly.
pub fn rotate_image(img: &RgbaImage, angle: f32) -> RgbaImage {
    let (w, h) = (img.width() as f32, img.height() as f32);
    let rad = angle.to_radians();
    let (sin, cos) = rad.sin_cos();

    let out_w = (w * cos.abs() + h * sin.abs()).round().max(1.0) as u32;
    let out_h = (w * sin.abs() + h * cos.abs()).round().max(1.0) as u32;

    let (src_cx, src_cy) = (w / 2.0, h / 2.0);
    let (dst_cx, dst_cy) = (out_w as f32 / 2.0, out_h as f32 / 2.0);

    let mut out = RgbaImage::new(out_w, out_h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        // Inverse-map the destination pixel centre into source space
        let dx = x as f32 + 0.5 - dst_cx;
        let dy = y as f32 + 0.5 - dst_cy;
        let sx = dx * cos + dy * sin + src_cx - 0.5;
        let sy = -dx * sin + dy * cos + src_cy - 0.5;
        *px = bilinear_sample(img, sx, sy);
    }
    out
}

/// The active layer's buffer with its visible window rotated by `angle`.
///
/// The window is extracted, rotated about its own centre and cleared.  The
/// whole rotated bounding box is then drawn back centred on the window, so
/// corners that stick out land in the margin of the backing buffer.  Only
/// what falls past the backing buffer's edge is lost.
pub fn rotated_layer_buffer(buf: &Buffer, geom: &VirtualCanvas, angle: f32) -> Buffer {
    let window = geom.visible_region();
    let extracted = buf.copy_region(window);
    let rotated = Buffer::from_rgba_image(rotate_image(extracted.as_rgba_image(), angle));

    let grid = geom.grid_size() as i32;
    let x = window.x + (grid - rotated.width() as i32).div_euclid(2);
    let y = window.y + (grid - rotated.height() as i32).div_euclid(2);
    let mut out = buf.clone();
    out.clear_region(window);
    out.draw_over(&rotated, x, y, 1.0);
    out
}

/// Show the active layer rotated by `angle` as a translucent overlay that
/// replaces the layer in the display composite.  Nothing is mutated and no
/// history is recorded.
pub fn preview_rotation(state: &mut CanvasState, angle: f32) {
    let geom = state.geometry;
    let preview = rotated_layer_buffer(&state.active_layer().pixels, &geom, angle);
    state.preview_layer = Some(preview);
    state.preview_replaces_layer = true;
    state.preview_opacity = ROTATION_PREVIEW_OPACITY;
}

/// End a rotation preview without applying it.
pub fn cancel_rotation_preview(state: &mut CanvasState) {
    state.clear_preview_state();
}

/// Rotate the active layer's visible window by `angle` degrees.
///
/// Pushes exactly one history entry.  An angle equivalent to 0° only ends
/// the preview and returns `false`.
pub fn commit_rotation(state: &mut CanvasState, history: &mut HistoryManager, angle: f32) -> bool {
    state.clear_preview_state();
    if is_identity_angle(angle) {
        return false;
    }
    history.push(state, format!("Rotate {angle}°"));
    rotate_active_layer(state, angle);
    crate::log_info!("Rotated layer '{}' by {angle}°", state.active_layer().name);
    true
}

/// Rotate the active layer without touching history.
pub fn rotate_active_layer(state: &mut CanvasState, angle: f32) {
    if is_identity_angle(angle) {
        return;
    }
    let geom = state.geometry;
    let rotated = rotated_layer_buffer(&state.active_layer().pixels, &geom, angle);
    state.active_layer_mut().pixels = rotated;
}

/// Rotate without a preview session (±90°, 180° shortcuts).
pub fn quick_rotate(state: &mut CanvasState, history: &mut HistoryManager, angle: f32) -> bool {
    commit_rotation(state, history, angle)
}

// ---------------------------------------------------------------------------
//  Flip
// ---------------------------------------------------------------------------

/// Mirror the active layer's visible window in place.  Always pushes history.
pub fn flip(state: &mut CanvasState, history: &mut HistoryManager, axis: FlipAxis) {
    history.push(state, axis.label());
    flip_active_layer(state, axis);
}

/// Mirror the active layer's visible window without touching history.
pub fn flip_active_layer(state: &mut CanvasState, axis: FlipAxis) {
    let window = state.geometry.visible_region();
    let layer = state.active_layer_mut();
    let extracted = layer.pixels.copy_region(window).into_rgba_image();
    let flipped = match axis {
        FlipAxis::Horizontal => imageops::flip_horizontal(&extracted),
        FlipAxis::Vertical => imageops::flip_vertical(&extracted),
    };
    layer
        .pixels
        .paste(&Buffer::from_rgba_image(flipped), window.x, window.y);
}

// ---------------------------------------------------------------------------
//  Translate
// ---------------------------------------------------------------------------

/// A copy of `buf` shifted by `(dx, dy)`.  Pixels pushed past the edge are
/// lost, uncovered pixels become transparent.
pub fn translated(buf: &Buffer, dx: i32, dy: i32) -> Buffer {
    let mut out = Buffer::new(buf.width(), buf.height());
    out.paste(buf, dx, dy);
    out
}

// ---------------------------------------------------------------------------
//  Grid resize
// ---------------------------------------------------------------------------

/// Change the visible grid edge to `new_grid_size` (clamped to the supported
/// range), keeping every layer's visible content centred.
///
/// Growing pads around the old content (the background layer's new area is
/// opaque white), shrinking keeps the centred crop.  Content is never
/// rescaled and off-window content is dropped.  The centring shift is
/// symmetric so that growing then shrinking back is lossless.
/// Returns `false` (no history entry) when the size does not change.
pub fn resize_grid(state: &mut CanvasState, history: &mut HistoryManager, new_grid_size: u32) -> bool {
    let old_geom = state.geometry;
    let new_geom = VirtualCanvas::new(new_grid_size);
    if new_geom == old_geom {
        return false;
    }
    history.push(state, format!("Resize Grid to {}", new_geom.grid_size()));

    let shift = (new_geom.grid_size() as i32 - old_geom.grid_size() as i32) / 2;
    let old_window = old_geom.visible_region();
    let new_window = new_geom.visible_region();
    let origin = Point::new(new_window.x + shift, new_window.y + shift);

    for (i, layer) in state.layers.iter_mut().enumerate() {
        let content = layer.pixels.copy_region(old_window);
        let mut fresh = if i == 0 {
            new_geom.new_background_buffer()
        } else {
            new_geom.new_buffer()
        };
        paste_clipped(&mut fresh, &content, origin, new_window);
        layer.pixels = fresh;
    }

    state.geometry = new_geom;
    state.clear_preview_state();
    crate::log_info!(
        "Grid resized {} → {}",
        old_geom.grid_size(),
        new_geom.grid_size()
    );
    true
}

/// Overwrite `dst` with `src` placed at `at`, restricted to `clip`.
fn paste_clipped(dst: &mut Buffer, src: &Buffer, at: Point, clip: Region) {
    let x_end = clip.x + clip.width as i32;
    let y_end = clip.y + clip.height as i32;
    for y in 0..src.height() as i32 {
        let ty = at.y + y;
        if ty < clip.y || ty >= y_end {
            continue;
        }
        for x in 0..src.width() as i32 {
            let tx = at.x + x;
            if tx < clip.x || tx >= x_end {
                continue;
            }
            dst.put_pixel(tx, ty, src.get_pixel(x, y));
        }
    }
}

/// Bilinear interpolation sampling from an RgbaImage.  Outside samples are
/// transparent.
fn bilinear_sample(img: &RgbaImage, x: f32, y: f32) -> Pixel {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let sample = |sx: i32, sy: i32| -> [f32; 4] {
        if sx < 0 || sy < 0 || sx >= img.width() as i32 || sy >= img.height() as i32 {
            [0.0; 4]
        } else {
            let p = img.get_pixel(sx as u32, sy as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
        }
    };

    let tl = sample(x0, y0);
    let tr = sample(x0 + 1, y0);
    let bl = sample(x0, y0 + 1);
    let br = sample(x0 + 1, y0 + 1);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = lerp(tl[c], tr[c], fx);
        let bot = lerp(bl[c], br[c], fx);
        out[c] = lerp(top, bot, fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_rounds_to_45() {
        assert_eq!(snap_angle(20.0), 0.0);
        assert_eq!(snap_angle(23.0), 45.0);
        assert_eq!(snap_angle(-100.0), -90.0);
    }

    #[test]
    fn rotate_90_swaps_bounding_box() {
        let img = RgbaImage::new(4, 2);
        let out = rotate_image(&img, 90.0);
        assert_eq!((out.width(), out.height()), (2, 4));
    }

    #[test]
    fn identity_angles() {
        assert!(is_identity_angle(0.0));
        assert!(is_identity_angle(360.0));
        assert!(is_identity_angle(-720.0));
        assert!(!is_identity_angle(90.0));
    }
}
