// ============================================================================
// IMAGE FILTERS: blur, sharpen, grayscale, invert
// ============================================================================
//
// Illustrative filters.  Each one records a snapshot and then rewrites the
// current layer's visible window only.

use image::Rgba;

use crate::canvas::{Buffer, CanvasState};
use crate::components::history::HistoryManager;

const SHARPEN_KERNEL: [[i32; 3]; 3] = [[0, -1, 0], [-1, 5, -1], [0, -1, 0]];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Filter {
    Blur,
    Sharpen,
    Grayscale,
    Invert,
}

impl Filter {
    pub fn label(&self) -> &'static str {
        match self {
            Filter::Blur => "Blur",
            Filter::Sharpen => "Sharpen",
            Filter::Grayscale => "Grayscale",
            Filter::Invert => "Invert",
        }
    }

    pub fn all() -> &'static [Filter] {
        &[Filter::Blur, Filter::Sharpen, Filter::Grayscale, Filter::Invert]
    }

    /// The filtered copy of `src`.
    pub fn apply_to(&self, src: &Buffer) -> Buffer {
        match self {
            Filter::Blur => box_blur(src),
            Filter::Sharpen => sharpen(src),
            Filter::Grayscale => grayscale(src),
            Filter::Invert => invert(src),
        }
    }

    /// Filter the current layer's visible window without touching history.
    pub fn apply_to_layer(&self, state: &mut CanvasState) {
        let window = state.geometry.visible_region();
        let layer = state.active_layer_mut();
        let filtered = self.apply_to(&layer.pixels.copy_region(window));
        layer.pixels.paste(&filtered, window.x, window.y);
    }
}

/// Run `filter` on the current layer's visible window.
pub fn apply_filter(state: &mut CanvasState, history: &mut HistoryManager, filter: Filter) {
    history.push(state, filter.label());
    filter.apply_to_layer(state);
}

/// 3×3 box average of all four channels.  The outermost rows and columns are
/// copied unchanged; every sample reads the unmodified source.
fn box_blur(src: &Buffer) -> Buffer {
    let mut out = src.clone();
    let (w, h) = (src.width() as i32, src.height() as i32);
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut sum = [0u32; 4];
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let p = src.get_pixel(x + dx, y + dy);
                    for c in 0..4 {
                        sum[c] += p[c] as u32;
                    }
                }
            }
            out.put_pixel(x, y, Rgba(sum.map(|s| (s / 9) as u8)));
        }
    }
    out
}

/// Sharpen RGB of interior pixels; alpha is kept.
fn sharpen(src: &Buffer) -> Buffer {
    let mut out = src.clone();
    let (w, h) = (src.width() as i32, src.height() as i32);
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = [0i32; 3];
            for (ky, row) in SHARPEN_KERNEL.iter().enumerate() {
                for (kx, &k) in row.iter().enumerate() {
                    if k == 0 {
                        continue;
                    }
                    let p = src.get_pixel(x + kx as i32 - 1, y + ky as i32 - 1);
                    for c in 0..3 {
                        acc[c] += k * p[c] as i32;
                    }
                }
            }
            let alpha = src.get_pixel(x, y)[3];
            let [r, g, b] = acc.map(|v| v.clamp(0, 255) as u8);
            out.put_pixel(x, y, Rgba([r, g, b, alpha]));
        }
    }
    out
}

/// `gray = floor(0.299 R + 0.587 G + 0.114 B)`, alpha kept.
fn grayscale(src: &Buffer) -> Buffer {
    let mut img = src.as_rgba_image().clone();
    for p in img.pixels_mut() {
        let gray = (0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32)
            .floor()
            .clamp(0.0, 255.0) as u8;
        *p = Rgba([gray, gray, gray, p[3]]);
    }
    Buffer::from_rgba_image(img)
}

/// RGB inverted, alpha kept.
fn invert(src: &Buffer) -> Buffer {
    let mut img = src.as_rgba_image().clone();
    for p in img.pixels_mut() {
        *p = Rgba([255 - p[0], 255 - p[1], 255 - p[2], p[3]]);
    }
    Buffer::from_rgba_image(img)
}
