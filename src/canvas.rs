use std::ops::{Add, Sub};

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::EditError;

/// Smallest editable grid edge.
pub const MIN_GRID_SIZE: u32 = 16;
/// Largest editable grid edge.
pub const MAX_GRID_SIZE: u32 = 64;
/// Grid edge used for new documents.
pub const DEFAULT_GRID_SIZE: u32 = 32;

/// One RGBA pixel, 8 bits per channel, not premultiplied.
pub type Pixel = Rgba<u8>;

pub const TRANSPARENT: Pixel = Rgba([0, 0, 0, 0]);
pub const WHITE: Pixel = Rgba([255, 255, 255, 255]);
pub const BLACK: Pixel = Rgba([0, 0, 0, 255]);

// ============================================================================
// POINT
// ============================================================================

/// Integer cell coordinate.  Depending on context it is either a visible-grid
/// position or a backing-buffer position (see [`VirtualCanvas`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Point::new(x, y)
    }
}

/// Axis-aligned region in buffer coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

// ============================================================================
// BUFFER: dense RGBA pixel grid
// ============================================================================

/// A fixed-size grid of RGBA pixels.  Never resized in place; operations
/// that change dimensions build a new `Buffer`.
///
/// All point accessors take signed coordinates.  Reads outside the grid
/// return [`TRANSPARENT`], writes outside the grid are dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Buffer {
    image: RgbaImage,
}

impl Buffer {
    /// Create a fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn new_filled(width: u32, height: u32, color: Pixel) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, color),
        }
    }

    pub fn from_rgba_image(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Wrap row-major RGBA bytes.  Returns `None` if `data` is not exactly
    /// `width * height * 4` bytes long.
    pub fn from_raw_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(|image| Self { image })
    }

    pub fn as_rgba_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_rgba_image(self) -> RgbaImage {
        self.image
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }

    /// Pixel at `(x, y)`, or `None` outside the grid.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> Option<Pixel> {
        if self.contains(x, y) {
            Some(*self.image.get_pixel(x as u32, y as u32))
        } else {
            None
        }
    }

    #[inline]
    pub fn get_pixel(&self, x: i32, y: i32) -> Pixel {
        self.get(x, y).unwrap_or(TRANSPARENT)
    }

    #[inline]
    pub fn put_pixel(&mut self, x: i32, y: i32, pixel: Pixel) {
        if self.contains(x, y) {
            self.image.put_pixel(x as u32, y as u32, pixel);
        }
    }

    /// Source-over `pixel` onto the existing pixel at `(x, y)`.
    #[inline]
    pub fn blend_pixel(&mut self, x: i32, y: i32, pixel: Pixel, opacity: f32) {
        if self.contains(x, y) {
            let base = *self.image.get_pixel(x as u32, y as u32);
            self.image
                .put_pixel(x as u32, y as u32, blend_over(base, pixel, opacity));
        }
    }

    pub fn fill(&mut self, color: Pixel) {
        for px in self.image.pixels_mut() {
            *px = color;
        }
    }

    pub fn clear(&mut self) {
        self.fill(TRANSPARENT);
    }

    /// Overwrite every pixel of `region` (clipped) with `color`.
    pub fn fill_region(&mut self, region: Region, color: Pixel) {
        let x0 = region.x.max(0);
        let y0 = region.y.max(0);
        let x1 = (region.x + region.width as i32).min(self.width() as i32);
        let y1 = (region.y + region.height as i32).min(self.height() as i32);
        for y in y0..y1 {
            for x in x0..x1 {
                self.image.put_pixel(x as u32, y as u32, color);
            }
        }
    }

    pub fn clear_region(&mut self, region: Region) {
        self.fill_region(region, TRANSPARENT);
    }

    /// Copy `region` into a new buffer of the region's size.  Parts of the
    /// region outside this buffer come back transparent.
    pub fn copy_region(&self, region: Region) -> Buffer {
        let mut out = Buffer::new(region.width, region.height);
        for y in 0..region.height as i32 {
            for x in 0..region.width as i32 {
                if let Some(px) = self.get(region.x + x, region.y + y) {
                    out.image.put_pixel(x as u32, y as u32, px);
                }
            }
        }
        out
    }

    /// Overwrite pixels with `src` placed at `(dst_x, dst_y)`, clipped.
    pub fn paste(&mut self, src: &Buffer, dst_x: i32, dst_y: i32) {
        for y in 0..src.height() as i32 {
            for x in 0..src.width() as i32 {
                self.put_pixel(dst_x + x, dst_y + y, *src.image.get_pixel(x as u32, y as u32));
            }
        }
    }

    /// Source-over `src` placed at `(dst_x, dst_y)` with the given opacity.
    pub fn draw_over(&mut self, src: &Buffer, dst_x: i32, dst_y: i32, opacity: f32) {
        for y in 0..src.height() as i32 {
            for x in 0..src.width() as i32 {
                let px = *src.image.get_pixel(x as u32, y as u32);
                if px[3] != 0 {
                    self.blend_pixel(dst_x + x, dst_y + y, px, opacity);
                }
            }
        }
    }

    /// True if every pixel has zero alpha.
    pub fn is_transparent(&self) -> bool {
        self.image.pixels().all(|p| p[3] == 0)
    }

    pub fn memory_bytes(&self) -> usize {
        self.image.as_raw().len()
    }
}

/// Non-premultiplied source-over of `top` onto `base`.  `opacity` scales the
/// top pixel's own alpha.  Against an opaque base this is the per-channel
/// linear blend `out = base * (1 - a) + top * a`.
pub fn blend_over(base: Pixel, top: Pixel, opacity: f32) -> Pixel {
    // Fast path: fully transparent top pixel, nothing to blend
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    // Fast path: full opacity, fully opaque top pixel, just overwrite
    if opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let top_a = (top[3] as f32 / 255.0) * opacity.clamp(0.0, 1.0);
    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return TRANSPARENT;
    }

    let mut out = [0u8; 4];
    for c in 0..3 {
        let t = top[c] as f32 / 255.0;
        let b = base[c] as f32 / 255.0;
        let v = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        out[c] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

// ============================================================================
// VIRTUAL CANVAS: visible grid centred inside a 3× backing buffer
// ============================================================================

/// Geometry of the oversized backing buffer.
///
/// The visible edit grid is `grid_size × grid_size`; each layer is backed by
/// a `virtual_size × virtual_size` buffer (`virtual_size = 3 * grid_size`)
/// with the visible window centred at `offset = grid_size`.  The margin lets
/// move and rotate stage content outside the window without clipping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VirtualCanvas {
    grid_size: u32,
}

impl Default for VirtualCanvas {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SIZE)
    }
}

impl VirtualCanvas {
    /// `grid_size` is clamped into `[MIN_GRID_SIZE, MAX_GRID_SIZE]`.
    pub fn new(grid_size: u32) -> Self {
        Self {
            grid_size: grid_size.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE),
        }
    }

    #[inline]
    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    #[inline]
    pub fn virtual_size(&self) -> u32 {
        self.grid_size * 3
    }

    #[inline]
    pub fn offset(&self) -> i32 {
        self.grid_size as i32
    }

    /// Visible-grid position → backing-buffer position.
    #[inline]
    pub fn to_backing(&self, p: Point) -> Point {
        Point::new(p.x + self.offset(), p.y + self.offset())
    }

    /// Backing-buffer position → visible-grid position.
    #[inline]
    pub fn to_visible(&self, q: Point) -> Point {
        Point::new(q.x - self.offset(), q.y - self.offset())
    }

    /// The visible window in backing coordinates.
    pub fn visible_region(&self) -> Region {
        Region::new(self.offset(), self.offset(), self.grid_size, self.grid_size)
    }

    /// The whole backing buffer.
    pub fn full_region(&self) -> Region {
        Region::new(0, 0, self.virtual_size(), self.virtual_size())
    }

    /// Recompute geometry for a new grid edge.  Pixel content is handled by
    /// `ops::transform::resize_grid`.
    pub fn resize(&mut self, new_grid_size: u32) {
        *self = Self::new(new_grid_size);
    }

    /// A new transparent buffer of backing size.
    pub fn new_buffer(&self) -> Buffer {
        Buffer::new(self.virtual_size(), self.virtual_size())
    }

    /// A new backing buffer whose visible window is opaque white.
    pub fn new_background_buffer(&self) -> Buffer {
        let mut buf = self.new_buffer();
        buf.fill_region(self.visible_region(), WHITE);
        buf
    }
}

// ============================================================================
// LAYER
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub name: String,
    pub pixels: Buffer,
    pub visible: bool,
    pub opacity: f32,
    /// Transient merge selection, not persisted and not part of history.
    pub selected: bool,
}

impl Layer {
    pub fn new(name: impl Into<String>, pixels: Buffer) -> Self {
        Self {
            name: name.into(),
            pixels,
            visible: true,
            opacity: 1.0,
            selected: false,
        }
    }
}

// ============================================================================
// CANVAS STATE: the layer stack
// ============================================================================

/// Ordered layers (index 0 is the bottom) over a shared [`VirtualCanvas`].
///
/// Invariants: never empty, `active_layer_index < layers.len()`.
#[derive(Clone, Debug)]
pub struct CanvasState {
    pub geometry: VirtualCanvas,
    pub layers: Vec<Layer>,
    pub active_layer_index: usize,
    /// Display-only overlay for the active layer (shape scratch, staged
    /// move, rotation preview).  Never part of history or export.
    pub preview_layer: Option<Buffer>,
    /// When true the preview replaces the active layer in the display
    /// composite instead of drawing on top of it.
    pub preview_replaces_layer: bool,
    pub preview_opacity: f32,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SIZE)
    }
}

impl CanvasState {
    pub fn new(grid_size: u32) -> Self {
        let geometry = VirtualCanvas::new(grid_size);
        let background = Layer::new("Background", geometry.new_background_buffer());
        Self::from_layers(geometry, vec![background], 0)
    }

    /// Build a stack from existing layers.  An empty list gets a background
    /// layer so the stack is never empty; the active index is clamped.
    pub fn from_layers(geometry: VirtualCanvas, mut layers: Vec<Layer>, active: usize) -> Self {
        if layers.is_empty() {
            layers.push(Layer::new("Background", geometry.new_background_buffer()));
        }
        let active_layer_index = active.min(layers.len() - 1);
        Self {
            geometry,
            layers,
            active_layer_index,
            preview_layer: None,
            preview_replaces_layer: false,
            preview_opacity: 1.0,
        }
    }

    #[inline]
    pub fn grid_size(&self) -> u32 {
        self.geometry.grid_size()
    }

    #[inline]
    pub fn virtual_size(&self) -> u32 {
        self.geometry.virtual_size()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn active_layer(&self) -> &Layer {
        &self.layers[self.active_layer_index]
    }

    pub fn active_layer_mut(&mut self) -> &mut Layer {
        &mut self.layers[self.active_layer_index]
    }

    /// Reset all preview-related state.
    pub fn clear_preview_state(&mut self) {
        self.preview_layer = None;
        self.preview_replaces_layer = false;
        self.preview_opacity = 1.0;
    }

    // ---- layer management ---------------------------------------------------

    /// Append a transparent layer on top and make it current.
    pub fn add_layer(&mut self, name: impl Into<String>) -> usize {
        self.layers.push(Layer::new(name, self.geometry.new_buffer()));
        self.active_layer_index = self.layers.len() - 1;
        self.active_layer_index
    }

    /// Remove the layer at `index`.  Refused (returns `false`) for an
    /// out-of-range index or when it is the last layer.
    pub fn remove_layer(&mut self, index: usize) -> bool {
        if self.layers.len() <= 1 || index >= self.layers.len() {
            return false;
        }
        self.layers.remove(index);
        if self.active_layer_index >= self.layers.len() {
            self.active_layer_index = self.layers.len() - 1;
        }
        true
    }

    /// Make `index` the current layer.
    pub fn select_layer(&mut self, index: usize) -> bool {
        if index >= self.layers.len() {
            return false;
        }
        self.active_layer_index = index;
        true
    }

    pub fn set_visible(&mut self, index: usize, visible: bool) -> bool {
        match self.layers.get_mut(index) {
            Some(layer) => {
                layer.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn toggle_visibility(&mut self, index: usize) -> bool {
        match self.layers.get_mut(index) {
            Some(layer) => {
                layer.visible = !layer.visible;
                true
            }
            None => false,
        }
    }

    /// Set layer opacity, clamped to `[0, 1]`.
    pub fn set_opacity(&mut self, index: usize, opacity: f32) -> bool {
        match self.layers.get_mut(index) {
            Some(layer) => {
                layer.opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
                true
            }
            None => false,
        }
    }

    pub fn rename_layer(&mut self, index: usize, name: impl Into<String>) -> bool {
        match self.layers.get_mut(index) {
            Some(layer) => {
                layer.name = name.into();
                true
            }
            None => false,
        }
    }

    pub fn set_selected(&mut self, index: usize, selected: bool) -> bool {
        match self.layers.get_mut(index) {
            Some(layer) => {
                layer.selected = selected;
                true
            }
            None => false,
        }
    }

    pub fn toggle_selected(&mut self, index: usize) -> bool {
        match self.layers.get_mut(index) {
            Some(layer) => {
                layer.selected = !layer.selected;
                true
            }
            None => false,
        }
    }

    pub fn selected_indices(&self) -> Vec<usize> {
        self.layers
            .iter()
            .enumerate()
            .filter(|(_, l)| l.selected)
            .map(|(i, _)| i)
            .collect()
    }

    /// Highest-index visible layer, or 0 when every layer is hidden.
    pub fn top_visible(&self) -> usize {
        self.layers.iter().rposition(|l| l.visible).unwrap_or(0)
    }

    // ---- compositing --------------------------------------------------------

    /// Bottom-to-top accumulation of every visible layer within `region`,
    /// each weighted by its opacity.
    pub fn composite(&self, region: Region) -> Buffer {
        composite_layers(self.layers.iter().filter(|l| l.visible), region)
    }

    /// Flattened visible window, exactly `grid_size × grid_size`.
    pub fn export(&self) -> Buffer {
        self.composite(self.geometry.visible_region())
    }

    /// Visible window composite for on-screen display, including the active
    /// preview overlay.
    pub fn composite_for_display(&self) -> Buffer {
        let region = self.geometry.visible_region();
        let Some(preview) = self.preview_layer.as_ref() else {
            return self.composite(region);
        };

        let mut out = Buffer::new(region.width, region.height);
        for (i, layer) in self.layers.iter().enumerate() {
            if !layer.visible {
                continue;
            }
            if i == self.active_layer_index {
                if !self.preview_replaces_layer {
                    blend_layer_into(&mut out, &layer.pixels, region, layer.opacity);
                }
                blend_layer_into(&mut out, preview, region, layer.opacity * self.preview_opacity);
            } else {
                blend_layer_into(&mut out, &layer.pixels, region, layer.opacity);
            }
        }
        out
    }

    /// Collapse all selected layers into one.
    ///
    /// The merged layer holds the bottom-to-top composite of the selected
    /// layers (hidden ones contribute nothing), is inserted at the lowest
    /// selected index and becomes current.  All selection flags are cleared.
    /// Requires at least two selected layers; otherwise nothing changes.
    pub fn merge_selected(&mut self) -> Result<usize, EditError> {
        let selected = self.selected_indices();
        if selected.len() < 2 {
            return Err(EditError::MergeNeedsTwoLayers {
                selected: selected.len(),
            });
        }

        let full = self.geometry.full_region();
        let merged_pixels = composite_layers(
            selected
                .iter()
                .map(|&i| &self.layers[i])
                .filter(|l| l.visible),
            full,
        );

        let names: Vec<&str> = selected.iter().map(|&i| self.layers[i].name.as_str()).collect();
        let merged_name = format!(
            "Merged ({}{})",
            names.iter().take(3).copied().collect::<Vec<_>>().join(", "),
            if names.len() > 3 { "..." } else { "" }
        );

        for &idx in selected.iter().rev() {
            self.layers.remove(idx);
        }
        let insert_at = selected[0];
        self.layers.insert(insert_at, Layer::new(merged_name, merged_pixels));
        self.active_layer_index = insert_at;
        for layer in &mut self.layers {
            layer.selected = false;
        }
        Ok(insert_at)
    }
}

/// Composite `layers` (bottom first) within `region` into a new buffer.
pub fn composite_layers<'a>(layers: impl Iterator<Item = &'a Layer>, region: Region) -> Buffer {
    let mut out = Buffer::new(region.width, region.height);
    for layer in layers {
        blend_layer_into(&mut out, &layer.pixels, region, layer.opacity);
    }
    out
}

fn blend_layer_into(out: &mut Buffer, src: &Buffer, region: Region, opacity: f32) {
    if opacity <= 0.0 {
        return;
    }
    for y in 0..region.height as i32 {
        for x in 0..region.width as i32 {
            let px = src.get_pixel(region.x + x, region.y + y);
            if px[3] != 0 {
                out.blend_pixel(x, y, px, opacity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_over_opaque_base_is_linear() {
        let base = Rgba([200, 100, 0, 255]);
        let top = Rgba([0, 0, 200, 255]);
        let out = blend_over(base, top, 0.5);
        assert_eq!(out, Rgba([100, 50, 100, 255]));
    }

    #[test]
    fn blend_over_transparent_base_keeps_color() {
        let out = blend_over(TRANSPARENT, Rgba([10, 20, 30, 255]), 0.5);
        assert_eq!(out, Rgba([10, 20, 30, 128]));
    }

    #[test]
    fn copy_region_pads_outside_with_transparent() {
        let buf = Buffer::new_filled(4, 4, BLACK);
        let copy = buf.copy_region(Region::new(2, 2, 4, 4));
        assert_eq!(copy.get_pixel(0, 0), BLACK);
        assert_eq!(copy.get_pixel(1, 1), BLACK);
        assert_eq!(copy.get_pixel(2, 2), TRANSPARENT);
    }
}
