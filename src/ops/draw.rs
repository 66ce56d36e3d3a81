// ============================================================================
// DRAW ENGINE: rasterization primitives for the pixel tools
// ============================================================================
//
// Every primitive takes the target buffer, the canvas geometry and the brush
// in effect.  Positions are visible-grid coordinates unless stated otherwise
// and are translated to backing coordinates here.  Shapes are rasterized into
// a coverage mask first and blended once, so overlapping stroke segments never
// stack translucent color.

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::canvas::{Buffer, CanvasState, Pixel, Point, TRANSPARENT, VirtualCanvas};

/// Alpha used for soft ("blur") strokes.
const SOFT_ALPHA: u8 = 128;
/// Soft strokes are wider than the nominal pen width by this factor.
const SOFT_WIDTH_SCALE: f32 = 1.5;

/// Color, width and softness of the pen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brush {
    pub color: [u8; 4],
    pub width: u32,
    pub soft: bool,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            color: [0, 0, 0, 255],
            width: 1,
            soft: false,
        }
    }
}

impl Brush {
    pub fn new(color: Pixel, width: u32, soft: bool) -> Self {
        Self {
            color: color.0,
            width: width.max(1),
            soft,
        }
    }

    pub fn pixel(&self) -> Pixel {
        Rgba(self.color)
    }

    /// True when strokes follow the exact integer algorithms.
    #[inline]
    pub fn is_pixel_exact(&self) -> bool {
        self.width <= 1 && !self.soft
    }

    /// Color actually laid down by a stroke.
    fn stroke_color(&self) -> Pixel {
        let mut c = self.pixel();
        if self.soft {
            c[3] = SOFT_ALPHA;
        }
        c
    }

    /// Footprint radius of one dab.
    fn radius(&self) -> f32 {
        let w = self.width.max(1) as f32;
        if self.soft { w * SOFT_WIDTH_SCALE * 0.5 } else { w * 0.5 }
    }
}

/// Shape tools that use the press/drag/release preview protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Line,
    Rectangle,
    FilledRectangle,
    Ellipse,
    FilledEllipse,
    Triangle,
    FilledTriangle,
}

impl ShapeKind {
    pub fn is_filled(&self) -> bool {
        matches!(
            self,
            ShapeKind::FilledRectangle | ShapeKind::FilledEllipse | ShapeKind::FilledTriangle
        )
    }
}

// ============================================================================
// Coverage mask
// ============================================================================

/// Per-pixel coverage in `[0, 1]` over a buffer-sized area.  Marks keep the
/// maximum coverage so repeated dabs never accumulate.
struct StrokeMask {
    width: u32,
    height: u32,
    coverage: Vec<f32>,
}

impl StrokeMask {
    fn for_buffer(buf: &Buffer) -> Self {
        Self {
            width: buf.width(),
            height: buf.height(),
            coverage: vec![0.0; buf.width() as usize * buf.height() as usize],
        }
    }

    #[inline]
    fn mark(&mut self, x: i32, y: i32, c: f32) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height || c <= 0.0 {
            return;
        }
        let i = y as usize * self.width as usize + x as usize;
        if c > self.coverage[i] {
            self.coverage[i] = c.min(1.0);
        }
    }

    /// One pen dab centred on `p` (backing coordinates).
    fn stamp(&mut self, p: Point, brush: &Brush) {
        if brush.is_pixel_exact() {
            self.mark(p.x, p.y, 1.0);
            return;
        }
        let r = brush.radius();
        let reach = (r + 1.0).ceil() as i32;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let d = ((dx * dx + dy * dy) as f32).sqrt();
                let c = if brush.soft {
                    1.0 - smoothstep((r - 1.0).max(0.0), r + 0.5, d)
                } else if d <= r {
                    1.0
                } else {
                    0.0
                };
                self.mark(p.x + dx, p.y + dy, c);
            }
        }
    }

    fn stamp_path(&mut self, points: &[Point], brush: &Brush) {
        for &p in points {
            self.stamp(p, brush);
        }
    }

    /// Blend `color` into `buf` weighted by coverage.
    fn apply(&self, buf: &mut Buffer, color: Pixel) {
        for (i, &c) in self.coverage.iter().enumerate() {
            if c > 0.0 {
                let x = (i % self.width as usize) as i32;
                let y = (i / self.width as usize) as i32;
                buf.blend_pixel(x, y, color, c);
            }
        }
    }

    /// Clear every covered pixel.
    fn erase(&self, buf: &mut Buffer) {
        for (i, &c) in self.coverage.iter().enumerate() {
            if c > 0.0 {
                let x = (i % self.width as usize) as i32;
                let y = (i / self.width as usize) as i32;
                buf.put_pixel(x, y, TRANSPARENT);
            }
        }
    }
}

// ============================================================================
// Integer algorithms
// ============================================================================

/// Bresenham line from `a` to `b`, both endpoints included.
pub fn bresenham_points(a: Point, b: Point) -> Vec<Point> {
    let dx = (b.x - a.x).abs();
    let dy = (b.y - a.y).abs();
    let sx = if a.x < b.x { 1 } else { -1 };
    let sy = if a.y < b.y { 1 } else { -1 };
    let mut err = dx - dy;

    let (mut x, mut y) = (a.x, a.y);
    let mut points = Vec::with_capacity((dx.max(dy) + 1) as usize);
    loop {
        points.push(Point::new(x, y));
        if x == b.x && y == b.y {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
    points
}

/// Midpoint ellipse outline around `center` with radii `rx`, `ry`.
///
/// Region 1 steps x while the slope is shallow, region 2 steps y while it
/// is steep; each step plots the four symmetric points.  Points may repeat.
pub fn midpoint_ellipse_points(center: Point, rx: i32, ry: i32) -> Vec<Point> {
    let mut points = Vec::new();
    if rx <= 0 || ry <= 0 {
        // Degenerate: the ellipse collapses onto an axis-aligned segment
        let a = Point::new(center.x - rx.max(0), center.y - ry.max(0));
        let b = Point::new(center.x + rx.max(0), center.y + ry.max(0));
        return bresenham_points(a, b);
    }

    let rx2 = rx as i64 * rx as i64;
    let ry2 = ry as i64 * ry as i64;
    let two_rx2 = 2 * rx2;
    let two_ry2 = 2 * ry2;

    let mut x: i64 = 0;
    let mut y: i64 = ry as i64;
    let mut px: i64 = 0;
    let mut py: i64 = two_rx2 * y;

    plot_four(&mut points, center, x, y);

    // Region 1
    let mut p = (ry2 as f64 - (rx2 * ry as i64) as f64 + 0.25 * rx2 as f64).round() as i64;
    while px < py {
        x += 1;
        px += two_ry2;
        if p < 0 {
            p += ry2 + px;
        } else {
            y -= 1;
            py -= two_rx2;
            p += ry2 + px - py;
        }
        plot_four(&mut points, center, x, y);
    }

    // Region 2
    let xf = x as f64 + 0.5;
    let yf = (y - 1) as f64;
    let mut p = (ry2 as f64 * xf * xf + rx2 as f64 * yf * yf - (rx2 * ry2) as f64).round() as i64;
    while y > 0 {
        y -= 1;
        py -= two_rx2;
        if p > 0 {
            p += rx2 - py;
        } else {
            x += 1;
            px += two_ry2;
            p += rx2 - py + px;
        }
        plot_four(&mut points, center, x, y);
    }
    points
}

fn plot_four(points: &mut Vec<Point>, c: Point, x: i64, y: i64) {
    let (x, y) = (x as i32, y as i32);
    points.push(Point::new(c.x + x, c.y + y));
    points.push(Point::new(c.x - x, c.y + y));
    points.push(Point::new(c.x + x, c.y - y));
    points.push(Point::new(c.x - x, c.y - y));
}

/// Rebuild an irregular polygon as a regular N-gon (N = vertex count).
///
/// Centre is the bounding-box centre, radius the distance from the first
/// vertex to that centre; vertices are spaced evenly by angle, the first at
/// the top.
pub fn regularize_polygon(points: &[Point]) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let min_x = points.iter().map(|p| p.x).min().unwrap_or(0);
    let max_x = points.iter().map(|p| p.x).max().unwrap_or(0);
    let min_y = points.iter().map(|p| p.y).min().unwrap_or(0);
    let max_y = points.iter().map(|p| p.y).max().unwrap_or(0);
    let cx = (min_x + max_x) / 2;
    let cy = (min_y + max_y) / 2;

    let first = points[0];
    let radius =
        ((((first.x - cx) as f64).powi(2) + ((first.y - cy) as f64).powi(2)).sqrt()) as i32 as f64;
    let sides = points.len();

    (0..sides)
        .map(|i| {
            let angle = 2.0 * std::f64::consts::PI * i as f64 / sides as f64
                - std::f64::consts::FRAC_PI_2;
            Point::new(
                (cx as f64 + radius * angle.cos()) as i32,
                (cy as f64 + radius * angle.sin()) as i32,
            )
        })
        .collect()
}

/// Triangle vertices for a drag from `a` to `b`.
///
/// Default is the right triangle `{a, b, (a.x, b.y)}`.  With `equilateral`
/// the apex sits above the midpoint of `a.x..b.x` on `a`'s row and the base
/// is `width * sqrt(3) / 2` below it.
pub fn triangle_points(a: Point, b: Point, equilateral: bool) -> [Point; 3] {
    if equilateral {
        let center_x = (a.x + b.x).div_euclid(2);
        let width = (b.x - a.x).abs();
        let height = (width as f64 * 3f64.sqrt() / 2.0) as i32;
        [
            Point::new(center_x, a.y),
            Point::new(a.x, a.y + height),
            Point::new(b.x, a.y + height),
        ]
    } else {
        [a, b, Point::new(a.x, b.y)]
    }
}

/// Centre and radii of the ellipse dragged from `a` to `b`.
///
/// With `perfect_circle` the circle is centred on `a` with radius
/// `min(|dx|, |dy|)`; otherwise the ellipse fits the bounding box.  Radii
/// are half the inclusive box size rounded up, so an odd span still reaches
/// both edges of the box.
pub fn ellipse_geometry(a: Point, b: Point, perfect_circle: bool) -> (Point, i32, i32) {
    if perfect_circle {
        let r = (b.x - a.x).abs().min((b.y - a.y).abs());
        (a, r, r)
    } else {
        let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
        let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));
        (
            Point::new((min_x + max_x).div_euclid(2), (min_y + max_y).div_euclid(2)),
            (max_x - min_x + 1) / 2,
            (max_y - min_y + 1) / 2,
        )
    }
}

// ============================================================================
// Primitives
// ============================================================================

/// Plot one pixel, or a soft dab when the brush is soft.
pub fn plot_pixel(buf: &mut Buffer, geom: &VirtualCanvas, brush: &Brush, pos: Point) {
    let p = geom.to_backing(pos);
    if brush.soft {
        let mut mask = StrokeMask::for_buffer(buf);
        mask.stamp(p, brush);
        mask.apply(buf, brush.stroke_color());
    } else {
        buf.blend_pixel(p.x, p.y, brush.pixel(), 1.0);
    }
}

/// Line from `a` to `b`.  Pixel-exact Bresenham for a 1-wide hard pen,
/// otherwise a continuous stroke of the pen's width and softness.
pub fn draw_line(buf: &mut Buffer, geom: &VirtualCanvas, brush: &Brush, a: Point, b: Point) {
    let mut mask = StrokeMask::for_buffer(buf);
    mask.stamp_path(&bresenham_points(geom.to_backing(a), geom.to_backing(b)), brush);
    mask.apply(buf, brush.stroke_color());
}

/// Axis-aligned rectangle over the normalized bounding box of `a` and `b`
/// (both corners included).
pub fn draw_rectangle(
    buf: &mut Buffer,
    geom: &VirtualCanvas,
    brush: &Brush,
    a: Point,
    b: Point,
    filled: bool,
) {
    let a = geom.to_backing(a);
    let b = geom.to_backing(b);
    let (x0, x1) = (a.x.min(b.x), a.x.max(b.x));
    let (y0, y1) = (a.y.min(b.y), a.y.max(b.y));

    let mut mask = StrokeMask::for_buffer(buf);
    if filled {
        for y in y0..=y1 {
            for x in x0..=x1 {
                mask.mark(x, y, 1.0);
            }
        }
        mask.apply(buf, brush.pixel());
        return;
    }

    let corners = [
        Point::new(x0, y0),
        Point::new(x1, y0),
        Point::new(x1, y1),
        Point::new(x0, y1),
    ];
    for i in 0..4 {
        mask.stamp_path(&bresenham_points(corners[i], corners[(i + 1) % 4]), brush);
    }
    mask.apply(buf, brush.stroke_color());
}

/// Ellipse (or circle) dragged from `a` to `b`.
///
/// A 1-wide hard outline uses the midpoint algorithm.  Filled, wide or soft
/// ellipses are filled from a distance field instead.
pub fn draw_ellipse(
    buf: &mut Buffer,
    geom: &VirtualCanvas,
    brush: &Brush,
    a: Point,
    b: Point,
    filled: bool,
    perfect_circle: bool,
) {
    let (center, rx, ry) = ellipse_geometry(geom.to_backing(a), geom.to_backing(b), perfect_circle);
    let mut mask = StrokeMask::for_buffer(buf);

    if !filled && brush.is_pixel_exact() {
        for p in midpoint_ellipse_points(center, rx, ry) {
            mask.mark(p.x, p.y, 1.0);
        }
        mask.apply(buf, brush.pixel());
        return;
    }

    let half = brush.radius();
    let (rxf, ryf) = (rx as f32, ry as f32);
    let reach = rx.max(ry) + half.ceil() as i32 + 2;
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let (px, py) = (dx as f32, dy as f32);
            let c = if filled {
                let d = sdf_ellipse(px, py, rxf + 0.5, ryf + 0.5);
                if brush.soft {
                    1.0 - smoothstep(-0.5, 0.5, d)
                } else if d <= 0.0 {
                    1.0
                } else {
                    0.0
                }
            } else {
                let d = sdf_ellipse(px, py, rxf.max(0.5), ryf.max(0.5)).abs();
                if brush.soft {
                    1.0 - smoothstep(half - 1.0, half + 0.5, d)
                } else if d <= half {
                    1.0
                } else {
                    0.0
                }
            };
            mask.mark(center.x + dx, center.y + dy, c);
        }
    }
    let color = if filled { brush.pixel() } else { brush.stroke_color() };
    mask.apply(buf, color);
}

/// Triangle dragged from `a` to `b`, see [`triangle_points`].
pub fn draw_triangle(
    buf: &mut Buffer,
    geom: &VirtualCanvas,
    brush: &Brush,
    a: Point,
    b: Point,
    filled: bool,
    equilateral: bool,
) {
    let verts = triangle_points(geom.to_backing(a), geom.to_backing(b), equilateral);
    draw_polygon(buf, brush, &verts, filled);
}

/// Closed polygon through `vertices` (backing coordinates).  A filled
/// polygon covers its even-odd interior plus its outline.
pub fn draw_polygon(buf: &mut Buffer, brush: &Brush, vertices: &[Point], filled: bool) {
    if vertices.is_empty() {
        return;
    }
    let mut mask = StrokeMask::for_buffer(buf);
    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[(i + 1) % vertices.len()];
        mask.stamp_path(&bresenham_points(a, b), brush);
    }

    if filled {
        let mut interior = StrokeMask::for_buffer(buf);
        scanline_fill(&mut interior, vertices);
        interior.apply(buf, brush.pixel());
    }
    mask.apply(buf, brush.stroke_color());
}

/// Even-odd fill sampled at integer cell positions.
fn scanline_fill(mask: &mut StrokeMask, vertices: &[Point]) {
    let min_y = vertices.iter().map(|p| p.y).min().unwrap_or(0);
    let max_y = vertices.iter().map(|p| p.y).max().unwrap_or(0);
    let n = vertices.len();
    let mut crossings: Vec<f64> = Vec::with_capacity(n);

    for y in min_y..=max_y {
        crossings.clear();
        let yf = y as f64;
        for i in 0..n {
            let p1 = vertices[i];
            let p2 = vertices[(i + 1) % n];
            let (y1, y2) = (p1.y as f64, p2.y as f64);
            if (y1 <= yf && yf < y2) || (y2 <= yf && yf < y1) {
                let t = (yf - y1) / (y2 - y1);
                crossings.push(p1.x as f64 + t * (p2.x - p1.x) as f64);
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));
        for pair in crossings.chunks_exact(2) {
            let start = pair[0].ceil() as i32;
            let end = pair[1].floor() as i32;
            for x in start..=end {
                mask.mark(x, y, 1.0);
            }
        }
    }
}

/// Render a preview-protocol shape dragged from `anchor` to `current`.
/// `constrain` is the shift modifier (perfect circle / equilateral).
pub fn draw_shape(
    buf: &mut Buffer,
    geom: &VirtualCanvas,
    brush: &Brush,
    kind: ShapeKind,
    anchor: Point,
    current: Point,
    constrain: bool,
) {
    match kind {
        ShapeKind::Line => draw_line(buf, geom, brush, anchor, current),
        ShapeKind::Rectangle => draw_rectangle(buf, geom, brush, anchor, current, false),
        ShapeKind::FilledRectangle => draw_rectangle(buf, geom, brush, anchor, current, true),
        ShapeKind::Ellipse => draw_ellipse(buf, geom, brush, anchor, current, false, constrain),
        ShapeKind::FilledEllipse => draw_ellipse(buf, geom, brush, anchor, current, true, constrain),
        ShapeKind::Triangle => draw_triangle(buf, geom, brush, anchor, current, false, constrain),
        ShapeKind::FilledTriangle => {
            draw_triangle(buf, geom, brush, anchor, current, true, constrain)
        }
    }
}

// ============================================================================
// Fill / pick / erase
// ============================================================================

/// Would a flood fill at `pos` with `fill` change anything?
pub fn flood_fill_changes(buf: &Buffer, geom: &VirtualCanvas, pos: Point, fill: Pixel) -> bool {
    let p = geom.to_backing(pos);
    buf.get(p.x, p.y).is_some_and(|target| target != fill)
}

/// 4-connected flood fill of the region sharing the color at `pos`.
/// Returns `false` (buffer untouched) when that color already equals `fill`.
pub fn flood_fill(buf: &mut Buffer, geom: &VirtualCanvas, pos: Point, fill: Pixel) -> bool {
    let start = geom.to_backing(pos);
    let Some(target) = buf.get(start.x, start.y) else {
        return false;
    };
    if target == fill {
        return false;
    }

    let size = geom.virtual_size() as i32;
    let mut stack = vec![start];
    while let Some(Point { x, y }) = stack.pop() {
        if x < 0 || y < 0 || x >= size || y >= size {
            continue;
        }
        if buf.get_pixel(x, y) != target {
            continue;
        }
        buf.put_pixel(x, y, fill);
        stack.push(Point::new(x + 1, y));
        stack.push(Point::new(x - 1, y));
        stack.push(Point::new(x, y + 1));
        stack.push(Point::new(x, y - 1));
    }
    true
}

/// Color of the first visible layer (top to bottom) with a non-transparent
/// pixel at `pos`.
pub fn pick_color(state: &CanvasState, pos: Point) -> Option<Pixel> {
    let p = state.geometry.to_backing(pos);
    state
        .layers
        .iter()
        .rev()
        .filter(|l| l.visible)
        .map(|l| l.pixels.get_pixel(p.x, p.y))
        .find(|px| px[3] > 0)
}

/// Clear the pen footprint at `pos`.  Softness is ignored.
pub fn erase(buf: &mut Buffer, geom: &VirtualCanvas, brush: &Brush, pos: Point) {
    let hard = Brush { soft: false, ..*brush };
    let mut mask = StrokeMask::for_buffer(buf);
    mask.stamp(geom.to_backing(pos), &hard);
    mask.erase(buf);
}

// ============================================================================
// Distance helpers
// ============================================================================

/// SDF for an ellipse (approximation), negative inside.
#[inline]
fn sdf_ellipse(px: f32, py: f32, rx: f32, ry: f32) -> f32 {
    let nx = px / rx;
    let ny = py / ry;
    let len = (nx * nx + ny * ny).sqrt();
    if len < 1e-8 {
        return -rx.min(ry);
    }
    let scale = (rx * rx * ny * ny + ry * ry * nx * nx).sqrt() / (rx * ry * len);
    (len - 1.0) / scale
}

/// Smoothstep between edge0 and edge1.
#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
