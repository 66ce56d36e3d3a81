use serde::{Deserialize, Serialize};

use crate::canvas::{BLACK, Buffer, CanvasState, Pixel, Point, TRANSPARENT, WHITE};
use crate::components::history::HistoryManager;
use crate::error::EditError;
use crate::ops::draw::{self, Brush, ShapeKind};
use crate::ops::macros::{MacroAction, MacroRecorder};
use crate::ops::transform;

pub const MIN_PEN_WIDTH: u32 = 1;
pub const MAX_PEN_WIDTH: u32 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DrawMode {
    #[default]
    Pencil,
    Line,
    Rectangle,
    FilledRectangle,
    Circle,
    FilledCircle,
    Triangle,
    FilledTriangle,
    Polygon,
    FilledPolygon,
    Fill,
    Eraser,
    Picker,
    Move,
}

impl DrawMode {
    pub fn label(&self) -> &'static str {
        match self {
            DrawMode::Pencil => "Pencil",
            DrawMode::Line => "Line",
            DrawMode::Rectangle => "Rectangle",
            DrawMode::FilledRectangle => "Filled Rectangle",
            DrawMode::Circle => "Circle",
            DrawMode::FilledCircle => "Filled Circle",
            DrawMode::Triangle => "Triangle",
            DrawMode::FilledTriangle => "Filled Triangle",
            DrawMode::Polygon => "Polygon",
            DrawMode::FilledPolygon => "Filled Polygon",
            DrawMode::Fill => "Fill",
            DrawMode::Eraser => "Eraser",
            DrawMode::Picker => "Color Picker",
            DrawMode::Move => "Move",
        }
    }

    pub fn all() -> &'static [DrawMode] {
        &[
            DrawMode::Pencil,
            DrawMode::Line,
            DrawMode::Rectangle,
            DrawMode::FilledRectangle,
            DrawMode::Circle,
            DrawMode::FilledCircle,
            DrawMode::Triangle,
            DrawMode::FilledTriangle,
            DrawMode::Polygon,
            DrawMode::FilledPolygon,
            DrawMode::Fill,
            DrawMode::Eraser,
            DrawMode::Picker,
            DrawMode::Move,
        ]
    }

    /// The shape drawn through the press/drag/release preview protocol.
    pub fn shape_kind(&self) -> Option<ShapeKind> {
        match self {
            DrawMode::Line => Some(ShapeKind::Line),
            DrawMode::Rectangle => Some(ShapeKind::Rectangle),
            DrawMode::FilledRectangle => Some(ShapeKind::FilledRectangle),
            DrawMode::Circle => Some(ShapeKind::Ellipse),
            DrawMode::FilledCircle => Some(ShapeKind::FilledEllipse),
            DrawMode::Triangle => Some(ShapeKind::Triangle),
            DrawMode::FilledTriangle => Some(ShapeKind::FilledTriangle),
            _ => None,
        }
    }

    pub fn is_polygon(&self) -> bool {
        matches!(self, DrawMode::Polygon | DrawMode::FilledPolygon)
    }
}

/// Modifier keys held during an input event.
///
/// `shift`: perfect circle, equilateral triangle, finish polygon, snap
/// rotation to 45°.  `alt`: regular polygon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        alt: false,
    };
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        alt: false,
    };
    pub const SHIFT_ALT: Modifiers = Modifiers {
        shift: true,
        alt: true,
    };
}

// ============================================================================
// SESSIONS
// ============================================================================

/// Move tool state machine: `Inactive → Staged` on press, back on release.
#[derive(Clone, Debug, Default)]
pub enum MoveSession {
    #[default]
    Inactive,
    Staged {
        /// Press position, backing coordinates.
        anchor: Point,
        offset: Point,
        staged: Buffer,
    },
}

/// An in-progress shape drag.  The scratch buffer is re-rendered from
/// scratch on every drag and shown as the preview overlay.
#[derive(Clone, Debug)]
pub struct ShapeSession {
    pub kind: ShapeKind,
    pub anchor: Point,
    pub brush: Brush,
}

// ============================================================================
// TOOL STATE
// ============================================================================

/// Current tool, colors, pen, and the per-tool sessions.
#[derive(Clone, Debug)]
pub struct ToolState {
    pub mode: DrawMode,
    pub primary_color: Pixel,
    pub secondary_color: Pixel,
    pen_width: u32,
    /// Soft ("blur") strokes.
    pub soft: bool,
    /// Accumulated polygon vertices, backing coordinates.
    pub polygon_points: Vec<Point>,
    pub move_session: MoveSession,
    pub shape_session: Option<ShapeSession>,
    /// Angle currently shown by the rotation preview.
    pub rotation_preview: Option<f32>,
    last_pos: Option<Point>,
}

impl Default for ToolState {
    fn default() -> Self {
        Self {
            mode: DrawMode::Pencil,
            primary_color: BLACK,
            secondary_color: WHITE,
            pen_width: 1,
            soft: false,
            polygon_points: Vec::new(),
            move_session: MoveSession::Inactive,
            shape_session: None,
            rotation_preview: None,
            last_pos: None,
        }
    }
}

impl ToolState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pen_width(&self) -> u32 {
        self.pen_width
    }

    pub fn set_pen_width(&mut self, width: u32) {
        self.pen_width = width.clamp(MIN_PEN_WIDTH, MAX_PEN_WIDTH);
    }

    /// Select a tool.  Leaving the polygon tools drops collected vertices.
    pub fn set_mode(&mut self, mode: DrawMode) {
        if !mode.is_polygon() {
            self.polygon_points.clear();
        }
        self.mode = mode;
    }

    pub fn swap_colors(&mut self) {
        std::mem::swap(&mut self.primary_color, &mut self.secondary_color);
    }

    pub fn set_transparent_primary(&mut self) {
        self.primary_color = TRANSPARENT;
    }

    /// The pen as currently configured.
    pub fn brush(&self) -> Brush {
        Brush::new(self.primary_color, self.pen_width, self.soft)
    }

    // ---- pointer events -----------------------------------------------------

    /// Pointer pressed at `pos` (visible-grid coordinates).
    ///
    /// Refused with [`EditError::LayerHidden`] when the current layer is
    /// hidden.  Every tool except the picker records a history snapshot
    /// first; a flood fill that would change nothing records nothing.
    pub fn press(
        &mut self,
        state: &mut CanvasState,
        history: &mut HistoryManager,
        recorder: &mut MacroRecorder,
        pos: Point,
        mods: Modifiers,
    ) -> Result<(), EditError> {
        if !state.active_layer().visible {
            crate::log_warn!(
                "Cannot draw on hidden layer '{}'",
                state.active_layer().name
            );
            return Err(EditError::LayerHidden);
        }

        let geom = state.geometry;
        let brush = self.brush();
        match self.mode {
            DrawMode::Picker => {
                if let Some(color) = draw::pick_color(state, pos) {
                    self.primary_color = color;
                }
            }
            DrawMode::Fill => {
                let color = self.primary_color;
                if !draw::flood_fill_changes(&state.active_layer().pixels, &geom, pos, color) {
                    return Ok(());
                }
                history.push(state, "Fill");
                draw::flood_fill(&mut state.active_layer_mut().pixels, &geom, pos, color);
                recorder.record(MacroAction::Fill {
                    pos,
                    color: color.0,
                });
            }
            DrawMode::Pencil => {
                history.push(state, "Pencil");
                draw::plot_pixel(&mut state.active_layer_mut().pixels, &geom, &brush, pos);
                recorder.record(MacroAction::Plot { pos, brush });
                self.last_pos = Some(pos);
            }
            DrawMode::Eraser => {
                history.push(state, "Eraser");
                draw::erase(&mut state.active_layer_mut().pixels, &geom, &brush, pos);
                recorder.record(MacroAction::Erase { pos, brush });
                self.last_pos = Some(pos);
            }
            DrawMode::Move => {
                history.push(state, "Move");
                self.move_session = MoveSession::Staged {
                    anchor: geom.to_backing(pos),
                    offset: Point::default(),
                    staged: state.active_layer().pixels.clone(),
                };
            }
            DrawMode::Polygon | DrawMode::FilledPolygon => {
                history.push(state, self.mode.label());
                self.polygon_points.push(geom.to_backing(pos));
                if mods.shift && self.polygon_points.len() > 2 {
                    self.finish_polygon(state, history, recorder, mods)?;
                }
            }
            DrawMode::Line
            | DrawMode::Rectangle
            | DrawMode::FilledRectangle
            | DrawMode::Circle
            | DrawMode::FilledCircle
            | DrawMode::Triangle
            | DrawMode::FilledTriangle => {
                history.push(state, self.mode.label());
                if let Some(kind) = self.mode.shape_kind() {
                    self.shape_session = Some(ShapeSession {
                        kind,
                        anchor: pos,
                        brush,
                    });
                    state.preview_layer = Some(geom.new_buffer());
                    state.preview_replaces_layer = false;
                    state.preview_opacity = 1.0;
                }
            }
        }
        Ok(())
    }

    /// Pointer dragged to `pos` with the button held.
    pub fn drag(
        &mut self,
        state: &mut CanvasState,
        recorder: &mut MacroRecorder,
        pos: Point,
        mods: Modifiers,
    ) {
        let geom = state.geometry;
        match self.mode {
            DrawMode::Pencil => {
                let Some(last) = self.last_pos else { return };
                let brush = self.brush();
                draw::draw_line(&mut state.active_layer_mut().pixels, &geom, &brush, last, pos);
                recorder.record(MacroAction::Stroke {
                    from: last,
                    to: pos,
                    brush,
                });
                self.last_pos = Some(pos);
            }
            DrawMode::Eraser => {
                if self.last_pos.is_none() {
                    return;
                }
                let brush = self.brush();
                draw::erase(&mut state.active_layer_mut().pixels, &geom, &brush, pos);
                recorder.record(MacroAction::Erase { pos, brush });
                self.last_pos = Some(pos);
            }
            DrawMode::Move => {
                if let MoveSession::Staged {
                    anchor,
                    offset,
                    staged,
                } = &mut self.move_session
                {
                    let grid = geom.grid_size() as i32;
                    let delta = geom.to_backing(pos) - *anchor;
                    *offset = Point::new(delta.x.clamp(-grid, grid), delta.y.clamp(-grid, grid));
                    state.preview_layer = Some(transform::translated(staged, offset.x, offset.y));
                    state.preview_replaces_layer = true;
                    state.preview_opacity = 1.0;
                }
            }
            _ => {
                if let Some(session) = &self.shape_session {
                    let mut scratch = geom.new_buffer();
                    draw::draw_shape(
                        &mut scratch,
                        &geom,
                        &session.brush,
                        session.kind,
                        session.anchor,
                        pos,
                        mods.shift,
                    );
                    state.preview_layer = Some(scratch);
                }
            }
        }
    }

    /// Pointer released at `pos`.  Commits move and shape sessions.
    pub fn release(
        &mut self,
        state: &mut CanvasState,
        recorder: &mut MacroRecorder,
        pos: Point,
        mods: Modifiers,
    ) {
        self.last_pos = None;
        let geom = state.geometry;

        if let MoveSession::Staged { offset, staged, .. } = std::mem::take(&mut self.move_session) {
            state.active_layer_mut().pixels = transform::translated(&staged, offset.x, offset.y);
            state.clear_preview_state();
            recorder.record(MacroAction::Move {
                dx: offset.x,
                dy: offset.y,
            });
        }

        if let Some(session) = self.shape_session.take() {
            let mut scratch = geom.new_buffer();
            draw::draw_shape(
                &mut scratch,
                &geom,
                &session.brush,
                session.kind,
                session.anchor,
                pos,
                mods.shift,
            );
            state.active_layer_mut().pixels.draw_over(&scratch, 0, 0, 1.0);
            state.clear_preview_state();
            recorder.record(MacroAction::Shape {
                kind: session.kind,
                anchor: session.anchor,
                end: pos,
                brush: session.brush,
                modifiers: mods,
            });
        }
    }

    // ---- polygon ------------------------------------------------------------

    /// Rasterize the collected vertices and clear them.  With `alt` the
    /// polygon is regularized first.
    pub fn finish_polygon(
        &mut self,
        state: &mut CanvasState,
        history: &mut HistoryManager,
        recorder: &mut MacroRecorder,
        mods: Modifiers,
    ) -> Result<(), EditError> {
        if self.polygon_points.len() < 3 {
            return Err(EditError::PolygonNeedsThreePoints {
                points: self.polygon_points.len(),
            });
        }
        if !state.active_layer().visible {
            return Err(EditError::LayerHidden);
        }
        let vertices = if mods.alt {
            draw::regularize_polygon(&self.polygon_points)
        } else {
            std::mem::take(&mut self.polygon_points)
        };
        self.polygon_points.clear();

        let filled = self.mode == DrawMode::FilledPolygon;
        let brush = self.brush();
        history.push(state, self.mode.label());
        draw::draw_polygon(&mut state.active_layer_mut().pixels, &brush, &vertices, filled);

        let geom = state.geometry;
        recorder.record(MacroAction::Polygon {
            vertices: vertices.iter().map(|&p| geom.to_visible(p)).collect(),
            brush,
            filled,
        });
        Ok(())
    }

    // ---- rotation -----------------------------------------------------------

    /// Show the current layer rotated by `angle` (snapped to 45° with shift).
    /// Never mutates the layer or history.
    pub fn preview_rotation(&mut self, state: &mut CanvasState, angle: f32, mods: Modifiers) {
        let angle = if mods.shift { transform::snap_angle(angle) } else { angle };
        transform::preview_rotation(state, angle);
        self.rotation_preview = Some(angle);
    }

    /// Apply the previewed angle.  One history entry per gesture; a 0° angle
    /// does nothing.
    pub fn commit_rotation(
        &mut self,
        state: &mut CanvasState,
        history: &mut HistoryManager,
        recorder: &mut MacroRecorder,
    ) -> bool {
        let Some(angle) = self.rotation_preview.take() else {
            state.clear_preview_state();
            return false;
        };
        self.rotate(state, history, recorder, angle)
    }

    pub fn cancel_rotation(&mut self, state: &mut CanvasState) {
        self.rotation_preview = None;
        transform::cancel_rotation_preview(state);
    }

    /// Rotate immediately without a preview session.
    pub fn quick_rotate(
        &mut self,
        state: &mut CanvasState,
        history: &mut HistoryManager,
        recorder: &mut MacroRecorder,
        angle: f32,
    ) -> bool {
        self.rotation_preview = None;
        self.rotate(state, history, recorder, angle)
    }

    fn rotate(
        &mut self,
        state: &mut CanvasState,
        history: &mut HistoryManager,
        recorder: &mut MacroRecorder,
        angle: f32,
    ) -> bool {
        if !state.active_layer().visible {
            crate::log_warn!(
                "Rotation refused: layer '{}' is hidden",
                state.active_layer().name
            );
            state.clear_preview_state();
            return false;
        }
        let applied = transform::quick_rotate(state, history, angle);
        if applied {
            recorder.record(MacroAction::Rotate { angle });
        }
        applied
    }
}
