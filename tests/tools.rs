use std::sync::Mutex;

use gridpaint::canvas::{BLACK, Point, TRANSPARENT, WHITE};
use gridpaint::components::tools::{DrawMode, MAX_PEN_WIDTH, Modifiers, MoveSession, ToolState};
use gridpaint::error::EditError;
use gridpaint::io::Palette;
use gridpaint::ops::draw::Brush;
use gridpaint::ops::macros::MacroAction;
use gridpaint::project::Project;
use image::Rgba;
use pretty_assertions::assert_eq;

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Untitled 16×16 project with a transparent "Ink" layer selected.
fn setup() -> Project {
    let mut project = Project::new_untitled(1, 16);
    project.add_layer("Ink");
    project
}

fn ink_pixel(project: &Project, pos: Point) -> Rgba<u8> {
    let q = project.canvas_state.geometry.to_backing(pos);
    project.canvas_state.layers[1].pixels.get_pixel(q.x, q.y)
}

fn ink_count(project: &Project) -> usize {
    project.canvas_state.layers[1]
        .pixels
        .as_raw()
        .chunks_exact(4)
        .filter(|p| p[3] != 0)
        .count()
}

fn p(x: i32, y: i32) -> Point {
    Point::new(x, y)
}

#[test]
pub fn test_defaults() {
    let tools = ToolState::default();
    assert_eq!(tools.mode, DrawMode::Pencil);
    assert_eq!(tools.primary_color, BLACK);
    assert_eq!(tools.secondary_color, WHITE);
    assert_eq!(tools.pen_width(), 1);
    assert!(!tools.soft);
}

#[test]
pub fn test_pen_width_is_clamped_and_colors_swap() {
    let mut tools = ToolState::new();
    tools.set_pen_width(0);
    assert_eq!(tools.pen_width(), 1);
    tools.set_pen_width(99);
    assert_eq!(tools.pen_width(), MAX_PEN_WIDTH);

    tools.swap_colors();
    assert_eq!(tools.primary_color, WHITE);
    assert_eq!(tools.secondary_color, BLACK);
    tools.set_transparent_primary();
    assert_eq!(tools.primary_color, TRANSPARENT);
}

#[test]
pub fn test_pencil_stroke_is_one_undo_step() {
    let mut project = setup();
    project
        .stroke(&[p(0, 0), p(2, 0), p(3, 0)], Modifiers::NONE)
        .expect("stroke");
    assert_eq!(ink_count(&project), 4);
    assert_eq!(ink_pixel(&project, p(1, 0)), BLACK);
    assert!(project.is_dirty);

    assert!(project.undo());
    assert_eq!(ink_count(&project), 0);
    assert!(project.redo());
    assert_eq!(ink_count(&project), 4);
}

#[test]
pub fn test_hidden_layer_refuses_every_tool() {
    let mut project = setup();
    project.canvas_state.set_visible(1, false);
    let count = project.history.undo_count();

    for mode in DrawMode::all() {
        project.tools.set_mode(*mode);
        assert_eq!(
            project.press(p(1, 1), Modifiers::NONE),
            Err(EditError::LayerHidden)
        );
    }
    assert_eq!(project.history.undo_count(), count);
    assert_eq!(ink_count(&project), 0);
}

#[test]
pub fn test_picker_sets_primary_without_history() {
    let mut project = setup();
    project.tools.set_mode(DrawMode::Picker);
    let count = project.history.undo_count();

    project.press(p(4, 4), Modifiers::NONE).expect("pick");
    assert_eq!(project.tools.primary_color, WHITE);
    assert_eq!(project.history.undo_count(), count);
}

#[test]
pub fn test_fill_with_same_color_pushes_nothing() {
    let mut project = setup();
    project.tools.set_mode(DrawMode::Fill);
    project.tools.set_transparent_primary();
    let count = project.history.undo_count();

    project.press(p(0, 0), Modifiers::NONE).expect("fill");
    assert_eq!(project.history.undo_count(), count);
    assert_eq!(ink_count(&project), 0);

    project.tools.primary_color = RED;
    project.press(p(0, 0), Modifiers::NONE).expect("fill");
    assert_eq!(project.history.undo_count(), count + 1);
    assert_eq!(ink_pixel(&project, p(15, 15)), RED);
}

#[test]
pub fn test_eraser_clears_footprint() {
    let mut project = setup();
    project.stroke(&[p(0, 0), p(4, 0)], Modifiers::NONE).expect("stroke");
    project.tools.set_mode(DrawMode::Eraser);
    project.stroke(&[p(1, 0), p(2, 0)], Modifiers::NONE).expect("erase");
    assert_eq!(ink_pixel(&project, p(0, 0)), BLACK);
    assert_eq!(ink_pixel(&project, p(1, 0)), TRANSPARENT);
    assert_eq!(ink_pixel(&project, p(2, 0)), TRANSPARENT);
    assert_eq!(ink_pixel(&project, p(3, 0)), BLACK);
}

#[test]
pub fn test_move_stages_then_commits() {
    let mut project = setup();
    project.press(p(0, 0), Modifiers::NONE).expect("plot");
    project.release(p(0, 0), Modifiers::NONE);

    project.tools.set_mode(DrawMode::Move);
    project.press(p(5, 5), Modifiers::NONE).expect("move");
    project.drag(p(8, 6), Modifiers::NONE);
    assert!(matches!(project.tools.move_session, MoveSession::Staged { .. }));
    assert_eq!(ink_pixel(&project, p(0, 0)), BLACK);
    assert!(project.canvas_state.preview_replaces_layer);
    assert_eq!(project.canvas_state.composite_for_display().get_pixel(3, 1), BLACK);

    project.release(p(8, 6), Modifiers::NONE);
    assert!(matches!(project.tools.move_session, MoveSession::Inactive));
    assert!(project.canvas_state.preview_layer.is_none());
    assert_eq!(ink_pixel(&project, p(0, 0)), TRANSPARENT);
    assert_eq!(ink_pixel(&project, p(3, 1)), BLACK);
}

#[test]
pub fn test_move_offset_is_clamped_and_margin_keeps_content() {
    let mut project = setup();
    project.press(p(0, 0), Modifiers::NONE).expect("plot");
    project.release(p(0, 0), Modifiers::NONE);
    project.tools.set_mode(DrawMode::Move);

    project.stroke(&[p(0, 0), p(100, 100)], Modifiers::NONE).expect("move");
    assert_eq!(ink_pixel(&project, p(16, 16)), BLACK);
    assert_eq!(project.canvas_state.export().get_pixel(0, 0), WHITE);

    project.stroke(&[p(0, 0), p(-16, -16)], Modifiers::NONE).expect("move back");
    assert_eq!(ink_pixel(&project, p(0, 0)), BLACK);
    assert_eq!(ink_count(&project), 1);
}

#[test]
pub fn test_shape_preview_rerenders_from_anchor() {
    let mut project = setup();
    project.tools.set_mode(DrawMode::Rectangle);
    project.press(p(0, 0), Modifiers::NONE).expect("press");

    project.drag(p(3, 3), Modifiers::NONE);
    let geom = project.canvas_state.geometry;
    let far = geom.to_backing(p(3, 3));
    let preview = project.canvas_state.preview_layer.clone().expect("preview");
    assert_eq!(preview.get_pixel(far.x, far.y), BLACK);
    assert_eq!(ink_count(&project), 0);

    project.drag(p(1, 1), Modifiers::NONE);
    let preview = project.canvas_state.preview_layer.clone().expect("preview");
    assert_eq!(preview.get_pixel(far.x, far.y), TRANSPARENT);

    project.release(p(2, 2), Modifiers::NONE);
    assert!(project.canvas_state.preview_layer.is_none());
    assert_eq!(ink_count(&project), 8);
    assert_eq!(ink_pixel(&project, p(1, 1)), TRANSPARENT);
    assert_eq!(ink_pixel(&project, p(2, 2)), BLACK);
}

#[test]
pub fn test_circle_with_shift_is_perfect() {
    let mut project = setup();
    project.tools.set_mode(DrawMode::Circle);
    project
        .stroke(&[p(8, 8), p(11, 14)], Modifiers::SHIFT)
        .expect("circle");
    assert_eq!(ink_pixel(&project, p(11, 8)), BLACK);
    assert_eq!(ink_pixel(&project, p(8, 11)), BLACK);
    assert_eq!(ink_pixel(&project, p(8, 14)), TRANSPARENT);
}

#[test]
pub fn test_polygon_accumulates_and_finishes_on_shift_click() {
    let mut project = setup();
    project.macros.start_recording("square");
    project.tools.set_mode(DrawMode::Polygon);

    project.press(p(0, 0), Modifiers::SHIFT).expect("click");
    project.press(p(6, 0), Modifiers::NONE).expect("click");
    project.press(p(6, 6), Modifiers::NONE).expect("click");
    assert_eq!(project.tools.polygon_points.len(), 3);
    assert_eq!(ink_count(&project), 0);

    project.press(p(0, 6), Modifiers::SHIFT).expect("finish");
    assert!(project.tools.polygon_points.is_empty());
    assert_eq!(ink_count(&project), 24);

    project.macros.stop_recording();
    assert_eq!(
        project.macros.get("square"),
        Some(
            &[MacroAction::Polygon {
                vertices: vec![p(0, 0), p(6, 0), p(6, 6), p(0, 6)],
                brush: Brush::new(BLACK, 1, false),
                filled: false,
            }][..]
        )
    );
}

#[test]
pub fn test_polygon_needs_three_points() {
    let mut project = setup();
    project.tools.set_mode(DrawMode::FilledPolygon);
    project.press(p(0, 0), Modifiers::NONE).expect("click");
    project.press(p(4, 0), Modifiers::NONE).expect("click");
    assert_eq!(
        project.finish_polygon(Modifiers::NONE),
        Err(EditError::PolygonNeedsThreePoints { points: 2 })
    );
    assert_eq!(project.tools.polygon_points.len(), 2);
}

#[test]
pub fn test_regular_polygon_with_alt() {
    let mut project = setup();
    project.tools.set_mode(DrawMode::Polygon);
    for pos in [p(2, 2), p(12, 2), p(12, 12), p(2, 12)] {
        project.press(pos, Modifiers::NONE).expect("click");
    }
    project.finish_polygon(Modifiers::SHIFT_ALT).expect("finish");
    // square regularized into a diamond around (7, 7)
    assert_eq!(ink_pixel(&project, p(7, 0)), BLACK);
    assert_eq!(ink_pixel(&project, p(14, 7)), BLACK);
    assert_eq!(ink_pixel(&project, p(2, 2)), TRANSPARENT);
}

#[test]
pub fn test_leaving_polygon_mode_drops_vertices() {
    let mut tools = ToolState::new();
    tools.set_mode(DrawMode::Polygon);
    tools.polygon_points.push(p(1, 1));
    tools.set_mode(DrawMode::FilledPolygon);
    assert_eq!(tools.polygon_points.len(), 1);
    tools.set_mode(DrawMode::Line);
    assert!(tools.polygon_points.is_empty());
}

#[test]
pub fn test_rotation_gesture_records_one_step() {
    let mut project = setup();
    project.press(p(0, 0), Modifiers::NONE).expect("plot");
    project.release(p(0, 0), Modifiers::NONE);
    let count = project.history.undo_count();

    project.preview_rotation(30.0, Modifiers::NONE);
    project.preview_rotation(50.0, Modifiers::SHIFT);
    assert_eq!(project.tools.rotation_preview, Some(45.0));
    assert_eq!(project.history.undo_count(), count);
    assert_eq!(ink_pixel(&project, p(0, 0)), BLACK);

    assert!(project.commit_rotation());
    assert_eq!(project.history.undo_count(), count + 1);
    assert!(!project.commit_rotation());
    assert_eq!(project.history.undo_count(), count + 1);
}

#[test]
pub fn test_cancel_rotation_leaves_layer() {
    let mut project = setup();
    project.press(p(3, 3), Modifiers::NONE).expect("plot");
    project.release(p(3, 3), Modifiers::NONE);
    let before = project.canvas_state.layers.clone();

    project.preview_rotation(90.0, Modifiers::NONE);
    project.cancel_rotation();
    assert!(project.canvas_state.preview_layer.is_none());
    assert_eq!(project.canvas_state.layers, before);
    assert!(!project.commit_rotation());
}

#[test]
pub fn test_layer_properties_through_project() {
    let mut project = setup();
    assert_eq!(project.palette, Palette::default());
    project.mark_clean();

    assert!(project.select_layer(0));
    assert!(!project.select_layer(9));
    assert!(project.set_selected(1, true));
    assert!(project.toggle_selected(1));
    assert!(!project.is_dirty);

    let count = project.history.undo_count();
    assert!(project.set_visible(1, true));
    assert!(!project.is_dirty);
    assert_eq!(project.history.undo_count(), count);

    assert!(project.set_visible(1, false));
    assert!(project.is_dirty);
    assert_eq!(project.history.undo_count(), count + 1);
    assert!(project.toggle_visibility(1));
    assert!(project.canvas_state.layers[1].visible);

    project.mark_clean();
    assert!(project.set_opacity(1, 2.0));
    assert_eq!(project.canvas_state.layers[1].opacity, 1.0);
    assert!(project.rename_layer(1, "Lines"));
    assert!(!project.rename_layer(7, "Nope"));
    assert!(project.is_dirty);
    assert_eq!(project.canvas_state.layers[1].name, "Lines");

    assert!(project.undo());
    assert_eq!(project.canvas_state.layers[1].name, "Ink");
}

/// Collects warnings so refusals can be asserted on.
struct WarnCollector {
    lines: Mutex<Vec<String>>,
}

impl log::Log for WarnCollector {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Warn
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata())
            && let Ok(mut lines) = self.lines.lock()
        {
            lines.push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static WARNINGS: WarnCollector = WarnCollector {
    lines: Mutex::new(Vec::new()),
};

#[test]
pub fn test_rotation_on_hidden_layer_is_refused_with_warning() {
    let _ = log::set_logger(&WARNINGS);
    log::set_max_level(log::LevelFilter::Warn);

    let mut project = setup();
    project.press(p(3, 3), Modifiers::NONE).expect("plot");
    project.release(p(3, 3), Modifiers::NONE);
    project.canvas_state.set_visible(1, false);
    let before = project.canvas_state.layers.clone();
    let count = project.history.undo_count();

    assert!(!project.quick_rotate(90.0));
    project.preview_rotation(45.0, Modifiers::NONE);
    assert!(!project.commit_rotation());
    assert_eq!(project.canvas_state.layers, before);
    assert_eq!(project.history.undo_count(), count);
    assert!(project.canvas_state.preview_layer.is_none());

    let lines = WARNINGS.lines.lock().expect("lock");
    assert!(
        lines
            .iter()
            .any(|l| l.contains("Rotation refused") && l.contains("Ink"))
    );
}
