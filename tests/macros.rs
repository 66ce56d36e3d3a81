use gridpaint::canvas::{BLACK, Point, TRANSPARENT};
use gridpaint::components::tools::{DrawMode, Modifiers};
use gridpaint::error::EditError;
use gridpaint::ops::draw::{Brush, ShapeKind};
use gridpaint::ops::filters::Filter;
use gridpaint::ops::macros::{MacroAction, MacroRecorder, RecorderState};
use gridpaint::ops::transform::FlipAxis;
use gridpaint::project::Project;
use pretty_assertions::assert_eq;

fn p(x: i32, y: i32) -> Point {
    Point::new(x, y)
}

fn setup() -> Project {
    let mut project = Project::new_untitled(1, 16);
    project.add_layer("Ink");
    project
}

#[test]
pub fn test_record_only_while_recording() {
    let mut recorder = MacroRecorder::new();
    recorder.record(MacroAction::Move { dx: 1, dy: 1 });
    assert_eq!(recorder.stop_recording(), None);
    assert!(recorder.is_empty());

    recorder.start_recording("nudge");
    assert!(recorder.is_recording());
    recorder.record(MacroAction::Move { dx: 1, dy: 0 });
    assert_eq!(recorder.stop_recording(), Some("nudge".to_string()));
    assert_eq!(recorder.state(), &RecorderState::Idle);
    assert_eq!(
        recorder.get("nudge"),
        Some(&[MacroAction::Move { dx: 1, dy: 0 }][..])
    );
}

#[test]
pub fn test_rerecording_overwrites() {
    let mut recorder = MacroRecorder::new();
    recorder.start_recording("m");
    recorder.record(MacroAction::Rotate { angle: 90.0 });
    recorder.stop_recording();
    recorder.start_recording("m");
    recorder.record(MacroAction::Flip {
        axis: FlipAxis::Vertical,
    });
    recorder.stop_recording();
    assert_eq!(recorder.len(), 1);
    assert_eq!(
        recorder.get("m"),
        Some(
            &[MacroAction::Flip {
                axis: FlipAxis::Vertical
            }][..]
        )
    );
}

#[test]
pub fn test_names_are_sorted_and_delete() {
    let mut recorder = MacroRecorder::new();
    for name in ["zeta", "alpha", "mid"] {
        recorder.start_recording(name);
        recorder.stop_recording();
    }
    assert_eq!(recorder.names(), vec!["alpha", "mid", "zeta"]);
    assert!(recorder.delete("mid"));
    assert!(!recorder.delete("mid"));
    assert_eq!(recorder.names(), vec!["alpha", "zeta"]);
}

#[test]
pub fn test_play_unknown_macro() {
    let mut project = setup();
    assert_eq!(
        project.play_macro("missing"),
        Err(EditError::NoSuchMacro("missing".to_string()))
    );
}

#[test]
pub fn test_recorded_strokes_replay_identically() {
    let mut project = setup();
    project.macros.start_recording("art");
    project
        .stroke(&[p(0, 0), p(5, 3), p(9, 3)], Modifiers::NONE)
        .expect("stroke");
    project.tools.set_mode(DrawMode::FilledRectangle);
    project
        .stroke(&[p(10, 10), p(13, 12)], Modifiers::NONE)
        .expect("rect");
    project.flip(FlipAxis::Horizontal);
    project.macros.stop_recording();
    let drawn = project.canvas_state.layers[1].pixels.clone();

    let mut replay = setup();
    replay.macros = project.macros.clone();
    let count = replay.history.undo_count();
    assert_eq!(replay.play_macro("art"), Ok(5));
    assert_eq!(replay.canvas_state.layers[1].pixels, drawn);
    assert_eq!(replay.history.undo_count(), count + 1);

    assert!(replay.undo());
    assert!(replay.canvas_state.layers[1].pixels.is_transparent());
}

#[test]
pub fn test_play_refuses_hidden_layer() {
    let mut project = setup();
    project.macros.start_recording("dot");
    project.press(p(1, 1), Modifiers::NONE).expect("plot");
    project.release(p(1, 1), Modifiers::NONE);
    project.macros.stop_recording();

    project.canvas_state.set_visible(1, false);
    assert_eq!(project.play_macro("dot"), Err(EditError::LayerHidden));
}

#[test]
pub fn test_macro_positions_follow_grid_resize() {
    let mut project = setup();
    project.macros.start_recording("corner");
    project.press(p(0, 0), Modifiers::NONE).expect("plot");
    project.release(p(0, 0), Modifiers::NONE);
    project.macros.stop_recording();
    project.clear_layer();

    project.resize_grid(32);
    project.play_macro("corner").expect("play");
    let q = project.canvas_state.geometry.to_backing(p(0, 0));
    assert_eq!(project.canvas_state.layers[1].pixels.get_pixel(q.x, q.y), BLACK);
}

#[test]
pub fn test_json_round_trip_and_merge() {
    let mut recorder = MacroRecorder::new();
    recorder.start_recording("shapes");
    recorder.record(MacroAction::Shape {
        kind: ShapeKind::Ellipse,
        anchor: p(2, 2),
        end: p(8, 6),
        brush: Brush::new(BLACK, 2, true),
        modifiers: Modifiers::SHIFT,
    });
    recorder.record(MacroAction::Fill {
        pos: p(4, 4),
        color: [1, 2, 3, 255],
    });
    recorder.record(MacroAction::Filter {
        filter: Filter::Invert,
    });
    recorder.stop_recording();
    let json = recorder.export_json().expect("export");
    assert!(json.contains("\"action\": \"shape\""));

    let mut other = MacroRecorder::new();
    other.start_recording("keep");
    other.stop_recording();
    assert_eq!(other.import_json(&json).expect("import"), 1);
    assert_eq!(other.names(), vec!["keep", "shapes"]);
    assert_eq!(other.get("shapes"), recorder.get("shapes"));
}

#[test]
pub fn test_invalid_json_changes_nothing() {
    let mut recorder = MacroRecorder::new();
    recorder.start_recording("a");
    recorder.stop_recording();
    assert!(recorder.import_json("{\"b\": [{\"action\": \"teleport\"}]}").is_err());
    assert_eq!(recorder.names(), vec!["a"]);
}

#[test]
pub fn test_erase_action_applies() {
    let mut project = setup();
    project.press(p(2, 2), Modifiers::NONE).expect("plot");
    project.release(p(2, 2), Modifiers::NONE);

    MacroAction::Erase {
        pos: p(2, 2),
        brush: Brush::default(),
    }
    .apply(&mut project.canvas_state);
    let q = project.canvas_state.geometry.to_backing(p(2, 2));
    assert_eq!(
        project.canvas_state.layers[1].pixels.get_pixel(q.x, q.y),
        TRANSPARENT
    );
}
