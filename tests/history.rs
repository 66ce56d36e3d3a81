use gridpaint::canvas::{BLACK, CanvasState, Point};
use gridpaint::components::history::{CanvasSnapshot, HistoryManager};
use gridpaint::ops::canvas_ops;
use image::Rgba;
use pretty_assertions::assert_eq;

fn paint(state: &mut CanvasState, pos: Point, color: Rgba<u8>) {
    let q = state.geometry.to_backing(pos);
    state.active_layer_mut().pixels.put_pixel(q.x, q.y, color);
}

/// Fresh canvas with its baseline recorded.
fn setup() -> (CanvasState, HistoryManager) {
    let state = CanvasState::new(16);
    let mut history = HistoryManager::new(100);
    history.push(&state, "Baseline");
    (state, history)
}

#[test]
pub fn test_push_twice_without_change_is_deduplicated() {
    let (mut state, mut history) = setup();
    paint(&mut state, Point::new(1, 1), BLACK);
    assert!(history.push(&state, "Pencil"));
    assert!(!history.push(&state, "Pencil"));
    assert_eq!(history.undo_count(), 2);
}

#[test]
pub fn test_baseline_is_never_undone() {
    let (mut state, mut history) = setup();
    assert!(!history.undo(&mut state));
    assert!(!history.redo(&mut state));
    assert_eq!(history.undo_count(), 1);
}

#[test]
pub fn test_undo_restores_previous_state() {
    let (mut state, mut history) = setup();
    let original = state.layers.clone();

    history.push(&state, "Pencil");
    paint(&mut state, Point::new(3, 3), BLACK);
    assert!(history.can_undo(&state));

    assert!(history.undo(&mut state));
    assert_eq!(state.layers, original);
    assert!(history.can_redo());
}

#[test]
pub fn test_undo_then_redo_is_exact() {
    let (mut state, mut history) = setup();
    history.push(&state, "Add Layer");
    state.add_layer("Ink");
    history.push(&state, "Pencil");
    paint(&mut state, Point::new(0, 0), Rgba([10, 20, 30, 255]));
    history.push(&state, "Opacity");
    state.set_opacity(1, 0.25);

    let before = state.layers.clone();
    assert!(history.undo(&mut state));
    assert!(history.redo(&mut state));
    assert_eq!(state.layers, before);
}

#[test]
pub fn test_multi_step_undo_redo() {
    let (mut state, mut history) = setup();
    let mut states = vec![state.layers.clone()];
    for i in 0..3 {
        history.push(&state, "Pencil");
        paint(&mut state, Point::new(i, 0), BLACK);
        states.push(state.layers.clone());
    }

    for expected in states.iter().rev().skip(1) {
        assert!(history.undo(&mut state));
        assert_eq!(&state.layers, expected);
    }
    assert!(!history.undo(&mut state));

    for expected in states.iter().skip(1) {
        assert!(history.redo(&mut state));
        assert_eq!(&state.layers, expected);
    }
    assert!(!history.redo(&mut state));
}

#[test]
pub fn test_new_push_clears_redo() {
    let (mut state, mut history) = setup();
    history.push(&state, "Pencil");
    paint(&mut state, Point::new(0, 0), BLACK);
    history.undo(&mut state);
    assert!(history.can_redo());

    history.push(&state, "Pencil");
    paint(&mut state, Point::new(5, 5), BLACK);
    history.push(&state, "Pencil");
    assert!(!history.can_redo());
}

#[test]
pub fn test_capacity_evicts_oldest() {
    let mut state = CanvasState::new(16);
    let mut history = HistoryManager::new(3);
    for i in 0..6 {
        history.push(&state, format!("Step {i}"));
        paint(&mut state, Point::new(i, 0), BLACK);
    }
    assert_eq!(history.undo_count(), 3);
    assert_eq!(history.undo_history(), vec!["Step 5", "Step 4", "Step 3"]);
}

#[test]
pub fn test_snapshot_does_not_alias_live_buffers() {
    let mut state = CanvasState::new(16);
    let snapshot = CanvasSnapshot::capture(&state, "Before");
    paint(&mut state, Point::new(2, 2), BLACK);
    assert!(snapshot.layers[0].pixels != state.layers[0].pixels);

    snapshot.restore_into(&mut state);
    assert_eq!(state.layers[0].pixels, snapshot.layers[0].pixels);
}

#[test]
pub fn test_undo_restores_grid_size() {
    let (mut state, mut history) = setup();
    gridpaint::ops::transform::resize_grid(&mut state, &mut history, 24);
    assert_eq!(state.grid_size(), 24);
    assert!(history.undo(&mut state));
    assert_eq!(state.grid_size(), 16);
    assert_eq!(state.layers[0].pixels.width(), 48);
}

#[test]
pub fn test_layer_ops_are_undoable() {
    let (mut state, mut history) = setup();
    canvas_ops::add_layer(&mut state, &mut history, "A");
    canvas_ops::rename_layer(&mut state, &mut history, 1, "Renamed");
    assert_eq!(state.layers[1].name, "Renamed");

    history.undo(&mut state);
    assert_eq!(state.layers[1].name, "A");
    history.undo(&mut state);
    assert_eq!(state.layer_count(), 1);
}

#[test]
pub fn test_shrinking_capacity_evicts() {
    let (mut state, mut history) = setup();
    for i in 0..5 {
        history.push(&state, "Pencil");
        paint(&mut state, Point::new(i, 1), BLACK);
    }
    history.set_max_history_size(2);
    assert_eq!(history.undo_count(), 2);
    assert_eq!(history.max_history_size(), 2);
    assert!(history.memory_usage() > 0);
}
