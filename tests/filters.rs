use gridpaint::canvas::{Buffer, CanvasState, Point};
use gridpaint::components::history::HistoryManager;
use gridpaint::ops::filters::{self, Filter};
use image::Rgba;
use pretty_assertions::assert_eq;

fn setup() -> (CanvasState, HistoryManager) {
    let mut state = CanvasState::new(16);
    state.add_layer("Ink");
    let mut history = HistoryManager::default();
    history.push(&state, "Baseline");
    (state, history)
}

fn paint(state: &mut CanvasState, pos: Point, color: Rgba<u8>) {
    let q = state.geometry.to_backing(pos);
    state.active_layer_mut().pixels.put_pixel(q.x, q.y, color);
}

fn visible_pixel(state: &CanvasState, pos: Point) -> Rgba<u8> {
    let q = state.geometry.to_backing(pos);
    state.active_layer().pixels.get_pixel(q.x, q.y)
}

#[test]
pub fn test_grayscale_uses_luma_weights() {
    let (mut state, mut history) = setup();
    paint(&mut state, Point::new(2, 2), Rgba([200, 100, 50, 77]));
    filters::apply_filter(&mut state, &mut history, Filter::Grayscale);
    // 0.299*200 + 0.587*100 + 0.114*50 = 124.2
    assert_eq!(visible_pixel(&state, Point::new(2, 2)), Rgba([124, 124, 124, 77]));
    assert_eq!(history.undo_count(), 2);
}

#[test]
pub fn test_invert_keeps_alpha() {
    let (mut state, mut history) = setup();
    paint(&mut state, Point::new(0, 0), Rgba([0, 100, 255, 10]));
    filters::apply_filter(&mut state, &mut history, Filter::Invert);
    assert_eq!(visible_pixel(&state, Point::new(0, 0)), Rgba([255, 155, 0, 10]));
}

#[test]
pub fn test_filters_touch_only_the_visible_window() {
    let (mut state, mut history) = setup();
    state.active_layer_mut().pixels.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
    filters::apply_filter(&mut state, &mut history, Filter::Invert);
    assert_eq!(state.active_layer().pixels.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
}

#[test]
pub fn test_blur_averages_interior() {
    let src = Buffer::new_filled(3, 3, Rgba([90, 90, 90, 255]));
    let mut buf = src.clone();
    buf.put_pixel(1, 1, Rgba([180, 180, 180, 255]));
    let out = Filter::Blur.apply_to(&buf);
    assert_eq!(out.get_pixel(1, 1), Rgba([100, 100, 100, 255]));
    assert_eq!(out.get_pixel(0, 0), Rgba([90, 90, 90, 255]));
}

#[test]
pub fn test_sharpen_boosts_center() {
    let mut buf = Buffer::new_filled(3, 3, Rgba([50, 50, 50, 200]));
    buf.put_pixel(1, 1, Rgba([100, 100, 100, 200]));
    let out = Filter::Sharpen.apply_to(&buf);
    // 5*100 - 4*50
    assert_eq!(out.get_pixel(1, 1), Rgba([255, 255, 255, 200]));
}

#[test]
pub fn test_filter_is_undoable() {
    let (mut state, mut history) = setup();
    paint(&mut state, Point::new(5, 5), Rgba([10, 20, 30, 255]));
    let before = state.layers.clone();
    filters::apply_filter(&mut state, &mut history, Filter::Invert);
    assert!(history.undo(&mut state));
    assert_eq!(state.layers, before);
    assert_eq!(Filter::all().len(), 4);
}
